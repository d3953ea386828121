use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "BULWARK_LICENSING_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Gateway base URL used by the `rest` organization client.
    #[arg(long, env = "BULWARK_GATEWAY_URL", default_value = "http://127.0.0.1:5555")]
    pub gateway_url: String,

    /// Organization service instances known to the `discovery` client.
    #[arg(
        long,
        env = "BULWARK_ORGANIZATION_INSTANCES",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:8085"
    )]
    pub organization_instances: Vec<String>,

    /// Comment attached to every license returned by a single-license lookup.
    #[arg(long, env = "BULWARK_LICENSE_COMMENT")]
    pub license_comment: Option<String>,

    #[arg(long, env = "BULWARK_OTLP_URL")]
    pub otlp_url: Option<String>,

    #[arg(long, env = "BULWARK_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
