use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "BULWARK_GATEWAY_ADDR", default_value = "0.0.0.0:5555")]
    pub listen_addr: String,

    /// Base URL that `/api/organization/**` is forwarded to.
    #[arg(long, env = "BULWARK_ORGANIZATION_URL", default_value = "http://127.0.0.1:8085")]
    pub organization_url: String,

    /// Base URL that `/api/licensing/**` is forwarded to.
    #[arg(long, env = "BULWARK_LICENSING_URL", default_value = "http://127.0.0.1:8080")]
    pub licensing_url: String,

    #[arg(long, env = "BULWARK_GATEWAY_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    #[arg(long, env = "BULWARK_GATEWAY_MAX_BODY_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "BULWARK_OTLP_URL")]
    pub otlp_url: Option<String>,

    #[arg(long, env = "BULWARK_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
