use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "BULWARK_ORGANIZATION_ADDR", default_value = "0.0.0.0:8085")]
    pub listen_addr: String,

    #[arg(long, env = "BULWARK_OTLP_URL")]
    pub otlp_url: Option<String>,

    #[arg(long, env = "BULWARK_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}
