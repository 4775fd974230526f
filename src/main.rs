use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use hl7_mllp_gateway::codec::DEFAULT_MAX_FRAME_LENGTH;
use hl7_mllp_gateway::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SHUTDOWN_GRACE};
use hl7_mllp_gateway::{
    ConfigError, DeliveryConfig, ExtraHeader, Gateway, GatewayConfig, HttpDelivery,
};

#[derive(Parser, Debug)]
#[command(
    name = "hl7-mllp-gateway",
    version,
    about = "Receives HL7v2 messages over MLLP and forwards them to a clinical data repository"
)]
struct Cli {
    /// HL7 port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to listen on.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Repository URL to send messages to (i.e. 'https://foo.example.app/').
    #[arg(long)]
    url: String,

    /// ID of an existing Hl7v2Config resource.
    #[arg(long = "config", value_name = "ID")]
    config_id: String,

    /// Additional HTTP header in format 'Header: value', may be repeated.
    #[arg(long = "header", value_name = "HEADER")]
    headers: Vec<ExtraHeader>,

    /// Delivery request timeout, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    timeout: u64,

    /// Largest accepted message, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FRAME_LENGTH)]
    max_frame_size: usize,

    /// How long open connections get to finish on shutdown, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    shutdown_grace: u64,
}

impl Cli {
    fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut delivery = DeliveryConfig::new(&self.url, self.config_id)?;
        delivery.headers = self.headers;
        delivery.timeout = Duration::from_secs(self.timeout);

        let mut config = GatewayConfig::new(delivery);
        config.host = self.host;
        config.port = self.port;
        config.max_frame_length = self.max_frame_size;
        config.shutdown_grace = Duration::from_secs(self.shutdown_grace);
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
        futures::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let delivery = match HttpDelivery::new(&config.delivery) {
        Ok(delivery) => delivery,
        Err(e) => {
            error!("Unable to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };
    info!("Delivering messages to {}", delivery.endpoint());

    let listen_addr = config.listen_addr();
    let gateway = match Gateway::bind(config, Arc::new(delivery)).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Unable to open port {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };

    gateway.run_until(shutdown_signal()).await;
    info!("Gateway stopped");
}
