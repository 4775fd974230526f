use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_LENGTH;
use crate::delivery::DeliveryConfig;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Everything the gateway needs, built once at start-up and shared read-only by every connection.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest MLLP block payload accepted before the connection is dropped.
    pub max_frame_length: usize,
    /// How long open connections get to finish after the listener stops.
    pub shutdown_grace: Duration,
    pub delivery: DeliveryConfig,
}

impl GatewayConfig {
    pub fn new(delivery: DeliveryConfig) -> Self {
        GatewayConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            delivery,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
