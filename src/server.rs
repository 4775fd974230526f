//! The TCP listener, spawning an independent pipeline task for each accepted connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::task::TaskTracker;

use crate::codec::MllpCodec;
use crate::config::GatewayConfig;
use crate::delivery::Deliver;
use crate::error::ConnectionError;
use crate::pipeline::handle_connection;

const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);
const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

/// Delay between retries after `accept` fails, doubling up to a ceiling until a connection
/// gets through again.
#[derive(Debug, Default)]
struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.delay {
            None => MIN_ACCEPT_DELAY,
            Some(delay) => (delay * 2).min(MAX_ACCEPT_DELAY),
        };
        self.delay = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.delay = None;
    }
}

/// A bound listener, ready to accept publishers.
pub struct Gateway<D: ?Sized> {
    listener: TcpListener,
    config: GatewayConfig,
    delivery: Arc<D>,
    connections: TaskTracker,
}

impl<D> Gateway<D>
where
    D: Deliver + ?Sized + 'static,
{
    /// Binds the configured address. Failing to bind is fatal for the caller to report.
    pub async fn bind(config: GatewayConfig, delivery: Arc<D>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        info!("Listening to {}", listener.local_addr()?);

        Ok(Gateway {
            listener,
            config,
            delivery,
            connections: TaskTracker::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    pub async fn run(self) {
        self.run_until(futures::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes, then waits for the open connections.
    ///
    /// Each open connection gets up to `shutdown_grace` to finish the message it is working on
    /// and for its publisher to hang up. Whatever is still running after that is left to be
    /// dropped with the runtime.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = AcceptBackoff::default();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            backoff.reset();
                            self.spawn_connection(stream, peer);
                        }
                        Err(e) => {
                            // eg. out of file descriptors, existing connections carry on regardless
                            let delay = backoff.next_delay();
                            error!("Unable to accept connection: {}, retrying in {:?}", e, delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        drop(self.listener);
        self.connections.close();

        let grace = self.config.shutdown_grace;
        if !self.connections.is_empty() {
            info!(
                "Waiting up to {:?} for {} open connection(s)",
                grace,
                self.connections.len()
            );
        }
        if tokio::time::timeout(grace, self.connections.wait())
            .await
            .is_err()
        {
            warn!(
                "{} connection(s) still open after {:?}, giving up on them",
                self.connections.len(),
                grace
            );
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        info!("New connection from {}", peer);
        let codec = MllpCodec::with_max_frame_length(self.config.max_frame_length);
        let delivery = Arc::clone(&self.delivery);

        self.connections.spawn(async move {
            if let Err(e) = handle_connection(stream, codec, &*delivery).await {
                log_connection_error(&e);
            }
            info!("Client {} disconnected", peer);
        });
    }
}

fn log_connection_error(err: &ConnectionError) {
    error!("{}", err);
    if let Some(preview) = err.preview() {
        info!("Message: {}...", preview);
    }
}
