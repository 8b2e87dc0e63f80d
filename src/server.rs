//! Server lifecycle: bind, run the accept loop alongside the refresh
//! ticker, and shut both down in response to a cancellation signal.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::{HttpError, Result};
use crate::http;
use crate::producer::FrameSlot;
use crate::refresh::RefreshTicker;
use crate::snapshot::ExposedSnapshot;

const NEW_CLIENT_CHANNEL_CAPACITY: usize = 32;

/// Owns the bound listener, the frame slot shared with the producer, and
/// the cancellation token that stops both the accept loop and the
/// refresh ticker together.
pub struct Server {
    config: AppConfig,
    frame_slot: Arc<FrameSlot>,
    exposed: Arc<RwLock<ExposedSnapshot>>,
    listener: Option<TcpListener>,
    cancel: CancellationToken,
}

impl Server {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            frame_slot: Arc::new(FrameSlot::new()),
            exposed: Arc::new(RwLock::new(ExposedSnapshot::blank())),
            listener: None,
            cancel: CancellationToken::new(),
        }
    }

    /// The frame slot the producer (real or demo) publishes into.
    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.frame_slot)
    }

    /// Bind the listening socket. Must be called before `run`.
    pub async fn listen(&mut self) -> Result<()> {
        let address = format!("{}:{}", self.config.http.host, self.config.http.port);
        info!("binding HTTP listener on {}", address);

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| HttpError::BindFailed {
                address: address.clone(),
                source,
            })?;

        info!("listening on {}", address);
        self.listener = Some(listener);
        Ok(())
    }

    /// Drive the accept loop and the refresh ticker until `stop` is
    /// called. Consumes the listener bound by `listen`.
    pub async fn run(&mut self) -> Result<()> {
        let listener = self.listener.take().ok_or_else(|| HttpError::StartupFailed {
            details: "run() called before listen()".to_string(),
        })?;

        let (new_clients_tx, new_clients_rx) = mpsc::channel(NEW_CLIENT_CHANNEL_CAPACITY);
        let ticker = RefreshTicker::new(
            Arc::clone(&self.frame_slot),
            Arc::clone(&self.exposed),
            self.config.refresh_interval(),
        );
        let ticker_cancel = self.cancel.clone();
        let ticker_task = tokio::spawn(ticker.run(new_clients_rx, ticker_cancel));

        let idle_timeout = self.config.idle_timeout();
        let exposed = Arc::clone(&self.exposed);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!("accepted connection from {}", peer);
                            tokio::spawn(http::handle_connection(
                                stream,
                                idle_timeout,
                                Arc::clone(&exposed),
                                new_clients_tx.clone(),
                            ));
                        }
                        Err(e) => {
                            error!("accept failed: {}", e);
                        }
                    }
                }
            }
        }

        info!("accept loop stopped, waiting for refresh ticker to finish");
        if let Err(e) = ticker_task.await {
            error!("refresh ticker task panicked: {}", e);
        }

        Ok(())
    }

    /// Request shutdown of the accept loop and the refresh ticker.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, for callers that need to
    /// trigger shutdown from outside while `run` holds `&mut self`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn test_config(port: u16) -> AppConfig {
        let mut config = AppConfig::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = port;
        config.producer.refresh_interval_us = 5_000;
        config
    }

    #[tokio::test]
    async fn test_listen_then_run_serves_ping() {
        let mut server = Server::new(test_config(0));
        // port 0 picks an ephemeral port; re-read it from the listener.
        server.listen().await.unwrap();
        let addr = server.listener.as_ref().unwrap().local_addr().unwrap();

        let run_task = tokio::spawn(async move {
            let _ = server.run().await;
            server
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /ping HTTP/1.0\r\n\r\n").await.unwrap();

        let mut buf = Vec::new();
        use tokio::io::AsyncReadExt;
        client.read_to_end(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf);
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.contains("\"online\":false"));

        run_task.abort();
    }

    #[tokio::test]
    async fn test_run_without_listen_reports_startup_error() {
        let mut server = Server::new(test_config(0));
        let result = server.run().await;
        assert!(result.is_err());
    }
}
