//! Pull sink: a minimal request/response responder.
//!
//! Each connection gets exactly one response carrying the latest snapshot as
//! JSON, then the connection is closed. The request content is ignored.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulsemeter_sdk::{LatestSnapshot, PullServer, Shutdown};
//!
//! #[tokio::main]
//! async fn main() {
//!     let latest = LatestSnapshot::new();
//!     let shutdown = Shutdown::new();
//!
//!     let server = PullServer::bind("0.0.0.0:7575").await.expect("bind");
//!     tokio::spawn(server.serve(latest.clone(), shutdown.token()));
//!
//!     // curl http://localhost:7575/
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use pulsemeter_types::Snapshot;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::shutdown::ShutdownToken;

/// How long to wait for a client's request bytes before answering anyway.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const REQUEST_BUF: usize = 1024;

/// The snapshot currently served by the pull sink.
///
/// Writers swap in a whole new `Arc<Snapshot>`; readers clone the `Arc`, so
/// a reader never sees a half-written value. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct LatestSnapshot {
    inner: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl LatestSnapshot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the served snapshot.
    pub fn store(&self, snapshot: Snapshot) {
        *self.inner.write() = Some(Arc::new(snapshot));
    }

    /// The latest snapshot, if any tick has happened yet.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().clone()
    }

    /// The response body: the latest snapshot as JSON, or `{}` before the
    /// first tick.
    pub fn render_body(&self) -> Result<String, serde_json::Error> {
        match self.get() {
            Some(snapshot) => serde_json::to_string(snapshot.as_ref()),
            None => Ok("{}".to_string()),
        }
    }
}

/// Build the full response for `body`.
pub fn format_response(body: &str) -> String {
    format!("HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n{body}")
}

/// The listening side of the pull sink.
#[derive(Debug)]
pub struct PullServer {
    listener: TcpListener,
}

impl PullServer {
    /// Bind the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, SinkError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, SinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires, answering each on its own
    /// task. The listener is closed when this returns.
    pub async fn serve(self, latest: LatestSnapshot, mut shutdown: ShutdownToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Pull sink listening");
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let latest = latest.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &latest).await {
                                warn!(%peer, error = %e, "Pull sink connection failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Pull sink accept failed");
                        // Avoid spinning on a persistent error such as fd exhaustion
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        info!("Pull sink closed");
    }
}

async fn handle_connection(mut stream: TcpStream, latest: &LatestSnapshot) -> Result<(), SinkError> {
    let mut buf = [0u8; REQUEST_BUF];
    match tokio::time::timeout(REQUEST_TIMEOUT, stream.read(&mut buf)).await {
        Ok(read) => {
            let n = read?;
            debug!(bytes = n, "Pull request");
        }
        Err(_) => debug!("No request bytes before timeout, answering anyway"),
    }

    let response = format_response(&latest.render_body()?);
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;

    async fn start() -> (SocketAddr, LatestSnapshot, Shutdown, tokio::task::JoinHandle<()>) {
        let latest = LatestSnapshot::new();
        let shutdown = Shutdown::new();
        let server = PullServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(server.serve(latest.clone(), shutdown.token()));
        (addr, latest, shutdown, task)
    }

    async fn request(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").unwrap().1
    }

    #[test]
    fn response_has_status_line_and_blank_line() {
        let response = format_response("{\"a\":1}");
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn empty_slot_renders_empty_object() {
        assert_eq!(LatestSnapshot::new().render_body().unwrap(), "{}");
    }

    #[tokio::test]
    async fn serves_latest_snapshot() {
        let (addr, latest, shutdown, task) = start().await;
        latest.store(Snapshot::builder().uuid("dev").pulse_count(42).build());

        let response = request(addr).await;
        let served: Snapshot = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(served.pulse_count, 42);
        assert_eq!(served.uuid, "dev");

        latest.store(Snapshot::builder().uuid("dev").pulse_count(43).build());
        let response = request(addr).await;
        let served: Snapshot = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(served.pulse_count, 43);

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn answers_before_first_tick() {
        let (addr, _latest, shutdown, task) = start().await;

        let response = request(addr).await;
        assert_eq!(body(&response), "{}");

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_clients_each_get_a_complete_snapshot() {
        let (addr, latest, shutdown, task) = start().await;
        latest.store(Snapshot::builder().pulse_count(7).build());

        let clients: Vec<_> = (0..8).map(|_| tokio::spawn(request(addr))).collect();
        for client in clients {
            let response = client.await.unwrap();
            let served: Snapshot = serde_json::from_str(body(&response)).unwrap();
            assert_eq!(served.pulse_count, 7);
        }

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn client_that_closes_early_does_not_stop_the_server() {
        let (addr, latest, shutdown, task) = start().await;
        latest.store(Snapshot::default());

        drop(TcpStream::connect(addr).await.unwrap());

        let response = request(addr).await;
        assert!(response.starts_with("HTTP/1.0 200 OK"));

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_closes_the_listener() {
        let (addr, _latest, shutdown, task) = start().await;

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("server should stop")
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
