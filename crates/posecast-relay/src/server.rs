//! TCP listener and task wiring for the relay.
//!
//! [`RelayServer`] owns the lifetime of everything: the accept loop, one
//! connection task per socket, and the three broadcast tasks. A `watch`
//! channel fans the shutdown signal out to all of them; flipping it stops
//! accepting, ends the tick loops, and lets every connection task drop its
//! socket, so in-flight writes fail fast instead of hanging.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, watch};

use posecast_config::RelayConfig;

use crate::broadcast::{population_event_loop, population_tick_loop, pose_tick_loop};
use crate::clients::ClientTable;
use crate::connection::handle_connection;
use crate::registry::{BodyRegistry, PopulationEvent};

/// The relay server: listener, shared tables, and broadcast timers.
pub struct RelayServer {
    config: RelayConfig,
    /// Tracked bodies (public for test inspection).
    pub registry: Arc<BodyRegistry>,
    /// Connected viewers (public for test inspection).
    pub clients: Arc<ClientTable>,
    /// Population-event receiver, consumed by the first `run` call.
    events: Mutex<Option<mpsc::UnboundedReceiver<PopulationEvent>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayServer {
    /// Construct a server from configuration. Nothing runs until [`run`].
    ///
    /// [`run`]: RelayServer::run
    pub fn new(config: RelayConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            registry: Arc::new(BodyRegistry::new(config.limits.max_bodies, event_tx)),
            clients: Arc::new(ClientTable::new(config.limits.max_clients)),
            events: Mutex::new(Some(event_rx)),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run until shutdown.
    ///
    /// A bind failure here is the only process-fatal error in the relay.
    pub async fn run(&self) -> std::io::Result<()> {
        let addr = format!(
            "{}:{}",
            self.config.network.bind_address, self.config.network.port
        );
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Relay listening on {}", listener.local_addr()?);
        self.run_with_listener(listener).await
    }

    /// Run with a pre-bound listener (useful for ephemeral-port tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        if let Some(events) = self.events.lock().await.take() {
            tokio::spawn(population_event_loop(
                Arc::clone(&self.clients),
                events,
                self.shutdown_rx.clone(),
            ));
        }
        tokio::spawn(pose_tick_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.clients),
            Duration::from_millis(self.config.timing.pose_tick_ms),
            self.shutdown_rx.clone(),
        ));
        tokio::spawn(population_tick_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.clients),
            Duration::from_millis(self.config.timing.population_tick_ms),
            self.shutdown_rx.clone(),
        ));

        let write_timeout = Duration::from_millis(self.config.timing.write_timeout_ms);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    stream.set_nodelay(true)?;
                    tracing::info!("Accepted connection from {peer}");

                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.clients),
                        write_timeout,
                        self.shutdown_rx.clone(),
                    ));
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Start a server on an ephemeral port and return the bound address.
    async fn start_test_server() -> (SocketAddr, Arc<RelayServer>) {
        let mut config = RelayConfig::default();
        config.timing.pose_tick_ms = 10;
        config.timing.population_tick_ms = 50;

        let server = Arc::new(RelayServer::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let srv = Arc::clone(&server);
        tokio::spawn(async move {
            srv.run_with_listener(listener).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        (addr, server)
    }

    #[tokio::test]
    async fn test_server_accepts_connection() {
        let (addr, _server) = start_test_server().await;
        let stream = TcpStream::connect(addr).await;
        assert!(stream.is_ok(), "Client should connect to the relay");
    }

    #[tokio::test]
    async fn test_login_occupies_slot() {
        let (addr, server) = start_test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"*login,Viewer*").await.unwrap();

        for _ in 0..50 {
            if server.clients.count().await == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("login was not registered");
    }

    #[tokio::test]
    async fn test_sensor_frames_populate_registry() {
        let (addr, server) = start_test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"*cbody,42**ubody,42,Head,1.0,2.0,3.0,0,0,0,1,0*")
            .await
            .unwrap();

        for _ in 0..50 {
            let snaps = server.registry.snapshot().await;
            if let Some(head) = snaps
                .first()
                .and_then(|s| s.joints.iter().find(|j| j.joint == "Head"))
                && head.pos == [1.0, 2.0, 3.0]
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sensor frames were not applied");
    }

    #[tokio::test]
    async fn test_graceful_shutdown_closes_connections() {
        let (addr, server) = start_test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "Client should receive EOF after relay shutdown");
    }
}
