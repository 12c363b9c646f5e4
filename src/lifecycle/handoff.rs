//! Handoff from the setup listener to the main server.
//!
//! # Sequence
//! ```text
//! finalize succeeds → HandoffTrigger::fire(trigger connection)
//!     → wait for the trigger connection to leave the registry
//!       (response flushed, bounded by the flush timeout)
//!     → SetupServer::stop() (socket released)
//!     → settle delay
//!     → BootTarget::boot()
//! ```
//!
//! The handler that produced the success response never stops the server
//! itself: its own connection would be destroyed before the body is written.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::SetupConfig;
use crate::lifecycle::server::{LifecycleError, SetupServer};
use crate::net::ConnectionKey;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main application's boot entry point.
#[async_trait]
pub trait BootTarget: Send + Sync {
    async fn boot(&self) -> Result<(), BoxError>;
}

#[derive(Debug, Error)]
pub enum HandoffError {
    /// Every trigger was dropped without firing.
    #[error("setup was abandoned before finalize completed")]
    Abandoned,
    #[error("failed to stop setup listener: {0}")]
    Stop(#[from] LifecycleError),
    #[error("main server failed: {0}")]
    Boot(#[source] BoxError),
}

/// Request to leave setup mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffRequest {
    /// Connection that carried the successful finalize, if known.
    pub trigger: Option<ConnectionKey>,
}

#[derive(Debug, Clone, Copy)]
pub struct HandoffTiming {
    pub flush_timeout: Duration,
    pub settle_delay: Duration,
}

impl From<&SetupConfig> for HandoffTiming {
    fn from(config: &SetupConfig) -> Self {
        Self {
            flush_timeout: config.flush_timeout(),
            settle_delay: config.settle_delay(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandoffTrigger {
    tx: mpsc::Sender<HandoffRequest>,
}

impl HandoffTrigger {
    /// Request the handoff. Returns false if one was already requested.
    pub fn fire(&self, trigger: Option<ConnectionKey>) -> bool {
        self.tx.try_send(HandoffRequest { trigger }).is_ok()
    }
}

#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::Receiver<HandoffRequest>,
}

impl HandoffReceiver {
    /// Wait for the first handoff request.
    pub async fn recv(&mut self) -> Option<HandoffRequest> {
        self.rx.recv().await
    }
}

pub fn channel() -> (HandoffTrigger, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (HandoffTrigger { tx }, HandoffReceiver { rx })
}

/// Drive the handoff to completion.
///
/// Resolves once the main server's boot entry point returns.
pub async fn run_handoff(
    server: SetupServer,
    mut requests: HandoffReceiver,
    timing: HandoffTiming,
    target: &dyn BootTarget,
) -> Result<(), HandoffError> {
    let request = requests.recv().await.ok_or(HandoffError::Abandoned)?;

    if let Some(key) = request.trigger {
        let flushed = tokio::time::timeout(timing.flush_timeout, server.registry().wait_closed(key)).await;
        if flushed.is_err() {
            tracing::warn!(
                connection = %key,
                timeout_ms = timing.flush_timeout.as_millis() as u64,
                "Finalize connection still open, stopping anyway"
            );
        }
    }

    server.stop().await?;
    tracing::info!(
        settle_delay_ms = timing.settle_delay.as_millis() as u64,
        "Setup listener released, starting main server"
    );

    tokio::time::sleep(timing.settle_delay).await;
    target.boot().await.map_err(HandoffError::Boot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    #[derive(Default)]
    struct RecordedBoot {
        /// Whether the old address could be rebound when boot ran.
        rebind_ok: Mutex<Vec<bool>>,
        addr: Mutex<Option<SocketAddr>>,
    }

    #[async_trait]
    impl BootTarget for RecordedBoot {
        async fn boot(&self) -> Result<(), BoxError> {
            let addr = self.addr.lock().unwrap().expect("address recorded");
            let ok = tokio::net::TcpListener::bind(addr).await.is_ok();
            self.rebind_ok.lock().unwrap().push(ok);
            Ok(())
        }
    }

    fn timing() -> HandoffTiming {
        HandoffTiming {
            flush_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(10),
        }
    }

    async fn start() -> SetupServer {
        let config = ListenerConfig {
            port: 0,
            bind_ip: "127.0.0.1".into(),
            max_connections: 8,
        };
        SetupServer::start(Router::new(), &config).await.unwrap()
    }

    #[tokio::test]
    async fn boot_runs_after_socket_is_released() {
        let server = start().await;
        let boot = RecordedBoot::default();
        *boot.addr.lock().unwrap() = Some(server.local_addr());

        let (trigger, rx) = channel();
        assert!(trigger.fire(None));
        assert!(!trigger.fire(None));

        run_handoff(server.clone(), rx, timing(), &boot).await.unwrap();
        assert_eq!(*boot.rebind_ok.lock().unwrap(), vec![true]);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn stalled_trigger_connection_is_destroyed_after_timeout() {
        let server = start().await;
        let boot = RecordedBoot::default();
        *boot.addr.lock().unwrap() = Some(server.local_addr());

        // Half a request: hyper waits on it forever.
        let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        let key = ConnectionKey::from(client.local_addr().unwrap());
        while !server.registry().contains(&key) {
            tokio::task::yield_now().await;
        }

        let (trigger, rx) = channel();
        trigger.fire(Some(key));
        tokio::time::timeout(Duration::from_secs(5), run_handoff(server.clone(), rx, timing(), &boot))
            .await
            .unwrap()
            .unwrap();

        assert!(!server.registry().contains(&key));
        assert_eq!(*boot.rebind_ok.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn dropped_trigger_abandons_handoff() {
        let server = start().await;
        let (trigger, rx) = channel();
        drop(trigger);

        let err = run_handoff(server, rx, timing(), &RecordedBoot::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Abandoned));
    }
}
