//! Setup listener lifecycle.
//!
//! # Responsibilities
//! - Own the one listener serving the setup router
//! - Register every connection in the [`ConnectionRegistry`]
//! - `stop`: stop accepting, destroy open connections, release the socket
//!
//! # Stop Sequence
//! ```text
//! trigger Shutdown → accept loop exits and drops the listener (socket free)
//!     → destroy every registered connection
//!     → wait for the registry to drain
//!     → stop() returns (exactly once)
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tower::util::MapRequest;

use crate::config::ListenerConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{ConnectionKey, ConnectionPermit, ConnectionRegistry, Listener, ListenerError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("setup server has already been stopped")]
    AlreadyStopped,
}

/// Observable state of the setup server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Running,
    Stopped,
    /// The accept loop died; carries the error message.
    Failed(String),
}

struct ServerInner {
    local_addr: SocketAddr,
    registry: ConnectionRegistry,
    shutdown: Shutdown,
    accept_task: Mutex<Option<JoinHandle<Result<(), ListenerError>>>>,
    stopped: AtomicBool,
    status: watch::Sender<ServerStatus>,
}

/// Handle to the running setup listener. Cheap to clone.
#[derive(Clone)]
pub struct SetupServer {
    inner: Arc<ServerInner>,
}

impl SetupServer {
    /// Bind and begin accepting.
    ///
    /// Bind failures are returned, never retried: there is no fallback port.
    pub async fn start(router: Router, config: &ListenerConfig) -> Result<Self, ListenerError> {
        let listener = Listener::bind(config).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        let registry = ConnectionRegistry::new();
        let shutdown = Shutdown::new();
        let (status, _) = watch::channel(ServerStatus::Running);

        let task = {
            let registry = registry.clone();
            let stop = shutdown.subscribe();
            let status = status.clone();
            tokio::spawn(async move {
                let result = accept_loop(listener, router, registry, stop).await;
                if let Err(ref e) = result {
                    tracing::error!(error = %e, "Setup listener failed");
                    status.send_replace(ServerStatus::Failed(e.to_string()));
                }
                result
            })
        };

        tracing::info!(address = %local_addr, "HTTP server starting");

        Ok(Self {
            inner: Arc::new(ServerInner {
                local_addr,
                registry,
                shutdown,
                accept_task: Mutex::new(Some(task)),
                stopped: AtomicBool::new(false),
                status,
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn status(&self) -> ServerStatus {
        self.inner.status.borrow().clone()
    }

    /// Resolve with the error message once the accept loop has failed.
    ///
    /// Never resolves for a server that stops cleanly.
    pub async fn failure(&self) -> String {
        let mut status = self.inner.status.subscribe();
        loop {
            let current = status.borrow_and_update().clone();
            if let ServerStatus::Failed(message) = current {
                return message;
            }
            if status.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Stop accepting, destroy every open connection and release the socket.
    ///
    /// Completes exactly once; the socket is free for rebinding when the
    /// first call returns. Later calls fail with [`LifecycleError::AlreadyStopped`].
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyStopped);
        }

        self.inner.shutdown.trigger();
        let task = self.inner.accept_task.lock().await.take();
        if let Some(task) = task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop had already failed"),
                Err(e) => tracing::warn!(error = %e, "Accept loop task did not finish cleanly"),
            }
        }

        let destroyed = self.inner.registry.destroy_all();
        if destroyed > 0 {
            tracing::info!(destroyed, "Destroying open setup connections");
        }
        self.inner.registry.wait_empty().await;

        self.inner.status.send_if_modified(|status| {
            if *status == ServerStatus::Running {
                *status = ServerStatus::Stopped;
                true
            } else {
                false
            }
        });
        tracing::info!(address = %self.inner.local_addr, "HTTP server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: Listener,
    router: Router,
    registry: ConnectionRegistry,
    mut stop: broadcast::Receiver<()>,
) -> Result<(), ListenerError> {
    loop {
        tokio::select! {
            biased;
            _ = stop.recv() => {
                tracing::info!("Setup listener no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer, permit) = accepted?;
                serve_connection(stream, peer, permit, router.clone(), &registry);
            }
        }
    }
}

fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    permit: ConnectionPermit,
    router: Router,
    registry: &ConnectionRegistry,
) {
    let (guard, mut killed) = registry.register(ConnectionKey::from(peer));

    // Handlers read the peer via `ConnectInfo<SocketAddr>`.
    let service = MapRequest::new(router, move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    });

    tokio::spawn(async move {
        let _permit = permit;
        let connection_id = guard.id();
        let connection = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));

        tokio::select! {
            result = connection => {
                if let Err(e) = result {
                    tracing::debug!(%connection_id, error = %e, "Connection ended with error");
                }
            }
            _ = &mut killed => {
                tracing::debug!(%connection_id, "Connection destroyed");
            }
        }
        drop(guard);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn loopback() -> ListenerConfig {
        ListenerConfig {
            port: 0,
            bind_ip: "127.0.0.1".into(),
            max_connections: 16,
        }
    }

    fn router() -> Router {
        Router::new().route(
            "/peer",
            get(|ConnectInfo(peer): ConnectInfo<SocketAddr>| async move { peer.to_string() }),
        )
    }

    #[tokio::test]
    async fn stop_destroys_idle_keepalive_connections() {
        let server = SetupServer::start(router(), &loopback()).await.unwrap();
        let addr = server.local_addr();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /peer HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(&client.local_addr().unwrap().to_string()));
        assert_eq!(server.registry().len(), 1);

        tokio::time::timeout(Duration::from_secs(5), server.stop())
            .await
            .unwrap()
            .unwrap();

        assert!(server.registry().is_empty());
        assert_eq!(server.status(), ServerStatus::Stopped);
        // Peer sees EOF (or a reset) instead of hanging.
        let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn socket_is_rebindable_after_stop() {
        let server = SetupServer::start(router(), &loopback()).await.unwrap();
        let addr = server.local_addr();
        server.stop().await.unwrap();

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn stop_completes_exactly_once() {
        let server = SetupServer::start(router(), &loopback()).await.unwrap();
        let second = server.clone();

        let (a, b) = tokio::join!(server.stop(), second.stop());
        assert!(a.is_ok() ^ b.is_ok());
        assert!(matches!(server.stop().await, Err(LifecycleError::AlreadyStopped)));
    }

    #[tokio::test]
    async fn new_connections_are_refused_after_stop() {
        let server = SetupServer::start(router(), &loopback()).await.unwrap();
        let addr = server.local_addr();
        server.stop().await.unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
