//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured port/interface
//! - Classify bind failures (port in use vs. missing privileges)
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Another socket already owns the address.
    #[error("Port {} is already in use", .0.port())]
    PortInUse(SocketAddr),
    /// Binding the port requires elevated privileges.
    #[error("Listening on port {} requires elevated privileges", .0.port())]
    PermissionDenied(SocketAddr),
    /// Any other failure to bind.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

impl ListenerError {
    fn from_bind(addr: SocketAddr, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::AddrInUse => ListenerError::PortInUse(addr),
            io::ErrorKind::PermissionDenied => ListenerError::PermissionDenied(addr),
            _ => ListenerError::Bind(e),
        }
    }

    /// Bind failures the process cannot recover from.
    pub fn is_fatal_bind(&self) -> bool {
        matches!(
            self,
            ListenerError::PortInUse(_) | ListenerError::PermissionDenied(_)
        )
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config
            .socket_addr()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ListenerError::from_bind(addr, e))?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ListenerError::Accept(io::Error::other(e)))?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> ListenerConfig {
        ListenerConfig {
            port,
            bind_ip: "127.0.0.1".into(),
            max_connections: 2,
        }
    }

    #[tokio::test]
    async fn second_bind_reports_port_in_use() {
        let first = Listener::bind(&loopback(0)).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let err = match Listener::bind(&loopback(port)).await {
            Err(e) => e,
            Ok(_) => panic!("second bind unexpectedly succeeded"),
        };
        assert!(matches!(err, ListenerError::PortInUse(addr) if addr.port() == port));
        assert!(err.is_fatal_bind());
        assert_eq!(err.to_string(), format!("Port {} is already in use", port));
    }

    #[test]
    fn permission_denied_is_classified() {
        let addr: SocketAddr = "0.0.0.0:80".parse().unwrap();
        let err = ListenerError::from_bind(addr, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ListenerError::PermissionDenied(_)));
        assert!(err.is_fatal_bind());
        assert_eq!(err.to_string(), "Listening on port 80 requires elevated privileges");
    }

    #[test]
    fn other_bind_failures_keep_their_cause() {
        use std::error::Error as _;

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let err = ListenerError::from_bind(addr, io::Error::other("boom"));
        assert!(!err.is_fatal_bind());
        assert_eq!(err.to_string(), "Failed to bind: boom");
        assert_eq!(err.source().unwrap().to_string(), "boom");
    }

    #[tokio::test]
    async fn accept_holds_a_permit_per_connection() {
        let listener = Listener::bind(&loopback(0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), listener.max_connections() - 1);

        drop(permit);
        assert_eq!(listener.available_permits(), listener.max_connections());
    }
}
