//! Connection registry and lifecycle tracking.
//!
//! # Responsibilities
//! - Key every open connection by its remote `(address, port)`
//! - Generate unique connection IDs for tracing
//! - Forcibly close registered connections on shutdown
//! - Let callers wait until one connection, or all of them, have closed

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{oneshot, watch};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Remote endpoint identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    pub addr: IpAddr,
    pub port: u16,
}

impl From<SocketAddr> for ConnectionKey {
    fn from(addr: SocketAddr) -> Self {
        Self {
            addr: addr.ip(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&SocketAddr::new(self.addr, self.port), f)
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    id: ConnectionId,
    /// Taken when the connection is destroyed.
    kill: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
struct RegistryInner {
    connections: DashMap<ConnectionKey, ConnectionEntry>,
    /// Bumped on every register/unregister.
    changes: watch::Sender<u64>,
}

/// Tracks every live connection of a listener.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                connections: DashMap::new(),
                changes,
            }),
        }
    }

    /// Register a connection.
    ///
    /// The guard unregisters on drop. The receiver resolves when the
    /// connection is destroyed by [`ConnectionRegistry::destroy_all`].
    pub fn register(&self, key: ConnectionKey) -> (ConnectionGuard, oneshot::Receiver<()>) {
        let id = ConnectionId::new();
        let (kill, killed) = oneshot::channel();
        if let Some(previous) = self
            .inner
            .connections
            .insert(key, ConnectionEntry { id, kill: Some(kill) })
        {
            tracing::warn!(%key, previous = %previous.id, "Replaced stale connection entry");
        }
        self.bump();
        tracing::trace!(connection_id = %id, %key, "Connection registered");

        let guard = ConnectionGuard {
            registry: self.clone(),
            key,
            id,
        };
        (guard, killed)
    }

    fn unregister(&self, key: ConnectionKey, id: ConnectionId) {
        if self
            .inner
            .connections
            .remove_if(&key, |_, entry| entry.id == id)
            .is_some()
        {
            self.bump();
        }
    }

    fn bump(&self) {
        self.inner.changes.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.inner.connections.contains_key(key)
    }

    pub fn keys(&self) -> Vec<ConnectionKey> {
        self.inner.connections.iter().map(|e| *e.key()).collect()
    }

    /// Signal every registered connection to close immediately.
    ///
    /// Entries stay registered until their serving task drops its guard.
    /// Returns the number of connections signalled.
    pub fn destroy_all(&self) -> usize {
        let mut destroyed = 0;
        for mut entry in self.inner.connections.iter_mut() {
            if let Some(kill) = entry.kill.take() {
                let _ = kill.send(());
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Wait until `key` is no longer registered.
    pub async fn wait_closed(&self, key: ConnectionKey) {
        self.wait_until(|registry| !registry.contains(&key)).await;
    }

    /// Wait until no connection is registered.
    pub async fn wait_empty(&self) {
        self.wait_until(|registry| registry.is_empty()).await;
    }

    async fn wait_until<F>(&self, done: F)
    where
        F: Fn(&Self) -> bool,
    {
        let mut changes = self.inner.changes.subscribe();
        loop {
            if done(self) {
                return;
            }
            // The sender lives as long as `self`, so this cannot fail.
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Unregisters the connection when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: ConnectionRegistry,
    key: ConnectionKey,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn key(&self) -> ConnectionKey {
        self.key
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.key, self.id);
        tracing::trace!(connection_id = %self.id, key = %self.key, "Connection closed");
    }
}
