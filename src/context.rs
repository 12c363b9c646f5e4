//! Process-wide setup context.
//!
//! Built once at startup and shared by handle (`Arc<SetupContext>`) with the
//! orchestrator, the HTTP layer and the main server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Debug)]
pub struct SetupContext {
    config: AppConfig,
    setup_mode: AtomicBool,
    listen_port: AtomicU16,
    telemetry_client_id: Uuid,
}

impl SetupContext {
    /// A fresh context starts in setup mode.
    pub fn new(config: AppConfig) -> Self {
        let port = config.listener.port;
        Self {
            config,
            setup_mode: AtomicBool::new(true),
            listen_port: AtomicU16::new(port),
            telemetry_client_id: Uuid::new_v4(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_setup_mode(&self) -> bool {
        self.setup_mode.load(Ordering::SeqCst)
    }

    /// Leave setup mode. Returns false if it had already been left.
    pub fn leave_setup_mode(&self) -> bool {
        self.setup_mode.swap(false, Ordering::SeqCst)
    }

    /// Record the address the setup listener actually bound.
    ///
    /// Matters when the configured port is `0`.
    pub fn record_listen_addr(&self, addr: SocketAddr) {
        self.listen_port.store(addr.port(), Ordering::SeqCst);
    }

    /// Port the main server will run on.
    pub fn listen_port(&self) -> u16 {
        self.listen_port.load(Ordering::SeqCst)
    }

    pub fn telemetry_client_id(&self) -> Uuid {
        self.telemetry_client_id
    }
}
