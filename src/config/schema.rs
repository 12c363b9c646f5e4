//! Configuration schema definitions.
//!
//! This module defines the configuration the setup server is started with.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the setup orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (port, bind interface).
    pub listener: ListenerConfig,

    /// First-run setup behaviour.
    pub setup: SetupConfig,

    /// Site defaults written into the configuration snapshot.
    pub site: SiteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
///
/// The setup listener and the main server share the same port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to listen on. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_ip: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Resolve the socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.bind_ip.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_ip: "0.0.0.0".to_string(),
            max_connections: 1024,
        }
    }
}

/// Setup-mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Root of the on-disk working directories.
    pub data_path: PathBuf,

    /// Semver requirement the host runtime must satisfy.
    pub runtime_requirement: String,

    /// Upper bound on waiting for the finalize response to reach the client.
    pub flush_timeout_ms: u64,

    /// Delay between releasing the setup socket and booting the main server.
    pub settle_delay_ms: u64,

    /// Include error detail in 404/500 bodies.
    pub debug: bool,

    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,
}

impl SetupConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data"),
            runtime_requirement: ">=0.1.0".to_string(),
            flush_timeout_ms: 5_000,
            settle_delay_ms: 1_000,
            debug: false,
            max_body_size: 64 * 1024,
        }
    }
}

/// Site defaults used when assembling the configuration snapshot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Token audience for issued JWTs.
    pub audience: String,

    /// Endpoint used to fetch locale packs.
    pub graph_endpoint: String,

    /// Public host prefix.
    pub host: String,

    /// Default locale code.
    pub locale: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Wiki.js".to_string(),
            audience: "urn:wiki.js".to_string(),
            graph_endpoint: "https://graph.requarks.io".to_string(),
            host: "http://".to_string(),
            locale: "en".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty formatter.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("[listener]\nport = 8080\n").unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.listener.bind_ip, "0.0.0.0");
        assert_eq!(config.setup.settle_delay(), Duration::from_millis(1_000));
        assert_eq!(config.site.locale, "en");
        assert_eq!(config.site.title, "Wiki.js");
        assert_eq!(config.site.audience, "urn:wiki.js");
    }

    #[test]
    fn socket_addr_combines_ip_and_port() {
        let listener = ListenerConfig {
            port: 4000,
            bind_ip: "127.0.0.1".into(),
            max_connections: 1,
        };
        assert_eq!(listener.socket_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());
    }
}
