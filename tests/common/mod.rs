//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Notify;

use setup_orchestrator::config::AppConfig;
use setup_orchestrator::lifecycle::{BootTarget, BoxError};
use setup_orchestrator::observability::TelemetrySink;
use setup_orchestrator::setup::RuntimeProbe;
use setup_orchestrator::store::MemoryStore;
use setup_orchestrator::{start_setup, Collaborators, SetupContext, SetupStack};

pub const SETTLE_DELAY_MS: u64 = 50;

/// Runtime that reports a fixed version.
pub struct FixedRuntime(pub Version);

impl RuntimeProbe for FixedRuntime {
    fn name(&self) -> &str {
        "test-runtime"
    }

    fn version(&self) -> Version {
        self.0.clone()
    }
}

/// Telemetry sink that remembers everything it was sent.
#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<(String, String)>>,
    pub errors: Mutex<Vec<String>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn send_event(&self, category: &str, action: &str) {
        self.events
            .lock()
            .unwrap()
            .push((category.to_string(), action.to_string()));
    }

    fn send_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Boot target that records when it ran and whether the setup port was free.
pub struct RecordingBoot {
    addr: SocketAddr,
    pub booted: Notify,
    pub boot_at: Mutex<Option<Instant>>,
    pub port_was_free: Mutex<Option<bool>>,
}

impl RecordingBoot {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            booted: Notify::new(),
            boot_at: Mutex::new(None),
            port_was_free: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BootTarget for RecordingBoot {
    async fn boot(&self) -> Result<(), BoxError> {
        let free = tokio::net::TcpListener::bind(self.addr).await.is_ok();
        *self.port_was_free.lock().unwrap() = Some(free);
        *self.boot_at.lock().unwrap() = Some(Instant::now());
        self.booted.notify_one();
        Ok(())
    }
}

pub struct TestStack {
    pub stack: SetupStack,
    pub store: Arc<MemoryStore>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub data_path: PathBuf,
    _dir: TempDir,
}

impl TestStack {
    pub fn addr(&self) -> SocketAddr {
        self.stack.server.local_addr()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr(), path)
    }
}

pub fn test_config(data_path: PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.port = 0;
    config.listener.bind_ip = "127.0.0.1".into();
    config.setup.data_path = data_path;
    config.setup.runtime_requirement = ">=1.0.0".into();
    config.setup.flush_timeout_ms = 2000;
    config.setup.settle_delay_ms = SETTLE_DELAY_MS;
    config
}

/// Start a setup listener on an ephemeral loopback port.
pub async fn start_stack(runtime_version: &str) -> TestStack {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data");
    let store = Arc::new(MemoryStore::new());
    let telemetry = Arc::new(RecordingTelemetry::default());

    let ctx = Arc::new(SetupContext::new(test_config(data_path.clone())));
    let collaborators = Collaborators {
        config_store: store.clone(),
        seed_store: store.clone(),
        modules: store.clone(),
        importer: None,
        runtime: Arc::new(FixedRuntime(Version::parse(runtime_version).unwrap())),
        telemetry: telemetry.clone(),
    };
    let stack = start_setup(ctx, collaborators).await.unwrap();

    TestStack {
        stack,
        store,
        telemetry,
        data_path,
        _dir: dir,
    }
}

/// Client that never reuses connections and ignores proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

pub fn admin_payload(email: &str) -> Value {
    serde_json::json!({
        "adminEmail": email,
        "adminPassword": "secret",
        "telemetry": true,
        "upgrade": false
    })
}

pub async fn post_finalize(stack: &TestStack, body: &Value) -> Value {
    let response = client()
        .post(stack.url("/finalize"))
        .json(body)
        .send()
        .await
        .expect("setup listener unreachable");
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}
