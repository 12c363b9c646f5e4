//! Main application server, booted once setup has handed off.
//!
//! Rebinds the port the setup listener released and serves until a
//! termination signal or an explicit [`MainServer::shutdown`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::context::SetupContext;
use crate::lifecycle::{shutdown_signal, BootTarget, BoxError, Shutdown};

#[derive(Debug, Serialize)]
struct SiteStatus {
    title: String,
    version: &'static str,
    setup_mode: bool,
}

pub struct MainServer {
    ctx: Arc<SetupContext>,
    shutdown: Shutdown,
}

impl MainServer {
    pub fn new(ctx: Arc<SetupContext>) -> Self {
        Self {
            ctx,
            shutdown: Shutdown::new(),
        }
    }

    /// Stop a booted server without an OS signal.
    pub fn shutdown(&self) -> bool {
        self.shutdown.trigger()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/healthz", get(|| async { "ok" }))
            .with_state(self.ctx.clone())
            .layer(TraceLayer::new_for_http())
    }
}

#[async_trait]
impl BootTarget for MainServer {
    async fn boot(&self) -> Result<(), BoxError> {
        let mut stop = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return Ok(());
        }

        let mut config = self.ctx.config().listener.clone();
        config.port = self.ctx.listen_port();
        let addr = config.socket_addr()?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Main server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = stop.recv() => {}
                }
            })
            .await?;

        tracing::info!("Main server stopped");
        Ok(())
    }
}

async fn index(State(ctx): State<Arc<SetupContext>>) -> Json<SiteStatus> {
    Json(SiteStatus {
        title: ctx.config().site.title.clone(),
        version: env!("CARGO_PKG_VERSION"),
        setup_mode: ctx.is_setup_mode(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_on_recorded_port_until_shutdown() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let mut config = AppConfig::default();
        config.listener.bind_ip = "127.0.0.1".into();
        let ctx = Arc::new(SetupContext::new(config));
        ctx.record_listen_addr(([127, 0, 0, 1], port).into());

        let server = Arc::new(MainServer::new(ctx));
        let running = {
            let server = server.clone();
            tokio::spawn(async move { server.boot().await.map_err(|e| e.to_string()) })
        };

        let mut connected = false;
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                connected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(connected);

        assert!(server.shutdown());
        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
