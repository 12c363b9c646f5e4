//! Setup router.
//!
//! # Responsibilities
//! - `POST /finalize`: decode the payload and run the finalize sequence
//! - `GET *`: serve the setup page
//! - Unmatched routes → 404, handler panics → 500; both reported to telemetry
//! - Wire up middleware (request ID, tracing, panic guard)
//!
//! Finalize failures are data, not transport errors: the status stays 200,
//! oversized bodies included. The sequence runs on its own task so a client
//! that disconnects mid-request only loses the response.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::SetupError;
use crate::http::response::{ErrorBody, FinalizeFailure, FinalizeSuccess};
use crate::net::ConnectionKey;
use crate::setup::{FinalizeOrchestrator, SetupPayload};

/// State injected into setup handlers.
#[derive(Clone)]
pub struct SetupState {
    pub orchestrator: Arc<FinalizeOrchestrator>,
}

impl SetupState {
    pub fn new(orchestrator: Arc<FinalizeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    fn debug(&self) -> bool {
        self.orchestrator.context().config().setup.debug
    }
}

/// Build the setup listener's router with all middleware layers.
pub fn setup_router(state: SetupState) -> Router {
    let panic_state = state.clone();

    Router::new()
        .route(
            "/finalize",
            post(finalize).get(setup_page).fallback(not_found),
        )
        .fallback(fallback)
        .with_state(state)
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
            handle_panic(&panic_state, panic)
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn finalize(State(state): State<SetupState>, request: Request) -> Response {
    let trigger = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| ConnectionKey::from(*peer));

    let max_body_size = state.orchestrator.context().config().setup.max_body_size;
    let body = match axum::body::to_bytes(request.into_body(), max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            let err = SetupError::InvalidPayload(format!("could not read request body: {}", e));
            return FinalizeFailure::new(err.to_string()).into_response();
        }
    };
    let payload: SetupPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed finalize request");
            return FinalizeFailure::new(SetupError::InvalidPayload(e.to_string()).to_string())
                .into_response();
        }
    };

    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.finalize(payload, trigger).await });

    match task.await {
        Ok(Ok(outcome)) => FinalizeSuccess::from(outcome).into_response(),
        Ok(Err(e)) => FinalizeFailure::new(e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Finalize task did not complete");
            FinalizeFailure::new(format!("setup did not complete: {}", e)).into_response()
        }
    }
}

async fn fallback(State(state): State<SetupState>, request: Request) -> Response {
    if request.method() == Method::GET || request.method() == Method::HEAD {
        setup_page(State(state)).await.into_response()
    } else {
        not_found(State(state), request).await
    }
}

async fn setup_page(State(state): State<SetupState>) -> Html<String> {
    let ctx = state.orchestrator.context();
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} Setup</title></head>
<body>
<div id="root" data-version="{version}" data-telemetry-client-id="{client_id}"></div>
<noscript>Submit the initial configuration with POST /finalize.</noscript>
</body>
</html>
"#,
        title = html_escape(&ctx.config().site.title),
        version = env!("CARGO_PKG_VERSION"),
        client_id = ctx.telemetry_client_id(),
    ))
}

async fn not_found(State(state): State<SetupState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    tracing::error!(method = %request.method(), %path, "Not Found");
    state.orchestrator.telemetry().send_error(&format!("Not Found: {}", path));

    ErrorBody::new("Not Found", Some(&path), state.debug()).into_response_with(StatusCode::NOT_FOUND)
}

fn handle_panic(state: &SetupState, panic: Box<dyn Any + Send>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Setup handler panicked");
    state.orchestrator.telemetry().send_error(detail);

    ErrorBody::new("Internal Server Error", Some(detail), state.debug())
        .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_title() {
        assert_eq!(html_escape(r#"<b>"Wiki" & co</b>"#), "&lt;b&gt;&quot;Wiki&quot; &amp; co&lt;/b&gt;");
    }
}
