//! Response bodies of the setup listener.
//!
//! # Responsibilities
//! - `/finalize` results: always HTTP 200, success or failure lives in `ok`
//! - 404/500 bodies: `{message, error}`, with detail only in debug mode
//! - `Connection: close` on the success response, so the handoff can
//!   observe the client connection finishing

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::setup::FinalizeOutcome;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeSuccess {
    pub ok: bool,
    pub redirect_path: String,
    pub redirect_port: u16,
}

impl From<FinalizeOutcome> for FinalizeSuccess {
    fn from(outcome: FinalizeOutcome) -> Self {
        Self {
            ok: true,
            redirect_path: outcome.redirect_path,
            redirect_port: outcome.redirect_port,
        }
    }
}

impl IntoResponse for FinalizeSuccess {
    fn into_response(self) -> Response {
        let mut response = Json(self).into_response();
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeFailure {
    pub ok: bool,
    pub error: String,
}

impl FinalizeFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

impl IntoResponse for FinalizeFailure {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Body of 404 and 500 responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: Value,
}

impl ErrorBody {
    /// `detail` is only included when `debug` is set.
    pub fn new(message: impl Into<String>, detail: Option<&str>, debug: bool) -> Self {
        let error = match detail {
            Some(detail) if debug => json!({ "message": detail }),
            _ => json!({}),
        };
        Self {
            message: message.into(),
            error,
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
