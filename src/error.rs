//! Errors surfaced by a finalize attempt.

use thiserror::Error;

use crate::setup::certs::CertificateError;
use crate::setup::snapshot::SnapshotError;
use crate::store::StoreError;

/// Everything that can stop a finalize attempt.
///
/// None of these are fatal to the process: they are reported to the caller
/// as `{ok: false, error}` and setup mode stays active so the attempt can be
/// retried.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{runtime} {required} required (found {found})")]
    UnsupportedRuntime {
        runtime: String,
        required: String,
        found: String,
    },

    #[error("invalid setup request: {0}")]
    InvalidPayload(String),

    #[error("setup is already being finalized")]
    FinalizeInProgress,

    #[error("setup has already been completed")]
    AlreadyCompleted,

    #[error("upgrade requested but no legacy importer is available")]
    UpgradeUnavailable,

    #[error("legacy import failed: {0}")]
    Import(#[source] StoreError),

    #[error("failed to prepare data directories: {0}")]
    Directory(#[from] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to hash administrator password: {0}")]
    PasswordHash(String),
}

pub type SetupResult<T> = Result<T, SetupError>;

impl SetupError {
    /// Whether the failure happened before anything was written.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SetupError::UnsupportedRuntime { .. }
                | SetupError::InvalidPayload(_)
                | SetupError::FinalizeInProgress
                | SetupError::AlreadyCompleted
                | SetupError::UpgradeUnavailable
        )
    }
}
