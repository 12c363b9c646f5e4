//! Persistence collaborators used by the setup run.
//!
//! # Data Flow
//! ```text
//! FinalizeOrchestrator
//!     → ConfigStore::save_sections   (one logical write of the snapshot)
//!     → SeedStore::replace_*         (records keyed by natural key)
//!     → ModuleRegistry               (refresh from disk, enable built-ins)
//!     → LegacyImporter::import       (optional, before anything else)
//! ```
//!
//! # Design Decisions
//! - Every seed write replaces by natural key, so a retried setup run
//!   never duplicates records left behind by a failed attempt
//! - Backends are behind traits; `memory` and `file` are the bundled ones

pub mod file;
pub mod memory;
pub mod model;

use async_trait::async_trait;
use thiserror::Error;

use crate::setup::snapshot::ConfigSection;
pub use file::JsonFileConfigStore;
pub use memory::MemoryStore;
pub use model::{
    AccountKey, GroupId, Locale, ModuleKind, NavigationItem, NavigationTree, NewGroup, NewUser,
    PageRule, PageRuleMatch, UserId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("store rejected write: {0}")]
    Rejected(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persists configuration sections.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Write every given section as one logical write.
    async fn save_sections(&self, sections: &[ConfigSection]) -> StoreResult<()>;
}

/// Persists seed records. Every `replace_*` deletes any record sharing the
/// natural key before inserting.
#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Natural key: locale code.
    async fn replace_locale(&self, locale: Locale) -> StoreResult<()>;

    /// Natural key: group name. Memberships of a replaced group are dropped.
    async fn replace_group(&self, group: NewGroup) -> StoreResult<GroupId>;

    /// Natural key: `(provider, email)`. Memberships of a replaced user are dropped.
    async fn replace_user(&self, user: NewUser) -> StoreResult<UserId>;

    async fn relate_user_group(&self, user: UserId, group: GroupId) -> StoreResult<()>;

    /// Natural key: navigation key.
    async fn replace_navigation(&self, tree: NavigationTree) -> StoreResult<()>;
}

/// Registry of pluggable modules (authentication, editors, ...).
#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    /// Reload module definitions; returns how many are installed.
    async fn refresh_from_disk(&self, kind: ModuleKind) -> StoreResult<usize>;

    async fn enable(&self, kind: ModuleKind, key: &str) -> StoreResult<()>;
}

/// Imports content from a legacy installation.
#[async_trait]
pub trait LegacyImporter: Send + Sync {
    async fn import(&self, connection_string: &str) -> StoreResult<()>;
}
