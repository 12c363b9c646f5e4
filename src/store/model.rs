//! Records produced by the setup run and handed to the stores.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Surrogate id assigned to a group by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// Surrogate id assigned to a user by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub code: String,
    pub name: String,
    pub native_name: String,
    #[serde(rename = "isRTL")]
    pub is_rtl: bool,
    pub strings: Map<String, Value>,
}

/// How a page rule path is compared against a page path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageRuleMatch {
    Start,
    Exact,
    End,
    Regex,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRule {
    pub id: String,
    pub roles: Vec<String>,
    #[serde(rename = "match")]
    pub match_mode: PageRuleMatch,
    pub deny: bool,
    pub path: String,
    pub locales: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    pub permissions: Vec<String>,
    pub page_rules: Vec<PageRule>,
    pub is_system: bool,
}

/// Natural key of an account: `(provider, email)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountKey {
    pub provider_key: String,
    pub email: String,
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_key, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub provider_key: String,
    /// PHC-formatted password hash. `None` means no password can ever match.
    pub password_hash: Option<String>,
    pub name: String,
    pub locale: String,
    pub default_editor: String,
    pub tfa_is_active: bool,
    pub is_system: bool,
    pub is_active: bool,
    pub is_verified: bool,
}

impl NewUser {
    pub fn account_key(&self) -> AccountKey {
        AccountKey {
            provider_key: self.provider_key.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: Uuid,
    pub icon: String,
    pub kind: String,
    pub label: String,
    pub target: String,
    pub target_type: String,
}

/// A navigation tree, unique by `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTree {
    pub key: String,
    #[serde(rename = "config")]
    pub items: Vec<NavigationItem>,
}

/// The pluggable module registries refreshed during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleKind {
    Authentication,
    Editor,
    Logger,
    Renderer,
    SearchEngine,
    Storage,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 6] = [
        ModuleKind::Authentication,
        ModuleKind::Editor,
        ModuleKind::Logger,
        ModuleKind::Renderer,
        ModuleKind::SearchEngine,
        ModuleKind::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Authentication => "authentication",
            ModuleKind::Editor => "editor",
            ModuleKind::Logger => "logger",
            ModuleKind::Renderer => "renderer",
            ModuleKind::SearchEngine => "search-engine",
            ModuleKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
