//! In-memory store implementing every setup collaborator.
//!
//! Used by the binary when no external database is wired in, and by tests.
//! One-shot failure points can be armed to simulate a collaborator failing
//! mid-sequence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::setup::snapshot::ConfigSection;
use crate::store::model::{
    GroupId, Locale, ModuleKind, NavigationTree, NewGroup, NewUser, UserId,
};
use crate::store::{ConfigStore, LegacyImporter, ModuleRegistry, SeedStore, StoreError, StoreResult};

/// Modules shipped with the application, per registry.
fn builtin_catalogue() -> HashMap<ModuleKind, Vec<&'static str>> {
    HashMap::from([
        (ModuleKind::Authentication, vec!["local", "github", "google", "ldap", "oidc", "saml"]),
        (ModuleKind::Editor, vec!["markdown", "ckeditor", "code", "asciidoc", "api"]),
        (ModuleKind::Logger, vec!["airbrake", "bugsnag", "loggly", "sentry"]),
        (ModuleKind::Renderer, vec!["markdown-core", "html-core", "html-security", "asciidoc-core"]),
        (ModuleKind::SearchEngine, vec!["db", "postgres", "elasticsearch", "solr"]),
        (ModuleKind::Storage, vec!["disk", "git", "s3", "sftp"]),
    ])
}

#[derive(Debug, Default)]
struct MemoryState {
    config: BTreeMap<String, Value>,
    locales: BTreeMap<String, Locale>,
    groups: BTreeMap<GroupId, NewGroup>,
    users: BTreeMap<UserId, NewUser>,
    memberships: BTreeSet<(UserId, GroupId)>,
    navigation: BTreeMap<String, NavigationTree>,
    /// kind → (module key → enabled)
    modules: HashMap<ModuleKind, BTreeMap<String, bool>>,
    imports: Vec<String>,
    next_id: u64,
    fail_points: HashSet<&'static str>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, op: &'static str) -> StoreResult<()> {
        if self.fail_points.remove(op) {
            return Err(StoreError::Rejected(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

/// Store that keeps every record in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    catalogue: HashMap<ModuleKind, Vec<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            catalogue: builtin_catalogue(),
        }
    }

    /// Make the next call of `op` fail once. `op` is the trait method name
    /// (`"save_sections"`, `"replace_user"`, `"refresh_from_disk"`, ...).
    pub async fn fail_next(&self, op: &'static str) {
        self.state.write().await.fail_points.insert(op);
    }

    pub async fn config_section(&self, name: &str) -> Option<Value> {
        self.state.read().await.config.get(name).cloned()
    }

    pub async fn config_names(&self) -> Vec<String> {
        self.state.read().await.config.keys().cloned().collect()
    }

    pub async fn locales(&self) -> Vec<Locale> {
        self.state.read().await.locales.values().cloned().collect()
    }

    pub async fn groups(&self) -> Vec<(GroupId, NewGroup)> {
        let state = self.state.read().await;
        state.groups.iter().map(|(id, g)| (*id, g.clone())).collect()
    }

    pub async fn users(&self) -> Vec<(UserId, NewUser)> {
        let state = self.state.read().await;
        state.users.iter().map(|(id, u)| (*id, u.clone())).collect()
    }

    pub async fn groups_of(&self, user: UserId) -> Vec<GroupId> {
        let state = self.state.read().await;
        state
            .memberships
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, g)| *g)
            .collect()
    }

    pub async fn navigation(&self, key: &str) -> Option<NavigationTree> {
        self.state.read().await.navigation.get(key).cloned()
    }

    pub async fn installed_modules(&self, kind: ModuleKind) -> Vec<String> {
        let state = self.state.read().await;
        state
            .modules
            .get(&kind)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn enabled_modules(&self, kind: ModuleKind) -> Vec<String> {
        let state = self.state.read().await;
        state
            .modules
            .get(&kind)
            .map(|m| {
                m.iter()
                    .filter(|(_, enabled)| **enabled)
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn imports(&self) -> Vec<String> {
        self.state.read().await.imports.clone()
    }

    /// True when nothing has been written yet.
    pub async fn is_pristine(&self) -> bool {
        let state = self.state.read().await;
        state.config.is_empty()
            && state.locales.is_empty()
            && state.groups.is_empty()
            && state.users.is_empty()
            && state.navigation.is_empty()
            && state.modules.is_empty()
            && state.imports.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn save_sections(&self, sections: &[ConfigSection]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("save_sections")?;
        for section in sections {
            state
                .config
                .insert(section.name.to_string(), section.value.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl SeedStore for MemoryStore {
    async fn replace_locale(&self, locale: Locale) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("replace_locale")?;
        state.locales.insert(locale.code.clone(), locale);
        Ok(())
    }

    async fn replace_group(&self, group: NewGroup) -> StoreResult<GroupId> {
        let mut state = self.state.write().await;
        state.check("replace_group")?;

        let stale: Vec<GroupId> = state
            .groups
            .iter()
            .filter(|(_, g)| g.name == group.name)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            state.groups.remove(id);
        }
        state.memberships.retain(|(_, g)| !stale.contains(g));

        let id = GroupId(state.next_id());
        state.groups.insert(id, group);
        Ok(id)
    }

    async fn replace_user(&self, user: NewUser) -> StoreResult<UserId> {
        let mut state = self.state.write().await;
        state.check("replace_user")?;

        let key = user.account_key();
        let stale: Vec<UserId> = state
            .users
            .iter()
            .filter(|(_, u)| u.account_key() == key)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            state.users.remove(id);
        }
        state.memberships.retain(|(u, _)| !stale.contains(u));

        let id = UserId(state.next_id());
        state.users.insert(id, user);
        Ok(id)
    }

    async fn relate_user_group(&self, user: UserId, group: GroupId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("relate_user_group")?;

        if !state.users.contains_key(&user) {
            return Err(StoreError::NotFound {
                kind: "user",
                key: user.0.to_string(),
            });
        }
        if !state.groups.contains_key(&group) {
            return Err(StoreError::NotFound {
                kind: "group",
                key: group.0.to_string(),
            });
        }
        state.memberships.insert((user, group));
        Ok(())
    }

    async fn replace_navigation(&self, tree: NavigationTree) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("replace_navigation")?;
        state.navigation.insert(tree.key.clone(), tree);
        Ok(())
    }
}

#[async_trait]
impl ModuleRegistry for MemoryStore {
    async fn refresh_from_disk(&self, kind: ModuleKind) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        state.check("refresh_from_disk")?;

        let available = self.catalogue.get(&kind).cloned().unwrap_or_default();
        let installed = state.modules.entry(kind).or_default();
        installed.retain(|key, _| available.contains(&key.as_str()));
        for key in available {
            installed.entry(key.to_string()).or_insert(false);
        }
        Ok(installed.len())
    }

    async fn enable(&self, kind: ModuleKind, key: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("enable")?;

        match state.modules.get_mut(&kind).and_then(|m| m.get_mut(key)) {
            Some(enabled) => {
                *enabled = true;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: kind.as_str(),
                key: key.to_string(),
            }),
        }
    }
}

#[async_trait]
impl LegacyImporter for MemoryStore {
    async fn import(&self, connection_string: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check("import")?;
        state.imports.push(connection_string.to_string());
        Ok(())
    }
}
