//! Default records written at the end of a setup run.
//!
//! # Order
//! ```text
//! locale → Administrators → Guests
//!     → authentication (enable local) → editors (enable markdown)
//!     → loggers → renderers → search engines (enable db) → storage
//!     → administrator account → guest account → site navigation
//! ```
//! Each write is awaited before the next; the first failure stops the run.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::error::{SetupError, SetupResult};
use crate::setup::payload::AdminPassword;
use crate::store::{
    GroupId, Locale, ModuleKind, ModuleRegistry, NavigationItem, NavigationTree, NewGroup,
    NewUser, PageRule, PageRuleMatch, SeedStore, UserId,
};

pub const ADMIN_GROUP: &str = "Administrators";
pub const GUEST_GROUP: &str = "Guests";
pub const GUEST_EMAIL: &str = "guest@example.com";
pub const LOCAL_PROVIDER: &str = "local";
pub const DEFAULT_EDITOR: &str = "markdown";
pub const DEFAULT_SEARCH_ENGINE: &str = "db";
pub const SITE_NAVIGATION: &str = "site";

const GUEST_PERMISSIONS: [&str; 3] = ["read:pages", "read:assets", "read:comments"];

/// Registries refreshed during seeding, with the built-in each one enables.
pub const MODULE_DEFAULTS: [(ModuleKind, Option<&str>); 6] = [
    (ModuleKind::Authentication, Some(LOCAL_PROVIDER)),
    (ModuleKind::Editor, Some(DEFAULT_EDITOR)),
    (ModuleKind::Logger, None),
    (ModuleKind::Renderer, None),
    (ModuleKind::SearchEngine, Some(DEFAULT_SEARCH_ENGINE)),
    (ModuleKind::Storage, None),
];

/// Ids of the records created by [`seed_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededIds {
    pub admin_group: GroupId,
    pub guest_group: GroupId,
    pub admin_user: UserId,
    pub guest_user: UserId,
}

pub fn default_locale(code: &str) -> Locale {
    Locale {
        code: code.to_string(),
        name: "English".to_string(),
        native_name: "English".to_string(),
        is_rtl: false,
        strings: Default::default(),
    }
}

pub fn admin_group() -> NewGroup {
    NewGroup {
        name: ADMIN_GROUP.to_string(),
        permissions: vec!["manage:system".to_string()],
        page_rules: Vec::new(),
        is_system: true,
    }
}

pub fn guest_group() -> NewGroup {
    let roles: Vec<String> = GUEST_PERMISSIONS.iter().map(|p| p.to_string()).collect();
    NewGroup {
        name: GUEST_GROUP.to_string(),
        permissions: roles.clone(),
        page_rules: vec![PageRule {
            id: "guest".to_string(),
            roles,
            match_mode: PageRuleMatch::Start,
            deny: false,
            path: String::new(),
            locales: Vec::new(),
        }],
        is_system: true,
    }
}

pub fn admin_user(email: &str, password_hash: String, locale: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        provider_key: LOCAL_PROVIDER.to_string(),
        password_hash: Some(password_hash),
        name: "Administrator".to_string(),
        locale: locale.to_string(),
        default_editor: DEFAULT_EDITOR.to_string(),
        tfa_is_active: false,
        is_system: false,
        is_active: true,
        is_verified: true,
    }
}

/// The guest account has no password and can never be deactivated.
pub fn guest_user(locale: &str) -> NewUser {
    NewUser {
        email: GUEST_EMAIL.to_string(),
        provider_key: LOCAL_PROVIDER.to_string(),
        password_hash: None,
        name: "Guest".to_string(),
        locale: locale.to_string(),
        default_editor: DEFAULT_EDITOR.to_string(),
        tfa_is_active: false,
        is_system: true,
        is_active: true,
        is_verified: true,
    }
}

pub fn site_navigation() -> NavigationTree {
    NavigationTree {
        key: SITE_NAVIGATION.to_string(),
        items: vec![NavigationItem {
            id: Uuid::new_v4(),
            icon: "home".to_string(),
            kind: "link".to_string(),
            label: "Home".to_string(),
            target: "/".to_string(),
            target_type: "home".to_string(),
        }],
    }
}

/// Hash a password with Argon2id (PHC string format).
pub fn hash_password(password: &AdminPassword) -> SetupResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SetupError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC hash.
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Write every seed record in order.
pub async fn seed_records(
    store: &dyn SeedStore,
    modules: &dyn ModuleRegistry,
    admin_email: &str,
    admin_password_hash: String,
    locale: &str,
) -> SetupResult<SeededIds> {
    tracing::info!(locale, "Installing default locale");
    store.replace_locale(default_locale(locale)).await?;

    tracing::info!("Creating default groups");
    let admin_group_id = store.replace_group(admin_group()).await?;
    let guest_group_id = store.replace_group(guest_group()).await?;

    for (kind, enable) in MODULE_DEFAULTS {
        let installed = modules.refresh_from_disk(kind).await?;
        tracing::debug!(%kind, installed, "Module registry refreshed");
        if let Some(key) = enable {
            modules.enable(kind, key).await?;
            tracing::debug!(%kind, key, "Module enabled");
        }
    }

    tracing::info!("Creating root administrator");
    let admin_user_id = store
        .replace_user(admin_user(admin_email, admin_password_hash, locale))
        .await?;
    store.relate_user_group(admin_user_id, admin_group_id).await?;

    tracing::info!("Creating guest account");
    let guest_user_id = store.replace_user(guest_user(locale)).await?;
    store.relate_user_group(guest_user_id, guest_group_id).await?;

    tracing::info!("Creating default site navigation");
    store.replace_navigation(site_navigation()).await?;

    Ok(SeededIds {
        admin_group: admin_group_id,
        guest_group: guest_group_id,
        admin_user: admin_user_id,
        guest_user: guest_user_id,
    })
}
