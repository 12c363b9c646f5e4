//! Configuration snapshot assembled during finalize.
//!
//! A [`SnapshotBuilder`] collects every section. Only [`SnapshotBuilder::build`]
//! produces a [`ConfigSnapshot`], and it refuses while any section is missing,
//! so the persistence step can never see a partial snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SiteConfig;
use crate::setup::certs::CertificateBundle;
use crate::setup::secrets::SessionSecret;

/// Every section name written by the persistence step, in write order.
pub const SECTION_NAMES: [&str; 14] = [
    "auth",
    "certs",
    "company",
    "features",
    "graphEndpoint",
    "host",
    "lang",
    "logo",
    "mail",
    "seo",
    "sessionSecret",
    "telemetry",
    "theming",
    "title",
];

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("configuration section '{0}' was never assembled")]
    Missing(&'static str),

    #[error("configuration section '{name}' could not be serialized: {source}")]
    Serialize {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One named section handed to the configuration store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSection {
    pub name: &'static str,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSection {
    pub audience: String,
    pub token_expiration: String,
    pub token_renewal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesSection {
    pub feature_page_ratings: bool,
    pub feature_page_comments: bool,
    pub feature_personal_wikis: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LangSection {
    pub code: String,
    pub auto_update: bool,
    pub namespacing: bool,
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSection {
    pub has_logo: bool,
    pub logo_is_square: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailSection {
    pub sender_name: String,
    pub sender_email: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub pass: String,
    #[serde(rename = "useDKIM")]
    pub use_dkim: bool,
    pub dkim_domain_name: String,
    pub dkim_key_selector: String,
    pub dkim_private_key: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            sender_name: String::new(),
            sender_email: String::new(),
            host: String::new(),
            port: 465,
            secure: true,
            user: String::new(),
            pass: String::new(),
            use_dkim: false,
            dkim_domain_name: String::new(),
            dkim_key_selector: String::new(),
            dkim_private_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoSection {
    pub description: String,
    pub robots: Vec<String>,
    pub analytics_service: String,
    pub analytics_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySection {
    pub is_enabled: bool,
    pub client_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemingSection {
    pub theme: String,
    pub dark_mode: bool,
}

/// A fully assembled configuration snapshot.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub auth: AuthSection,
    pub certs: CertificateBundle,
    pub company: String,
    pub features: FeaturesSection,
    pub graph_endpoint: String,
    pub host: String,
    pub lang: LangSection,
    pub logo: LogoSection,
    pub mail: MailSection,
    pub seo: SeoSection,
    pub session_secret: SessionSecret,
    pub telemetry: TelemetrySection,
    pub theming: ThemingSection,
    pub title: String,
}

impl ConfigSnapshot {
    /// Serialize one section by its persisted name.
    pub fn section(&self, name: &'static str) -> Result<Value, SnapshotError> {
        let value = match name {
            "auth" => serde_json::to_value(&self.auth),
            "certs" => serde_json::to_value(&self.certs),
            "company" => serde_json::to_value(&self.company),
            "features" => serde_json::to_value(&self.features),
            "graphEndpoint" => serde_json::to_value(&self.graph_endpoint),
            "host" => serde_json::to_value(&self.host),
            "lang" => serde_json::to_value(&self.lang),
            "logo" => serde_json::to_value(&self.logo),
            "mail" => serde_json::to_value(&self.mail),
            "seo" => serde_json::to_value(&self.seo),
            "sessionSecret" => serde_json::to_value(&self.session_secret),
            "telemetry" => serde_json::to_value(&self.telemetry),
            "theming" => serde_json::to_value(&self.theming),
            "title" => serde_json::to_value(&self.title),
            _ => return Err(SnapshotError::Missing(name)),
        };
        value.map_err(|source| SnapshotError::Serialize { name, source })
    }

    /// All sections in [`SECTION_NAMES`] order.
    pub fn sections(&self) -> Result<Vec<ConfigSection>, SnapshotError> {
        SECTION_NAMES
            .iter()
            .map(|&name| {
                Ok(ConfigSection {
                    name,
                    value: self.section(name)?,
                })
            })
            .collect()
    }
}

/// Incrementally assembles a [`ConfigSnapshot`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    auth: AuthSection,
    certs: Option<CertificateBundle>,
    company: String,
    features: FeaturesSection,
    graph_endpoint: String,
    host: String,
    lang: LangSection,
    logo: LogoSection,
    mail: MailSection,
    seo: SeoSection,
    session_secret: SessionSecret,
    telemetry: TelemetrySection,
    theming: ThemingSection,
    title: String,
}

impl SnapshotBuilder {
    /// Fill every section except `certs` from site defaults.
    ///
    /// The session secret is generated here; the key pair depends on it.
    pub fn new(site: &SiteConfig, telemetry_enabled: bool, telemetry_client_id: Uuid) -> Self {
        Self {
            auth: AuthSection {
                audience: site.audience.clone(),
                token_expiration: "30m".to_string(),
                token_renewal: "14d".to_string(),
            },
            certs: None,
            company: String::new(),
            features: FeaturesSection {
                feature_page_ratings: true,
                feature_page_comments: true,
                feature_personal_wikis: true,
            },
            graph_endpoint: site.graph_endpoint.clone(),
            host: site.host.clone(),
            lang: LangSection {
                code: site.locale.clone(),
                auto_update: true,
                namespacing: false,
                namespaces: Vec::new(),
            },
            logo: LogoSection {
                has_logo: false,
                logo_is_square: false,
            },
            mail: MailSection::default(),
            seo: SeoSection {
                description: String::new(),
                robots: vec!["index".to_string(), "follow".to_string()],
                analytics_service: String::new(),
                analytics_id: String::new(),
            },
            session_secret: SessionSecret::generate(),
            telemetry: TelemetrySection {
                is_enabled: telemetry_enabled,
                client_id: telemetry_client_id,
            },
            theming: ThemingSection {
                theme: "default".to_string(),
                dark_mode: false,
            },
            title: site.title.clone(),
        }
    }

    pub fn session_secret(&self) -> &SessionSecret {
        &self.session_secret
    }

    pub fn certs(mut self, certs: CertificateBundle) -> Self {
        self.certs = Some(certs);
        self
    }

    /// Finish the snapshot. Fails if any section is still missing.
    pub fn build(self) -> Result<ConfigSnapshot, SnapshotError> {
        let certs = self.certs.ok_or(SnapshotError::Missing("certs"))?;
        Ok(ConfigSnapshot {
            auth: self.auth,
            certs,
            company: self.company,
            features: self.features,
            graph_endpoint: self.graph_endpoint,
            host: self.host,
            lang: self.lang,
            logo: self.logo,
            mail: self.mail,
            seo: self.seo,
            session_secret: self.session_secret,
            telemetry: self.telemetry,
            theming: self.theming,
            title: self.title,
        })
    }
}
