//! The finalize request body.

use std::fmt;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SetupError;

/// Plaintext administrator password. Wiped from memory on drop.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct AdminPassword(String);

impl AdminPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminPassword(<redacted>)")
    }
}

/// `POST /finalize` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub admin_email: String,
    pub admin_password: AdminPassword,
    #[serde(default)]
    pub telemetry: bool,
    #[serde(default)]
    pub upgrade: bool,
    #[serde(default)]
    pub upg_mongo: Option<String>,
}

impl SetupPayload {
    /// Reject payloads that could never produce a usable administrator.
    pub fn validate(&self) -> Result<(), SetupError> {
        let email = self.admin_email.trim();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        };
        if !valid_email {
            return Err(SetupError::InvalidPayload(format!(
                "'{}' is not a valid administrator email",
                self.admin_email
            )));
        }

        if self.admin_password.expose().is_empty() {
            return Err(SetupError::InvalidPayload(
                "administrator password must not be empty".to_string(),
            ));
        }

        if self.upgrade && self.legacy_connection().is_none() {
            return Err(SetupError::InvalidPayload(
                "upgrade requested without a legacy connection string".to_string(),
            ));
        }

        Ok(())
    }

    /// Email as stored: surrounding whitespace dropped, case kept.
    pub fn stored_email(&self) -> &str {
        self.admin_email.trim()
    }

    /// The legacy connection string, if one was supplied.
    pub fn legacy_connection(&self) -> Option<&str> {
        self.upg_mongo
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> SetupPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_wire_field_names() {
        let p = payload(
            r#"{"adminEmail":"A@X.com","adminPassword":"secret","telemetry":true,"upgrade":false}"#,
        );
        assert_eq!(p.stored_email(), "A@X.com");
        assert_eq!(p.admin_password.expose(), "secret");
        assert!(p.telemetry);
        assert!(!p.upgrade);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn telemetry_defaults_to_off() {
        let p = payload(r#"{"adminEmail":"a@x.com","adminPassword":"secret"}"#);
        assert!(!p.telemetry);
    }

    #[test]
    fn rejects_bad_email_and_empty_password() {
        let p = payload(r#"{"adminEmail":"nobody","adminPassword":"secret"}"#);
        assert!(matches!(p.validate(), Err(SetupError::InvalidPayload(_))));

        let p = payload(r#"{"adminEmail":"a@x.com","adminPassword":""}"#);
        assert!(matches!(p.validate(), Err(SetupError::InvalidPayload(_))));
    }

    #[test]
    fn upgrade_needs_connection_string() {
        let p = payload(
            r#"{"adminEmail":"a@x.com","adminPassword":"s","upgrade":true,"upgMongo":"  "}"#,
        );
        assert!(p.validate().is_err());

        let p = payload(
            r#"{"adminEmail":"a@x.com","adminPassword":"s","upgrade":true,"upgMongo":"mongodb://db/wiki"}"#,
        );
        assert_eq!(p.legacy_connection(), Some("mongodb://db/wiki"));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn debug_hides_password() {
        let p = payload(r#"{"adminEmail":"a@x.com","adminPassword":"hunter2"}"#);
        assert!(!format!("{:?}", p).contains("hunter2"));
    }
}
