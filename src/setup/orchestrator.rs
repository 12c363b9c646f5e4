//! Finalize orchestration.
//!
//! # Sequence
//! ```text
//! preconditions (no side effects):
//!     in-flight guard → not yet completed → runtime version → payload
//! steps (strictly ordered, first failure aborts, no rollback):
//!     1. legacy import (only when requested)
//!     2. data directories
//!     3. configuration snapshot (generates the session secret)
//!     4. key pair sealed with the session secret
//!     5. persist every snapshot section
//!     6. seed records
//! then:
//!     leave setup mode → request handoff → caller answers {ok, redirectPath, redirectPort}
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::parse_config_value;
use crate::context::SetupContext;
use crate::error::{SetupError, SetupResult};
use crate::lifecycle::HandoffTrigger;
use crate::net::ConnectionKey;
use crate::observability::TelemetrySink;
use crate::setup::certs::CertificateBundle;
use crate::setup::dirs::DataDirectories;
use crate::setup::payload::SetupPayload;
use crate::setup::runtime::{check_runtime, RuntimeProbe};
use crate::setup::seed::{hash_password, seed_records};
use crate::setup::snapshot::SnapshotBuilder;
use crate::store::{ConfigStore, LegacyImporter, ModuleRegistry, SeedStore};

/// Services the finalize sequence writes through.
#[derive(Clone)]
pub struct Collaborators {
    pub config_store: Arc<dyn ConfigStore>,
    pub seed_store: Arc<dyn SeedStore>,
    pub modules: Arc<dyn ModuleRegistry>,
    /// `None` when this build cannot migrate a legacy installation.
    pub importer: Option<Arc<dyn LegacyImporter>>,
    pub runtime: Arc<dyn RuntimeProbe>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

/// Where the client should go once setup is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub redirect_path: String,
    pub redirect_port: u16,
}

pub struct FinalizeOrchestrator {
    ctx: Arc<SetupContext>,
    collaborators: Collaborators,
    handoff: HandoffTrigger,
    in_flight: Mutex<()>,
    completed: AtomicBool,
}

impl FinalizeOrchestrator {
    pub fn new(ctx: Arc<SetupContext>, collaborators: Collaborators, handoff: HandoffTrigger) -> Self {
        Self {
            ctx,
            collaborators,
            handoff,
            in_flight: Mutex::new(()),
            completed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<SetupContext> {
        &self.ctx
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.collaborators.telemetry
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Run the whole setup sequence for one submission.
    ///
    /// `trigger` is the connection that carried the request; the handoff
    /// waits for it to close before stopping the setup listener.
    pub async fn finalize(
        &self,
        payload: SetupPayload,
        trigger: Option<ConnectionKey>,
    ) -> SetupResult<FinalizeOutcome> {
        self.collaborators.telemetry.send_event("setup", "finalize");

        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SetupError::FinalizeInProgress)?;
        if self.is_completed() || !self.ctx.is_setup_mode() {
            return Err(SetupError::AlreadyCompleted);
        }

        if let Err(e) = self.run(&payload).await {
            tracing::error!(error = %e, "Setup failed");
            return Err(e);
        }

        self.completed.store(true, Ordering::SeqCst);
        self.ctx.leave_setup_mode();
        tracing::info!("Setup is complete");

        if !self.handoff.fire(trigger) {
            tracing::warn!("Handoff was already requested");
        }

        Ok(FinalizeOutcome {
            redirect_path: "/".to_string(),
            redirect_port: self.ctx.listen_port(),
        })
    }

    async fn run(&self, payload: &SetupPayload) -> SetupResult<()> {
        let config = self.ctx.config();

        check_runtime(&config.setup.runtime_requirement, self.collaborators.runtime.as_ref())?;
        payload.validate()?;
        let importer = match (payload.upgrade, &self.collaborators.importer) {
            (true, Some(importer)) => Some(importer),
            (true, None) => return Err(SetupError::UpgradeUnavailable),
            (false, _) => None,
        };

        if let (Some(importer), Some(connection)) = (importer, payload.legacy_connection()) {
            tracing::info!("Importing legacy installation");
            importer
                .import(&parse_config_value(connection))
                .await
                .map_err(SetupError::Import)?;
        }

        tracing::info!(path = %config.setup.data_path.display(), "Creating data directories");
        DataDirectories::new(&config.setup.data_path).prepare().await?;

        let builder = SnapshotBuilder::new(
            &config.site,
            payload.telemetry,
            self.ctx.telemetry_client_id(),
        );

        tracing::info!("Generating certificates");
        let certs = CertificateBundle::generate_async(builder.session_secret().clone()).await?;
        let snapshot = builder.certs(certs).build()?;

        tracing::info!("Persisting configuration");
        let sections = snapshot.sections()?;
        self.collaborators.config_store.save_sections(&sections).await?;

        let password = payload.admin_password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| SetupError::PasswordHash(e.to_string()))??;

        seed_records(
            self.collaborators.seed_store.as_ref(),
            self.collaborators.modules.as_ref(),
            payload.stored_email(),
            password_hash,
            &config.site.locale,
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::lifecycle::handoff::{self, HandoffReceiver};
    use crate::setup::payload::AdminPassword;
    use crate::setup::secrets::SessionSecret;
    use crate::setup::seed::{verify_password, GUEST_EMAIL};
    use crate::setup::snapshot::SECTION_NAMES;
    use crate::store::MemoryStore;
    use semver::Version;
    use std::path::Path;

    struct FixedRuntime(Version);

    impl RuntimeProbe for FixedRuntime {
        fn name(&self) -> &str {
            "test-runtime"
        }
        fn version(&self) -> Version {
            self.0.clone()
        }
    }

    struct Quiet;

    impl TelemetrySink for Quiet {
        fn send_event(&self, _: &str, _: &str) {}
        fn send_error(&self, _: &str) {}
    }

    fn orchestrator(
        data: &Path,
        store: &Arc<MemoryStore>,
        runtime: &str,
        with_importer: bool,
    ) -> (FinalizeOrchestrator, HandoffReceiver) {
        let mut config = AppConfig::default();
        config.listener.port = 4242;
        config.setup.data_path = data.to_path_buf();
        config.setup.runtime_requirement = ">=1.0.0".into();

        let collaborators = Collaborators {
            config_store: store.clone(),
            seed_store: store.clone(),
            modules: store.clone(),
            importer: with_importer.then(|| store.clone() as Arc<dyn LegacyImporter>),
            runtime: Arc::new(FixedRuntime(Version::parse(runtime).unwrap())),
            telemetry: Arc::new(Quiet),
        };
        let (trigger, rx) = handoff::channel();
        let ctx = Arc::new(SetupContext::new(config));
        (FinalizeOrchestrator::new(ctx, collaborators, trigger), rx)
    }

    fn payload(email: &str) -> SetupPayload {
        SetupPayload {
            admin_email: email.to_string(),
            admin_password: AdminPassword::new("secret"),
            telemetry: true,
            upgrade: false,
            upg_mongo: None,
        }
    }

    #[tokio::test]
    async fn successful_finalize_persists_everything_and_requests_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let store = Arc::new(MemoryStore::new());
        let (orch, mut rx) = orchestrator(&data, &store, "1.2.0", false);

        let outcome = orch.finalize(payload("A@x.com"), None).await.unwrap();
        assert_eq!(outcome.redirect_path, "/");
        assert_eq!(outcome.redirect_port, 4242);
        assert!(!orch.context().is_setup_mode());
        assert_eq!(rx.recv().await.map(|r| r.trigger), Some(None));

        let mut names = store.config_names().await;
        names.sort();
        let mut expected: Vec<String> = SECTION_NAMES.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(names, expected);

        assert!(data.join("cache").is_dir());
        assert!(data.join("uploads").is_dir());

        let users = store.users().await;
        let admin = users.iter().find(|(_, u)| u.email == "a@x.com").unwrap();
        assert!(verify_password(admin.1.password_hash.as_deref().unwrap(), "secret"));
        let guest = users.iter().find(|(_, u)| u.email == GUEST_EMAIL).unwrap();
        assert!(guest.1.password_hash.is_none());
    }

    #[tokio::test]
    async fn persisted_private_key_opens_with_persisted_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", false);
        orch.finalize(payload("a@x.com"), None).await.unwrap();

        let certs: CertificateBundle =
            serde_json::from_value(store.config_section("certs").await.unwrap()).unwrap();
        let secret = store.config_section("sessionSecret").await.unwrap();
        let secret = SessionSecret::parse(secret.as_str().unwrap()).unwrap();

        let key = certs.unlock(&secret).unwrap();
        assert_eq!(rsa::RsaPublicKey::from(&key), certs.public_key().unwrap());
        assert!(certs.unlock(&SessionSecret::generate()).is_err());
    }

    #[tokio::test]
    async fn unsupported_runtime_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(&data, &store, "0.9.0", false);

        let err = orch.finalize(payload("a@x.com"), None).await.unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedRuntime { .. }));
        assert!(err.is_precondition());
        assert!(store.is_pristine().await);
        assert!(!data.exists());
        assert!(orch.context().is_setup_mode());
    }

    #[tokio::test]
    async fn retry_after_failure_does_not_duplicate_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", false);

        store.fail_next("replace_navigation").await;
        assert!(orch.finalize(payload("a@x.com"), None).await.is_err());
        assert!(orch.context().is_setup_mode());
        assert_eq!(store.users().await.len(), 2);

        orch.finalize(payload("a@x.com"), None).await.unwrap();
        assert_eq!(store.users().await.len(), 2);
        assert_eq!(store.groups().await.len(), 2);
        assert_eq!(store.locales().await.len(), 1);
    }

    #[tokio::test]
    async fn second_submission_after_success_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", false);

        orch.finalize(payload("a@x.com"), None).await.unwrap();
        let err = orch.finalize(payload("b@x.com"), None).await.unwrap_err();
        assert!(matches!(err, SetupError::AlreadyCompleted));
        assert_eq!(store.users().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_submission_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", false);

        let _held = orch.in_flight.try_lock().unwrap();
        let err = orch.finalize(payload("a@x.com"), None).await.unwrap_err();
        assert!(matches!(err, SetupError::FinalizeInProgress));
        assert!(store.is_pristine().await);
    }

    #[tokio::test]
    async fn upgrade_imports_with_substituted_connection_string() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", true);

        let mut request = payload("a@x.com");
        request.upgrade = true;
        request.upg_mongo = Some("mongodb://$(SETUP_TEST_UNSET_HOST:legacy-db)/wiki".into());
        orch.finalize(request, None).await.unwrap();

        assert_eq!(store.imports().await, vec!["mongodb://legacy-db/wiki".to_string()]);
    }

    #[tokio::test]
    async fn upgrade_without_importer_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (orch, _rx) = orchestrator(dir.path(), &store, "1.2.0", false);

        let mut request = payload("a@x.com");
        request.upgrade = true;
        request.upg_mongo = Some("mongodb://db/wiki".into());
        let err = orch.finalize(request, None).await.unwrap_err();
        assert!(matches!(err, SetupError::UpgradeUnavailable));
        assert!(store.is_pristine().await);
    }
}
