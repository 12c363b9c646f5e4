//! Host runtime precondition.

use semver::{Version, VersionReq};

use crate::error::SetupError;

/// Reports the name and version of the runtime hosting the application.
pub trait RuntimeProbe: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> Version;
}

/// The running build itself.
///
/// The binary carries its own runtime, so `setup.runtime_requirement` gates
/// which release of this package may finalize, not the machine it runs on.
/// A build whose version does not parse reports `0.0.0` and fails closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRuntime;

impl RuntimeProbe for HostRuntime {
    fn name(&self) -> &str {
        env!("CARGO_PKG_NAME")
    }

    fn version(&self) -> Version {
        Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
    }
}

/// Fail with [`SetupError::UnsupportedRuntime`] unless the probe satisfies `requirement`.
pub fn check_runtime(requirement: &str, probe: &dyn RuntimeProbe) -> Result<(), SetupError> {
    let found = probe.version();
    let unsupported = || SetupError::UnsupportedRuntime {
        runtime: probe.name().to_string(),
        required: requirement.to_string(),
        found: found.to_string(),
    };

    let req = VersionReq::parse(requirement).map_err(|_| unsupported())?;
    if req.matches(&found) {
        Ok(())
    } else {
        Err(unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Version);

    impl RuntimeProbe for Fixed {
        fn name(&self) -> &str {
            "test-runtime"
        }

        fn version(&self) -> Version {
            self.0.clone()
        }
    }

    #[test]
    fn host_runtime_satisfies_default_requirement() {
        assert!(check_runtime(">=0.1.0", &HostRuntime).is_ok());
    }

    #[test]
    fn host_runtime_reports_the_package_version() {
        assert_eq!(HostRuntime.version().to_string(), env!("CARGO_PKG_VERSION"));
        assert!(check_runtime(&format!(">{}", env!("CARGO_PKG_VERSION")), &HostRuntime).is_err());
    }

    #[test]
    fn old_runtime_is_rejected() {
        let err = check_runtime(">=10.14.0", &Fixed(Version::new(8, 0, 0))).unwrap_err();
        assert_eq!(err.to_string(), "test-runtime >=10.14.0 required (found 8.0.0)");
    }

    #[test]
    fn unparseable_requirement_is_rejected() {
        assert!(check_runtime("whatever", &Fixed(Version::new(1, 0, 0))).is_err());
    }
}
