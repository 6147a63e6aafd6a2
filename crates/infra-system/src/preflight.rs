// Preflight checks run before any host mutation
use tracing::debug;

use domainjoin_core::{AppError, Result};

use crate::package_manager::PackageManager;

/// What a command needs from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// `join`: root, package manager, credential
    Join,
    /// `configure`: root only
    Configure,
}

/// Facts gathered about the running host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub is_linux: bool,
    pub is_root: bool,
    pub package_manager: Option<PackageManager>,
}

impl HostFacts {
    /// Inspect the current process and host
    pub fn gather() -> Self {
        let facts = Self {
            is_linux: cfg!(target_os = "linux"),
            is_root: effective_root(),
            package_manager: PackageManager::detect(),
        };
        debug!(facts = ?facts, "Host facts gathered");
        facts
    }
}

/// Check the host against a requirement
///
/// # Errors
/// - AppError::Precondition naming the first unmet condition
pub fn check(facts: &HostFacts, requirement: Requirement, has_credential: bool) -> Result<()> {
    if !facts.is_linux {
        return Err(AppError::Precondition(
            "domain join is only supported on Linux".to_string(),
        ));
    }
    if !facts.is_root {
        return Err(AppError::Precondition(
            "must run as root (try sudo)".to_string(),
        ));
    }
    if requirement == Requirement::Join {
        if facts.package_manager.is_none() {
            return Err(AppError::Precondition(
                "no supported package manager (apt-get, dnf, yum, zypper)".to_string(),
            ));
        }
        if !has_credential {
            return Err(AppError::Precondition(
                "ADMIN_PASSWORD or ADMIN_PASSWORD_FILE is required to join".to_string(),
            ));
        }
    }
    Ok(())
}

/// Local hostname, or `localhost` when it cannot be read
pub fn local_hostname() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            let name = name.to_string_lossy().trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }
    "localhost".to_string()
}

fn effective_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::Uid::effective().is_root()
    }

    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HostFacts {
        HostFacts {
            is_linux: true,
            is_root: true,
            package_manager: Some(PackageManager::Apt),
        }
    }

    #[test]
    fn test_ready_host_passes() {
        check(&facts(), Requirement::Join, true).unwrap();
        check(&facts(), Requirement::Configure, false).unwrap();
    }

    #[test]
    fn test_non_root_is_rejected() {
        let facts = HostFacts {
            is_root: false,
            ..facts()
        };

        let err = check(&facts, Requirement::Configure, true).unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_join_needs_package_manager_and_credential() {
        let no_pm = HostFacts {
            package_manager: None,
            ..facts()
        };
        assert!(check(&no_pm, Requirement::Join, true).is_err());
        // configure never installs anything
        assert!(check(&no_pm, Requirement::Configure, false).is_ok());

        let err = check(&facts(), Requirement::Join, false).unwrap_err();
        assert!(err.to_string().contains("ADMIN_PASSWORD"));
    }

    #[test]
    fn test_non_linux_is_rejected_first() {
        let facts = HostFacts {
            is_linux: false,
            is_root: false,
            package_manager: None,
        };

        let err = check(&facts, Requirement::Join, false).unwrap_err();
        assert!(err.to_string().contains("Linux"));
    }

    #[test]
    fn test_local_hostname_is_never_empty() {
        assert!(!local_hostname().is_empty());
    }
}
