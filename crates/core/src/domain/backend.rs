// Backend Domain Model - identity backends and the join state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, Result};

/// Identity-integration backend (mutually exclusive per host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Vendor enterprise agent installed from local artifacts
    PrimaryAgent,
    /// Open-source realmd + SSSD broker from distribution packages
    FallbackBroker,
}

impl Backend {
    /// The other backend of the pair
    pub fn other(self) -> Self {
        match self {
            Backend::PrimaryAgent => Backend::FallbackBroker,
            Backend::FallbackBroker => Backend::PrimaryAgent,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::PrimaryAgent => write!(f, "primary agent"),
            Backend::FallbackBroker => write!(f, "fallback broker"),
        }
    }
}

/// Which backend the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Primary when its artifacts are present, fallback otherwise
    #[default]
    Auto,
    Primary,
    Fallback,
}

/// Why a backend was selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    ArtifactsPresent,
    /// Primary path skipped (not failed) because its artifacts are absent
    PrimaryArtifactsMissing,
    Requested,
}

/// Result of the one-time backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub backend: Backend,
    pub reason: SelectionReason,
}

/// Terminal result of driving a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    pub backend: Backend,
    pub joined: bool,
    pub detail: String,
}

/// Self-reported state of a backend on this host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub installed: bool,
    pub joined: bool,
    pub detail: String,
}

impl BackendStatus {
    pub fn not_installed() -> Self {
        Self {
            installed: false,
            joined: false,
            detail: "not installed".to_string(),
        }
    }
}

/// Orchestrator state
///
/// There is deliberately no state for "both backends attempted": selection
/// happens once and only moves forward along one backend's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Unconfigured,
    PrimarySelected,
    FallbackSelected,
    PrimaryInstalled,
    FallbackInstalled,
    Joined(Backend),
    Failed,
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinState::Unconfigured => write!(f, "UNCONFIGURED"),
            JoinState::PrimarySelected => write!(f, "PRIMARY_SELECTED"),
            JoinState::FallbackSelected => write!(f, "FALLBACK_SELECTED"),
            JoinState::PrimaryInstalled => write!(f, "PRIMARY_INSTALLED"),
            JoinState::FallbackInstalled => write!(f, "FALLBACK_INSTALLED"),
            JoinState::Joined(_) => write!(f, "JOINED"),
            JoinState::Failed => write!(f, "FAILED"),
        }
    }
}

impl JoinState {
    /// Backend this state belongs to, if one has been selected
    pub fn backend(&self) -> Option<Backend> {
        match self {
            JoinState::PrimarySelected | JoinState::PrimaryInstalled => Some(Backend::PrimaryAgent),
            JoinState::FallbackSelected | JoinState::FallbackInstalled => {
                Some(Backend::FallbackBroker)
            }
            JoinState::Joined(backend) => Some(*backend),
            JoinState::Unconfigured | JoinState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JoinState::Joined(_) | JoinState::Failed)
    }

    /// Unconfigured -> {Primary,Fallback}Selected
    pub fn select(self, backend: Backend) -> Result<Self> {
        let next = match backend {
            Backend::PrimaryAgent => JoinState::PrimarySelected,
            Backend::FallbackBroker => JoinState::FallbackSelected,
        };
        if self != JoinState::Unconfigured {
            return Err(self.invalid(next));
        }
        Ok(next)
    }

    /// *Selected -> *Installed
    pub fn installed(self) -> Result<Self> {
        match self {
            JoinState::PrimarySelected => Ok(JoinState::PrimaryInstalled),
            JoinState::FallbackSelected => Ok(JoinState::FallbackInstalled),
            other => Err(other.invalid_named("INSTALLED")),
        }
    }

    /// *Installed -> Joined
    pub fn joined(self) -> Result<Self> {
        match self {
            JoinState::PrimaryInstalled => Ok(JoinState::Joined(Backend::PrimaryAgent)),
            JoinState::FallbackInstalled => Ok(JoinState::Joined(Backend::FallbackBroker)),
            other => Err(other.invalid_named("JOINED")),
        }
    }

    /// Any non-terminal state -> Failed
    pub fn fail(self) -> Result<Self> {
        if self.is_terminal() {
            return Err(self.invalid(JoinState::Failed));
        }
        Ok(JoinState::Failed)
    }

    fn invalid(self, to: JoinState) -> DomainError {
        self.invalid_named(&to.to_string())
    }

    fn invalid_named(self, to: &str) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.to_string(),
            to: to.to_string(),
        }
    }
}
