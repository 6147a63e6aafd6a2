// Check Domain Model - catalog entries and their outcomes

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::context::Secret;

/// Tri-state check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Not applicable on this host (prerequisite absent)
    Skip,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::Skip => write!(f, "SKIP"),
        }
    }
}

/// Check categories, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Dns,
    Network,
    Time,
    Realm,
    PrimaryAgent,
    FallbackBroker,
    Kerberos,
    Identity,
    Groups,
    Ssh,
    Sudo,
}

impl CheckCategory {
    pub fn label(&self) -> &'static str {
        match self {
            CheckCategory::Dns => "DNS",
            CheckCategory::Network => "Network",
            CheckCategory::Time => "Time",
            CheckCategory::Realm => "Realm",
            CheckCategory::PrimaryAgent => "Primary Agent",
            CheckCategory::FallbackBroker => "Fallback Broker",
            CheckCategory::Kerberos => "Kerberos",
            CheckCategory::Identity => "Identity",
            CheckCategory::Groups => "Groups",
            CheckCategory::Ssh => "SSH",
            CheckCategory::Sudo => "Sudo",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity surfaces a host may or may not have installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// realmd command line (`realm`)
    Realm,
    PrimaryAgent,
    FallbackBroker,
    /// MIT/Heimdal client tools (`kinit`)
    KerberosClient,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Realm => write!(f, "realm"),
            Surface::PrimaryAgent => write!(f, "primary-agent"),
            Surface::FallbackBroker => write!(f, "fallback-broker"),
            Surface::KerberosClient => write!(f, "kerberos-client"),
        }
    }
}

/// What a probe has to look at
///
/// Structured so that tool-output parsing stays inside the probe
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    Resolve { host: String },
    SrvRecord { record: String },
    Ping { host: String },
    TcpPort { host: String, port: u16 },
    TimeSync,
    Membership { surface: Surface, domain: String },
    DaemonRunning { process: String },
    KerberosTicket { principal: String, password: Secret },
    /// Passes when any of the candidate names resolves
    Account { candidates: Vec<String> },
    /// A missing optional group is Skip rather than Fail
    Group { candidates: Vec<String>, optional: bool },
    ServiceActive { units: Vec<String> },
    PamModule { modules: Vec<String>, dir: PathBuf },
    NonEmptyFile { path: PathBuf },
}

impl ProbeKind {
    /// Stable key for logging and test doubles (never contains secrets)
    pub fn key(&self) -> String {
        match self {
            ProbeKind::Resolve { host } => format!("resolve:{}", host),
            ProbeKind::SrvRecord { record } => format!("srv:{}", record),
            ProbeKind::Ping { host } => format!("ping:{}", host),
            ProbeKind::TcpPort { host, port } => format!("tcp:{}:{}", host, port),
            ProbeKind::TimeSync => "time-sync".to_string(),
            ProbeKind::Membership { surface, .. } => format!("membership:{}", surface),
            ProbeKind::DaemonRunning { process } => format!("daemon:{}", process),
            ProbeKind::KerberosTicket { principal, .. } => format!("kinit:{}", principal),
            ProbeKind::Account { candidates } => format!("account:{}", first(candidates)),
            ProbeKind::Group { candidates, .. } => format!("group:{}", first(candidates)),
            ProbeKind::ServiceActive { units } => format!("service:{}", first(units)),
            ProbeKind::PamModule { modules, .. } => format!("pam:{}", modules.join("|")),
            ProbeKind::NonEmptyFile { path } => format!("file:{}", path.display()),
        }
    }
}

fn first(items: &[String]) -> &str {
    items.first().map(String::as_str).unwrap_or("")
}

/// Prerequisite a check needs before it is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Installed(Surface),
    Credential,
}

/// One entry of the verification catalog
#[derive(Debug, Clone)]
pub struct CheckSpec {
    pub name: &'static str,
    pub category: CheckCategory,
    pub description: String,
    pub probe: ProbeKind,
    pub requires: Vec<Prerequisite>,
}

/// Raw probe result, before it is bound to a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub detail: String,
}

impl ProbeOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }

    pub fn skip(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skip,
            detail: detail.into(),
        }
    }
}

/// Outcome of one catalog entry, immutable once recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub detail: String,
    pub duration_ms: i64,
}

impl CheckResult {
    pub fn new(
        name: impl Into<String>,
        category: CheckCategory,
        status: CheckStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            status,
            detail: detail.into(),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_key_hides_password() {
        let probe = ProbeKind::KerberosTicket {
            principal: "Administrator@CORP.EXAMPLE.COM".to_string(),
            password: Secret::new("hunter2"),
        };

        assert_eq!(probe.key(), "kinit:Administrator@CORP.EXAMPLE.COM");
        assert!(!format!("{:?}", probe).contains("hunter2"));
    }

    #[test]
    fn test_category_order_follows_catalog() {
        assert!(CheckCategory::Dns < CheckCategory::Network);
        assert!(CheckCategory::FallbackBroker < CheckCategory::Kerberos);
        assert!(CheckCategory::Ssh < CheckCategory::Sudo);
    }
}
