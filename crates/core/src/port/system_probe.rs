// System probe port for verification checks
// reason: async-trait, probes spawn processes and open sockets
use async_trait::async_trait;

use crate::domain::{ProbeKind, ProbeOutcome, Surface};

/// System probe port
///
/// Implementations must never fail: every internal error (missing tool,
/// timeout, unreadable file) is mapped to a Fail or Skip outcome.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Run a single probe
    ///
    /// # Example
    /// ```text
    /// let outcome = probe.run(&ProbeKind::TcpPort { host: "10.0.0.10".into(), port: 389 }).await;
    /// if outcome.status == CheckStatus::Fail {
    ///     println!("LDAP unreachable: {}", outcome.detail);
    /// }
    /// ```
    async fn run(&self, kind: &ProbeKind) -> ProbeOutcome;

    /// Is this identity surface installed on the host?
    fn is_installed(&self, surface: Surface) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::CheckStatus;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Mock SystemProbe for testing
    ///
    /// Every probe passes unless overridden by key (see `ProbeKind::key`).
    pub struct MockSystemProbe {
        installed: HashSet<Surface>,
        overrides: HashMap<String, ProbeOutcome>,
        panics: HashSet<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockSystemProbe {
        pub fn new() -> Self {
            Self {
                installed: HashSet::new(),
                overrides: HashMap::new(),
                panics: HashSet::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn installed(mut self, surface: Surface) -> Self {
            self.installed.insert(surface);
            self
        }

        pub fn outcome(mut self, key: impl Into<String>, status: CheckStatus) -> Self {
            let key = key.into();
            let detail = format!("mock {} for {}", status, key);
            self.overrides.insert(
                key,
                ProbeOutcome {
                    status,
                    detail,
                },
            );
            self
        }

        /// Make the probe for `key` panic (for isolation testing)
        pub fn panicking(mut self, key: impl Into<String>) -> Self {
            self.panics.insert(key.into());
            self
        }

        /// Keys of probes actually run, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Default for MockSystemProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn run(&self, kind: &ProbeKind) -> ProbeOutcome {
            let key = kind.key();
            self.calls.lock().unwrap().push(key.clone());

            if self.panics.contains(&key) {
                panic!("mock probe panic for {}", key);
            }

            self.overrides
                .get(&key)
                .cloned()
                .unwrap_or_else(|| ProbeOutcome::pass(format!("mock pass for {}", key)))
        }

        fn is_installed(&self, surface: Surface) -> bool {
            self.installed.contains(&surface)
        }
    }
}
