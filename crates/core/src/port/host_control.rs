// Host Control Port
// Service restarts and sudoers validation used after a join

use async_trait::async_trait;
use std::path::Path;

use crate::port::ExecutionError;

#[async_trait]
pub trait HostControl: Send + Sync {
    /// Restart the first unit in `units` that exists on the host
    ///
    /// # Errors
    /// - ExecutionError if no unit could be restarted
    async fn restart_service(&self, units: &[String]) -> Result<(), ExecutionError>;

    /// Syntax-check a sudoers drop-in
    ///
    /// Returns `Ok(Some(message))` when the file is rejected.
    async fn validate_sudoers(&self, path: &Path) -> Result<Option<String>, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Mock HostControl for testing
    #[derive(Default)]
    pub struct MockHostControl {
        restart_fails: bool,
        sudoers_rejected: bool,
        restarts: Arc<Mutex<Vec<String>>>,
        validated: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MockHostControl {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_restart(mut self) -> Self {
            self.restart_fails = true;
            self
        }

        pub fn rejecting_sudoers(mut self) -> Self {
            self.sudoers_rejected = true;
            self
        }

        pub fn restarts(&self) -> Vec<String> {
            self.restarts.lock().unwrap().clone()
        }

        /// Paths handed to `validate_sudoers`, in call order
        pub fn validated(&self) -> Vec<PathBuf> {
            self.validated.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostControl for MockHostControl {
        async fn restart_service(&self, units: &[String]) -> Result<(), ExecutionError> {
            let unit = units.first().cloned().unwrap_or_default();
            self.restarts.lock().unwrap().push(unit.clone());
            if self.restart_fails {
                return Err(ExecutionError::SpawnFailed(format!(
                    "mock restart failure for {}",
                    unit
                )));
            }
            Ok(())
        }

        async fn validate_sudoers(&self, path: &Path) -> Result<Option<String>, ExecutionError> {
            self.validated.lock().unwrap().push(path.to_path_buf());
            if self.sudoers_rejected {
                return Ok(Some(format!("{}: syntax error", path.display())));
            }
            Ok(None)
        }
    }
}
