// Backend Adapter Port
// One implementation per identity backend; the orchestrator only sees this trait

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Backend, BackendStatus, DomainContext};
use crate::port::ExecutionError;

/// Adapter errors (always fatal to the run)
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Command `{command}` exited with status {code:?}: {message}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration file error: {0}")]
    ConfigFile(String),
}

/// Backend Adapter trait
///
/// Adapters never retry and never touch the other backend. Any `Err` is
/// treated as fatal by the orchestrator.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend this adapter drives
    fn backend(&self) -> Backend;

    /// Are the installable artifacts / prerequisites present on this host?
    ///
    /// Must be side-effect free; it drives backend selection.
    fn prerequisites_present(&self, ctx: &DomainContext) -> bool;

    /// Install the backend's packages
    ///
    /// # Errors
    /// - AdapterError::CommandFailed if the package manager reports failure
    /// - AdapterError::MissingPrerequisite if artifacts are missing/corrupt
    async fn install(&self, ctx: &DomainContext) -> Result<(), AdapterError>;

    /// Join the host to the domain
    ///
    /// # Errors
    /// - AdapterError::CommandFailed if the join utility exits non-zero
    async fn join(&self, ctx: &DomainContext) -> Result<(), AdapterError>;

    /// Report the backend's own view of this host (never fails)
    async fn status(&self, ctx: &DomainContext) -> BackendStatus;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock adapter behavior for each step
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Step {
        Succeed,
        Fail,
    }

    #[derive(Debug, Default)]
    struct Calls {
        install: usize,
        join: usize,
        status: usize,
    }

    /// Mock Backend Adapter for testing
    pub struct MockBackendAdapter {
        backend: Backend,
        artifacts_present: bool,
        install_step: Step,
        join_step: Step,
        calls: Arc<Mutex<Calls>>,
    }

    impl MockBackendAdapter {
        pub fn new(backend: Backend) -> Self {
            Self {
                backend,
                artifacts_present: true,
                install_step: Step::Succeed,
                join_step: Step::Succeed,
                calls: Arc::new(Mutex::new(Calls::default())),
            }
        }

        pub fn without_artifacts(mut self) -> Self {
            self.artifacts_present = false;
            self
        }

        pub fn failing_install(mut self) -> Self {
            self.install_step = Step::Fail;
            self
        }

        pub fn failing_join(mut self) -> Self {
            self.join_step = Step::Fail;
            self
        }

        pub fn install_calls(&self) -> usize {
            self.calls.lock().unwrap().install
        }

        pub fn join_calls(&self) -> usize {
            self.calls.lock().unwrap().join
        }

        pub fn status_calls(&self) -> usize {
            self.calls.lock().unwrap().status
        }

        /// Install, join and status calls combined
        pub fn total_calls(&self) -> usize {
            let calls = self.calls.lock().unwrap();
            calls.install + calls.join + calls.status
        }

        fn failure(&self, command: &str) -> AdapterError {
            AdapterError::CommandFailed {
                command: command.to_string(),
                code: Some(1),
                message: format!("mock {} failure", self.backend),
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for MockBackendAdapter {
        fn backend(&self) -> Backend {
            self.backend
        }

        fn prerequisites_present(&self, _ctx: &DomainContext) -> bool {
            self.artifacts_present
        }

        async fn install(&self, _ctx: &DomainContext) -> Result<(), AdapterError> {
            self.calls.lock().unwrap().install += 1;
            match self.install_step {
                Step::Succeed => Ok(()),
                Step::Fail => Err(self.failure("install")),
            }
        }

        async fn join(&self, _ctx: &DomainContext) -> Result<(), AdapterError> {
            self.calls.lock().unwrap().join += 1;
            match self.join_step {
                Step::Succeed => Ok(()),
                Step::Fail => Err(self.failure("join")),
            }
        }

        async fn status(&self, ctx: &DomainContext) -> BackendStatus {
            let mut calls = self.calls.lock().unwrap();
            calls.status += 1;
            let joined = calls.join > 0 && self.join_step == Step::Succeed;
            BackendStatus {
                installed: calls.install > 0 && self.install_step == Step::Succeed,
                joined,
                detail: if joined {
                    format!("joined to {}", ctx.domain_name)
                } else {
                    "not joined".to_string()
                },
            }
        }
    }
}
