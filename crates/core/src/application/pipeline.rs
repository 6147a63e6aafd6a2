// Join Pipeline - join, then post-join configuration
use tracing::info;

use crate::application::configurator::{ConfigureSummary, PostJoinConfigurator};
use crate::application::orchestrator::JoinOrchestrator;
use crate::domain::{BackendPreference, DomainContext, JoinOutcome};
use crate::error::Result;

/// What a full `join` run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub join: JoinOutcome,
    /// None when configuration was not requested
    pub configure: Option<ConfigureSummary>,
}

/// Orchestrator followed by the configurator
///
/// The configurator only ever sees a successful join outcome; a failed
/// join returns before any host file is touched.
pub struct JoinPipeline {
    orchestrator: JoinOrchestrator,
    configurator: Option<PostJoinConfigurator>,
}

impl JoinPipeline {
    pub fn new(orchestrator: JoinOrchestrator, configurator: Option<PostJoinConfigurator>) -> Self {
        Self {
            orchestrator,
            configurator,
        }
    }

    pub fn orchestrator(&self) -> &JoinOrchestrator {
        &self.orchestrator
    }

    pub async fn run(
        &mut self,
        ctx: &DomainContext,
        preference: BackendPreference,
    ) -> Result<PipelineOutcome> {
        let join = self.orchestrator.run(ctx, preference).await?;

        let configure = match &self.configurator {
            Some(configurator) => Some(configurator.apply(&join, ctx).await?),
            None => {
                info!("Post-join configuration skipped");
                None
            }
        };

        Ok(PipelineOutcome { join, configure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::configurator::HostPaths;
    use crate::domain::{AccessPolicy, Backend, DomainSettings, JoinState};
    use crate::error::AppError;
    use crate::port::backend_adapter::mocks::MockBackendAdapter;
    use crate::port::file_store::mocks::InMemoryFileStore;
    use crate::port::host_control::mocks::MockHostControl;
    use std::sync::Arc;

    fn settings() -> DomainSettings {
        DomainSettings {
            domain_name: Some("corp.example.com".to_string()),
            dc_ip: Some("10.0.0.10".to_string()),
            dc_fqdn: Some("dc1.corp.example.com".to_string()),
            admin_password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    fn pipeline(
        primary: MockBackendAdapter,
        files: &InMemoryFileStore,
        configure: bool,
    ) -> JoinPipeline {
        let settings = settings();
        let ctx = DomainContext::from_settings(&settings, "web01").unwrap();
        let orchestrator = JoinOrchestrator::new(
            Arc::new(primary),
            Arc::new(MockBackendAdapter::new(Backend::FallbackBroker)),
        );
        let configurator = configure.then(|| {
            PostJoinConfigurator::new(
                Arc::new(files.clone()),
                Arc::new(MockHostControl::new()),
                HostPaths::default(),
                AccessPolicy::from_settings(&settings, &ctx),
            )
        });
        JoinPipeline::new(orchestrator, configurator)
    }

    #[tokio::test]
    async fn test_failed_join_never_configures() {
        let files = InMemoryFileStore::new();
        let mut pipeline = pipeline(
            MockBackendAdapter::new(Backend::PrimaryAgent).failing_join(),
            &files,
            true,
        );
        let ctx = DomainContext::from_settings(&settings(), "web01").unwrap();

        let err = pipeline.run(&ctx, BackendPreference::Auto).await.unwrap_err();

        assert!(matches!(err, AppError::Join { .. }));
        assert_eq!(pipeline.orchestrator().state(), JoinState::Failed);
        assert_eq!(files.write_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_join_configures_host() {
        let files = InMemoryFileStore::new()
            .with_file("/etc/ssh/sshd_config", "PasswordAuthentication no\n");
        let mut pipeline = pipeline(MockBackendAdapter::new(Backend::PrimaryAgent), &files, true);
        let ctx = DomainContext::from_settings(&settings(), "web01").unwrap();

        let outcome = pipeline.run(&ctx, BackendPreference::Auto).await.unwrap();

        assert_eq!(outcome.join.backend, Backend::PrimaryAgent);
        let summary = outcome.configure.unwrap();
        assert!(!summary.is_noop());
        assert!(files.write_count() > 0);
    }

    #[tokio::test]
    async fn test_no_configure_leaves_files_alone() {
        let files = InMemoryFileStore::new();
        let mut pipeline = pipeline(MockBackendAdapter::new(Backend::PrimaryAgent), &files, false);
        let ctx = DomainContext::from_settings(&settings(), "web01").unwrap();

        let outcome = pipeline.run(&ctx, BackendPreference::Auto).await.unwrap();

        assert!(outcome.configure.is_none());
        assert_eq!(files.write_count(), 0);
    }
}
