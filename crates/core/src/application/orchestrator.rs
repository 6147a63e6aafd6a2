// Backend Join Orchestrator
// Selects exactly one backend and drives it Install -> Join; any adapter error is fatal
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{
    Backend, BackendPreference, DomainContext, JoinOutcome, JoinState, Selection,
    SelectionReason,
};
use crate::error::{AppError, Result};
use crate::port::{AdapterError, BackendAdapter};

/// Backend Join Orchestrator
///
/// Selection is availability-driven: the fallback is chosen only when the
/// primary agent's artifacts are absent, never after a failed primary
/// attempt. Once a backend is selected the run either reaches `Joined` on
/// that backend or ends in `Failed`.
pub struct JoinOrchestrator {
    primary: Arc<dyn BackendAdapter>,
    fallback: Arc<dyn BackendAdapter>,
    state: JoinState,
}

impl JoinOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `primary` - Adapter for the vendor agent
    /// * `fallback` - Adapter for the open-source broker
    ///
    /// # Example
    /// ```ignore
    /// let mut orchestrator = JoinOrchestrator::new(primary, fallback);
    /// let outcome = orchestrator.run(&ctx, BackendPreference::Auto).await?;
    /// ```
    pub fn new(primary: Arc<dyn BackendAdapter>, fallback: Arc<dyn BackendAdapter>) -> Self {
        debug_assert_eq!(primary.backend(), Backend::PrimaryAgent);
        debug_assert_eq!(fallback.backend(), Backend::FallbackBroker);
        Self {
            primary,
            fallback,
            state: JoinState::Unconfigured,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    fn adapter(&self, backend: Backend) -> &Arc<dyn BackendAdapter> {
        match backend {
            Backend::PrimaryAgent => &self.primary,
            Backend::FallbackBroker => &self.fallback,
        }
    }

    /// Decide which backend to use (no side effects)
    ///
    /// # Errors
    /// - AppError::Precondition if `Primary` is requested without artifacts,
    ///   or if the selected backend has no usable prerequisites at all
    pub fn select_backend(
        &self,
        ctx: &DomainContext,
        preference: BackendPreference,
    ) -> Result<Selection> {
        let selection = match preference {
            BackendPreference::Primary => {
                if !self.primary.prerequisites_present(ctx) {
                    return Err(AppError::Precondition(
                        "primary agent requested but its installer artifacts are missing"
                            .to_string(),
                    ));
                }
                Selection {
                    backend: Backend::PrimaryAgent,
                    reason: SelectionReason::Requested,
                }
            }
            BackendPreference::Fallback => Selection {
                backend: Backend::FallbackBroker,
                reason: SelectionReason::Requested,
            },
            BackendPreference::Auto => {
                if self.primary.prerequisites_present(ctx) {
                    Selection {
                        backend: Backend::PrimaryAgent,
                        reason: SelectionReason::ArtifactsPresent,
                    }
                } else {
                    Selection {
                        backend: Backend::FallbackBroker,
                        reason: SelectionReason::PrimaryArtifactsMissing,
                    }
                }
            }
        };

        if selection.backend == Backend::FallbackBroker && !self.fallback.prerequisites_present(ctx)
        {
            return Err(AppError::Precondition(
                "no identity backend can be installed on this host".to_string(),
            ));
        }

        Ok(selection)
    }

    /// Commit to `backend` if nothing was selected yet, and make sure later
    /// steps stay on the committed backend
    fn commit(&mut self, backend: Backend) -> Result<()> {
        if self.state == JoinState::Unconfigured {
            self.state = self.state.select(backend)?;
        }
        match self.state.backend() {
            Some(current) if current == backend => Ok(()),
            Some(current) => Err(AppError::InvalidState(format!(
                "{} already selected, refusing to drive {}",
                current, backend
            ))),
            None => Err(AppError::InvalidState(format!(
                "cannot drive {} from state {}",
                backend, self.state
            ))),
        }
    }

    fn mark_failed(&mut self) {
        if let Ok(failed) = self.state.fail() {
            self.state = failed;
        }
    }

    /// Install the selected backend
    ///
    /// # Errors
    /// - AppError::Install on any adapter error (fatal)
    pub async fn install(&mut self, backend: Backend, ctx: &DomainContext) -> Result<()> {
        self.commit(backend)?;
        if self.state != JoinState::PrimarySelected && self.state != JoinState::FallbackSelected {
            return Err(AppError::InvalidState(format!(
                "install not allowed in state {}",
                self.state
            )));
        }

        info!(backend = %backend, "Installing backend");

        match self.adapter(backend).install(ctx).await {
            Ok(()) => {
                self.state = self.state.installed()?;
                info!(backend = %backend, state = %self.state, "Backend installed");
                Ok(())
            }
            Err(e) => {
                self.mark_failed();
                error!(backend = %backend, error = %e, "Backend installation failed");
                Err(AppError::Install {
                    backend,
                    reason: describe(e),
                })
            }
        }
    }

    /// Join the domain through the installed backend
    ///
    /// # Errors
    /// - AppError::Join on any adapter error (fatal)
    pub async fn join(&mut self, backend: Backend, ctx: &DomainContext) -> Result<JoinOutcome> {
        self.commit(backend)?;
        if self.state != JoinState::PrimaryInstalled && self.state != JoinState::FallbackInstalled
        {
            return Err(AppError::InvalidState(format!(
                "join not allowed in state {}",
                self.state
            )));
        }

        info!(backend = %backend, domain = %ctx.domain_name, "Joining domain");

        let adapter = Arc::clone(self.adapter(backend));
        if let Err(e) = adapter.join(ctx).await {
            self.mark_failed();
            error!(backend = %backend, error = %e, "Domain join failed");
            return Err(AppError::Join {
                backend,
                reason: describe(e),
            });
        }
        self.state = self.state.joined()?;

        let status = adapter.status(ctx).await;
        let mut detail = format!("joined {} via {}", ctx.domain_name, backend);
        if status.joined {
            detail.push_str(&format!(" ({})", status.detail));
        } else {
            warn!(
                backend = %backend,
                status = %status.detail,
                "Join command succeeded but backend does not report membership yet"
            );
            detail.push_str(&format!("; status check: {}", status.detail));
        }

        info!(backend = %backend, "Domain join completed");

        Ok(JoinOutcome {
            backend,
            joined: true,
            detail,
        })
    }

    /// Full run: select -> install -> join
    pub async fn run(
        &mut self,
        ctx: &DomainContext,
        preference: BackendPreference,
    ) -> Result<JoinOutcome> {
        let selection = match self.select_backend(ctx, preference) {
            Ok(selection) => selection,
            Err(e) => {
                self.mark_failed();
                return Err(e);
            }
        };

        match selection.reason {
            SelectionReason::PrimaryArtifactsMissing => warn!(
                backend = %selection.backend,
                "Primary agent skipped: installer artifacts not found, using fallback broker"
            ),
            _ => info!(
                backend = %selection.backend,
                reason = ?selection.reason,
                "Backend selected"
            ),
        }

        self.install(selection.backend, ctx).await?;
        self.join(selection.backend, ctx).await
    }
}

fn describe(err: AdapterError) -> String {
    err.to_string()
}
