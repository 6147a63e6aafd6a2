// Verification Engine - runs the catalog and aggregates a report
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::application::catalog::standard_catalog;
use crate::application::configurator::HostPaths;
use crate::application::constants::CHECK_GUARD_TIMEOUT;
use crate::application::panic_guard::{execute_guarded_async, PanicGuardResult};
use crate::domain::{
    CheckResult, CheckSpec, CheckStatus, DomainContext, Prerequisite, Surface, VerificationReport,
};
use crate::port::{SystemProbe, TimeProvider};

/// Verification engine
///
/// Checks run one at a time in catalog order. A probe that panics or hangs
/// produces a Fail for its own check and the run moves on.
pub struct VerificationEngine {
    probe: Arc<dyn SystemProbe>,
    time: Arc<dyn TimeProvider>,
    guard: Duration,
}

impl VerificationEngine {
    pub fn new(probe: Arc<dyn SystemProbe>, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            probe,
            time,
            guard: CHECK_GUARD_TIMEOUT,
        }
    }

    /// Override the per-check guard timeout
    pub fn with_guard(mut self, guard: Duration) -> Self {
        self.guard = guard;
        self
    }

    /// Run the standard catalog against `target`
    ///
    /// `observer` sees every result as soon as it is recorded, so callers can
    /// stream progress while the report is still being built.
    ///
    /// # Example
    /// ```ignore
    /// let report = engine
    ///     .verify(&ctx, "web01.corp.example.com", &paths, |r| println!("{} {}", r.status, r.name))
    ///     .await;
    /// println!("{}", report.verdict);
    /// ```
    pub async fn verify<F>(
        &self,
        ctx: &DomainContext,
        target: &str,
        paths: &HostPaths,
        observer: F,
    ) -> VerificationReport
    where
        F: FnMut(&CheckResult),
    {
        let catalog = standard_catalog(ctx, target, paths);
        self.run(ctx, target, &catalog, observer).await
    }

    /// Run an explicit catalog
    pub async fn run<F>(
        &self,
        ctx: &DomainContext,
        target: &str,
        catalog: &[CheckSpec],
        mut observer: F,
    ) -> VerificationReport
    where
        F: FnMut(&CheckResult),
    {
        info!(target = %target, checks = catalog.len(), "Starting verification");

        // Surface detection is asked once per run
        let mut surfaces: HashMap<Surface, bool> = HashMap::new();
        let mut results = Vec::with_capacity(catalog.len());

        for spec in catalog {
            let result = match self.unmet_prerequisite(spec, ctx, &mut surfaces) {
                Some(reason) => CheckResult::new(spec.name, spec.category, CheckStatus::Skip, reason),
                None => self.run_check(spec).await,
            };

            debug!(
                check = %result.name,
                status = %result.status,
                duration_ms = result.duration_ms,
                "Check finished"
            );
            observer(&result);
            results.push(result);
        }

        let report = VerificationReport::from_results(target, results);
        info!(
            target = %target,
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            verdict = %report.verdict,
            "Verification finished"
        );
        report
    }

    fn unmet_prerequisite(
        &self,
        spec: &CheckSpec,
        ctx: &DomainContext,
        surfaces: &mut HashMap<Surface, bool>,
    ) -> Option<String> {
        for prerequisite in &spec.requires {
            match prerequisite {
                Prerequisite::Installed(surface) => {
                    let present = *surfaces
                        .entry(*surface)
                        .or_insert_with(|| self.probe.is_installed(*surface));
                    if !present {
                        return Some(format!("{} not installed", surface));
                    }
                }
                Prerequisite::Credential => {
                    if !ctx.has_credential() {
                        return Some("no administrator credential configured".to_string());
                    }
                }
            }
        }
        None
    }

    async fn run_check(&self, spec: &CheckSpec) -> CheckResult {
        let started = self.time.now_millis();
        let guarded = tokio::time::timeout(
            self.guard,
            execute_guarded_async(self.probe.run(&spec.probe)),
        )
        .await;
        let elapsed = (self.time.now_millis() - started).max(0);

        let (status, detail) = match guarded {
            Ok(PanicGuardResult::Success(outcome)) => (outcome.status, outcome.detail),
            Ok(PanicGuardResult::Panicked(msg)) => {
                warn!(check = %spec.name, panic_msg = %msg, "Probe panicked");
                (CheckStatus::Fail, format!("probe panicked: {}", msg))
            }
            Err(_) => {
                warn!(check = %spec.name, timeout_secs = self.guard.as_secs(), "Probe timed out");
                (
                    CheckStatus::Fail,
                    format!("probe timed out after {}s", self.guard.as_secs()),
                )
            }
        };

        CheckResult::new(spec.name, spec.category, status, detail).with_duration(elapsed)
    }
}
