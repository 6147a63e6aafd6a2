// Command handlers - composition root for the host adapters
use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

use domainjoin_core::application::{
    HostPaths, JoinOrchestrator, JoinPipeline, PostJoinConfigurator, VerificationEngine,
};
use domainjoin_core::domain::{
    AccessPolicy, BackendPreference, BackendStatus, DomainContext, DomainSettings, JoinOutcome,
    Verdict,
};
use domainjoin_core::port::time_provider::SystemTimeProvider;
use domainjoin_core::port::{BackendAdapter, CommandRunner, FileStore, HostControl};
use domainjoin_core::AppError;
use domainjoin_infra_system::constants::RUN_LOCK_PATH;
use domainjoin_infra_system::preflight::{self, HostFacts, Requirement};
use domainjoin_infra_system::settings::{artifact_dir, resolve_env_file};
use domainjoin_infra_system::{
    load_settings, FallbackBrokerAdapter, LocalFileStore, PackageManager, PrimaryAgentAdapter,
    RunLock, SubprocessRunner, SystemProbeImpl, SystemdControl,
};

use crate::{render, Cli, Commands};

/// Validated settings for one invocation
struct Loaded {
    settings: DomainSettings,
    ctx: DomainContext,
}

fn load(env_file: Option<&Path>) -> Result<Loaded> {
    let path = resolve_env_file(env_file);
    let settings = load_settings(&path).map_err(AppError::from)?;
    let ctx = DomainContext::from_settings(&settings, &preflight::local_hostname())
        .map_err(AppError::from)
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    debug!(domain = %ctx.domain_name, host = %ctx.host.fqdn, "Domain context ready");
    Ok(Loaded { settings, ctx })
}

/// Real host adapters, wired once per invocation
struct Host {
    runner: Arc<dyn CommandRunner>,
    files: Arc<dyn FileStore>,
    control: Arc<dyn HostControl>,
    package_manager: Option<PackageManager>,
    primary: Arc<PrimaryAgentAdapter>,
    fallback: Arc<FallbackBrokerAdapter>,
}

impl Host {
    fn wire(settings: &DomainSettings, package_manager: Option<PackageManager>) -> Self {
        let runner: Arc<dyn CommandRunner> =
            Arc::new(SubprocessRunner::new(Arc::new(SystemTimeProvider)));
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new());
        let control: Arc<dyn HostControl> = Arc::new(SystemdControl::new(runner.clone()));

        let primary = Arc::new(PrimaryAgentAdapter::new(
            runner.clone(),
            package_manager,
            artifact_dir(settings),
        ));
        let fallback = Arc::new(FallbackBrokerAdapter::new(
            runner.clone(),
            package_manager,
            files.clone(),
            control.clone(),
        ));

        Self {
            runner,
            files,
            control,
            package_manager,
            primary,
            fallback,
        }
    }

    fn configurator(&self, policy: AccessPolicy) -> PostJoinConfigurator {
        let paths = HostPaths::for_host(self.files.as_ref());
        PostJoinConfigurator::new(self.files.clone(), self.control.clone(), paths, policy)
    }

    fn adapters(&self) -> [Arc<dyn BackendAdapter>; 2] {
        [self.primary.clone(), self.fallback.clone()]
    }
}

/// Dispatch a parsed command line
///
/// # Returns
/// Process exit code; any `Err` maps to exit 1 in `main`.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let loaded = load(cli.env_file.as_deref())?;

    match cli.command {
        Commands::Join {
            backend,
            no_configure,
        } => join(&loaded, backend.into(), !no_configure).await,
        Commands::Configure => configure(&loaded).await,
        Commands::Verify {
            target,
            json,
            strict,
        } => verify(&loaded, target, json, strict).await,
        Commands::Status => status(&loaded).await,
    }
}

async fn join(loaded: &Loaded, preference: BackendPreference, configure: bool) -> Result<ExitCode> {
    let facts = HostFacts::gather();
    preflight::check(&facts, Requirement::Join, loaded.ctx.has_credential())?;
    let _lock = RunLock::acquire(Path::new(RUN_LOCK_PATH))?;

    let host = Host::wire(&loaded.settings, facts.package_manager);
    let orchestrator = JoinOrchestrator::new(host.primary.clone(), host.fallback.clone());
    let configurator = configure
        .then(|| host.configurator(AccessPolicy::from_settings(&loaded.settings, &loaded.ctx)));

    render::info(&format!(
        "Joining {} to {} (DC {})",
        loaded.ctx.host.fqdn, loaded.ctx.domain_name, loaded.ctx.dc_fqdn
    ));

    let mut pipeline = JoinPipeline::new(orchestrator, configurator);
    let outcome = pipeline.run(&loaded.ctx, preference).await?;

    render::info(&format!(
        "Joined {} via {}: {}",
        loaded.ctx.domain_name, outcome.join.backend, outcome.join.detail
    ));
    match &outcome.configure {
        Some(summary) => {
            if summary.is_noop() {
                render::info("Post-join configuration already in place");
            }
            for path in &summary.changed {
                render::info(&format!("Updated {}", path.display()));
            }
            for warning in &summary.warnings {
                render::warn(warning);
            }
        }
        None => render::info("Post-join configuration skipped (--no-configure)"),
    }

    Ok(ExitCode::SUCCESS)
}

async fn configure(loaded: &Loaded) -> Result<ExitCode> {
    let facts = HostFacts::gather();
    preflight::check(&facts, Requirement::Configure, loaded.ctx.has_credential())?;
    let _lock = RunLock::acquire(Path::new(RUN_LOCK_PATH))?;

    let host = Host::wire(&loaded.settings, facts.package_manager);

    let mut joined = None;
    for adapter in host.adapters() {
        let status = adapter.status(&loaded.ctx).await;
        debug!(backend = %adapter.backend(), joined = status.joined, detail = %status.detail, "Backend status");
        if status.joined {
            joined = Some(JoinOutcome {
                backend: adapter.backend(),
                joined: true,
                detail: status.detail,
            });
            break;
        }
    }
    let outcome = joined.ok_or_else(|| {
        AppError::Precondition(format!(
            "no backend reports {} as joined; run `domainjoin join` first",
            loaded.ctx.domain_name
        ))
    })?;

    render::info(&format!("Configuring access for {} ({})", loaded.ctx.domain_name, outcome.backend));
    let configurator = host.configurator(AccessPolicy::from_settings(&loaded.settings, &loaded.ctx));
    let summary = configurator.apply(&outcome, &loaded.ctx).await?;

    if summary.is_noop() {
        render::info("Nothing to change");
    }
    for path in &summary.changed {
        render::info(&format!("Updated {}", path.display()));
    }
    for warning in &summary.warnings {
        render::warn(warning);
    }

    Ok(ExitCode::SUCCESS)
}

async fn verify(
    loaded: &Loaded,
    target: Option<String>,
    json: bool,
    strict: bool,
) -> Result<ExitCode> {
    let target = target.unwrap_or_else(|| loaded.ctx.host.fqdn.clone());
    let host = Host::wire(&loaded.settings, PackageManager::detect());
    let probe = Arc::new(SystemProbeImpl::new(host.runner.clone()));
    let engine = VerificationEngine::new(probe, Arc::new(SystemTimeProvider));
    let paths = HostPaths::for_host(host.files.as_ref());

    if !json {
        render::info(&format!("Verifying {} against {}", target, loaded.ctx.domain_name));
    }

    let report = engine
        .verify(&loaded.ctx, &target, &paths, |result| {
            if !json {
                println!("{}", render::check_line(result));
            }
        })
        .await;

    let finished_at = chrono::Utc::now().to_rfc3339();
    if json {
        println!("{}", render::json(&report, &finished_at)?);
    } else {
        println!();
        println!("{}", render::category_table(&report));
        println!();
        println!("{}", render::summary(&report, &finished_at));
    }

    info!(verdict = %report.verdict, failed = report.failed, "Verification complete");
    if strict && report.verdict == Verdict::Failure {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn status(loaded: &Loaded) -> Result<ExitCode> {
    let host = Host::wire(&loaded.settings, PackageManager::detect());

    let artifacts = host.primary.artifacts();
    let primary_artifacts = if artifacts.is_empty() {
        format!("none in {}", host.primary.artifact_dir().display())
    } else {
        format!("{} in {}", artifacts.len(), host.primary.artifact_dir().display())
    };
    let fallback_artifacts = match host.package_manager {
        Some(pm) => format!("packages via {}", pm.program()),
        None => "no package manager".to_string(),
    };

    let mut rows: Vec<(String, String, BackendStatus)> = Vec::new();
    for (adapter, artifacts) in host.adapters().into_iter().zip([primary_artifacts, fallback_artifacts]) {
        let status = adapter.status(&loaded.ctx).await;
        rows.push((adapter.backend().to_string(), artifacts, status));
    }

    render::info(&format!("Domain {} (DC {})", loaded.ctx.domain_name, loaded.ctx.dc_fqdn));
    println!("{}", render::backend_table(&rows));

    Ok(ExitCode::SUCCESS)
}
