// Primary agent adapter (vendor AD agent: adjoin / adinfo / adclient)
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use domainjoin_core::application::constants::JOIN_TIMEOUT;
use domainjoin_core::domain::{Backend, BackendStatus, DomainContext};
use domainjoin_core::port::{
    AdapterError, BackendAdapter, CommandOutput, CommandRunner, CommandSpec, ExecutionError,
};

use crate::constants::PROBE_COMMAND_TIMEOUT;
use crate::package_manager::PackageManager;

/// Primary agent adapter
///
/// Installs the vendor packages shipped in the artifact directory and joins
/// with `adjoin`. Whether the artifacts exist is the only input to backend
/// selection.
pub struct PrimaryAgentAdapter {
    runner: Arc<dyn CommandRunner>,
    package_manager: Option<PackageManager>,
    artifact_dir: PathBuf,
}

impl PrimaryAgentAdapter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        package_manager: Option<PackageManager>,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            package_manager,
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Installer packages in the artifact directory, sorted by name
    ///
    /// Without a package manager both `.deb` and `.rpm` count, so `status`
    /// can still report what was shipped.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let wanted: &[&str] = match self.package_manager {
            Some(pm) => &[pm.artifact_extension()],
            None => &["deb", "rpm"],
        };

        let entries = match std::fs::read_dir(&self.artifact_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.artifact_dir.display(), error = %e, "Artifact directory unreadable");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| wanted.contains(&ext))
            })
            .collect();
        files.sort();
        files
    }

    fn join_command(&self, ctx: &DomainContext, password: &str) -> CommandSpec {
        let mut spec = CommandSpec::new("adjoin")
            .args(["--workstation", "--user", ctx.admin.user.as_str(), "--password"])
            .secret_arg(password);
        if let Some(ou) = &ctx.computer_ou {
            spec = spec.args(["--container", ou.as_str()]);
        }
        spec.args(["--name", ctx.host.hostname.as_str()])
            .arg(ctx.domain_name.as_str())
            .timeout(JOIN_TIMEOUT)
    }
}

fn check(spec: &CommandSpec, output: CommandOutput) -> Result<CommandOutput, AdapterError> {
    if output.success() {
        Ok(output)
    } else {
        Err(AdapterError::CommandFailed {
            command: spec.display(),
            code: output.exit_code,
            message: output.diagnostic().to_string(),
        })
    }
}

#[async_trait]
impl BackendAdapter for PrimaryAgentAdapter {
    fn backend(&self) -> Backend {
        Backend::PrimaryAgent
    }

    fn prerequisites_present(&self, _ctx: &DomainContext) -> bool {
        !self.artifacts().is_empty()
    }

    async fn install(&self, _ctx: &DomainContext) -> Result<(), AdapterError> {
        let package_manager = self.package_manager.ok_or_else(|| {
            AdapterError::MissingPrerequisite("no supported package manager".to_string())
        })?;

        let artifacts = self.artifacts();
        if artifacts.is_empty() {
            return Err(AdapterError::MissingPrerequisite(format!(
                "no .{} packages in {}",
                package_manager.artifact_extension(),
                self.artifact_dir.display()
            )));
        }

        info!(
            package_manager = package_manager.program(),
            packages = artifacts.len(),
            "Installing primary agent"
        );
        let spec = package_manager.install_files(&artifacts);
        check(&spec, self.runner.run(&spec).await?)?;
        Ok(())
    }

    async fn join(&self, ctx: &DomainContext) -> Result<(), AdapterError> {
        let password = ctx.admin.password.as_ref().ok_or_else(|| {
            AdapterError::MissingPrerequisite("administrator password".to_string())
        })?;

        info!(domain = %ctx.domain_name, user = %ctx.admin.user, "Joining with primary agent");
        let spec = self.join_command(ctx, password.expose());
        check(&spec, self.runner.run(&spec).await?)?;
        Ok(())
    }

    async fn status(&self, _ctx: &DomainContext) -> BackendStatus {
        let spec = CommandSpec::new("adinfo")
            .arg("--mode")
            .timeout(PROBE_COMMAND_TIMEOUT);

        match self.runner.run(&spec).await {
            Ok(output) => {
                let mode = output.stdout.trim().to_string();
                BackendStatus {
                    installed: true,
                    joined: output.success() && mode == "connected",
                    detail: if mode.is_empty() {
                        output.diagnostic().to_string()
                    } else {
                        format!("adinfo mode: {}", mode)
                    },
                }
            }
            Err(ExecutionError::NotFound(_)) => BackendStatus::not_installed(),
            Err(e) => {
                warn!(error = %e, "adinfo did not complete");
                BackendStatus {
                    installed: true,
                    joined: false,
                    detail: e.to_string(),
                }
            }
        }
    }
}
