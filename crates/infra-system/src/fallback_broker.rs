// Fallback broker adapter (realmd + SSSD)
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use domainjoin_core::application::config_edit::set_ini_key;
use domainjoin_core::application::constants::{FALLBACK_BROKER_DAEMON, JOIN_TIMEOUT};
use domainjoin_core::domain::{Backend, BackendStatus, DomainContext};
use domainjoin_core::port::{
    AdapterError, BackendAdapter, CommandOutput, CommandRunner, CommandSpec, ExecutionError,
    FileStore, HostControl,
};

use crate::constants::{PROBE_COMMAND_TIMEOUT, SSSD_CONF, SSSD_CONF_MODE};
use crate::package_manager::PackageManager;

/// sssd.conf settings applied after `realm join`
const SSSD_DOMAIN_SETTINGS: &[(&str, &str)] = &[
    ("use_fully_qualified_names", "False"),
    ("fallback_homedir", "/home/%u"),
];

/// Fallback broker adapter
///
/// Available wherever a supported package manager exists. Joins through
/// `realm join` with the password on stdin, then relaxes SSSD naming so short
/// account names resolve.
pub struct FallbackBrokerAdapter {
    runner: Arc<dyn CommandRunner>,
    package_manager: Option<PackageManager>,
    files: Arc<dyn FileStore>,
    host: Arc<dyn HostControl>,
    sssd_conf: PathBuf,
}

impl FallbackBrokerAdapter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        package_manager: Option<PackageManager>,
        files: Arc<dyn FileStore>,
        host: Arc<dyn HostControl>,
    ) -> Self {
        Self {
            runner,
            package_manager,
            files,
            host,
            sssd_conf: PathBuf::from(SSSD_CONF),
        }
    }

    /// Override the sssd.conf location
    pub fn with_sssd_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.sssd_conf = path.into();
        self
    }

    async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput, AdapterError> {
        let output = self.runner.run(&spec).await?;
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

    /// Apply the SSSD domain settings; restart only when the file changed
    async fn configure_sssd(&self, ctx: &DomainContext) -> Result<(), AdapterError> {
        let current = self
            .files
            .read(&self.sssd_conf)
            .map_err(|e| AdapterError::ConfigFile(format!("{}: {}", self.sssd_conf.display(), e)))?
            .unwrap_or_default();

        let section = format!("domain/{}", ctx.domain_name);
        let updated = SSSD_DOMAIN_SETTINGS
            .iter()
            .fold(current.clone(), |text, (key, value)| {
                set_ini_key(&text, &section, key, value)
            });

        if updated == current {
            info!(path = %self.sssd_conf.display(), "SSSD settings already in place");
            return Ok(());
        }

        self.files
            .write(&self.sssd_conf, &updated, SSSD_CONF_MODE)
            .map_err(|e| AdapterError::ConfigFile(format!("{}: {}", self.sssd_conf.display(), e)))?;

        if let Err(e) = self
            .host
            .restart_service(&[FALLBACK_BROKER_DAEMON.to_string()])
            .await
        {
            warn!(error = %e, "SSSD restart failed, new settings apply on next start");
        }
        Ok(())
    }
}

#[async_trait]
impl BackendAdapter for FallbackBrokerAdapter {
    fn backend(&self) -> Backend {
        Backend::FallbackBroker
    }

    fn prerequisites_present(&self, _ctx: &DomainContext) -> bool {
        self.package_manager.is_some()
    }

    async fn install(&self, _ctx: &DomainContext) -> Result<(), AdapterError> {
        let package_manager = self.package_manager.ok_or_else(|| {
            AdapterError::MissingPrerequisite("no supported package manager".to_string())
        })?;

        let packages = package_manager.fallback_packages();
        info!(
            package_manager = package_manager.program(),
            packages = ?packages,
            "Installing fallback broker"
        );
        self.run_checked(package_manager.install_packages(packages))
            .await?;
        Ok(())
    }

    async fn join(&self, ctx: &DomainContext) -> Result<(), AdapterError> {
        let password = ctx.admin.password.as_ref().ok_or_else(|| {
            AdapterError::MissingPrerequisite("administrator password".to_string())
        })?;

        self.run_checked(
            CommandSpec::new("realm")
                .args(["discover", ctx.domain_name.as_str()])
                .timeout(PROBE_COMMAND_TIMEOUT),
        )
        .await?;

        let mut join = CommandSpec::new("realm")
            .args(["join", "--verbose"])
            .arg(format!("--user={}", ctx.admin.user));
        if let Some(ou) = &ctx.computer_ou {
            join = join.arg(format!("--computer-ou={}", ou));
        }
        let join = join
            .arg(ctx.domain_name.as_str())
            .stdin(format!("{}\n", password.expose()))
            .timeout(JOIN_TIMEOUT);

        info!(domain = %ctx.domain_name, user = %ctx.admin.user, "Joining with fallback broker");
        self.run_checked(join).await?;

        self.configure_sssd(ctx).await
    }

    async fn status(&self, ctx: &DomainContext) -> BackendStatus {
        let spec = CommandSpec::new("realm")
            .args(["list", "--name-only"])
            .timeout(PROBE_COMMAND_TIMEOUT);

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => {
                let realms: Vec<String> = output
                    .stdout
                    .lines()
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect();
                let joined = realms.iter().any(|r| *r == ctx.domain_name);
                BackendStatus {
                    installed: true,
                    joined,
                    detail: if realms.is_empty() {
                        "no realm configured".to_string()
                    } else {
                        format!("realms: {}", realms.join(", "))
                    },
                }
            }
            Ok(output) => BackendStatus {
                installed: true,
                joined: false,
                detail: output.diagnostic().to_string(),
            },
            Err(ExecutionError::NotFound(_)) => BackendStatus::not_installed(),
            Err(e) => {
                warn!(error = %e, "realm list did not complete");
                BackendStatus {
                    installed: true,
                    joined: false,
                    detail: e.to_string(),
                }
            }
        }
    }
}
