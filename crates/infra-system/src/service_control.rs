// systemd service control and sudoers validation
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use domainjoin_core::port::{CommandRunner, CommandSpec, ExecutionError, HostControl};

use crate::constants::PROBE_COMMAND_TIMEOUT;

/// HostControl over `systemctl` and `visudo`
pub struct SystemdControl {
    runner: Arc<dyn CommandRunner>,
}

impl SystemdControl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl HostControl for SystemdControl {
    /// Restart the first unit name that systemd accepts
    ///
    /// Unit names differ per distribution (`ssh` vs `sshd`), so each
    /// candidate is tried in order.
    async fn restart_service(&self, units: &[String]) -> Result<(), ExecutionError> {
        let mut last_error = String::from("no unit given");

        for unit in units {
            let spec = CommandSpec::new("systemctl")
                .args(["restart", unit.as_str()])
                .timeout(PROBE_COMMAND_TIMEOUT);
            let output = self.runner.run(&spec).await?;
            if output.success() {
                info!(unit = %unit, "Service restarted");
                return Ok(());
            }
            warn!(unit = %unit, error = %output.diagnostic(), "Restart attempt failed");
            last_error = format!("{}: {}", unit, output.diagnostic());
        }

        Err(ExecutionError::SpawnFailed(last_error))
    }

    async fn validate_sudoers(&self, path: &Path) -> Result<Option<String>, ExecutionError> {
        let spec = CommandSpec::new("visudo")
            .arg("-cf")
            .arg(path.display().to_string())
            .timeout(PROBE_COMMAND_TIMEOUT);
        let output = self.runner.run(&spec).await?;

        if output.success() {
            Ok(None)
        } else {
            Ok(Some(output.diagnostic().to_string()))
        }
    }
}
