// Post-Join Configurator
// Backend-agnostic SSH / sudo / PAM adjustments, idempotent by construction
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::config_edit::{
    contains_active, ensure_line, include_before, merge_list_directive, set_directive,
    sudoers_escape,
};
use crate::application::constants::{MKHOMEDIR_LINE, SSH_UNITS, SUDOERS_DROPIN};
use crate::domain::{AccessPolicy, DomainContext, JoinOutcome};
use crate::error::{AppError, Result};
use crate::port::{FileStore, HostControl};

const SUDOERS_HEADER: &str = "# Domain access granted by domainjoin";
const STAGED_SUFFIX: &str = ".domainjoin-tmp";
const MKHOMEDIR_MODULES: &[&str] = &["pam_mkhomedir.so", "pam_oddjob_mkhomedir.so"];

/// Files the configurator edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub sshd_config: PathBuf,
    pub sudoers_dropin: PathBuf,
    pub pam_session: PathBuf,
    pub pam_dir: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            sshd_config: PathBuf::from("/etc/ssh/sshd_config"),
            sudoers_dropin: PathBuf::from(SUDOERS_DROPIN),
            pam_session: PathBuf::from("/etc/pam.d/common-session"),
            pam_dir: PathBuf::from("/etc/pam.d"),
        }
    }
}

impl HostPaths {
    /// Default paths, with the PAM session stack picked per distribution family
    pub fn for_host(files: &dyn FileStore) -> Self {
        let mut paths = Self::default();
        if !files.exists(&paths.pam_session) {
            let system_auth = paths.pam_dir.join("system-auth");
            if files.exists(&system_auth) {
                paths.pam_session = system_auth;
            }
        }
        paths
    }
}

fn staged_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(STAGED_SUFFIX);
    PathBuf::from(name)
}

/// What a configurator run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureSummary {
    pub changed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ConfigureSummary {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Post-Join Configurator
pub struct PostJoinConfigurator {
    files: Arc<dyn FileStore>,
    host: Arc<dyn HostControl>,
    paths: HostPaths,
    policy: AccessPolicy,
}

impl PostJoinConfigurator {
    pub fn new(
        files: Arc<dyn FileStore>,
        host: Arc<dyn HostControl>,
        paths: HostPaths,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            files,
            host,
            paths,
            policy,
        }
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    /// Apply SSH, sudo and home-directory settings
    ///
    /// Safe to run any number of times; a second run changes nothing.
    ///
    /// # Errors
    /// - AppError::InvalidState if the outcome is not joined
    /// - AppError::Configure if a file cannot be written or sudoers rejects
    ///   the drop-in
    pub async fn apply(&self, outcome: &JoinOutcome, ctx: &DomainContext) -> Result<ConfigureSummary> {
        if !outcome.joined {
            return Err(AppError::InvalidState(
                "post-join configuration requires a joined host".to_string(),
            ));
        }

        info!(domain = %ctx.domain_name, "Applying post-join configuration");

        let mut summary = ConfigureSummary::default();
        self.configure_ssh(&mut summary).await?;
        self.configure_sudo(&mut summary).await?;
        self.configure_mkhomedir(&mut summary)?;

        info!(
            changed = summary.changed.len(),
            warnings = summary.warnings.len(),
            "Post-join configuration applied"
        );
        Ok(summary)
    }

    fn read(&self, path: &Path) -> Result<Option<String>> {
        self.files
            .read(path)
            .map_err(|e| AppError::Configure(format!("cannot read {}: {}", path.display(), e)))
    }

    fn write(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        self.files
            .write(path, contents, mode)
            .map_err(|e| AppError::Configure(format!("cannot write {}: {}", path.display(), e)))
    }

    async fn configure_ssh(&self, summary: &mut ConfigureSummary) -> Result<()> {
        let path = &self.paths.sshd_config;
        let Some(current) = self.read(path)? else {
            let msg = format!("{} not found, SSH settings not applied", path.display());
            warn!(path = %path.display(), "sshd_config missing, skipping SSH settings");
            summary.warnings.push(msg);
            return Ok(());
        };

        let mut directives = vec![
            ("PasswordAuthentication", "yes"),
            ("KbdInteractiveAuthentication", "yes"),
            ("UsePAM", "yes"),
        ];
        if self.policy.enable_gssapi {
            directives.push(("GSSAPIAuthentication", "yes"));
            directives.push(("GSSAPICleanupCredentials", "yes"));
        }
        let mut updated = current.clone();
        for (key, value) in &directives {
            updated = set_directive(&updated, key, value);
        }
        let mut edited: Vec<&str> = directives.iter().map(|(key, _)| *key).collect();
        if !self.policy.ssh_allow_groups.is_empty() {
            updated = merge_list_directive(&updated, "AllowGroups", &self.policy.ssh_allow_groups);
            edited.push("AllowGroups");
        }

        if let Some(include) = edited.iter().find_map(|key| include_before(&updated, key)) {
            warn!(
                path = %path.display(),
                include = %include,
                "Included drop-ins are read before edited SSH directives"
            );
            summary.warnings.push(format!(
                "'{}' precedes the edited directives in {}; matching settings in those files take precedence",
                include,
                path.display()
            ));
        }

        if updated == current {
            info!(path = %path.display(), "SSH settings already in place");
            return Ok(());
        }

        self.write(path, &updated, 0o644)?;
        summary.changed.push(path.clone());

        let units: Vec<String> = SSH_UNITS.iter().map(|u| u.to_string()).collect();
        if let Err(e) = self.host.restart_service(&units).await {
            // The file change still applies on the next daemon start
            warn!(error = %e, "SSH daemon restart failed");
            summary
                .warnings
                .push(format!("SSH daemon restart failed: {}", e));
        }
        Ok(())
    }

    async fn configure_sudo(&self, summary: &mut ConfigureSummary) -> Result<()> {
        let path = &self.paths.sudoers_dropin;
        let previous = self.read(path)?;
        let current = previous.clone().unwrap_or_default();

        let mut updated = ensure_line(&current, SUDOERS_HEADER);
        for group in &self.policy.sudo_groups {
            let entry = format!("%{} ALL=(ALL:ALL) ALL", sudoers_escape(group));
            updated = ensure_line(&updated, &entry);
        }
        for user in &self.policy.sudo_users {
            let entry = format!("{} ALL=(ALL:ALL) ALL", sudoers_escape(user));
            updated = ensure_line(&updated, &entry);
        }

        if previous.as_deref() == Some(updated.as_str()) {
            info!(path = %path.display(), "Sudo drop-in already in place");
            return Ok(());
        }

        // Staged beside the live drop-in; sudo skips names containing a dot
        let staged = staged_path(path);
        self.write(&staged, &updated, 0o440)?;

        match self.host.validate_sudoers(&staged).await {
            Ok(None) => {}
            Ok(Some(message)) => {
                if let Err(e) = self.files.remove(&staged) {
                    warn!(
                        error = %e,
                        path = %staged.display(),
                        "Could not remove rejected sudo drop-in"
                    );
                }
                return Err(AppError::Configure(format!(
                    "sudoers rejected {}: {}",
                    path.display(),
                    message
                )));
            }
            Err(e) => {
                warn!(error = %e, "Sudoers validation unavailable");
                summary
                    .warnings
                    .push(format!("sudo drop-in not validated: {}", e));
            }
        }

        self.files.rename(&staged, path).map_err(|e| {
            AppError::Configure(format!("cannot install {}: {}", path.display(), e))
        })?;
        summary.changed.push(path.clone());
        Ok(())
    }

    fn configure_mkhomedir(&self, summary: &mut ConfigureSummary) -> Result<()> {
        let path = &self.paths.pam_session;
        let Some(current) = self.read(path)? else {
            warn!(path = %path.display(), "PAM session stack missing, skipping mkhomedir");
            summary.warnings.push(format!(
                "{} not found, home directory creation not enabled",
                path.display()
            ));
            return Ok(());
        };

        if MKHOMEDIR_MODULES.iter().any(|m| contains_active(&current, m)) {
            return Ok(());
        }

        let updated = ensure_line(&current, MKHOMEDIR_LINE);
        self.write(path, &updated, 0o644)?;
        summary.changed.push(path.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Backend, DomainSettings};
    use crate::port::file_store::mocks::InMemoryFileStore;
    use crate::port::host_control::mocks::MockHostControl;

    const SSHD: &str = "PasswordAuthentication no\n#UsePAM no\n";
    const PAM: &str = "session required pam_unix.so\n";

    fn ctx() -> DomainContext {
        let settings = DomainSettings {
            domain_name: Some("corp.example.com".to_string()),
            dc_ip: Some("10.0.0.10".to_string()),
            dc_fqdn: Some("dc1.corp.example.com".to_string()),
            ..Default::default()
        };
        DomainContext::from_settings(&settings, "web01").unwrap()
    }

    fn policy(gssapi: bool) -> AccessPolicy {
        AccessPolicy {
            ssh_allow_groups: vec!["domain admins".to_string(), "sudo".to_string()],
            sudo_groups: vec!["domain admins".to_string()],
            sudo_users: vec!["alice".to_string()],
            enable_gssapi: gssapi,
        }
    }

    fn joined() -> JoinOutcome {
        JoinOutcome {
            backend: Backend::FallbackBroker,
            joined: true,
            detail: "joined".to_string(),
        }
    }

    fn setup(
        files: InMemoryFileStore,
        host: MockHostControl,
        gssapi: bool,
    ) -> (PostJoinConfigurator, Arc<MockHostControl>) {
        let host = Arc::new(host);
        let configurator = PostJoinConfigurator::new(
            Arc::new(files),
            host.clone(),
            HostPaths::default(),
            policy(gssapi),
        );
        (configurator, host)
    }

    fn host_files() -> InMemoryFileStore {
        InMemoryFileStore::new()
            .with_file("/etc/ssh/sshd_config", SSHD)
            .with_file("/etc/pam.d/common-session", PAM)
    }

    #[tokio::test]
    async fn test_apply_writes_all_three_adjustments() {
        let files = host_files();
        let (configurator, host) = setup(files.clone(), MockHostControl::new(), true);

        let summary = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert_eq!(summary.changed.len(), 3);
        assert!(summary.warnings.is_empty());
        assert_eq!(host.restarts(), vec!["ssh".to_string()]);

        let sshd = files.contents("/etc/ssh/sshd_config").unwrap();
        assert!(sshd.contains("PasswordAuthentication yes\n"));
        assert!(sshd.contains("UsePAM yes\n"));
        assert!(sshd.contains("GSSAPIAuthentication yes\n"));
        assert!(sshd.contains("AllowGroups \"domain admins\" sudo\n"));

        let sudoers = files.contents(SUDOERS_DROPIN).unwrap();
        assert!(sudoers.contains("%domain\\ admins ALL=(ALL:ALL) ALL\n"));
        assert!(sudoers.contains("alice ALL=(ALL:ALL) ALL\n"));
        assert_eq!(files.mode(SUDOERS_DROPIN), Some(0o440));

        let pam = files.contents("/etc/pam.d/common-session").unwrap();
        assert!(pam.ends_with(&format!("{}\n", MKHOMEDIR_LINE)));
    }

    #[tokio::test]
    async fn test_second_run_is_byte_identical() {
        let files = host_files();
        let (configurator, host) = setup(files.clone(), MockHostControl::new(), false);

        configurator.apply(&joined(), &ctx()).await.unwrap();
        let snapshot: Vec<Option<String>> =
            files.paths().iter().map(|p| files.contents(p)).collect();
        let writes = files.write_count();

        let second = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert!(second.is_noop());
        assert_eq!(files.write_count(), writes);
        let again: Vec<Option<String>> = files.paths().iter().map(|p| files.contents(p)).collect();
        assert_eq!(snapshot, again);
        // Restart only happens when sshd_config changed
        assert_eq!(host.restarts().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_failure_is_a_warning() {
        let files = host_files();
        let (configurator, _) = setup(files.clone(), MockHostControl::new().failing_restart(), false);

        let summary = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("restart failed"));
        assert!(files
            .contents("/etc/ssh/sshd_config")
            .unwrap()
            .contains("UsePAM yes"));
    }

    #[tokio::test]
    async fn test_leading_include_is_a_warning() {
        let sshd = format!("Include /etc/ssh/sshd_config.d/*.conf\n{}", SSHD);
        let files = InMemoryFileStore::new()
            .with_file("/etc/ssh/sshd_config", sshd)
            .with_file("/etc/pam.d/common-session", PAM);
        let (configurator, _) = setup(files.clone(), MockHostControl::new(), false);

        let summary = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("Include /etc/ssh/sshd_config.d/*.conf"));
        // The edit itself still happens
        assert!(files
            .contents("/etc/ssh/sshd_config")
            .unwrap()
            .contains("PasswordAuthentication yes"));
    }

    #[tokio::test]
    async fn test_rejected_sudoers_is_removed() {
        let files = host_files();
        let (configurator, _) =
            setup(files.clone(), MockHostControl::new().rejecting_sudoers(), false);

        let err = configurator.apply(&joined(), &ctx()).await.unwrap_err();

        assert!(matches!(err, AppError::Configure(_)));
        assert!(files.contents(SUDOERS_DROPIN).is_none());
        assert!(files.contents(staged_path(Path::new(SUDOERS_DROPIN))).is_none());
    }

    #[tokio::test]
    async fn test_sudoers_validated_before_going_live() {
        let previous = "%wheel ALL=(ALL:ALL) ALL\n";
        let files = host_files().with_file(SUDOERS_DROPIN, previous);
        let (configurator, host) =
            setup(files.clone(), MockHostControl::new().rejecting_sudoers(), false);

        configurator.apply(&joined(), &ctx()).await.unwrap_err();

        let staged = staged_path(Path::new(SUDOERS_DROPIN));
        assert_eq!(host.validated(), vec![staged.clone()]);
        assert_eq!(files.contents(SUDOERS_DROPIN).as_deref(), Some(previous));
        assert!(files.contents(&staged).is_none());
    }

    #[tokio::test]
    async fn test_accepted_sudoers_is_moved_into_place() {
        let files = host_files();
        let (configurator, host) = setup(files.clone(), MockHostControl::new(), false);

        configurator.apply(&joined(), &ctx()).await.unwrap();

        let staged = staged_path(Path::new(SUDOERS_DROPIN));
        assert_eq!(host.validated(), vec![staged.clone()]);
        assert!(files.contents(&staged).is_none());
        assert_eq!(files.mode(SUDOERS_DROPIN), Some(0o440));
    }

    #[tokio::test]
    async fn test_existing_mkhomedir_is_respected() {
        let files = InMemoryFileStore::new()
            .with_file("/etc/ssh/sshd_config", SSHD)
            .with_file(
                "/etc/pam.d/common-session",
                "session optional pam_oddjob_mkhomedir.so\n",
            );
        let (configurator, _) = setup(files.clone(), MockHostControl::new(), false);

        let summary = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert!(!summary
            .changed
            .contains(&PathBuf::from("/etc/pam.d/common-session")));
    }

    #[tokio::test]
    async fn test_missing_sshd_config_is_a_warning() {
        let files = InMemoryFileStore::new().with_file("/etc/pam.d/common-session", PAM);
        let (configurator, host) = setup(files, MockHostControl::new(), false);

        let summary = configurator.apply(&joined(), &ctx()).await.unwrap();

        assert!(summary.warnings[0].contains("sshd_config"));
        assert!(host.restarts().is_empty());
    }

    #[tokio::test]
    async fn test_not_joined_is_rejected() {
        let files = host_files();
        let (configurator, _) = setup(files.clone(), MockHostControl::new(), false);
        let mut outcome = joined();
        outcome.joined = false;

        let err = configurator.apply(&outcome, &ctx()).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(files.write_count(), 0);
    }

    #[test]
    fn test_paths_fall_back_to_system_auth() {
        let files = InMemoryFileStore::new().with_file("/etc/pam.d/system-auth", PAM);
        assert_eq!(
            HostPaths::for_host(&files).pam_session,
            PathBuf::from("/etc/pam.d/system-auth")
        );
    }
}
