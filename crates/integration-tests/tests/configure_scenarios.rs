//! Post-Join Configuration Scenario Tests
//!
//! Idempotence and failure handling of the configurator, in memory and
//! against real files in a temporary root.

use std::sync::Arc;

use domainjoin_core::application::{HostPaths, PostJoinConfigurator};
use domainjoin_core::domain::{AccessPolicy, Backend, DomainContext, DomainSettings, JoinOutcome};
use domainjoin_core::port::file_store::mocks::InMemoryFileStore;
use domainjoin_core::port::host_control::mocks::MockHostControl;
use domainjoin_core::AppError;
use domainjoin_infra_system::LocalFileStore;
use tempfile::TempDir;

const SSHD: &str = "\
Port 22
PasswordAuthentication no
AllowGroups admins
";
const PAM: &str = "session required pam_unix.so\n";

fn settings() -> DomainSettings {
    DomainSettings {
        domain_name: Some("corp.example.com".to_string()),
        dc_ip: Some("10.0.0.10".to_string()),
        dc_fqdn: Some("dc1.corp.example.com".to_string()),
        host_name: Some("web01".to_string()),
        sudo_users: Some("alice".to_string()),
        ..Default::default()
    }
}

fn ctx() -> DomainContext {
    DomainContext::from_settings(&settings(), "localhost").unwrap()
}

fn joined() -> JoinOutcome {
    JoinOutcome {
        backend: Backend::FallbackBroker,
        joined: true,
        detail: "joined corp.example.com".to_string(),
    }
}

fn policy() -> AccessPolicy {
    AccessPolicy::from_settings(&settings(), &ctx())
}

/// Running twice leaves the second run with nothing to do
#[tokio::test]
async fn test_configure_twice_is_noop() {
    let paths = HostPaths::default();
    let files = InMemoryFileStore::new()
        .with_file(&paths.sshd_config, SSHD)
        .with_file(&paths.pam_session, PAM);
    let host = Arc::new(MockHostControl::new());
    let configurator =
        PostJoinConfigurator::new(Arc::new(files.clone()), host.clone(), paths.clone(), policy());

    let first = configurator.apply(&joined(), &ctx()).await.unwrap();
    let snapshot: Vec<Option<String>> = files.paths().iter().map(|p| files.contents(p)).collect();
    let writes = files.write_count();

    let second = configurator.apply(&joined(), &ctx()).await.unwrap();

    assert_eq!(first.changed.len(), 3);
    assert!(second.is_noop());
    assert_eq!(files.write_count(), writes);
    let after: Vec<Option<String>> = files.paths().iter().map(|p| files.contents(p)).collect();
    assert_eq!(snapshot, after);
    // Only the first run restarted the SSH daemon
    assert_eq!(host.restarts().len(), 1);

    let sshd = files.contents(&paths.sshd_config).unwrap();
    assert!(sshd.contains("PasswordAuthentication yes"));
    assert!(sshd.contains("AllowGroups admins \"domain admins\" \"domain users\""));

    let sudoers = files.contents(&paths.sudoers_dropin).unwrap();
    assert!(sudoers.contains("alice ALL=(ALL:ALL) ALL"));
    assert_eq!(files.mode(&paths.sudoers_dropin), Some(0o440));

    println!("✅ Configurator idempotent across runs");
}

/// A rejected sudo drop-in is rolled back and the run fails
#[tokio::test]
async fn test_rejected_sudoers_rolls_back() {
    let paths = HostPaths::default();
    let files = InMemoryFileStore::new()
        .with_file(&paths.sshd_config, SSHD)
        .with_file(&paths.pam_session, PAM);
    let configurator = PostJoinConfigurator::new(
        Arc::new(files.clone()),
        Arc::new(MockHostControl::new().rejecting_sudoers()),
        paths.clone(),
        policy(),
    );

    let err = configurator.apply(&joined(), &ctx()).await.unwrap_err();

    assert!(matches!(err, AppError::Configure(_)));
    assert!(files.contents(&paths.sudoers_dropin).is_none());
}

/// Same idempotence on disk through the local file store
#[tokio::test]
async fn test_configure_on_disk_is_idempotent() {
    let root = TempDir::new().unwrap();
    let paths = HostPaths {
        sshd_config: root.path().join("ssh/sshd_config"),
        sudoers_dropin: root.path().join("sudoers.d/domainjoin"),
        pam_session: root.path().join("pam.d/common-session"),
        pam_dir: root.path().join("pam.d"),
    };
    std::fs::create_dir_all(root.path().join("ssh")).unwrap();
    std::fs::create_dir_all(&paths.pam_dir).unwrap();
    std::fs::write(&paths.sshd_config, SSHD).unwrap();
    std::fs::write(&paths.pam_session, PAM).unwrap();

    let configurator = PostJoinConfigurator::new(
        Arc::new(LocalFileStore::new()),
        Arc::new(MockHostControl::new()),
        paths.clone(),
        policy(),
    );

    let first = configurator.apply(&joined(), &ctx()).await.unwrap();
    let sshd_after_first = std::fs::read_to_string(&paths.sshd_config).unwrap();
    let second = configurator.apply(&joined(), &ctx()).await.unwrap();

    assert_eq!(first.changed.len(), 3);
    assert!(second.is_noop());
    assert_eq!(std::fs::read_to_string(&paths.sshd_config).unwrap(), sshd_after_first);
    assert!(std::fs::read_to_string(&paths.pam_session)
        .unwrap()
        .contains("pam_mkhomedir.so"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&paths.sudoers_dropin)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o440);
    }
}

/// An authselect-style symlinked PAM stack keeps its link
#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_pam_stack_is_edited_through_link() {
    let root = TempDir::new().unwrap();
    let pam_dir = root.path().join("pam.d");
    std::fs::create_dir_all(&pam_dir).unwrap();
    std::fs::create_dir_all(root.path().join("ssh")).unwrap();
    std::fs::write(root.path().join("ssh/sshd_config"), SSHD).unwrap();

    let managed = root.path().join("authselect-system-auth");
    std::fs::write(&managed, PAM).unwrap();
    std::os::unix::fs::symlink(&managed, pam_dir.join("system-auth")).unwrap();

    let paths = HostPaths {
        sshd_config: root.path().join("ssh/sshd_config"),
        sudoers_dropin: root.path().join("sudoers.d/domainjoin"),
        pam_session: pam_dir.join("system-auth"),
        pam_dir: pam_dir.clone(),
    };

    let host = Arc::new(MockHostControl::new());
    let configurator = PostJoinConfigurator::new(
        Arc::new(LocalFileStore::new()),
        host.clone(),
        paths.clone(),
        policy(),
    );

    configurator.apply(&joined(), &ctx()).await.unwrap();

    let link = std::fs::symlink_metadata(&paths.pam_session).unwrap();
    assert!(link.file_type().is_symlink());
    assert!(std::fs::read_to_string(&managed)
        .unwrap()
        .contains("pam_mkhomedir.so"));

    // Sudoers was checked under its staged name, never the live one
    let validated = host.validated();
    assert_eq!(validated.len(), 1);
    assert_ne!(validated[0], paths.sudoers_dropin);
    assert!(!validated[0].exists());
    assert!(paths.sudoers_dropin.exists());
}
