// Package manager detection and install commands
use std::path::PathBuf;

use domainjoin_core::application::constants::INSTALL_TIMEOUT;
use domainjoin_core::port::CommandSpec;

/// Supported package managers, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
}

const DETECTION_ORDER: &[PackageManager] = &[
    PackageManager::Apt,
    PackageManager::Dnf,
    PackageManager::Yum,
    PackageManager::Zypper,
];

impl PackageManager {
    /// First supported package manager on PATH
    pub fn detect() -> Option<Self> {
        Self::detect_with(|program| which::which(program).is_ok())
    }

    /// Detection with an injectable lookup (for tests)
    pub fn detect_with(is_available: impl Fn(&str) -> bool) -> Option<Self> {
        DETECTION_ORDER
            .iter()
            .copied()
            .find(|pm| is_available(pm.program()))
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Zypper => "zypper",
        }
    }

    /// Installer package format this manager accepts
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            PackageManager::Apt => "deb",
            _ => "rpm",
        }
    }

    /// realmd/SSSD stack for this distribution family
    pub fn fallback_packages(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &[
                "realmd",
                "sssd",
                "sssd-tools",
                "adcli",
                "libnss-sss",
                "libpam-sss",
                "krb5-user",
                "oddjob-mkhomedir",
                "packagekit",
            ],
            PackageManager::Dnf | PackageManager::Yum => &[
                "realmd",
                "sssd",
                "sssd-tools",
                "adcli",
                "oddjob",
                "oddjob-mkhomedir",
                "krb5-workstation",
                "samba-common-tools",
            ],
            PackageManager::Zypper => &[
                "realmd",
                "sssd",
                "sssd-tools",
                "sssd-ad",
                "adcli",
                "krb5-client",
            ],
        }
    }

    /// Non-interactive install of repository packages
    pub fn install_packages(&self, packages: &[&str]) -> CommandSpec {
        self.base_install().args(packages.iter().copied())
    }

    /// Non-interactive install of local package files
    pub fn install_files(&self, files: &[PathBuf]) -> CommandSpec {
        // apt-get only treats an argument as a file when it looks like a path
        self.base_install()
            .args(files.iter().map(|f| f.display().to_string()))
    }

    fn base_install(&self) -> CommandSpec {
        let spec = CommandSpec::new(self.program()).timeout(INSTALL_TIMEOUT);
        match self {
            PackageManager::Apt => spec
                .env("DEBIAN_FRONTEND", "noninteractive")
                .args(["install", "-y"]),
            PackageManager::Dnf | PackageManager::Yum => spec.args(["install", "-y"]),
            PackageManager::Zypper => spec.args(["--non-interactive", "install"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_prefers_apt_then_dnf() {
        assert_eq!(
            PackageManager::detect_with(|p| p == "dnf" || p == "yum"),
            Some(PackageManager::Dnf)
        );
        assert_eq!(
            PackageManager::detect_with(|p| p == "apt-get" || p == "zypper"),
            Some(PackageManager::Apt)
        );
        assert_eq!(PackageManager::detect_with(|_| false), None);
    }

    #[test]
    fn test_apt_install_is_non_interactive() {
        let spec = PackageManager::Apt.install_packages(&["realmd", "sssd"]);

        assert_eq!(spec.display(), "apt-get install -y realmd sssd");
        assert_eq!(
            spec.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );
        assert_eq!(spec.timeout, INSTALL_TIMEOUT);
    }

    #[test]
    fn test_zypper_install_files() {
        let spec = PackageManager::Zypper
            .install_files(&[PathBuf::from("/opt/domainjoin/agent/agent.rpm")]);

        assert_eq!(
            spec.display(),
            "zypper --non-interactive install /opt/domainjoin/agent/agent.rpm"
        );
        assert_eq!(PackageManager::Zypper.artifact_extension(), "rpm");
    }
}
