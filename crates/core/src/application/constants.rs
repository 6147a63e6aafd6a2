// Application constants (No magic values)
use std::time::Duration;

/// LDAP service port on the domain controller
pub const LDAP_PORT: u16 = 389;

/// Kerberos KDC port on the domain controller
pub const KERBEROS_PORT: u16 = 88;

/// Outer guard around a single verification check (30s)
/// Probes apply their own shorter timeouts; this only catches hung probes
pub const CHECK_GUARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Package installation timeout (30 minutes)
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Domain join timeout (5 minutes)
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Sudo drop-in written by the post-join configurator
pub const SUDOERS_DROPIN: &str = "/etc/sudoers.d/domainjoin";

/// PAM modules that prove AD-aware authentication is wired in
pub const AD_PAM_MODULES: &[&str] = &["pam_sss.so", "pam_centrifydc.so"];

/// Home directory creation line for the PAM session stack
pub const MKHOMEDIR_LINE: &str = "session optional pam_mkhomedir.so skel=/etc/skel umask=0077";

/// SSH daemon unit names (Debian family first)
pub const SSH_UNITS: &[&str] = &["ssh", "sshd"];

/// Primary agent daemon (process name) and unit
pub const PRIMARY_AGENT_DAEMON: &str = "adclient";
pub const PRIMARY_AGENT_UNIT: &str = "centrifydc";

/// Fallback broker daemon (process name and unit)
pub const FALLBACK_BROKER_DAEMON: &str = "sssd";
