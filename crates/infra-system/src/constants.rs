// Infrastructure constants (No magic values)
use std::time::Duration;

/// TCP connect timeout for port probes
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// `ping -W` wait, in seconds
pub const PING_WAIT_SECS: u64 = 2;

/// Timeout for probe and status commands
pub const PROBE_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default environment file
pub const DEFAULT_ENV_FILE: &str = "/etc/domainjoin/domain.env";

/// Prefix of environment overrides (`DOMAINJOIN_DOMAIN_NAME`, ...)
pub const ENV_PREFIX: &str = "DOMAINJOIN";

/// Default directory holding the primary agent's installer packages
pub const DEFAULT_ARTIFACT_DIR: &str = "/opt/domainjoin/agent";

/// Advisory lock held by mutating commands
pub const RUN_LOCK_PATH: &str = "/run/domainjoin.lock";

/// SSSD configuration written after a fallback join
pub const SSSD_CONF: &str = "/etc/sssd/sssd.conf";

/// SSSD refuses to start unless its config is private
pub const SSSD_CONF_MODE: u32 = 0o600;
