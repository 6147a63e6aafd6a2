// Domain Context - immutable run configuration

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;

use super::error::{DomainError, Result};

pub const DEFAULT_ADMIN_USER: &str = "Administrator";
pub const DEFAULT_TEST_USER: &str = "testuser";
pub const DEFAULT_ADMIN_GROUP: &str = "Domain Admins";
pub const DEFAULT_BUILTIN_GROUP: &str = "Domain Users";

/// Local groups that keep SSH access after the allow-list is installed
const LOCAL_ADMIN_GROUPS: &[&str] = &["root", "sudo", "wheel"];

/// A credential value that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Raw key/value settings as read from the environment file
///
/// Keys map 1:1 to the lowercase form of the file's variables
/// (`DOMAIN_NAME` -> `domain_name`). Nothing here is validated yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainSettings {
    pub domain_name: Option<String>,
    pub domain_realm: Option<String>,
    pub domain_netbios: Option<String>,
    pub dc_ip: Option<String>,
    pub dc_fqdn: Option<String>,
    pub host_ip: Option<String>,
    pub host_fqdn: Option<String>,
    pub host_name: Option<String>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub admin_password_file: Option<String>,
    pub computer_ou: Option<String>,
    pub test_user: Option<String>,
    pub admin_group: Option<String>,
    pub builtin_group: Option<String>,
    pub ssh_allow_groups: Option<String>,
    pub sudo_groups: Option<String>,
    pub sudo_users: Option<String>,
    pub enable_gssapi: Option<bool>,
    pub primary_artifact_dir: Option<String>,
}

/// Identity of the host being joined (or verified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub ip: Option<IpAddr>,
    pub fqdn: String,
    pub hostname: String,
}

/// Administrator account used for join and ticket checks
#[derive(Debug, Clone)]
pub struct AdminCredential {
    pub user: String,
    pub password: Option<Secret>,
}

/// Well-known accounts and groups the verifier looks up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownAccounts {
    pub test_user: String,
    pub admin_group: String,
    pub builtin_group: String,
}

/// Immutable configuration for one orchestrator/verifier run
#[derive(Debug, Clone)]
pub struct DomainContext {
    pub domain_name: String,
    pub realm: String,
    pub netbios: String,
    pub dc_ip: IpAddr,
    pub dc_fqdn: String,
    pub host: HostIdentity,
    pub admin: AdminCredential,
    pub computer_ou: Option<String>,
    pub accounts: KnownAccounts,
}

impl DomainContext {
    /// Validate raw settings into a context
    ///
    /// # Arguments
    /// * `settings` - Raw settings from the environment file
    /// * `local_hostname` - Used when `HOST_NAME` is not set
    ///
    /// # Errors
    /// - `DomainError::MissingSetting` for an absent required key
    /// - `DomainError::ValidationError` for malformed values
    pub fn from_settings(settings: &DomainSettings, local_hostname: &str) -> Result<Self> {
        let domain_name = required(&settings.domain_name, "DOMAIN_NAME")?.to_lowercase();
        if !domain_name.contains('.') {
            return Err(DomainError::ValidationError(format!(
                "DOMAIN_NAME must be a fully qualified name, got '{}'",
                domain_name
            )));
        }

        let realm = match non_empty(&settings.domain_realm) {
            Some(realm) if realm != realm.to_uppercase() => {
                return Err(DomainError::ValidationError(format!(
                    "DOMAIN_REALM must be uppercase, got '{}'",
                    realm
                )));
            }
            Some(realm) => realm.to_string(),
            None => domain_name.to_uppercase(),
        };

        let netbios = non_empty(&settings.domain_netbios)
            .map(|n| n.to_uppercase())
            .unwrap_or_else(|| first_label(&domain_name).to_uppercase());

        let dc_ip = parse_ip(required(&settings.dc_ip, "DC_IP")?, "DC_IP")?;
        let dc_fqdn = required(&settings.dc_fqdn, "DC_FQDN")?.to_lowercase();

        let host_ip = non_empty(&settings.host_ip)
            .map(|ip| parse_ip(ip, "HOST_IP"))
            .transpose()?;
        let hostname = non_empty(&settings.host_name)
            .map(str::to_string)
            .unwrap_or_else(|| first_label(local_hostname).to_string());
        if hostname.is_empty() {
            return Err(DomainError::MissingSetting("HOST_NAME"));
        }
        let fqdn = non_empty(&settings.host_fqdn)
            .map(str::to_lowercase)
            .unwrap_or_else(|| format!("{}.{}", hostname.to_lowercase(), domain_name));

        Ok(Self {
            domain_name,
            realm,
            netbios,
            dc_ip,
            dc_fqdn,
            host: HostIdentity {
                ip: host_ip,
                fqdn,
                hostname,
            },
            admin: AdminCredential {
                user: or_default(&settings.admin_user, DEFAULT_ADMIN_USER),
                password: non_empty(&settings.admin_password).map(Secret::new),
            },
            computer_ou: non_empty(&settings.computer_ou).map(str::to_string),
            accounts: KnownAccounts {
                test_user: or_default(&settings.test_user, DEFAULT_TEST_USER),
                admin_group: or_default(&settings.admin_group, DEFAULT_ADMIN_GROUP),
                builtin_group: or_default(&settings.builtin_group, DEFAULT_BUILTIN_GROUP),
            },
        })
    }

    /// Domain-qualified form of an account or group name (`name@domain`)
    pub fn qualified(&self, name: &str) -> String {
        format!("{}@{}", name, self.domain_name)
    }

    /// Kerberos principal of the administrator (`user@REALM`)
    pub fn admin_principal(&self) -> String {
        format!("{}@{}", self.admin.user, self.realm)
    }

    pub fn has_credential(&self) -> bool {
        self.admin.password.is_some()
    }
}

/// SSH/sudo access policy applied after a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub ssh_allow_groups: Vec<String>,
    pub sudo_groups: Vec<String>,
    pub sudo_users: Vec<String>,
    pub enable_gssapi: bool,
}

impl AccessPolicy {
    pub fn from_settings(settings: &DomainSettings, ctx: &DomainContext) -> Self {
        let ssh_allow_groups = non_empty(&settings.ssh_allow_groups)
            .map(split_list)
            .unwrap_or_else(|| {
                let mut groups = vec![
                    ctx.accounts.admin_group.to_lowercase(),
                    ctx.accounts.builtin_group.to_lowercase(),
                ];
                groups.extend(LOCAL_ADMIN_GROUPS.iter().map(|g| g.to_string()));
                groups
            });

        let sudo_groups = non_empty(&settings.sudo_groups)
            .map(split_list)
            .unwrap_or_else(|| vec![ctx.accounts.admin_group.to_lowercase()]);

        Self {
            ssh_allow_groups,
            sudo_groups,
            sudo_users: non_empty(&settings.sudo_users)
                .map(split_list)
                .unwrap_or_default(),
            enable_gssapi: settings.enable_gssapi.unwrap_or(false),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str> {
    non_empty(value).ok_or(DomainError::MissingSetting(key))
}

fn or_default(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}

fn parse_ip(value: &str, key: &str) -> Result<IpAddr> {
    value.parse().map_err(|_| {
        DomainError::ValidationError(format!("{} is not an IP address: '{}'", key, value))
    })
}

fn first_label(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Split a comma-separated list, dropping blanks and duplicates (order kept)
fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}
