// Verification catalog - the fixed, ordered list of checks

use crate::application::configurator::HostPaths;
use crate::application::constants::{
    AD_PAM_MODULES, FALLBACK_BROKER_DAEMON, KERBEROS_PORT, LDAP_PORT, PRIMARY_AGENT_DAEMON,
    SSH_UNITS,
};
use crate::domain::{
    CheckCategory, CheckSpec, DomainContext, Prerequisite, ProbeKind, Secret, Surface,
};

fn spec(
    name: &'static str,
    category: CheckCategory,
    description: impl Into<String>,
    probe: ProbeKind,
    requires: Vec<Prerequisite>,
) -> CheckSpec {
    CheckSpec {
        name,
        category,
        description: description.into(),
        probe,
        requires,
    }
}

/// Build the catalog for a domain and a target host
///
/// The order is fixed; it only exists so the output reads the same way on
/// every host.
pub fn standard_catalog(ctx: &DomainContext, target: &str, paths: &HostPaths) -> Vec<CheckSpec> {
    let dc_ip = ctx.dc_ip.to_string();
    let domain = ctx.domain_name.clone();
    let admin_group = ctx.accounts.admin_group.to_lowercase();
    let builtin_group = ctx.accounts.builtin_group.to_lowercase();
    let installed = |surface| vec![Prerequisite::Installed(surface)];

    vec![
        // DNS
        spec(
            "dns.controller",
            CheckCategory::Dns,
            format!("{} resolves", ctx.dc_fqdn),
            ProbeKind::Resolve {
                host: ctx.dc_fqdn.clone(),
            },
            vec![],
        ),
        spec(
            "dns.target_host",
            CheckCategory::Dns,
            format!("{} resolves", target),
            ProbeKind::Resolve {
                host: target.to_string(),
            },
            vec![],
        ),
        spec(
            "dns.ldap_srv",
            CheckCategory::Dns,
            "LDAP service record resolves",
            ProbeKind::SrvRecord {
                record: format!("_ldap._tcp.{}", domain),
            },
            vec![],
        ),
        spec(
            "dns.kerberos_srv",
            CheckCategory::Dns,
            "Kerberos service record resolves",
            ProbeKind::SrvRecord {
                record: format!("_kerberos._tcp.{}", domain),
            },
            vec![],
        ),
        // Network
        spec(
            "network.ping",
            CheckCategory::Network,
            format!("{} answers ping", dc_ip),
            ProbeKind::Ping {
                host: dc_ip.clone(),
            },
            vec![],
        ),
        spec(
            "network.ldap_port",
            CheckCategory::Network,
            format!("LDAP port {} reachable", LDAP_PORT),
            ProbeKind::TcpPort {
                host: dc_ip.clone(),
                port: LDAP_PORT,
            },
            vec![],
        ),
        spec(
            "network.kerberos_port",
            CheckCategory::Network,
            format!("Kerberos port {} reachable", KERBEROS_PORT),
            ProbeKind::TcpPort {
                host: dc_ip,
                port: KERBEROS_PORT,
            },
            vec![],
        ),
        // Time
        spec(
            "time.ntp_sync",
            CheckCategory::Time,
            "System clock synchronized",
            ProbeKind::TimeSync,
            vec![],
        ),
        // Membership, one surface per category
        spec(
            "realm.membership",
            CheckCategory::Realm,
            format!("realm lists {}", domain),
            ProbeKind::Membership {
                surface: Surface::Realm,
                domain: domain.clone(),
            },
            installed(Surface::Realm),
        ),
        spec(
            "primary_agent.membership",
            CheckCategory::PrimaryAgent,
            "Primary agent connected to the domain",
            ProbeKind::Membership {
                surface: Surface::PrimaryAgent,
                domain: domain.clone(),
            },
            installed(Surface::PrimaryAgent),
        ),
        spec(
            "primary_agent.service",
            CheckCategory::PrimaryAgent,
            format!("{} daemon running", PRIMARY_AGENT_DAEMON),
            ProbeKind::DaemonRunning {
                process: PRIMARY_AGENT_DAEMON.to_string(),
            },
            installed(Surface::PrimaryAgent),
        ),
        spec(
            "fallback_broker.membership",
            CheckCategory::FallbackBroker,
            "SSSD domain online",
            ProbeKind::Membership {
                surface: Surface::FallbackBroker,
                domain: domain.clone(),
            },
            installed(Surface::FallbackBroker),
        ),
        spec(
            "fallback_broker.service",
            CheckCategory::FallbackBroker,
            format!("{} daemon running", FALLBACK_BROKER_DAEMON),
            ProbeKind::DaemonRunning {
                process: FALLBACK_BROKER_DAEMON.to_string(),
            },
            installed(Surface::FallbackBroker),
        ),
        // Kerberos
        spec(
            "kerberos.ticket",
            CheckCategory::Kerberos,
            format!("Ticket for {}", ctx.admin_principal()),
            ProbeKind::KerberosTicket {
                principal: ctx.admin_principal(),
                password: ctx
                    .admin
                    .password
                    .clone()
                    .unwrap_or_else(|| Secret::new("")),
            },
            vec![
                Prerequisite::Installed(Surface::KerberosClient),
                Prerequisite::Credential,
            ],
        ),
        // Identity
        spec(
            "identity.admin_user",
            CheckCategory::Identity,
            format!("{} resolves", ctx.admin.user),
            ProbeKind::Account {
                candidates: vec![ctx.admin.user.clone(), ctx.qualified(&ctx.admin.user)],
            },
            vec![],
        ),
        spec(
            "identity.test_user",
            CheckCategory::Identity,
            format!("{} resolves", ctx.accounts.test_user),
            ProbeKind::Account {
                candidates: vec![
                    ctx.accounts.test_user.clone(),
                    ctx.qualified(&ctx.accounts.test_user),
                ],
            },
            vec![],
        ),
        // Groups
        spec(
            "groups.admin_group",
            CheckCategory::Groups,
            format!("{} resolves", admin_group),
            ProbeKind::Group {
                candidates: vec![admin_group.clone(), ctx.qualified(&admin_group)],
                optional: false,
            },
            vec![],
        ),
        spec(
            "groups.builtin_group",
            CheckCategory::Groups,
            format!("{} resolves", builtin_group),
            ProbeKind::Group {
                candidates: vec![builtin_group.clone(), ctx.qualified(&builtin_group)],
                optional: true,
            },
            vec![],
        ),
        // SSH
        spec(
            "ssh.service",
            CheckCategory::Ssh,
            "SSH daemon active",
            ProbeKind::ServiceActive {
                units: SSH_UNITS.iter().map(|u| u.to_string()).collect(),
            },
            vec![],
        ),
        spec(
            "ssh.pam_module",
            CheckCategory::Ssh,
            "AD-aware PAM module configured",
            ProbeKind::PamModule {
                modules: AD_PAM_MODULES.iter().map(|m| m.to_string()).collect(),
                dir: paths.pam_dir.clone(),
            },
            vec![],
        ),
        // Sudo
        spec(
            "sudo.dropin",
            CheckCategory::Sudo,
            format!("{} present", paths.sudoers_dropin.display()),
            ProbeKind::NonEmptyFile {
                path: paths.sudoers_dropin.clone(),
            },
            vec![],
        ),
    ]
}
