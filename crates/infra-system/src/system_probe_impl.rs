// System probe implementation
// reason: tokio for DNS/TCP, sysinfo for the process table, external tools for the rest
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use domainjoin_core::application::config_edit::contains_active;
use domainjoin_core::domain::{CheckStatus, ProbeKind, ProbeOutcome, Secret, Surface};
use domainjoin_core::port::{CommandOutput, CommandRunner, CommandSpec, ExecutionError, SystemProbe};

use crate::constants::{PING_WAIT_SECS, PROBE_COMMAND_TIMEOUT, TCP_CONNECT_TIMEOUT};

type ToolLookup = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Host probe
///
/// Every error is mapped into the outcome: a missing tool is Skip, anything
/// else that goes wrong is Fail.
pub struct SystemProbeImpl {
    runner: Arc<dyn CommandRunner>,
    system: Mutex<System>,
    tool_lookup: ToolLookup,
}

impl SystemProbeImpl {
    /// Create a new system probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = SystemProbeImpl::new(runner);
    /// let outcome = probe.run(&ProbeKind::TimeSync).await;
    /// ```
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            system: Mutex::new(System::new()),
            tool_lookup: Box::new(tool_on_host),
        }
    }

    /// Replace tool discovery (for tests)
    pub fn with_tool_lookup(mut self, lookup: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.tool_lookup = Box::new(lookup);
        self
    }

    /// Run a probe command; Err carries the outcome to report instead
    async fn command(&self, spec: CommandSpec) -> Result<CommandOutput, ProbeOutcome> {
        match self.runner.run(&spec.timeout(PROBE_COMMAND_TIMEOUT)).await {
            Ok(output) => Ok(output),
            Err(ExecutionError::NotFound(program)) => {
                Err(ProbeOutcome::skip(format!("{} not installed", program)))
            }
            Err(e) => Err(ProbeOutcome::fail(e.to_string())),
        }
    }

    async fn resolve(&self, host: &str) -> ProbeOutcome {
        if host.parse::<IpAddr>().is_ok() {
            return ProbeOutcome::pass(format!("{} is an address literal", host));
        }

        match timeout(TCP_CONNECT_TIMEOUT, lookup_host((host, 0))).await {
            Ok(Ok(mut addrs)) => match addrs.next() {
                Some(addr) => ProbeOutcome::pass(format!("{} -> {}", host, addr.ip())),
                None => ProbeOutcome::fail(format!("{} has no addresses", host)),
            },
            Ok(Err(e)) => ProbeOutcome::fail(format!("{} does not resolve: {}", host, e)),
            Err(_) => ProbeOutcome::fail(format!("lookup of {} timed out", host)),
        }
    }

    async fn srv_record(&self, record: &str) -> ProbeOutcome {
        match self
            .command(CommandSpec::new("host").args(["-t", "SRV", record]))
            .await
        {
            Ok(output) => {
                let count = output.stdout.matches("has SRV record").count();
                return if output.success() && count > 0 {
                    ProbeOutcome::pass(format!("{} records", count))
                } else {
                    ProbeOutcome::fail(format!("{}: {}", record, output.diagnostic()))
                };
            }
            Err(outcome) if outcome.status != CheckStatus::Skip => return outcome,
            Err(_) => {}
        }

        // `host` missing, try `dig`
        let output = match self
            .command(CommandSpec::new("dig").args(["+short", "SRV", record]))
            .await
        {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        let count = output.stdout.lines().filter(|l| !l.trim().is_empty()).count();
        if output.success() && count > 0 {
            ProbeOutcome::pass(format!("{} records", count))
        } else {
            ProbeOutcome::fail(format!("no SRV records for {}", record))
        }
    }

    async fn ping(&self, host: &str) -> ProbeOutcome {
        let wait = PING_WAIT_SECS.to_string();
        match self
            .command(CommandSpec::new("ping").args(["-c", "1", "-W", wait.as_str(), host]))
            .await
        {
            Ok(output) if output.success() => ProbeOutcome::pass(format!("{} answered", host)),
            Ok(_) => ProbeOutcome::fail(format!("no reply from {}", host)),
            Err(outcome) => outcome,
        }
    }

    async fn tcp_port(&self, host: &str, port: u16) -> ProbeOutcome {
        match timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => ProbeOutcome::pass(format!("{}:{} open", host, port)),
            Ok(Err(e)) => ProbeOutcome::fail(format!("{}:{} {}", host, port, e)),
            Err(_) => ProbeOutcome::fail(format!(
                "{}:{} no answer within {}s",
                host,
                port,
                TCP_CONNECT_TIMEOUT.as_secs()
            )),
        }
    }

    async fn time_sync(&self) -> ProbeOutcome {
        match self
            .command(CommandSpec::new("timedatectl").args([
                "show",
                "-p",
                "NTPSynchronized",
                "--value",
            ]))
            .await
        {
            Ok(output) if output.success() => {
                return match output.stdout.trim() {
                    "yes" => ProbeOutcome::pass("NTP synchronized"),
                    other => ProbeOutcome::fail(format!("NTPSynchronized={}", other)),
                };
            }
            Ok(_) | Err(_) => {}
        }

        let output = match self
            .command(CommandSpec::new("chronyc").arg("tracking"))
            .await
        {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        let leap = output
            .stdout
            .lines()
            .find(|l| l.trim_start().starts_with("Leap status"))
            .and_then(|l| l.split_once(':'))
            .map(|(_, v)| v.trim().to_string());
        match leap.as_deref() {
            Some("Normal") => ProbeOutcome::pass("chrony synchronized"),
            Some(status) => ProbeOutcome::fail(format!("chrony leap status: {}", status)),
            None => ProbeOutcome::fail("chrony reported no tracking data"),
        }
    }

    async fn membership(&self, surface: Surface, domain: &str) -> ProbeOutcome {
        let spec = match surface {
            Surface::Realm => CommandSpec::new("realm").args(["list", "--name-only"]),
            Surface::PrimaryAgent => CommandSpec::new("adinfo").arg("--mode"),
            Surface::FallbackBroker => {
                CommandSpec::new("sssctl").args(["domain-status", "-o", domain])
            }
            Surface::KerberosClient => {
                return ProbeOutcome::skip("kerberos client has no membership");
            }
        };

        let output = match self.command(spec).await {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        let member = output.success()
            && match surface {
                Surface::Realm => output
                    .stdout
                    .lines()
                    .any(|l| l.trim().eq_ignore_ascii_case(domain)),
                Surface::PrimaryAgent => output.stdout.trim() == "connected",
                _ => output.stdout.contains("Online status: Online"),
            };

        if member {
            ProbeOutcome::pass(format!("{} member of {}", surface, domain))
        } else {
            ProbeOutcome::fail(format!(
                "{} not joined: {}",
                surface,
                first_line(output.diagnostic())
            ))
        }
    }

    fn daemon_running(&self, process: &str) -> ProbeOutcome {
        let Ok(mut system) = self.system.lock() else {
            return ProbeOutcome::fail("process table unavailable");
        };
        system.refresh_processes();
        let pids: Vec<String> = system
            .processes_by_exact_name(process)
            .map(|p| p.pid().to_string())
            .collect();

        if pids.is_empty() {
            ProbeOutcome::fail(format!("{} not running", process))
        } else {
            ProbeOutcome::pass(format!("{} running (pid {})", process, pids.join(", ")))
        }
    }

    async fn kerberos_ticket(&self, principal: &str, password: &Secret) -> ProbeOutcome {
        // Private cache so the check never touches the caller's tickets
        let cache = std::env::temp_dir().join(format!("domainjoin-krb5cc-{}", std::process::id()));
        let ccname = format!("FILE:{}", cache.display());

        let result = self
            .command(
                CommandSpec::new("kinit")
                    .arg(principal)
                    .env("KRB5CCNAME", ccname.as_str())
                    .stdin(format!("{}\n", password.expose())),
            )
            .await;

        if result.is_ok() {
            let _ = self
                .command(CommandSpec::new("kdestroy").env("KRB5CCNAME", ccname.as_str()))
                .await;
        }
        let _ = std::fs::remove_file(&cache);

        match result {
            Ok(output) if output.success() => {
                ProbeOutcome::pass(format!("ticket granted for {}", principal))
            }
            Ok(output) => ProbeOutcome::fail(first_line(output.diagnostic()).to_string()),
            Err(outcome) => outcome,
        }
    }

    async fn getent(&self, database: &str, candidates: &[String]) -> Result<Option<String>, ProbeOutcome> {
        for name in candidates {
            let output = self
                .command(CommandSpec::new("getent").args([database, name.as_str()]))
                .await?;
            if output.success() && !output.stdout.trim().is_empty() {
                return Ok(Some(name.clone()));
            }
        }
        Ok(None)
    }

    async fn account(&self, candidates: &[String]) -> ProbeOutcome {
        match self.getent("passwd", candidates).await {
            Ok(Some(name)) => ProbeOutcome::pass(format!("{} resolves", name)),
            Ok(None) => ProbeOutcome::fail(format!("none of {} resolve", candidates.join(", "))),
            Err(outcome) => outcome,
        }
    }

    async fn group(&self, candidates: &[String], optional: bool) -> ProbeOutcome {
        match self.getent("group", candidates).await {
            Ok(Some(name)) => ProbeOutcome::pass(format!("{} resolves", name)),
            Ok(None) if optional => {
                ProbeOutcome::skip(format!("{} not present in this domain", candidates.join(", ")))
            }
            Ok(None) => ProbeOutcome::fail(format!("none of {} resolve", candidates.join(", "))),
            Err(outcome) => outcome,
        }
    }

    async fn service_active(&self, units: &[String]) -> ProbeOutcome {
        let mut states = Vec::new();
        for unit in units {
            let output = match self
                .command(CommandSpec::new("systemctl").args(["is-active", unit.as_str()]))
                .await
            {
                Ok(output) => output,
                Err(outcome) => return outcome,
            };
            let state = output.stdout.trim().to_string();
            if state == "active" {
                return ProbeOutcome::pass(format!("{} active", unit));
            }
            states.push(format!("{} ({})", unit, if state.is_empty() { "unknown" } else { state.as_str() }));
        }
        ProbeOutcome::fail(format!("not active: {}", states.join(", ")))
    }

    fn pam_module(&self, modules: &[String], dir: &Path) -> ProbeOutcome {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return ProbeOutcome::fail(format!("{}: {}", dir.display(), e)),
        };

        let mut hits: Vec<String> = Vec::new();
        for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            for module in modules {
                if contains_active(&text, module) {
                    let file = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    hits.push(format!("{} in {}", module, file));
                }
            }
        }

        if hits.is_empty() {
            ProbeOutcome::fail(format!("no AD PAM module in {}", dir.display()))
        } else {
            hits.sort();
            ProbeOutcome::pass(hits.join(", "))
        }
    }

    fn non_empty_file(&self, path: &Path) -> ProbeOutcome {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {
                ProbeOutcome::pass(format!("{} ({} bytes)", path.display(), meta.len()))
            }
            Ok(_) => ProbeOutcome::fail(format!("{} is empty", path.display())),
            Err(e) => ProbeOutcome::fail(format!("{}: {}", path.display(), e)),
        }
    }
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn run(&self, kind: &ProbeKind) -> ProbeOutcome {
        let outcome = match kind {
            ProbeKind::Resolve { host } => self.resolve(host).await,
            ProbeKind::SrvRecord { record } => self.srv_record(record).await,
            ProbeKind::Ping { host } => self.ping(host).await,
            ProbeKind::TcpPort { host, port } => self.tcp_port(host, *port).await,
            ProbeKind::TimeSync => self.time_sync().await,
            ProbeKind::Membership { surface, domain } => self.membership(*surface, domain).await,
            ProbeKind::DaemonRunning { process } => self.daemon_running(process),
            ProbeKind::KerberosTicket {
                principal,
                password,
            } => self.kerberos_ticket(principal, password).await,
            ProbeKind::Account { candidates } => self.account(candidates).await,
            ProbeKind::Group {
                candidates,
                optional,
            } => self.group(candidates, *optional).await,
            ProbeKind::ServiceActive { units } => self.service_active(units).await,
            ProbeKind::PamModule { modules, dir } => self.pam_module(modules, dir),
            ProbeKind::NonEmptyFile { path } => self.non_empty_file(path),
        };

        debug!(
            probe = %kind.key(),
            status = %outcome.status,
            detail = %outcome.detail,
            "Probe completed"
        );
        outcome
    }

    fn is_installed(&self, surface: Surface) -> bool {
        let tool = match surface {
            Surface::Realm => "realm",
            Surface::PrimaryAgent => "adinfo",
            Surface::FallbackBroker => "sssd",
            Surface::KerberosClient => "kinit",
        };
        (self.tool_lookup)(tool)
    }
}

/// PATH lookup, plus sbin directories that a non-root PATH may lack
fn tool_on_host(tool: &str) -> bool {
    which::which(tool).is_ok()
        || ["/usr/sbin", "/sbin"]
            .iter()
            .any(|dir| Path::new(dir).join(tool).is_file())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
