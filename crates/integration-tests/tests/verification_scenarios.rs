//! Verification Scenario Tests
//!
//! Full catalog runs against a scripted host probe, checking the
//! aggregated report rather than single checks.

use std::sync::Arc;

use domainjoin_core::application::{standard_catalog, HostPaths, VerificationEngine};
use domainjoin_core::domain::{
    CheckCategory, CheckSpec, CheckStatus, DomainContext, DomainSettings, Prerequisite, ProbeKind,
    Surface, Verdict,
};
use domainjoin_core::port::system_probe::mocks::MockSystemProbe;
use domainjoin_core::port::time_provider::mocks::SteppingClock;

const TARGET: &str = "web01.corp.example.com";

fn ctx(with_password: bool) -> DomainContext {
    let settings = DomainSettings {
        domain_name: Some("corp.example.com".to_string()),
        dc_ip: Some("10.0.0.10".to_string()),
        dc_fqdn: Some("dc1.corp.example.com".to_string()),
        host_name: Some("web01".to_string()),
        admin_password: with_password.then(|| "hunter2".to_string()),
        ..Default::default()
    };
    DomainContext::from_settings(&settings, "localhost").unwrap()
}

fn engine(probe: MockSystemProbe) -> (VerificationEngine, Arc<MockSystemProbe>) {
    let probe = Arc::new(probe);
    let engine = VerificationEngine::new(probe.clone(), Arc::new(SteppingClock::new(0, 2)));
    (engine, probe)
}

fn fallback_host() -> MockSystemProbe {
    MockSystemProbe::new()
        .installed(Surface::Realm)
        .installed(Surface::FallbackBroker)
        .installed(Surface::KerberosClient)
}

/// Scenario D: 8 pass, 1 fail, 3 skip is PARTIAL at 8/9
#[tokio::test]
async fn test_scenario_d_partial_verdict() {
    let mut catalog: Vec<CheckSpec> = (0..9)
        .map(|i| CheckSpec {
            name: "dns.controller",
            category: CheckCategory::Dns,
            description: format!("host {} resolves", i),
            probe: ProbeKind::Resolve {
                host: format!("h{}.corp.example.com", i),
            },
            requires: vec![],
        })
        .collect();
    catalog.extend((0..3).map(|i| CheckSpec {
        name: "primary_agent.service",
        category: CheckCategory::PrimaryAgent,
        description: format!("agent check {}", i),
        probe: ProbeKind::DaemonRunning {
            process: "adclient".to_string(),
        },
        requires: vec![Prerequisite::Installed(Surface::PrimaryAgent)],
    }));

    let (engine, _) =
        engine(MockSystemProbe::new().outcome("resolve:h8.corp.example.com", CheckStatus::Fail));
    let report = engine.run(&ctx(true), TARGET, &catalog, |_| {}).await;

    assert_eq!((report.passed, report.failed, report.skipped), (8, 1, 3));
    assert_eq!(report.total(), 12);
    assert!((report.success_rate - 8.0 / 9.0).abs() < 1e-9);
    assert_eq!(report.verdict, Verdict::Partial);

    println!("✅ Scenario D: 8/1/3 is PARTIAL");
}

/// Healthy fallback-broker host: only the primary agent checks skip
#[tokio::test]
async fn test_fallback_host_all_green() {
    let (engine, probe) = engine(fallback_host());

    let mut streamed = Vec::new();
    let report = engine
        .verify(&ctx(true), TARGET, &HostPaths::default(), |r| {
            streamed.push(r.name.clone())
        })
        .await;

    assert_eq!(report.total(), 21);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.verdict, Verdict::Success);
    assert!(report
        .results
        .iter()
        .filter(|r| r.category == CheckCategory::PrimaryAgent)
        .all(|r| r.status == CheckStatus::Skip));

    let names: Vec<String> = report.results.iter().map(|r| r.name.clone()).collect();
    assert_eq!(streamed, names);
    // Skipped checks never reach the probe
    assert_eq!(probe.calls().len(), 19);
}

/// Scenario A, verification half: a primary-agent host passes its own
/// membership checks and never probes the fallback broker
#[tokio::test]
async fn test_scenario_a_primary_agent_host() {
    let (engine, probe) = engine(
        MockSystemProbe::new()
            .installed(Surface::PrimaryAgent)
            .installed(Surface::KerberosClient),
    );

    let report = engine.verify(&ctx(true), TARGET, &HostPaths::default(), |_| {}).await;

    let status = |name: &str| {
        report
            .results
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status("primary_agent.membership"), CheckStatus::Pass);
    assert_eq!(status("primary_agent.service"), CheckStatus::Pass);
    assert_eq!(status("fallback_broker.membership"), CheckStatus::Skip);
    assert_eq!(status("fallback_broker.service"), CheckStatus::Skip);
    assert_eq!(status("kerberos.ticket"), CheckStatus::Pass);
    assert_eq!(report.verdict, Verdict::Success);

    let calls = probe.calls();
    assert!(calls.contains(&"membership:primary-agent".to_string()));
    assert!(!calls.contains(&"membership:fallback-broker".to_string()));
    assert!(!calls.contains(&"daemon:sssd".to_string()));

    println!("✅ Scenario A: primary agent verified, fallback broker skipped");
}

/// Unreachable controller: three or more failures is FAILURE
#[tokio::test]
async fn test_unreachable_controller_is_failure() {
    let probe = fallback_host()
        .outcome("ping:10.0.0.10", CheckStatus::Fail)
        .outcome("tcp:10.0.0.10:389", CheckStatus::Fail)
        .outcome("tcp:10.0.0.10:88", CheckStatus::Fail);
    let (engine, _) = engine(probe);

    let report = engine.verify(&ctx(true), TARGET, &HostPaths::default(), |_| {}).await;

    assert_eq!(report.failed, 3);
    assert_eq!(report.verdict, Verdict::Failure);
    let network: Vec<_> = report
        .by_category()
        .into_iter()
        .filter(|s| s.category == CheckCategory::Network)
        .collect();
    assert_eq!(network[0].failed, 3);
}

/// Bare host with nothing installed and no credential
#[tokio::test]
async fn test_bare_host_skips_backend_categories() {
    let (engine, probe) = engine(MockSystemProbe::new());

    let report = engine.verify(&ctx(false), TARGET, &HostPaths::default(), |_| {}).await;

    let skipped: Vec<&str> = report
        .results
        .iter()
        .filter(|r| r.status == CheckStatus::Skip)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(
        skipped,
        vec![
            "realm.membership",
            "primary_agent.membership",
            "primary_agent.service",
            "fallback_broker.membership",
            "fallback_broker.service",
            "kerberos.ticket",
        ]
    );
    assert_eq!(report.passed + report.failed + report.skipped, 21);
    assert!(probe.calls().iter().all(|k| !k.starts_with("kinit:")));
}

/// A panicking probe fails its own check and the run completes
#[tokio::test]
async fn test_panicking_probe_does_not_abort_run() {
    let (engine, _) = engine(fallback_host().panicking("time-sync"));

    let report = engine.verify(&ctx(true), TARGET, &HostPaths::default(), |_| {}).await;

    assert_eq!(report.total(), 21);
    let time = report
        .results
        .iter()
        .find(|r| r.name == "time.ntp_sync")
        .unwrap();
    assert_eq!(time.status, CheckStatus::Fail);
    assert!(time.detail.contains("panicked"));
    assert_eq!(report.verdict, Verdict::Partial);
}

#[test]
fn test_catalog_is_stable_across_targets() {
    let a: Vec<&str> = standard_catalog(&ctx(true), "a.corp.example.com", &HostPaths::default())
        .iter()
        .map(|s| s.name)
        .collect();
    let b: Vec<&str> = standard_catalog(&ctx(false), "b.corp.example.com", &HostPaths::default())
        .iter()
        .map(|s| s.name)
        .collect();

    assert_eq!(a, b);
    assert_eq!(a.len(), 21);
}
