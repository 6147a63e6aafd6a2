// Report rendering - tagged lines, category table, summary block
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use domainjoin_core::domain::{BackendStatus, CheckResult, CheckStatus, VerificationReport, Verdict};

pub fn info(msg: &str) {
    println!("{} {}", "[INFO]".cyan().bold(), msg);
}

pub fn warn(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    println!("{} {}", "[ERROR]".red().bold(), msg);
}

fn status_tag(status: CheckStatus) -> ColoredString {
    let tag = format!("[{}]", status);
    match status {
        CheckStatus::Pass => tag.green().bold(),
        CheckStatus::Fail => tag.red().bold(),
        CheckStatus::Skip => tag.dimmed(),
    }
}

/// `[PASS] dns.controller: dc1.corp.example.com -> 10.0.0.10`
pub fn check_line(result: &CheckResult) -> String {
    format!("{} {}: {}", status_tag(result.status), result.name, result.detail)
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Pass")]
    passed: usize,
    #[tabled(rename = "Fail")]
    failed: usize,
    #[tabled(rename = "Skip")]
    skipped: usize,
}

/// Per-category counts, in catalog order
pub fn category_table(report: &VerificationReport) -> String {
    let rows: Vec<CategoryRow> = report
        .by_category()
        .into_iter()
        .map(|s| CategoryRow {
            category: s.category.label().to_string(),
            passed: s.passed,
            failed: s.failed,
            skipped: s.skipped,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn verdict_text(verdict: Verdict) -> ColoredString {
    let text = verdict.to_string();
    match verdict {
        Verdict::Success => text.green().bold(),
        Verdict::Partial => text.yellow().bold(),
        Verdict::Failure => text.red().bold(),
    }
}

/// Counts, success rate and verdict
pub fn summary(report: &VerificationReport, finished_at: &str) -> String {
    [
        format!("{}", "Verification Summary".cyan().bold()),
        format!("  {} {}", "Target:".bold(), report.target),
        format!(
            "  {} {} passed, {} failed, {} skipped ({} total)",
            "Checks:".bold(),
            report.passed,
            report.failed,
            report.skipped,
            report.total()
        ),
        format!("  {} {:.1}%", "Success rate:".bold(), report.success_rate * 100.0),
        format!(
            "  {} {} - {}",
            "Verdict:".bold(),
            verdict_text(report.verdict),
            report.verdict.summary()
        ),
        format!("  {} {}", "Finished:".bold(), finished_at),
    ]
    .join("\n")
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: &'a str,
    #[serde(flatten)]
    report: &'a VerificationReport,
}

/// Serialized report for `--json`
pub fn json(report: &VerificationReport, generated_at: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        generated_at,
        report,
    })
}

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Artifacts")]
    artifacts: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Joined")]
    joined: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// One row per backend for `status`
pub fn backend_table(rows: &[(String, String, BackendStatus)]) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
    let rows: Vec<BackendRow> = rows
        .iter()
        .map(|(backend, artifacts, status)| BackendRow {
            backend: backend.clone(),
            artifacts: artifacts.clone(),
            installed: yes_no(status.installed),
            joined: yes_no(status.joined),
            detail: status.detail.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
