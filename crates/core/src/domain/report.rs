// Verification Report - aggregate of an ordered check run

use serde::Serialize;
use std::fmt;

use super::check::{CheckCategory, CheckResult, CheckStatus};

/// Highest failure count still classified as Partial
pub const PARTIAL_MAX_FAILURES: usize = 2;

/// Coarse classification of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    Partial,
    Failure,
}

impl Verdict {
    /// Band a failure count
    ///
    /// A couple of failures are tolerated as environment-dependent false
    /// negatives; three or more means the join is broken.
    pub fn from_failures(failed: usize) -> Self {
        match failed {
            0 => Verdict::Success,
            n if n <= PARTIAL_MAX_FAILURES => Verdict::Partial,
            _ => Verdict::Failure,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Verdict::Success => "Domain integration verified",
            Verdict::Partial => "Domain integration mostly working, review failed checks",
            Verdict::Failure => "Domain integration broken",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => write!(f, "SUCCESS"),
            Verdict::Partial => write!(f, "PARTIAL"),
            Verdict::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Per-category counts, in catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: CheckCategory,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Final report, derived once from the ordered results and never mutated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub target: String,
    pub results: Vec<CheckResult>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
    pub verdict: Verdict,
}

impl VerificationReport {
    /// Derive counts, rate and verdict from the ordered results
    pub fn from_results(target: impl Into<String>, results: Vec<CheckResult>) -> Self {
        let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();
        let passed = count(CheckStatus::Pass);
        let failed = count(CheckStatus::Fail);
        let skipped = count(CheckStatus::Skip);

        Self {
            target: target.into(),
            passed,
            failed,
            skipped,
            success_rate: success_rate(passed, failed),
            verdict: Verdict::from_failures(failed),
            results,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Results grouped by category, categories in first-seen order
    pub fn by_category(&self) -> Vec<CategorySummary> {
        let mut summaries: Vec<CategorySummary> = Vec::new();

        for result in &self.results {
            let idx = match summaries.iter().position(|s| s.category == result.category) {
                Some(idx) => idx,
                None => {
                    summaries.push(CategorySummary {
                        category: result.category,
                        passed: 0,
                        failed: 0,
                        skipped: 0,
                    });
                    summaries.len() - 1
                }
            };

            let summary = &mut summaries[idx];
            match result.status {
                CheckStatus::Pass => summary.passed += 1,
                CheckStatus::Fail => summary.failed += 1,
                CheckStatus::Skip => summary.skipped += 1,
            }
        }

        summaries
    }
}

/// `passed / (passed + failed)`, or 0 when nothing was decided
pub fn success_rate(passed: usize, failed: usize) -> f64 {
    let decided = passed + failed;
    if decided == 0 {
        0.0
    } else {
        passed as f64 / decided as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pass: usize, fail: usize, skip: usize) -> Vec<CheckResult> {
        let mut out = Vec::new();
        for i in 0..pass {
            out.push(CheckResult::new(format!("p{}", i), CheckCategory::Dns, CheckStatus::Pass, ""));
        }
        for i in 0..fail {
            out.push(CheckResult::new(format!("f{}", i), CheckCategory::Network, CheckStatus::Fail, ""));
        }
        for i in 0..skip {
            out.push(CheckResult::new(format!("s{}", i), CheckCategory::Sudo, CheckStatus::Skip, ""));
        }
        out
    }

    #[test]
    fn test_verdict_bands() {
        assert_eq!(Verdict::from_failures(0), Verdict::Success);
        assert_eq!(Verdict::from_failures(1), Verdict::Partial);
        assert_eq!(Verdict::from_failures(2), Verdict::Partial);
        assert_eq!(Verdict::from_failures(3), Verdict::Failure);
        assert_eq!(Verdict::from_failures(40), Verdict::Failure);
    }

    #[test]
    fn test_counts_always_sum_to_total() {
        for (p, f, s) in [(0, 0, 0), (3, 0, 0), (0, 4, 1), (7, 2, 5), (0, 0, 9)] {
            let report = VerificationReport::from_results("host", results(p, f, s));
            assert_eq!(report.passed + report.failed + report.skipped, report.total());
            assert_eq!((report.passed, report.failed, report.skipped), (p, f, s));
        }
    }

    #[test]
    fn test_success_rate_ignores_skips() {
        let report = VerificationReport::from_results("host", results(8, 1, 3));

        assert!((report.success_rate - 8.0 / 9.0).abs() < 1e-9);
        assert_eq!(report.verdict, Verdict::Partial);
    }

    #[test]
    fn test_success_rate_zero_when_nothing_decided() {
        let report = VerificationReport::from_results("host", results(0, 0, 4));

        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.verdict, Verdict::Success);
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn test_three_failures_is_failure_regardless_of_passes() {
        let report = VerificationReport::from_results("host", results(50, 3, 10));
        assert_eq!(report.verdict, Verdict::Failure);
    }

    #[test]
    fn test_by_category_keeps_first_seen_order() {
        let report = VerificationReport::from_results("host", results(2, 1, 1));
        let summary = report.by_category();

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].category, CheckCategory::Dns);
        assert_eq!(summary[0].passed, 2);
        assert_eq!(summary[1].failed, 1);
        assert_eq!(summary[2].skipped, 1);
    }

    #[test]
    fn test_report_serializes_with_wire_names() {
        let report = VerificationReport::from_results("host", results(1, 0, 1));
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["verdict"], "SUCCESS");
        assert_eq!(value["results"][0]["category"], "dns");
        assert_eq!(value["results"][1]["status"], "SKIP");
        assert_eq!(value["skipped"], 1);
    }
}
