// Domain Layer - Pure business logic and entities

pub mod backend;
pub mod check;
pub mod context;
pub mod error;
pub mod report;

// Re-exports
pub use backend::{
    Backend, BackendPreference, BackendStatus, JoinOutcome, JoinState, Selection,
    SelectionReason,
};
pub use check::{
    CheckCategory, CheckResult, CheckSpec, CheckStatus, Prerequisite, ProbeKind, ProbeOutcome,
    Surface,
};
pub use context::{AccessPolicy, AdminCredential, DomainContext, DomainSettings, Secret};
pub use error::DomainError;
pub use report::{CategorySummary, VerificationReport, Verdict};
