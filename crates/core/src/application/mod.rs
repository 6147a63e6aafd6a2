// Application Layer - Use Cases and Business Logic

pub mod catalog;
pub mod config_edit;
pub mod configurator;
pub mod constants;
pub mod orchestrator;
pub mod panic_guard;
pub mod pipeline;
pub mod verification;

// Re-exports
pub use catalog::standard_catalog;
pub use configurator::{ConfigureSummary, HostPaths, PostJoinConfigurator};
pub use orchestrator::JoinOrchestrator;
pub use pipeline::{JoinPipeline, PipelineOutcome};
pub use verification::VerificationEngine;
