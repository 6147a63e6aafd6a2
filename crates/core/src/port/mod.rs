// Port Layer - Interfaces for external dependencies

pub mod backend_adapter;
pub mod command_runner;
pub mod file_store;
pub mod host_control;
pub mod system_probe;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use backend_adapter::{AdapterError, BackendAdapter};
pub use command_runner::{CommandOutput, CommandRunner, CommandSpec, ExecutionError};
pub use file_store::FileStore;
pub use host_control::HostControl;
pub use system_probe::SystemProbe;
pub use time_provider::TimeProvider;
