// domainjoin Infrastructure - System Adapters
// Implements: CommandRunner, BackendAdapter, SystemProbe, HostControl, FileStore

pub mod constants;
pub mod fallback_broker;
pub mod local_file_store;
pub mod package_manager;
pub mod preflight;
pub mod primary_agent;
pub mod run_lock;
pub mod service_control;
pub mod settings;
pub mod subprocess_runner;
pub mod system_probe_impl;

pub use fallback_broker::FallbackBrokerAdapter;
pub use local_file_store::LocalFileStore;
pub use package_manager::PackageManager;
pub use primary_agent::PrimaryAgentAdapter;
pub use run_lock::RunLock;
pub use service_control::SystemdControl;
pub use settings::{load_settings, ConfigError};
pub use subprocess_runner::SubprocessRunner;
pub use system_probe_impl::SystemProbeImpl;
