//! domainjoin CLI - join a Linux host to Active Directory and verify it

mod commands;
mod logging;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use domainjoin_core::domain::BackendPreference;
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "domainjoin")]
#[command(about = "Join a Linux host to an Active Directory domain and verify the result", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Domain environment file (KEY=VALUE)
    #[arg(long, global = true, env = "DOMAINJOIN_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format (written to stderr)
    #[arg(long, global = true, env = "DOMAINJOIN_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Install an identity backend, join the domain, configure access
    Join {
        /// Backend to use
        #[arg(long, value_enum, default_value = "auto")]
        backend: BackendArg,

        /// Skip SSH / sudo / PAM configuration after the join
        #[arg(long)]
        no_configure: bool,
    },

    /// Re-apply SSH / sudo / PAM configuration on a joined host
    Configure,

    /// Run the verification checks
    Verify {
        /// Host to verify (default: this host's FQDN)
        target: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Exit 2 when the verdict is FAILURE
        #[arg(long)]
        strict: bool,
    },

    /// Show backend artifacts and join status
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    Primary,
    Fallback,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Primary => BackendPreference::Primary,
            BackendArg::Fallback => BackendPreference::Fallback,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            render::error(&format!("cannot start runtime: {}", e));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::run(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            render::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
