// Subprocess runner implementation
// reason: async-trait, tokio for async process management with timeouts
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use domainjoin_core::port::{
    CommandOutput, CommandRunner, CommandSpec, ExecutionError, TimeProvider,
};

/// Subprocess runner
///
/// Resolves the program on PATH, feeds optional stdin, and kills the child
/// when the command's timeout elapses. Output is decoded lossily; tools run with
/// `LC_ALL=C` so their output stays parseable.
pub struct SubprocessRunner {
    time_provider: Arc<dyn TimeProvider>,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(Arc::new(SystemTimeProvider));
    /// let out = runner.run(&CommandSpec::new("realm").arg("list")).await?;
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    /// Spawn child process, feed stdin, and wait for output
    async fn spawn_and_wait(
        &self,
        spec: &CommandSpec,
    ) -> Result<std::process::Output, ExecutionError> {
        let program = which::which(&spec.program)
            .map_err(|_| ExecutionError::NotFound(spec.program.clone()))?;

        let mut child = Command::new(program)
            .args(&spec.args)
            .env("LC_ALL", "C")
            .envs(&spec.env)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
            // Closing stdin signals EOF to tools reading a password
            drop(stdin);
        }

        let timeout_ms = spec.timeout.as_millis() as i64;
        match timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
            Err(_) => Err(ExecutionError::Timeout(timeout_ms)),
        }
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        debug!(
            command = %spec.display(),
            timeout_ms = spec.timeout.as_millis() as u64,
            "Starting subprocess"
        );

        let output = match self.spawn_and_wait(spec).await {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %spec.display(), error = %e, "Subprocess did not complete");
                return Err(e);
            }
        };

        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        };

        info!(
            command = %spec.display(),
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            "Subprocess completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainjoin_core::port::time_provider::SystemTimeProvider;
    use std::time::Duration;

    fn runner() -> SubprocessRunner {
        SubprocessRunner::new(Arc::new(SystemTimeProvider))
    }

    #[tokio::test]
    async fn test_run_success() {
        let output = runner()
            .run(&CommandSpec::new("echo").arg("hello"))
            .await
            .unwrap();

        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let output = runner()
            .run(&CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.diagnostic(), "oops");
    }

    #[tokio::test]
    async fn test_stdin_is_fed() {
        let output = runner()
            .run(&CommandSpec::new("cat").stdin("s3cret\n"))
            .await
            .unwrap();

        assert_eq!(output.stdout, "s3cret\n");
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let result = runner()
            .run(
                &CommandSpec::new("sleep")
                    .arg("10")
                    .timeout(Duration::from_millis(100)),
            )
            .await;

        assert!(matches!(result, Err(ExecutionError::Timeout(100))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = runner()
            .run(&CommandSpec::new("definitely-not-a-real-tool-7f3a"))
            .await;

        assert!(matches!(result, Err(ExecutionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_extra_env_reaches_child() {
        let output = runner()
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "printf %s \"$KRB5CCNAME\""])
                    .env("KRB5CCNAME", "FILE:/tmp/cc"),
            )
            .await
            .unwrap();

        assert_eq!(output.stdout, "FILE:/tmp/cc");
    }
}
