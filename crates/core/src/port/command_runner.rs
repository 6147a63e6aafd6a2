// Command Runner Port
// Abstraction for running external tools (package managers, join utilities, probes)

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for short query commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// A single external command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    /// Indices into `args` that must be masked when logged
    pub secret_args: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            secret_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that is masked in logs
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments safe to log
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if self.secret_args.contains(&i) {
                    "***".to_string()
                } else {
                    a.clone()
                }
            })
            .collect()
    }

    /// `program arg1 arg2` with secrets masked
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.display_args());
        parts.join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr if present, stdout otherwise (for error messages)
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Command Runner trait
///
/// Implementations:
/// - SubprocessRunner: spawns a real child process with a timeout
/// - MockCommandRunner: scripted outputs for tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion
    ///
    /// A non-zero exit status is NOT an error; callers decide what it means.
    ///
    /// # Errors
    /// - ExecutionError::NotFound if the program is not on PATH
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Timeout if it runs longer than `spec.timeout`
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Scripted response for a program
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Exit { code: i32, stdout: String },
        NotFound,
        Timeout,
    }

    impl MockResponse {
        pub fn ok(stdout: impl Into<String>) -> Self {
            MockResponse::Exit {
                code: 0,
                stdout: stdout.into(),
            }
        }

        pub fn exit(code: i32) -> Self {
            MockResponse::Exit {
                code,
                stdout: String::new(),
            }
        }
    }

    /// Mock Command Runner for testing
    ///
    /// Responses are matched on `program` plus the first argument, falling back
    /// to `program` alone; unknown programs exit 0 with empty output.
    #[derive(Default)]
    pub struct MockCommandRunner {
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        calls: Arc<Mutex<Vec<CommandSpec>>>,
    }

    impl MockCommandRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, key: impl Into<String>, response: MockResponse) -> Self {
            self.responses.lock().unwrap().insert(key.into(), response);
            self
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        /// Commands run so far, rendered with secrets masked
        pub fn call_lines(&self) -> Vec<String> {
            self.calls().iter().map(CommandSpec::display).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for MockCommandRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
            self.calls.lock().unwrap().push(spec.clone());

            let responses = self.responses.lock().unwrap();
            let with_arg = spec
                .args
                .first()
                .map(|a| format!("{} {}", spec.program, a));
            let response = with_arg
                .and_then(|k| responses.get(&k))
                .or_else(|| responses.get(&spec.program))
                .cloned()
                .unwrap_or_else(|| MockResponse::ok(""));

            match response {
                MockResponse::Exit { code, stdout } => Ok(CommandOutput {
                    exit_code: Some(code),
                    stdout,
                    stderr: if code == 0 {
                        String::new()
                    } else {
                        format!("{} failed", spec.program)
                    },
                    duration_ms: 1,
                }),
                MockResponse::NotFound => Err(ExecutionError::NotFound(spec.program.clone())),
                MockResponse::Timeout => Err(ExecutionError::Timeout(
                    spec.timeout.as_millis() as i64,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_args_are_masked() {
        let spec = CommandSpec::new("adjoin")
            .args(["--user", "Administrator", "--password"])
            .secret_arg("hunter2")
            .arg("corp.example.com");

        assert_eq!(
            spec.display(),
            "adjoin --user Administrator --password *** corp.example.com"
        );
        assert_eq!(spec.args[3], "hunter2");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let mut output = CommandOutput {
            exit_code: Some(1),
            stdout: "partial output\n".to_string(),
            stderr: "  realm: No such realm found\n".to_string(),
            duration_ms: 5,
        };
        assert_eq!(output.diagnostic(), "realm: No such realm found");

        output.stderr.clear();
        assert_eq!(output.diagnostic(), "partial output");
        assert!(!output.success());
    }
}
