//! Process execution for git commands.
//!
//! Uses the git CLI directly (rather than libgit2) so that hooks, credential
//! helpers and repository config behave exactly as they do for the pipeline
//! script's own `git` calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::command::GitCommand;
use crate::error::GitError;

/// Captured result of one git process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Map a non-zero exit into [`GitError::CommandFailed`].
    pub fn into_result(self, command: &GitCommand) -> Result<GitOutput, GitError> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.to_error(command))
        }
    }

    /// The [`GitError::CommandFailed`] describing this output
    pub fn to_error(&self, command: &GitCommand) -> GitError {
        GitError::CommandFailed {
            command: command.display(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Executes git commands. The seam between the typed operations and the host.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `command` in `cwd`, returning its output whatever the exit status.
    async fn run(&self, cwd: &Path, command: &GitCommand) -> Result<GitOutput, GitError>;
}

/// Runs the system git binary.
#[derive(Debug, Clone)]
pub struct SystemGitRunner {
    program: PathBuf,
}

impl Default for SystemGitRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemGitRunner {
    /// Runner for `git`, resolved on PATH when possible
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Runner for a specific git executable (name on PATH or a path)
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        let program = program.as_ref();
        let resolved = which::which(program).unwrap_or_else(|_| program.to_path_buf());
        Self { program: resolved }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether the configured program can be found
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

#[async_trait]
impl GitRunner for SystemGitRunner {
    #[instrument(skip_all, fields(cwd = %cwd.display(), subcommand = command.subcommand()))]
    async fn run(&self, cwd: &Path, command: &GitCommand) -> Result<GitOutput, GitError> {
        debug!(command = %command.display(), "Running git command");

        let mut cmd = Command::new(&self.program);
        cmd.args(command.command_line())
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0");
        for (key, value) in command.env_vars() {
            cmd.env(key, value);
        }

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let result = GitOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(status = ?result.status, "git command finished");
        Ok(result)
    }
}

/// Record of a command seen by [`MockGitRunner`]
#[derive(Debug, Clone)]
pub struct MockCall {
    pub cwd: PathBuf,
    pub command: GitCommand,
}

impl MockCall {
    pub fn args(&self) -> &[String] {
        self.command.args()
    }

    /// Arguments joined with spaces, handy for assertions
    pub fn line(&self) -> String {
        self.command.args().join(" ")
    }
}

/// Whether the first few whole arguments of `args`, joined with spaces,
/// equal `prefix`. `"push"` matches `push origin main`, while
/// `"log -1 --pretty=format:%an"` does not match `--pretty=format:%an <%ae>`.
fn matches_prefix(args: &[String], prefix: &str) -> bool {
    (1..=args.len()).any(|n| args[..n].join(" ") == prefix)
}

/// In-memory runner for tests.
///
/// Records every command and answers from scripted responses. A response is
/// keyed by leading whole arguments joined with spaces (e.g. `"push"` or
/// `"log -1 --pretty=format:%an"`) and used once. Unscripted commands
/// succeed with empty output.
#[derive(Clone, Default)]
pub struct MockGitRunner {
    responses: Arc<Mutex<VecDeque<(String, GitOutput)>>>,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGitRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next command whose arguments start with `prefix`
    pub fn respond(&self, prefix: &str, output: GitOutput) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back((prefix.to_string(), output));
        self
    }

    /// Queue the same response `times` times
    pub fn respond_times(&self, prefix: &str, output: &GitOutput, times: usize) -> &Self {
        for _ in 0..times {
            self.respond(prefix, output.clone());
        }
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Argument lines of every recorded call, in order
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(MockCall::line).collect()
    }

    /// Number of recorded calls whose leading arguments are `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches_prefix(call.args(), prefix))
            .count()
    }

    /// Scripted responses not consumed yet
    pub fn pending(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl GitRunner for MockGitRunner {
    async fn run(&self, cwd: &Path, command: &GitCommand) -> Result<GitOutput, GitError> {
        self.calls.lock().unwrap().push(MockCall {
            cwd: cwd.to_path_buf(),
            command: command.clone(),
        });

        let mut responses = self.responses.lock().unwrap();
        let position = responses
            .iter()
            .position(|(prefix, _)| matches_prefix(command.args(), prefix));
        Ok(position
            .and_then(|i| responses.remove(i))
            .map_or_else(|| GitOutput::ok(""), |(_, output)| output))
    }
}
