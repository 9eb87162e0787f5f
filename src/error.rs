//! Error type shared by the runner, credential and facade layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", status_label(.status))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` still failing after {attempts} attempts")]
    RetriesExhausted {
        command: String,
        attempts: usize,
        #[source]
        last_error: Box<GitError>,
    },

    #[error("no username/password found for credentials '{0}'")]
    CredentialsNotFound(String),

    #[error("cannot derive a repository name from remote url '{0}'")]
    InvalidRemoteUrl(String),

    #[error("unexpected output from `{command}`: {message}")]
    Parse { command: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

impl GitError {
    /// Whether a retry loop should try the command again.
    ///
    /// Only a git process that ran and failed counts; a missing binary or a
    /// missing credential will not fix itself between attempts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::CommandFailed { .. })
    }

    /// stderr of the failed git process, looking through retry wrappers.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::CommandFailed { stderr, .. } => Some(stderr),
            GitError::RetriesExhausted { last_error, .. } => last_error.stderr(),
            _ => None,
        }
    }
}
