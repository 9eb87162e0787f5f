//! Argument lists for every git invocation the wrapper makes.
//!
//! Arguments are handed to the process API as a vector, never joined into a
//! shell string, so commit messages and refspecs need no quoting.

use std::fmt;
use std::path::Path;

/// Config key whose value is hidden in logs.
const CREDENTIAL_HELPER_KEY: &str = "credential.helper";

/// A single `git` invocation: `-c` options, arguments and extra environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GitCommand {
    config: Vec<(String, String)>,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl GitCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            config: Vec::new(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a `-c key=value` option placed before the subcommand.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    /// Add an environment variable for this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn config_pairs(&self) -> &[(String, String)] {
        &self.config
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    /// Value of an environment variable attached to this command.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn subcommand(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    /// Everything after the program name, as passed to the process.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.config.len() * 2 + self.args.len());
        for (key, value) in &self.config {
            line.push("-c".to_string());
            line.push(format!("{key}={value}"));
        }
        line.extend(self.args.iter().cloned());
        line
    }

    /// Loggable form of the command. Credential helper bodies are masked.
    pub fn display(&self) -> String {
        let mut parts = vec!["git".to_string()];
        for (key, value) in &self.config {
            parts.push("-c".to_string());
            if key == CREDENTIAL_HELPER_KEY && !value.is_empty() {
                parts.push(format!("{key}=<redacted>"));
            } else {
                parts.push(format!("{key}={value}"));
            }
        }
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    // ─── Write commands ──────────────────────────────────────────────────

    pub fn clone_repo(url: &str, branch: Option<&str>, target: &Path) -> Self {
        let mut cmd = Self::new(["clone"]);
        if let Some(branch) = branch {
            cmd = cmd.arg("--branch").arg(branch);
        }
        cmd.arg(url).arg(target.to_string_lossy())
    }

    pub fn fetch(remote: &str) -> Self {
        Self::new(["fetch", "--tags", remote])
    }

    pub fn checkout(branch: &str) -> Self {
        Self::new(["checkout", branch])
    }

    pub fn create_branch(branch: &str) -> Self {
        Self::new(["checkout", "-b", branch])
    }

    pub fn add(pathspec: &str) -> Self {
        Self::new(["add", "--", pathspec])
    }

    pub fn commit(message: &str) -> Self {
        Self::new(["commit", "-m", message])
    }

    pub fn tag(tag: &str, message: &str) -> Self {
        Self::new(["tag", "-m", message, tag])
    }

    pub fn merge(branch: &str) -> Self {
        Self::new(["merge", branch])
    }

    pub fn merge_fast_forward_only(branch: &str) -> Self {
        Self::new(["merge", "--ff-only", branch])
    }

    pub fn push(remote: &str, refspec: Option<&str>) -> Self {
        let cmd = Self::new(["push", remote]);
        match refspec {
            Some(refspec) => cmd.arg(refspec),
            None => cmd,
        }
    }

    pub fn push_tags(remote: &str) -> Self {
        Self::new(["push", remote, "--tags"])
    }

    pub fn pull(remote: &str, refspec: Option<&str>) -> Self {
        let cmd = Self::new(["pull", remote]);
        match refspec {
            Some(refspec) => cmd.arg(refspec),
            None => cmd,
        }
    }

    // ─── Query commands ──────────────────────────────────────────────────

    pub fn head_hash() -> Self {
        Self::new(["rev-parse", "HEAD"])
    }

    pub fn head_hash_short() -> Self {
        Self::new(["rev-parse", "--short", "HEAD"])
    }

    /// `git log -1` rendering HEAD with the given pretty format.
    pub fn head_log(format: &str) -> Self {
        Self::new(["log", "-1"]).arg(format!("--pretty=format:{format}"))
    }

    pub fn exact_tag() -> Self {
        Self::new(["describe", "--tags", "--exact-match"])
    }

    pub fn remote_url(remote: &str) -> Self {
        Self::new(["config", "--get"]).arg(format!("remote.{remote}.url"))
    }

    pub fn current_branch() -> Self {
        Self::new(["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn status_porcelain() -> Self {
        Self::new(["status", "--porcelain"])
    }

    pub fn staged_diff_quiet() -> Self {
        Self::new(["diff", "--cached", "--quiet"])
    }
}

impl fmt::Debug for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("GitCommand")
            .field("command", &self.display())
            .field("env", &env_keys)
            .finish()
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
