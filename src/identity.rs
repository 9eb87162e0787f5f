//! Author/committer identity for a single git invocation.
//!
//! Identity is never written to the process environment. It is attached to
//! one [`GitCommand`] as child-process variables, so whatever
//! `GIT_AUTHOR_*`/`GIT_COMMITTER_*` values the caller had before a call are
//! exactly the values it has afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GitError;
use crate::git::GitCommand;

pub const GIT_AUTHOR_NAME: &str = "GIT_AUTHOR_NAME";
pub const GIT_AUTHOR_EMAIL: &str = "GIT_AUTHOR_EMAIL";
pub const GIT_COMMITTER_NAME: &str = "GIT_COMMITTER_NAME";
pub const GIT_COMMITTER_EMAIL: &str = "GIT_COMMITTER_EMAIL";

/// A name/email pair as git records it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parse the `Name <email>` form used by `git log --pretty=format:'%an <%ae>'`
    pub fn parse(line: &str) -> Result<Self, GitError> {
        let parse_err = |message: &str| GitError::Parse {
            command: "author line".to_string(),
            message: format!("{message}: '{line}'"),
        };

        let line = line.trim();
        let open = line.rfind('<').ok_or_else(|| parse_err("missing '<'"))?;
        let close = line
            .strip_suffix('>')
            .map(str::len)
            .ok_or_else(|| parse_err("missing trailing '>'"))?;
        if close < open {
            return Err(parse_err("malformed email"));
        }

        let name = line[..open].trim();
        let email = line[open + 1..close].trim();
        if name.is_empty() {
            return Err(parse_err("empty name"));
        }
        Ok(Self::new(name, email))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

impl FromStr for Identity {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Author and committer applied to one git invocation.
///
/// A missing committer falls back to the author. A missing author leaves
/// the author variables unset so git uses its own configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityScope {
    pub author: Option<Identity>,
    pub committer: Option<Identity>,
}

impl IdentityScope {
    pub fn new(author: Option<Identity>, committer: Option<Identity>) -> Self {
        Self { author, committer }
    }

    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.committer.is_none()
    }

    fn effective_committer(&self) -> Option<&Identity> {
        self.committer.as_ref().or(self.author.as_ref())
    }

    /// The environment variables this scope sets
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::with_capacity(4);
        if let Some(author) = &self.author {
            vars.push((GIT_AUTHOR_NAME, author.name.clone()));
            vars.push((GIT_AUTHOR_EMAIL, author.email.clone()));
        }
        if let Some(committer) = self.effective_committer() {
            vars.push((GIT_COMMITTER_NAME, committer.name.clone()));
            vars.push((GIT_COMMITTER_EMAIL, committer.email.clone()));
        }
        vars
    }

    /// Attach the scope to a single command
    pub fn apply(&self, command: GitCommand) -> GitCommand {
        self.env()
            .into_iter()
            .fold(command, |cmd, (key, value)| cmd.env(key, value))
    }
}
