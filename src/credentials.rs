//! Username/password credentials for authenticated remote operations.
//!
//! A credential identifier (e.g. `scm-user`) is resolved to a username and
//! password, which are handed to git through an inline credential helper.
//! The secret lives only in the child-process environment; the helper
//! script that reads it is the only thing on the command line.

use std::collections::HashMap;
use std::fmt;

use crate::error::GitError;
use crate::git::GitCommand;

/// Child-process variable carrying the username
pub const AUTH_USERNAME_VAR: &str = "CI_GIT_AUTH_USR";
/// Child-process variable carrying the password or token
pub const AUTH_PASSWORD_VAR: &str = "CI_GIT_AUTH_PSW";

const HELPER_SCRIPT: &str =
    "!f() { echo username=\"$CI_GIT_AUTH_USR\"; echo password=\"$CI_GIT_AUTH_PSW\"; }; f";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves a credential identifier to a username/password pair
pub trait CredentialStore: Send + Sync {
    fn resolve(&self, id: &str) -> Result<Credential, GitError>;
}

/// Normalise an identifier to the variable stem used for lookups:
/// upper case, with `-`, `.` and spaces turned into `_`.
pub fn variable_stem(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Credentials bound into the environment as `<ID>_USR` / `<ID>_PSW`,
/// the layout CI servers use for username/password bindings.
#[derive(Clone, Default)]
pub struct EnvCredentialStore {
    vars: HashMap<String, String>,
}

impl EnvCredentialStore {
    /// Snapshot of the current process environment; non-UTF-8 entries are skipped
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn resolve(&self, id: &str) -> Result<Credential, GitError> {
        let stem = variable_stem(id);
        let username = self.vars.get(&format!("{stem}_USR"));
        let password = self.vars.get(&format!("{stem}_PSW"));
        match (username, password) {
            (Some(username), Some(password)) => Ok(Credential::new(username, password)),
            _ => Err(GitError::CredentialsNotFound(id.to_string())),
        }
    }
}

/// Fixed set of credentials, keyed by normalised identifier
#[derive(Clone, Default)]
pub struct StaticCredentialStore {
    credentials: HashMap<String, Credential>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, credential: Credential) -> Self {
        self.credentials.insert(variable_stem(&id.into()), credential);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn resolve(&self, id: &str) -> Result<Credential, GitError> {
        self.credentials
            .get(&variable_stem(id))
            .cloned()
            .ok_or_else(|| GitError::CredentialsNotFound(id.to_string()))
    }
}

/// Tries each store in turn, returning the first hit
pub struct ChainedCredentialStore {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl ChainedCredentialStore {
    pub fn new(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { stores }
    }
}

impl CredentialStore for ChainedCredentialStore {
    fn resolve(&self, id: &str) -> Result<Credential, GitError> {
        for store in &self.stores {
            match store.resolve(id) {
                Ok(credential) => return Ok(credential),
                Err(GitError::CredentialsNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(GitError::CredentialsNotFound(id.to_string()))
    }
}

/// Wires a credential into a git command through `credential.helper`.
pub struct CredentialHelper;

impl CredentialHelper {
    /// Clear inherited helpers, install the inline helper and put the
    /// secret into the command's environment.
    pub fn attach(command: GitCommand, credential: &Credential) -> GitCommand {
        command
            .config("credential.helper", "")
            .config("credential.helper", HELPER_SCRIPT)
            .env(AUTH_USERNAME_VAR, credential.username.as_str())
            .env(AUTH_PASSWORD_VAR, credential.password.as_str())
    }
}
