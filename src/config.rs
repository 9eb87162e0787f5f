use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::{
    ChainedCredentialStore, Credential, EnvCredentialStore, StaticCredentialStore,
};

use crate::git::{
    GitSettings, PagesSettings, DEFAULT_PAGES_BRANCH, DEFAULT_PAGES_SCRATCH_DIR, DEFAULT_REMOTE,
};
use crate::identity::Identity;
use crate::retry::{RetryPolicy, DEFAULT_DELAY_MS, DEFAULT_MAX_RETRIES};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub committer: CommitterConfig,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Credentials supplied by config files, keyed by identifier
    #[serde(default)]
    pub credentials: HashMap<String, CredentialConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote used by fetch, pull, push and the URL accessors
    #[serde(default = "default_remote")]
    pub remote: String,
    /// git executable (name on PATH or absolute path)
    #[serde(default = "default_program")]
    pub program: String,
    /// Credential identifier; resolved from `<ID>_USR` / `<ID>_PSW`
    #[serde(default)]
    pub credentials: Option<String>,
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_program() -> String {
    "git".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            program: default_program(),
            credentials: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt of a credentialed remote operation
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Delay in milliseconds between attempts (default: 500)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Committer identity applied to every write. Both fields are needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitterConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CommitterConfig {
    pub fn identity(&self) -> Option<Identity> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) if !name.is_empty() => {
                Some(Identity::new(name.clone(), email.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    #[serde(default = "default_pages_branch")]
    pub branch: String,
    /// Scratch checkout, relative to the working directory
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
}

fn default_pages_branch() -> String {
    DEFAULT_PAGES_BRANCH.to_string()
}

fn default_scratch_dir() -> String {
    DEFAULT_PAGES_SCRATCH_DIR.to_string()
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            branch: default_pages_branch(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// `[credentials.<id>]` entry. The environment wins over these.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Project config file, looked up in the current directory
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".ci-git.toml")
    }

    /// User config file in the platform config directory
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ci-git").join("config.toml"))
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// [`Config::load`] reading `CI_GIT_*` overrides from `env` instead of
    /// the process environment when given
    pub fn load_with_env(
        config_path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        // Start with embedded defaults so ci-git works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables: CI_GIT_<SECTION>__<KEY>
        builder = builder.add_source(
            config::Environment::with_prefix("CI_GIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Write config as TOML to `path`
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    /// Credentials from `[credentials.<id>]` sections
    pub fn static_credentials(&self) -> StaticCredentialStore {
        self.credentials
            .iter()
            .fold(StaticCredentialStore::new(), |store, (id, entry)| {
                store.with(
                    id.clone(),
                    Credential::new(entry.username.clone(), entry.password.clone()),
                )
            })
    }

    /// `env` first, then the config-file credentials
    pub fn credential_store(&self, env: EnvCredentialStore) -> ChainedCredentialStore {
        ChainedCredentialStore::new(vec![Box::new(env), Box::new(self.static_credentials())])
    }

    /// Runtime settings for [`crate::git::Git`]
    pub fn git_settings(&self) -> GitSettings {
        GitSettings {
            remote: self.git.remote.clone(),
            credentials: self
                .git
                .credentials
                .clone()
                .filter(|id| !id.trim().is_empty()),
            retry: self.retry_policy(),
            committer: self.committer.identity(),
            pages: PagesSettings {
                branch: self.pages.branch.clone(),
                scratch_dir: PathBuf::from(&self.pages.scratch_dir),
            },
        }
    }
}
