//! Registry of the environment variables ci-git reads or sets.
//!
//! Printed by `ci-git env`. Config overrides use the `CI_GIT_` prefix with
//! `__` separating nested keys (e.g. `CI_GIT_RETRY__MAX_RETRIES`).

use std::fmt::Write as _;

/// An environment variable definition
#[derive(Debug, Clone)]
pub struct EnvVar {
    /// Variable name; `<ID>` stands for a normalised credential identifier
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Category for grouping in output
    pub category: EnvVarCategory,
    /// Default value if not set
    pub default: Option<&'static str>,
    /// Example value
    pub example: Option<&'static str>,
}

/// Categories for organizing environment variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarCategory {
    /// Credential lookup
    Credentials,
    /// Remote and executable settings
    Git,
    /// Retry of credentialed remote operations
    Retry,
    /// Committer identity
    Committer,
    /// GitHub-Pages publishing
    Pages,
    /// Logging configuration
    Logging,
    /// Set on git child processes only
    ChildProcess,
}

impl EnvVarCategory {
    /// Display name for this category
    pub fn display_name(&self) -> &'static str {
        match self {
            EnvVarCategory::Credentials => "Credentials",
            EnvVarCategory::Git => "Git",
            EnvVarCategory::Retry => "Retry",
            EnvVarCategory::Committer => "Committer",
            EnvVarCategory::Pages => "Pages",
            EnvVarCategory::Logging => "Logging",
            EnvVarCategory::ChildProcess => "Set on git processes",
        }
    }

    /// All categories in display order
    pub fn all() -> &'static [EnvVarCategory] {
        &[
            EnvVarCategory::Credentials,
            EnvVarCategory::Git,
            EnvVarCategory::Retry,
            EnvVarCategory::Committer,
            EnvVarCategory::Pages,
            EnvVarCategory::Logging,
            EnvVarCategory::ChildProcess,
        ]
    }
}

/// Static registry of all documented environment variables
pub static ENV_VARS: &[EnvVar] = &[
    // === Credentials ===
    EnvVar {
        name: "<ID>_USR",
        description: "Username for credential identifier <ID> (upper case, '-' and '.' as '_')",
        category: EnvVarCategory::Credentials,
        default: None,
        example: Some("SCM_USER_USR=ci-bot"),
    },
    EnvVar {
        name: "<ID>_PSW",
        description: "Password or token for credential identifier <ID>",
        category: EnvVarCategory::Credentials,
        default: None,
        example: Some("SCM_USER_PSW=ghp_..."),
    },
    // === Git ===
    EnvVar {
        name: "CI_GIT_GIT__CREDENTIALS",
        description: "Credential identifier used for clone, fetch, pull and push",
        category: EnvVarCategory::Git,
        default: None,
        example: Some("scm-user"),
    },
    EnvVar {
        name: "CI_GIT_GIT__REMOTE",
        description: "Remote used by remote operations and URL accessors",
        category: EnvVarCategory::Git,
        default: Some("origin"),
        example: Some("upstream"),
    },
    EnvVar {
        name: "CI_GIT_GIT__PROGRAM",
        description: "git executable, name on PATH or absolute path",
        category: EnvVarCategory::Git,
        default: Some("git"),
        example: Some("/usr/local/bin/git"),
    },
    // === Retry ===
    EnvVar {
        name: "CI_GIT_RETRY__MAX_RETRIES",
        description: "Retries after the first attempt of a credentialed remote operation",
        category: EnvVarCategory::Retry,
        default: Some("5"),
        example: Some("3"),
    },
    EnvVar {
        name: "CI_GIT_RETRY__DELAY_MS",
        description: "Delay in milliseconds between attempts",
        category: EnvVarCategory::Retry,
        default: Some("500"),
        example: Some("2000"),
    },
    // === Committer ===
    EnvVar {
        name: "CI_GIT_COMMITTER__NAME",
        description: "Committer name for commits, tags and merges (author is used when unset)",
        category: EnvVarCategory::Committer,
        default: None,
        example: Some("CI Server"),
    },
    EnvVar {
        name: "CI_GIT_COMMITTER__EMAIL",
        description: "Committer email",
        category: EnvVarCategory::Committer,
        default: None,
        example: Some("ci@example.com"),
    },
    // === Pages ===
    EnvVar {
        name: "CI_GIT_PAGES__BRANCH",
        description: "Branch publish-pages pushes to",
        category: EnvVarCategory::Pages,
        default: Some("gh-pages"),
        example: Some("pages"),
    },
    EnvVar {
        name: "CI_GIT_PAGES__SCRATCH_DIR",
        description: "Temporary checkout of the pages branch, relative to the working directory",
        category: EnvVarCategory::Pages,
        default: Some(".gh-pages"),
        example: Some("target/pages"),
    },
    // === Logging ===
    EnvVar {
        name: "CI_GIT_LOGGING__LEVEL",
        description: "Log level (trace, debug, info, warn, error); RUST_LOG takes precedence",
        category: EnvVarCategory::Logging,
        default: Some("info"),
        example: Some("debug"),
    },
    EnvVar {
        name: "CI_GIT_LOGGING__FILE",
        description: "Write logs to this file instead of stderr",
        category: EnvVarCategory::Logging,
        default: None,
        example: Some("ci-git.log"),
    },
    // === Child process ===
    EnvVar {
        name: "GIT_AUTHOR_NAME",
        description: "Author name for a single commit, tag, merge or pull",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "GIT_AUTHOR_EMAIL",
        description: "Author email for a single commit, tag, merge or pull",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "GIT_COMMITTER_NAME",
        description: "Committer name for a single commit, tag, merge or pull",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "GIT_COMMITTER_EMAIL",
        description: "Committer email for a single commit, tag, merge or pull",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "CI_GIT_AUTH_USR",
        description: "Username read by the inline credential helper",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "CI_GIT_AUTH_PSW",
        description: "Password read by the inline credential helper",
        category: EnvVarCategory::ChildProcess,
        default: None,
        example: None,
    },
    EnvVar {
        name: "GIT_TERMINAL_PROMPT",
        description: "Always 0 so git fails instead of prompting",
        category: EnvVarCategory::ChildProcess,
        default: Some("0"),
        example: None,
    },
];

/// Get all environment variables for a given category
pub fn env_vars_for_category(category: EnvVarCategory) -> impl Iterator<Item = &'static EnvVar> {
    ENV_VARS.iter().filter(move |v| v.category == category)
}

/// Get environment variables grouped by category
pub fn env_vars_by_category() -> Vec<(EnvVarCategory, Vec<&'static EnvVar>)> {
    EnvVarCategory::all()
        .iter()
        .map(|cat| {
            let vars: Vec<&EnvVar> = env_vars_for_category(*cat).collect();
            (*cat, vars)
        })
        .filter(|(_, vars)| !vars.is_empty())
        .collect()
}

/// Plain-text listing grouped by category
pub fn render() -> String {
    let mut out = String::new();
    for (category, vars) in env_vars_by_category() {
        let _ = writeln!(out, "{}:", category.display_name());
        for var in vars {
            let _ = writeln!(out, "  {:<28} {}", var.name, var.description);
            if let Some(default) = var.default {
                let _ = writeln!(out, "  {:<28} default: {default}", "");
            }
        }
        out.push('\n');
    }
    out
}
