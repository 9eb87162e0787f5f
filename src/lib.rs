//! ci-git - credential-aware git wrapper for CI pipeline scripts
//!
//! Typed operations (clone, fetch, commit, tag, merge, push, pull, pages
//! publishing) that shell out to `git`, scope author/committer identity to a
//! single invocation, and retry credentialed remote operations.

pub mod config;
pub mod credentials;
pub mod env_vars;
pub mod error;
pub mod git;
pub mod identity;
pub mod logging;
pub mod pages;
pub mod retry;

pub use credentials::{Credential, CredentialStore, EnvCredentialStore, StaticCredentialStore};
pub use error::GitError;
pub use git::{Git, GitSettings};
pub use identity::{Identity, IdentityScope};
pub use retry::RetryPolicy;
