//! Typed git operations for pipeline scripts.
//!
//! [`Git`] turns each call into one or more `git` invocations in a working
//! directory:
//! - write operations run under an [`IdentityScope`] so commits, tags and
//!   merge commits get the intended author and committer
//! - remote operations (clone, fetch, pull, push) get a credential helper and
//!   a bounded retry when a credential identifier is configured
//! - accessors return the trimmed single-line stdout of a query command

mod command;
mod remote;
mod runner;

pub use command::GitCommand;
pub use remote::{parse_github_repository, parse_repository_name};
pub use runner::{GitOutput, GitRunner, MockCall, MockGitRunner, SystemGitRunner};

use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{CredentialHelper, CredentialStore, EnvCredentialStore};
use crate::error::GitError;
use crate::identity::{Identity, IdentityScope};
use crate::retry::{run_with_retry, RetryPolicy};

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_PAGES_BRANCH: &str = "gh-pages";
pub const DEFAULT_PAGES_SCRATCH_DIR: &str = ".gh-pages";

/// stderr fragments from `git describe --exact-match` meaning "HEAD is not tagged"
const NOT_TAGGED_MARKERS: &[&str] = &[
    "no tag exactly matches",
    "no names found",
    "cannot describe anything",
];

/// GitHub-Pages publishing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagesSettings {
    /// Branch the site is published to
    pub branch: String,
    /// Scratch checkout, relative to the working directory
    pub scratch_dir: PathBuf,
}

impl Default for PagesSettings {
    fn default() -> Self {
        Self {
            branch: DEFAULT_PAGES_BRANCH.to_string(),
            scratch_dir: PathBuf::from(DEFAULT_PAGES_SCRATCH_DIR),
        }
    }
}

/// Runtime settings for [`Git`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub remote: String,
    /// Credential identifier for remote operations; `None` runs them bare
    pub credentials: Option<String>,
    pub retry: RetryPolicy,
    /// Committer for every write; the author is used when unset
    pub committer: Option<Identity>,
    pub pages: PagesSettings,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            credentials: None,
            retry: RetryPolicy::default(),
            committer: None,
            pages: PagesSettings::default(),
        }
    }
}

/// Git operations bound to one working directory
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn GitRunner>,
    credentials: Arc<dyn CredentialStore>,
    settings: GitSettings,
    dir: PathBuf,
}

impl Git {
    pub fn new(
        runner: Arc<dyn GitRunner>,
        credentials: Arc<dyn CredentialStore>,
        settings: GitSettings,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            credentials,
            settings,
            dir: dir.into(),
        }
    }

    /// System git, credentials from the environment
    pub fn system(settings: GitSettings, dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(SystemGitRunner::new()),
            Arc::new(EnvCredentialStore::from_env()),
            settings,
            dir,
        )
    }

    /// Same runner, credentials and settings in another directory
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Clone::clone(self)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    // ─── Execution ───────────────────────────────────────────────────────

    async fn run(&self, command: &GitCommand) -> Result<GitOutput, GitError> {
        self.runner
            .run(&self.dir, command)
            .await?
            .into_result(command)
    }

    /// Run a query and return its trimmed stdout
    async fn query(&self, command: &GitCommand) -> Result<String, GitError> {
        let output = self.run(command).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run a remote operation, with credentials and retry when configured
    async fn run_remote(&self, command: GitCommand) -> Result<GitOutput, GitError> {
        let Some(id) = self.settings.credentials.as_deref() else {
            return self.run(&command).await;
        };

        let credential = self.credentials.resolve(id)?;
        debug!(credentials = id, username = %credential.username, "Using credentials");
        let command = CredentialHelper::attach(command, &credential);
        let label = command.display();
        let command = &command;
        run_with_retry(&self.settings.retry, &label, move || self.run(command)).await
    }

    /// Identity scope for a write by `author`
    fn scope(&self, author: Option<Identity>) -> IdentityScope {
        let scope = IdentityScope::new(author, self.settings.committer.clone());
        if scope.is_empty() {
            debug!("No author or committer known, git configuration applies");
        }
        scope
    }

    /// Author for writes without an explicit one: the author of HEAD, else
    /// the configured committer, else whatever git itself is configured with.
    pub(crate) async fn default_author(&self) -> Option<Identity> {
        match self.commit_author_complete().await {
            Ok(line) => match Identity::parse(&line) {
                Ok(author) => Some(author),
                Err(e) => {
                    warn!(error = %e, "Could not parse HEAD author");
                    self.settings.committer.clone()
                }
            },
            Err(e) => {
                debug!(error = %e, "No HEAD author, falling back to committer");
                self.settings.committer.clone()
            }
        }
    }

    // ─── Remote operations ───────────────────────────────────────────────

    /// Clone `url` into the working directory
    pub async fn clone_repo(&self, url: &str) -> Result<(), GitError> {
        self.clone_into(url, None, Path::new(".")).await
    }

    /// Clone `url` (optionally a single branch) into `target`, relative to
    /// the working directory
    #[instrument(skip_all, fields(dir = %self.dir.display(), url, target = %target.display()))]
    pub async fn clone_into(
        &self,
        url: &str,
        branch: Option<&str>,
        target: &Path,
    ) -> Result<(), GitError> {
        self.run_remote(GitCommand::clone_repo(url, branch, target))
            .await?;
        info!("Cloned repository");
        Ok(())
    }

    /// Fetch the configured remote, tags included
    #[instrument(skip_all, fields(dir = %self.dir.display(), remote = %self.settings.remote))]
    pub async fn fetch(&self) -> Result<(), GitError> {
        self.run_remote(GitCommand::fetch(&self.settings.remote))
            .await?;
        info!("Fetched");
        Ok(())
    }

    /// Push `refspec` (or the current branch's default) to the configured remote
    #[instrument(skip_all, fields(dir = %self.dir.display(), remote = %self.settings.remote, refspec))]
    pub async fn push(&self, refspec: Option<&str>) -> Result<(), GitError> {
        self.run_remote(GitCommand::push(&self.settings.remote, refspec))
            .await?;
        info!("Pushed");
        Ok(())
    }

    /// Push all tags to the configured remote
    #[instrument(skip_all, fields(dir = %self.dir.display(), remote = %self.settings.remote))]
    pub async fn push_tags(&self) -> Result<(), GitError> {
        self.run_remote(GitCommand::push_tags(&self.settings.remote))
            .await?;
        info!("Pushed tags");
        Ok(())
    }

    /// Pull `refspec` from the configured remote. A pull may create a merge
    /// commit, so it runs under the default author's identity.
    pub async fn pull(&self, refspec: Option<&str>) -> Result<(), GitError> {
        let author = self.default_author().await;
        self.pull_as(refspec, author).await
    }

    #[instrument(skip_all, fields(dir = %self.dir.display(), remote = %self.settings.remote, refspec))]
    pub async fn pull_as(
        &self,
        refspec: Option<&str>,
        author: Option<Identity>,
    ) -> Result<(), GitError> {
        let command = self
            .scope(author)
            .apply(GitCommand::pull(&self.settings.remote, refspec));
        self.run_remote(command).await?;
        info!("Pulled");
        Ok(())
    }

    /// Push; when rejected, pull the same refspec and push once more
    #[instrument(skip_all, fields(dir = %self.dir.display(), refspec))]
    pub async fn push_and_pull_on_failure(&self, refspec: Option<&str>) -> Result<(), GitError> {
        match self.push(refspec).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Push failed, pulling before pushing again");
                self.pull(refspec).await?;
                self.push(refspec).await
            }
        }
    }

    // ─── Local write operations ──────────────────────────────────────────

    #[instrument(skip_all, fields(dir = %self.dir.display(), branch))]
    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(&GitCommand::checkout(branch)).await?;
        Ok(())
    }

    /// Check out `branch`, creating it from HEAD when it does not exist
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch))]
    pub async fn checkout_or_create(&self, branch: &str) -> Result<(), GitError> {
        if let Err(e) = self.checkout(branch).await {
            debug!(error = %e, "Checkout failed, creating branch");
            self.run(&GitCommand::create_branch(branch)).await?;
            info!("Created branch");
        }
        Ok(())
    }

    pub async fn add(&self, pathspec: &str) -> Result<(), GitError> {
        self.run(&GitCommand::add(pathspec)).await?;
        Ok(())
    }

    /// Commit staged changes as the author of the current HEAD commit
    pub async fn commit(&self, message: &str) -> Result<(), GitError> {
        let author = self.default_author().await;
        self.commit_as(message, author).await
    }

    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub async fn commit_as(&self, message: &str, author: Option<Identity>) -> Result<(), GitError> {
        let command = self.scope(author).apply(GitCommand::commit(message));
        self.run(&command).await?;
        info!("Committed");
        Ok(())
    }

    /// Whether the index differs from HEAD
    pub async fn are_changes_staged(&self) -> Result<bool, GitError> {
        let command = GitCommand::staged_diff_quiet();
        let output = self.runner.run(&self.dir, &command).await?;
        match output.status {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(output.to_error(&command)),
        }
    }

    /// Create an annotated tag on HEAD
    pub async fn set_tag(&self, tag: &str, message: &str) -> Result<(), GitError> {
        let author = self.default_author().await;
        self.set_tag_as(tag, message, author).await
    }

    #[instrument(skip_all, fields(dir = %self.dir.display(), tag))]
    pub async fn set_tag_as(
        &self,
        tag: &str,
        message: &str,
        author: Option<Identity>,
    ) -> Result<(), GitError> {
        let command = self.scope(author).apply(GitCommand::tag(tag, message));
        self.run(&command).await?;
        info!("Tagged");
        Ok(())
    }

    /// Merge `branch` into the current branch
    pub async fn merge(&self, branch: &str) -> Result<(), GitError> {
        let author = self.default_author().await;
        self.merge_as(branch, author).await
    }

    #[instrument(skip_all, fields(dir = %self.dir.display(), branch))]
    pub async fn merge_as(&self, branch: &str, author: Option<Identity>) -> Result<(), GitError> {
        let command = self.scope(author).apply(GitCommand::merge(branch));
        self.run(&command).await?;
        info!("Merged");
        Ok(())
    }

    /// Merge only if the current branch can be fast-forwarded to `branch`
    #[instrument(skip_all, fields(dir = %self.dir.display(), branch))]
    pub async fn merge_fast_forward_only(&self, branch: &str) -> Result<(), GitError> {
        self.run(&GitCommand::merge_fast_forward_only(branch))
            .await?;
        info!("Fast-forwarded");
        Ok(())
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub async fn commit_hash(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_hash()).await
    }

    pub async fn commit_hash_short(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_hash_short()).await
    }

    /// Full message of the HEAD commit
    pub async fn commit_message(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_log("%B")).await
    }

    /// `Name <email>` of the HEAD commit's author
    pub async fn commit_author_complete(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_log("%an <%ae>")).await
    }

    pub async fn commit_author_name(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_log("%an")).await
    }

    pub async fn commit_author_email(&self) -> Result<String, GitError> {
        self.query(&GitCommand::head_log("%ae")).await
    }

    /// Committer date of HEAD
    pub async fn commit_date(&self) -> Result<DateTime<FixedOffset>, GitError> {
        let command = GitCommand::head_log("%cI");
        let raw = self.query(&command).await?;
        DateTime::parse_from_rfc3339(&raw).map_err(|e| GitError::Parse {
            command: command.display(),
            message: format!("'{raw}' is not an RFC 3339 date: {e}"),
        })
    }

    /// Tag pointing exactly at HEAD, if any
    pub async fn tag(&self) -> Result<Option<String>, GitError> {
        let command = GitCommand::exact_tag();
        let output = self.runner.run(&self.dir, &command).await?;
        if output.success() {
            return Ok(Some(output.stdout.trim().to_string()));
        }

        let stderr = output.stderr.to_lowercase();
        if NOT_TAGGED_MARKERS.iter().any(|m| stderr.contains(m)) {
            Ok(None)
        } else {
            Err(output.to_error(&command))
        }
    }

    pub async fn is_tag(&self) -> Result<bool, GitError> {
        Ok(self.tag().await?.is_some())
    }

    /// Current branch, e.g. `feature/login`
    pub async fn branch_name(&self) -> Result<String, GitError> {
        self.query(&GitCommand::current_branch()).await
    }

    /// Current branch without any `/`-separated prefix, e.g. `login`
    pub async fn simple_branch_name(&self) -> Result<String, GitError> {
        let branch = self.branch_name().await?;
        Ok(branch.rsplit('/').next().unwrap_or_default().to_string())
    }

    /// URL of the configured remote
    pub async fn repository_url(&self) -> Result<String, GitError> {
        self.query(&GitCommand::remote_url(&self.settings.remote))
            .await
    }

    /// Repository name from the remote URL, e.g. `widgets`
    pub async fn repository_name(&self) -> Result<String, GitError> {
        parse_repository_name(&self.repository_url().await?)
    }

    /// `owner/repo` from a GitHub remote URL
    pub async fn github_repository_name(&self) -> Result<String, GitError> {
        parse_github_repository(&self.repository_url().await?)
    }

    /// Whether the working tree has uncommitted changes
    pub async fn is_dirty(&self) -> Result<bool, GitError> {
        let status = self.query(&GitCommand::status_porcelain()).await?;
        Ok(!status.is_empty())
    }
}
