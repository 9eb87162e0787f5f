//! Publishing a built site to the GitHub-Pages branch.
//!
//! The pages branch is cloned into a scratch directory inside the working
//! directory, the site is copied over it, committed and pushed. The scratch
//! directory is removed afterwards whether or not publishing succeeded.

use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::error::GitError;
use crate::git::Git;
use crate::identity::Identity;

impl Git {
    /// Publish the contents of `source_dir` to `sub_folder` of the pages
    /// branch. Both are relative to the working directory / checkout root.
    #[instrument(skip_all, fields(dir = %self.dir().display(), source = %source_dir.display(), sub_folder = %sub_folder.display()))]
    pub async fn publish_pages(
        &self,
        source_dir: &Path,
        commit_message: &str,
        sub_folder: &Path,
    ) -> Result<(), GitError> {
        let url = self.repository_url().await?;
        let author = self.default_author().await;
        let scratch = self.dir().join(&self.settings().pages.scratch_dir);

        remove_dir_if_exists(&scratch)?;

        let result = self
            .publish_into(&scratch, &url, source_dir, commit_message, sub_folder, author)
            .await;

        if let Err(e) = remove_dir_if_exists(&scratch) {
            warn!(scratch = %scratch.display(), error = %e, "Failed to remove pages checkout");
        }
        result
    }

    async fn publish_into(
        &self,
        scratch: &Path,
        url: &str,
        source_dir: &Path,
        commit_message: &str,
        sub_folder: &Path,
        author: Option<Identity>,
    ) -> Result<(), GitError> {
        let branch = self.settings().pages.branch.clone();
        // Relative to the working directory, which is where clone runs
        let clone_target = self.settings().pages.scratch_dir.clone();
        self.clone_into(url, Some(&branch), &clone_target).await?;

        let source = self.dir().join(source_dir);
        let target = scratch.join(sub_folder);
        let copied = copy_tree(&source, &target, scratch)?;
        debug!(files = copied, target = %target.display(), "Copied site into pages checkout");

        let pages = self.at(scratch);
        pages.add(".").await?;
        if !pages.are_changes_staged().await? {
            info!("Pages branch already up to date");
            return Ok(());
        }
        pages.commit_as(commit_message, author).await?;
        pages.push(Some(&branch)).await?;
        info!(branch = %branch, files = copied, "Published pages");
        Ok(())
    }
}

fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn io_error(kind: std::io::ErrorKind, message: String) -> GitError {
    GitError::Io(std::io::Error::new(kind, message))
}

/// Copy every file below `source` into `target`, keeping relative paths and
/// overwriting existing files. Anything inside a `.git` directory or under
/// `exclude` is skipped. Returns the number of files copied.
pub fn copy_tree(source: &Path, target: &Path, exclude: &Path) -> Result<usize, GitError> {
    if !source.is_dir() {
        return Err(io_error(
            std::io::ErrorKind::NotFound,
            format!("source directory {} does not exist", source.display()),
        ));
    }

    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&source.to_string_lossy())
    );
    let options = glob::MatchOptions {
        require_literal_leading_dot: false,
        ..glob::MatchOptions::new()
    };
    let entries = glob::glob_with(&pattern, options)
        .map_err(|e| io_error(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let mut copied = 0;
    for entry in entries {
        let path = entry.map_err(|e| GitError::Io(e.into_error()))?;
        if !path.is_file() || path.starts_with(exclude) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };
        if relative.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }

        let destination = target.join(relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&path, &destination)?;
        copied += 1;
    }
    Ok(copied)
}
