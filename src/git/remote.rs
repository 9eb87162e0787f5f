//! Repository names derived from remote URLs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GitError;

/// HTTPS (optionally with userinfo), `ssh://` and scp-like GitHub URLs
static GITHUB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://(?:[^@/]+@)?github\.com/|ssh://git@github\.com/|git@github\.com:)([^/]+)/([^/]+?)(?:\.git)?/?$",
    )
    .expect("GitHub URL pattern is valid")
});

/// Last path component of a remote URL without the `.git` suffix.
///
/// `https://host/group/sub/repo.git` and `git@host:group/repo` both give
/// `repo`.
pub fn parse_repository_name(url: &str) -> Result<String, GitError> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() || name == trimmed {
        return Err(GitError::InvalidRemoteUrl(url.to_string()));
    }
    Ok(name.to_string())
}

/// `owner/repo` for a GitHub remote URL
pub fn parse_github_repository(url: &str) -> Result<String, GitError> {
    let captures = GITHUB_URL
        .captures(url.trim())
        .ok_or_else(|| GitError::InvalidRemoteUrl(url.to_string()))?;
    Ok(format!("{}/{}", &captures[1], &captures[2]))
}
