//! Integration tests for the `Git` facade against a real git executable
//!
//! Every test builds its own throwaway repositories inside a `TempDir`: a bare
//! repository acting as the remote and one or more clones of it. Nothing
//! touches the network or the repository the tests are run from.
//!
//! Tests are skipped when no `git` executable is found on PATH.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test git_integration
//!
//! # Specific test module
//! cargo test --test git_integration remote_tests
//! ```

use ci_git::credentials::{Credential, CredentialHelper, StaticCredentialStore};
use ci_git::git::{Git, GitCommand, GitSettings, SystemGitRunner};
use ci_git::{GitError, Identity, RetryPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ─── Configuration Helpers ───────────────────────────────────────────────────

/// Macro to skip test if git is not installed
macro_rules! skip_if_no_git {
    () => {
        if which::which("git").is_err() {
            eprintln!("Skipping test: git not found on PATH");
            return;
        }
    };
}

fn jane() -> Identity {
    Identity::new("Jane Doe", "jane@example.com")
}

fn bob() -> Identity {
    Identity::new("Bob Builder", "bob@example.com")
}

/// Run git directly, for fixture setup only
fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
        .env("GIT_COMMITTER_NAME", "Fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@example.com")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare remote on `main` plus one clone with a single commit pushed
struct Fixture {
    temp: TempDir,
    remote: PathBuf,
    work: PathBuf,
}

impl Fixture {
    async fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let remote = temp.path().join("widgets.git");
        let work = temp.path().join("work");
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        git(&remote, &["init", "--bare", "--quiet"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        git(&work, &["init", "--quiet"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&work, &["config", "pull.rebase", "false"]);
        git(
            &work,
            &["remote", "add", "origin", remote.to_str().unwrap()],
        );

        let fixture = Self { temp, remote, work };
        let repo = fixture.git();
        fixture.write("README.md", "# widgets\n");
        repo.add(".").await.unwrap();
        repo.commit_as("Initial commit", Some(jane())).await.unwrap();
        repo.push(Some("main")).await.unwrap();
        fixture
    }

    fn git(&self) -> Git {
        Git::system(GitSettings::default(), &self.work)
    }

    fn remote_url(&self) -> String {
        self.remote.to_string_lossy().into_owned()
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.work.join(name), contents).unwrap();
    }

    /// Second clone of the remote, ready for commits and pulls
    async fn second_clone(&self, name: &str) -> Git {
        let parent = Git::system(GitSettings::default(), self.temp.path());
        parent
            .clone_into(&self.remote_url(), Some("main"), Path::new(name))
            .await
            .unwrap();
        let dir = self.temp.path().join(name);
        git(&dir, &["config", "pull.rebase", "false"]);
        Git::system(GitSettings::default(), dir)
    }
}

// ─── Accessor Tests ──────────────────────────────────────────────────────────

mod accessor_tests {
    use super::*;

    #[tokio::test]
    async fn test_head_commit_accessors() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        let hash = repo.commit_hash().await.unwrap();
        assert_eq!(hash.len(), 40);
        assert_eq!(hash, git(&fixture.work, &["rev-parse", "HEAD"]));

        let short = repo.commit_hash_short().await.unwrap();
        assert!(hash.starts_with(&short));
        assert!(short.len() < hash.len());

        assert_eq!(repo.commit_message().await.unwrap(), "Initial commit");
        assert_eq!(
            repo.commit_author_complete().await.unwrap(),
            "Jane Doe <jane@example.com>"
        );
        assert_eq!(repo.commit_author_name().await.unwrap(), "Jane Doe");
        assert_eq!(
            repo.commit_author_email().await.unwrap(),
            "jane@example.com"
        );

        let date = repo.commit_date().await.unwrap();
        assert!(date.timestamp() <= chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_branch_and_remote_accessors() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        assert_eq!(repo.branch_name().await.unwrap(), "main");
        assert_eq!(repo.repository_url().await.unwrap(), fixture.remote_url());
        assert_eq!(repo.repository_name().await.unwrap(), "widgets");
        assert!(matches!(
            repo.github_repository_name().await,
            Err(GitError::InvalidRemoteUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_dirty_and_staged() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        assert!(!repo.is_dirty().await.unwrap());
        assert!(!repo.are_changes_staged().await.unwrap());

        fixture.write("notes.txt", "draft");
        assert!(repo.is_dirty().await.unwrap());
        assert!(!repo.are_changes_staged().await.unwrap());

        repo.add("notes.txt").await.unwrap();
        assert!(repo.are_changes_staged().await.unwrap());
    }

    #[tokio::test]
    async fn test_accessor_outside_repository_fails() {
        skip_if_no_git!();
        let temp = TempDir::new().unwrap();
        let repo = Git::system(GitSettings::default(), temp.path());

        let err = repo.commit_hash().await.unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }
}

// ─── Local Write Tests ───────────────────────────────────────────────────────

mod write_tests {
    use super::*;

    #[tokio::test]
    async fn test_tag_lifecycle() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        assert_eq!(repo.tag().await.unwrap(), None);
        assert!(!repo.is_tag().await.unwrap());

        repo.set_tag_as("v1.0.0", "Release 1.0.0", Some(jane()))
            .await
            .unwrap();
        assert_eq!(repo.tag().await.unwrap().as_deref(), Some("v1.0.0"));
        assert!(repo.is_tag().await.unwrap());

        // A new commit is no longer exactly on the tag
        fixture.write("CHANGELOG.md", "1.0.0\n");
        repo.add(".").await.unwrap();
        repo.commit_as("Changelog", Some(jane())).await.unwrap();
        assert_eq!(repo.tag().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_defaults_to_head_author() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        fixture.write("src.txt", "v2");
        repo.add(".").await.unwrap();
        repo.commit("Second commit").await.unwrap();

        assert_eq!(
            repo.commit_author_complete().await.unwrap(),
            "Jane Doe <jane@example.com>"
        );
        assert_eq!(
            git(&fixture.work, &["log", "-1", "--pretty=format:%cn <%ce>"]),
            "Jane Doe <jane@example.com>"
        );
    }

    #[tokio::test]
    async fn test_configured_committer_is_used() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let settings = GitSettings {
            committer: Some(Identity::new("CI Server", "ci@example.com")),
            ..GitSettings::default()
        };
        let repo = Git::system(settings, &fixture.work);

        fixture.write("build.txt", "42");
        repo.add(".").await.unwrap();
        repo.commit_as("Build 42", Some(bob())).await.unwrap();

        assert_eq!(
            git(&fixture.work, &["log", "-1", "--pretty=format:%an|%cn"]),
            "Bob Builder|CI Server"
        );
    }

    #[tokio::test]
    async fn test_identity_does_not_leak_into_process_env() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();
        let before: Vec<Option<String>> = ["GIT_AUTHOR_NAME", "GIT_COMMITTER_EMAIL"]
            .iter()
            .map(|name| std::env::var(name).ok())
            .collect();

        fixture.write("a.txt", "a");
        repo.add(".").await.unwrap();
        repo.commit_as("Scoped identity", Some(bob())).await.unwrap();

        let after: Vec<Option<String>> = ["GIT_AUTHOR_NAME", "GIT_COMMITTER_EMAIL"]
            .iter()
            .map(|name| std::env::var(name).ok())
            .collect();
        assert_eq!(before, after);
        assert_eq!(repo.commit_author_name().await.unwrap(), "Bob Builder");
    }

    #[tokio::test]
    async fn test_checkout_or_create_and_simple_branch_name() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        repo.checkout_or_create("feature/login").await.unwrap();
        assert_eq!(repo.branch_name().await.unwrap(), "feature/login");
        assert_eq!(repo.simple_branch_name().await.unwrap(), "login");

        repo.checkout("main").await.unwrap();
        // Existing branch is checked out, not recreated
        repo.checkout_or_create("feature/login").await.unwrap();
        assert_eq!(repo.branch_name().await.unwrap(), "feature/login");
    }

    #[tokio::test]
    async fn test_checkout_unknown_branch_fails() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;

        let err = fixture.git().checkout("does-not-exist").await.unwrap_err();
        assert!(err.stderr().is_some());
    }

    #[tokio::test]
    async fn test_merge_fast_forward_only() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        repo.checkout_or_create("feature").await.unwrap();
        fixture.write("feature.txt", "done");
        repo.add(".").await.unwrap();
        repo.commit_as("Add feature", Some(bob())).await.unwrap();
        let feature_head = repo.commit_hash().await.unwrap();

        repo.checkout("main").await.unwrap();
        repo.merge_fast_forward_only("feature").await.unwrap();

        assert_eq!(repo.commit_hash().await.unwrap(), feature_head);
    }

    #[tokio::test]
    async fn test_fast_forward_only_refuses_divergent_history() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let repo = fixture.git();

        repo.checkout_or_create("feature").await.unwrap();
        fixture.write("feature.txt", "f");
        repo.add(".").await.unwrap();
        repo.commit_as("Feature", Some(bob())).await.unwrap();

        repo.checkout("main").await.unwrap();
        fixture.write("main.txt", "m");
        repo.add(".").await.unwrap();
        repo.commit_as("Main", Some(jane())).await.unwrap();

        assert!(repo.merge_fast_forward_only("feature").await.is_err());

        // A regular merge creates a merge commit authored by HEAD's author
        repo.merge("feature").await.unwrap();
        assert_eq!(
            git(&fixture.work, &["rev-list", "--count", "--merges", "HEAD"]),
            "1"
        );
        assert_eq!(repo.commit_author_name().await.unwrap(), "Jane Doe");
    }
}

// ─── Remote Tests ────────────────────────────────────────────────────────────

mod remote_tests {
    use super::*;

    #[tokio::test]
    async fn test_clone_sees_pushed_commit() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let expected = fixture.git().commit_hash().await.unwrap();

        let copy = fixture.second_clone("copy").await;

        assert_eq!(copy.commit_hash().await.unwrap(), expected);
        assert_eq!(copy.repository_name().await.unwrap(), "widgets");
    }

    #[tokio::test]
    async fn test_fetch_and_pull() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let copy = fixture.second_clone("copy").await;

        let repo = fixture.git();
        fixture.write("new.txt", "new");
        repo.add(".").await.unwrap();
        repo.commit_as("New file", Some(bob())).await.unwrap();
        repo.set_tag_as("v0.2.0", "Release", Some(bob())).await.unwrap();
        repo.push(Some("main")).await.unwrap();
        repo.push_tags().await.unwrap();

        copy.fetch().await.unwrap();
        assert!(git(copy.dir(), &["tag", "--list"]).contains("v0.2.0"));

        copy.pull(Some("main")).await.unwrap();
        assert_eq!(
            copy.commit_hash().await.unwrap(),
            repo.commit_hash().await.unwrap()
        );
        assert_eq!(copy.tag().await.unwrap().as_deref(), Some("v0.2.0"));
    }

    #[tokio::test]
    async fn test_push_and_pull_on_failure_recovers_from_rejection() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let other = fixture.second_clone("other").await;

        std::fs::write(other.dir().join("other.txt"), "other").unwrap();
        other.add(".").await.unwrap();
        other.commit_as("Other change", Some(bob())).await.unwrap();
        other.push(Some("main")).await.unwrap();

        let repo = fixture.git();
        fixture.write("mine.txt", "mine");
        repo.add(".").await.unwrap();
        repo.commit_as("My change", Some(jane())).await.unwrap();

        assert!(repo.push(Some("main")).await.is_err());
        repo.push_and_pull_on_failure(Some("main")).await.unwrap();

        let remote_head = git(&fixture.remote, &["rev-parse", "main"]);
        assert_eq!(repo.commit_hash().await.unwrap(), remote_head);
        assert!(fixture.work.join("other.txt").exists());
    }

    #[tokio::test]
    async fn test_credentialed_push_retries_then_gives_up() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        git(
            &fixture.work,
            &["remote", "add", "broken", "/nonexistent/widgets.git"],
        );
        let settings = GitSettings {
            remote: "broken".to_string(),
            credentials: Some("scm".to_string()),
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
            ..GitSettings::default()
        };
        let store =
            StaticCredentialStore::new().with("scm", Credential::new("bot", "t0ken"));
        let repo = Git::new(
            Arc::new(SystemGitRunner::new()),
            Arc::new(store),
            settings,
            &fixture.work,
        );

        let err = repo.push(Some("main")).await.unwrap_err();

        match err {
            GitError::RetriesExhausted {
                command, attempts, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(!command.contains("t0ken"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    /// git itself resolves the credential through the inline helper
    #[test]
    fn test_credential_helper_answers_git_credential_fill() {
        skip_if_no_git!();
        let temp = TempDir::new().unwrap();
        let command = CredentialHelper::attach(
            GitCommand::new(["credential", "fill"]),
            &Credential::new("bot", "t0ken"),
        );
        assert!(!command.command_line().join(" ").contains("t0ken"));

        let mut child = Command::new("git")
            .args(command.command_line())
            .envs(command.env_vars().iter().map(|(k, v)| (k, v)))
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("GIT_ASKPASS")
            .env_remove("SSH_ASKPASS")
            .current_dir(temp.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to run git credential fill");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(b"protocol=https\nhost=example.com\n\n")
            .unwrap();
        let output = child.wait_with_output().unwrap();

        assert!(
            output.status.success(),
            "git credential fill failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.lines().any(|l| l == "username=bot"), "{stdout}");
        assert!(stdout.lines().any(|l| l == "password=t0ken"), "{stdout}");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_running_git() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;
        let settings = GitSettings {
            credentials: Some("unknown".to_string()),
            ..GitSettings::default()
        };
        let repo = Git::new(
            Arc::new(SystemGitRunner::new()),
            Arc::new(StaticCredentialStore::new()),
            settings,
            &fixture.work,
        );

        assert!(matches!(
            repo.fetch().await,
            Err(GitError::CredentialsNotFound(_))
        ));
    }
}

// ─── Pages Tests ─────────────────────────────────────────────────────────────

mod pages_tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_pages_to_local_remote() {
        skip_if_no_git!();
        let fixture = Fixture::new().await;

        // Seed the pages branch on the remote
        let repo = fixture.git();
        repo.checkout_or_create("gh-pages").await.unwrap();
        repo.push(Some("gh-pages")).await.unwrap();
        repo.checkout("main").await.unwrap();

        let site = fixture.work.join("site");
        std::fs::create_dir_all(site.join("css")).unwrap();
        std::fs::write(site.join("index.html"), "<h1>widgets</h1>").unwrap();
        std::fs::write(site.join("css/main.css"), "body {}").unwrap();

        repo.publish_pages(Path::new("site"), "Publish docs", Path::new("docs"))
            .await
            .unwrap();

        assert!(!fixture.work.join(".gh-pages").exists());
        let files = git(
            &fixture.remote,
            &["ls-tree", "-r", "--name-only", "gh-pages"],
        );
        assert!(files.contains("docs/index.html"));
        assert!(files.contains("docs/css/main.css"));
        assert_eq!(
            git(&fixture.remote, &["log", "-1", "--pretty=format:%s|%an", "gh-pages"]),
            "Publish docs|Jane Doe"
        );

        // Publishing the same content again is a no-op
        let before = git(&fixture.remote, &["rev-parse", "gh-pages"]);
        repo.publish_pages(Path::new("site"), "Publish docs", Path::new("docs"))
            .await
            .unwrap();
        assert_eq!(git(&fixture.remote, &["rev-parse", "gh-pages"]), before);
    }
}
