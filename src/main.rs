use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use ci_git::config::Config;
use ci_git::credentials::EnvCredentialStore;
use ci_git::git::{Git, SystemGitRunner};
use ci_git::identity::Identity;
use ci_git::{env_vars, logging};

#[derive(Parser)]
#[command(name = "ci-git")]
#[command(about = "Credential-aware git wrapper for CI pipeline scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Repository working directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    /// Credential identifier for remote operations (reads <ID>_USR / <ID>_PSW)
    #[arg(long, global = true)]
    credentials: Option<String>,

    /// Remote name
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Retries after the first attempt of a credentialed remote operation
    #[arg(long, global = true)]
    retries: Option<usize>,

    /// Delay between attempts in milliseconds
    #[arg(long, global = true)]
    retry_delay_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a repository into the working directory
    Clone {
        url: String,

        /// Branch to check out
        #[arg(short, long)]
        branch: Option<String>,

        /// Target directory, relative to the working directory
        #[arg(long, default_value = ".")]
        into: PathBuf,
    },

    /// Fetch the remote, including tags
    Fetch,

    /// Check out a branch
    Checkout {
        branch: String,

        /// Create the branch from HEAD when it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Stage files
    Add {
        #[arg(default_value = ".")]
        pathspec: String,
    },

    /// Commit staged changes
    Commit {
        #[arg(short, long)]
        message: String,

        /// Author as "Name <email>" (default: author of HEAD)
        #[arg(long)]
        author: Option<Identity>,
    },

    /// Create an annotated tag on HEAD
    Tag {
        tag: String,

        #[arg(short, long)]
        message: String,

        /// Author as "Name <email>" (default: author of HEAD)
        #[arg(long)]
        author: Option<Identity>,
    },

    /// Merge a branch into the current branch
    Merge {
        branch: String,

        /// Refuse anything but a fast-forward
        #[arg(long)]
        ff_only: bool,

        /// Author as "Name <email>" (default: author of HEAD)
        #[arg(long, conflicts_with = "ff_only")]
        author: Option<Identity>,
    },

    /// Push to the remote
    Push {
        refspec: Option<String>,

        /// On rejection, pull the refspec and push again
        #[arg(long)]
        pull_on_failure: bool,

        /// Push all tags instead of a refspec
        #[arg(long, conflicts_with_all = ["refspec", "pull_on_failure"])]
        tags: bool,
    },

    /// Pull from the remote
    Pull {
        refspec: Option<String>,

        /// Author as "Name <email>" for a merge commit (default: author of HEAD)
        #[arg(long)]
        author: Option<Identity>,
    },

    /// Publish a directory to the GitHub-Pages branch
    PublishPages {
        /// Directory holding the built site
        source: PathBuf,

        #[arg(short, long, default_value = "Publish pages")]
        message: String,

        /// Folder inside the pages branch
        #[arg(long, default_value = ".")]
        sub_folder: PathBuf,
    },

    /// Print a value about the current repository
    Info {
        #[arg(value_enum)]
        field: InfoField,
    },

    /// List recognised environment variables
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InfoField {
    Hash,
    ShortHash,
    Message,
    Author,
    AuthorName,
    AuthorEmail,
    Date,
    Tag,
    Branch,
    SimpleBranch,
    Url,
    RepoName,
    GithubRepo,
    Dirty,
    Staged,
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(credentials) = &cli.credentials {
        config.git.credentials = Some(credentials.clone());
    }
    if let Some(remote) = &cli.remote {
        config.git.remote = remote.clone();
    }
    if let Some(retries) = cli.retries {
        config.retry.max_retries = retries;
    }
    if let Some(delay) = cli.retry_delay_ms {
        config.retry.delay_ms = delay;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config);

    let logging_handle = logging::init_logging(&config, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let runner = SystemGitRunner::with_program(&config.git.program);
    if !matches!(cli.command, Commands::Env) && !runner.is_available() {
        bail!(
            "git executable '{}' not found (set git.program or CI_GIT_GIT__PROGRAM)",
            config.git.program
        );
    }

    let git = Git::new(
        Arc::new(runner),
        Arc::new(config.credential_store(EnvCredentialStore::from_env())),
        config.git_settings(),
        cli.dir.clone(),
    );

    match cli.command {
        Commands::Clone { url, branch, into } => {
            git.clone_into(&url, branch.as_deref(), &into).await?;
        }
        Commands::Fetch => git.fetch().await?,
        Commands::Checkout { branch, create } => {
            if create {
                git.checkout_or_create(&branch).await?;
            } else {
                git.checkout(&branch).await?;
            }
        }
        Commands::Add { pathspec } => git.add(&pathspec).await?,
        Commands::Commit { message, author } => match author {
            Some(author) => git.commit_as(&message, Some(author)).await?,
            None => git.commit(&message).await?,
        },
        Commands::Tag {
            tag,
            message,
            author,
        } => match author {
            Some(author) => git.set_tag_as(&tag, &message, Some(author)).await?,
            None => git.set_tag(&tag, &message).await?,
        },
        Commands::Merge {
            branch,
            ff_only,
            author,
        } => {
            if ff_only {
                git.merge_fast_forward_only(&branch).await?;
            } else if let Some(author) = author {
                git.merge_as(&branch, Some(author)).await?;
            } else {
                git.merge(&branch).await?;
            }
        }
        Commands::Push {
            refspec,
            pull_on_failure,
            tags,
        } => {
            if tags {
                git.push_tags().await?;
            } else if pull_on_failure {
                git.push_and_pull_on_failure(refspec.as_deref()).await?;
            } else {
                git.push(refspec.as_deref()).await?;
            }
        }
        Commands::Pull { refspec, author } => match author {
            Some(author) => git.pull_as(refspec.as_deref(), Some(author)).await?,
            None => git.pull(refspec.as_deref()).await?,
        },
        Commands::PublishPages {
            source,
            message,
            sub_folder,
        } => {
            git.publish_pages(&source, &message, &sub_folder)
                .await
                .context("Failed to publish pages")?;
        }
        Commands::Info { field } => {
            if let Some(value) = cmd_info(&git, field).await? {
                println!("{value}");
            }
        }
        Commands::Env => print!("{}", env_vars::render()),
    }

    Ok(())
}

/// Value for `ci-git info <field>`; `None` prints nothing (HEAD not tagged)
async fn cmd_info(git: &Git, field: InfoField) -> Result<Option<String>> {
    let value = match field {
        InfoField::Hash => git.commit_hash().await?,
        InfoField::ShortHash => git.commit_hash_short().await?,
        InfoField::Message => git.commit_message().await?,
        InfoField::Author => git.commit_author_complete().await?,
        InfoField::AuthorName => git.commit_author_name().await?,
        InfoField::AuthorEmail => git.commit_author_email().await?,
        InfoField::Date => git.commit_date().await?.to_rfc3339(),
        InfoField::Tag => return Ok(git.tag().await?),
        InfoField::Branch => git.branch_name().await?,
        InfoField::SimpleBranch => git.simple_branch_name().await?,
        InfoField::Url => git.repository_url().await?,
        InfoField::RepoName => git.repository_name().await?,
        InfoField::GithubRepo => git.github_repository_name().await?,
        InfoField::Dirty => git.is_dirty().await?.to_string(),
        InfoField::Staged => git.are_changes_staged().await?.to_string(),
    };
    Ok(Some(value))
}
