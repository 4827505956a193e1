//! Build metadata consumed by the cache key template engine.
//!
//! Populated once from CLI flags (with CI environment fallbacks) before any
//! orchestrator call and read-only afterwards. The field tree is what a
//! `--cache-key` template renders against, e.g.
//! `"{{ repo.name }}-{{ commit.branch }}"`.

use clap::Args;
use serde::Serialize;

/// Build context: repository, commit, and build information.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub repo: Repo,
    pub commit: Commit,
    pub build: Build,
}

/// Repository fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Repo {
    pub owner: String,
    pub name: String,
    pub link: String,
    pub branch: String,
}

/// Commit fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Commit {
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub branch: String,
    pub message: String,
    pub author: String,
}

/// Build fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Build {
    pub number: u64,
    pub event: String,
    pub link: String,
}

/// CLI surface for the build metadata, flattened into every subcommand.
#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    /// Repository owner
    #[arg(long, env = "CI_REPO_OWNER", default_value = "", hide_short_help = true)]
    pub repo_owner: String,

    /// Repository name
    #[arg(long, env = "CI_REPO_NAME", default_value = "", hide_short_help = true)]
    pub repo_name: String,

    /// Repository link
    #[arg(long, env = "CI_REPO_LINK", default_value = "", hide_short_help = true)]
    pub repo_link: String,

    /// Repository default branch
    #[arg(long, env = "CI_REPO_BRANCH", default_value = "main", hide_short_help = true)]
    pub repo_branch: String,

    /// Git commit sha
    #[arg(long, env = "CI_COMMIT_SHA", default_value = "", hide_short_help = true)]
    pub commit_sha: String,

    /// Git commit ref
    #[arg(long, env = "CI_COMMIT_REF", default_value = "", hide_short_help = true)]
    pub commit_ref: String,

    /// Git commit branch
    #[arg(long, env = "CI_COMMIT_BRANCH", default_value = "main", hide_short_help = true)]
    pub commit_branch: String,

    /// Git commit message
    #[arg(long, env = "CI_COMMIT_MESSAGE", default_value = "", hide_short_help = true)]
    pub commit_message: String,

    /// Git commit author
    #[arg(long, env = "CI_COMMIT_AUTHOR", default_value = "", hide_short_help = true)]
    pub commit_author: String,

    /// Build number
    #[arg(long, env = "CI_BUILD_NUMBER", default_value_t = 0, hide_short_help = true)]
    pub build_number: u64,

    /// Build event (push, pull_request, tag, ...)
    #[arg(long, env = "CI_BUILD_EVENT", default_value = "", hide_short_help = true)]
    pub build_event: String,

    /// Build link
    #[arg(long, env = "CI_BUILD_LINK", default_value = "", hide_short_help = true)]
    pub build_link: String,
}

impl From<MetadataArgs> for Metadata {
    fn from(args: MetadataArgs) -> Self {
        Metadata {
            repo: Repo {
                owner: args.repo_owner,
                name: args.repo_name,
                link: args.repo_link,
                branch: args.repo_branch,
            },
            commit: Commit {
                sha: args.commit_sha,
                git_ref: args.commit_ref,
                branch: args.commit_branch,
                message: args.commit_message,
                author: args.commit_author,
            },
            build: Build {
                number: args.build_number,
                event: args.build_event,
                link: args.build_link,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_with_ref_rename() {
        let mut metadata = Metadata::default();
        metadata.commit.git_ref = "refs/heads/main".to_string();

        let value = toml::to_string(&metadata).unwrap();
        assert!(value.contains("ref = \"refs/heads/main\""));
        assert!(!value.contains("git_ref"));
    }

    #[test]
    fn metadata_from_args() {
        let args = MetadataArgs {
            repo_owner: "acme".to_string(),
            repo_name: "rocket".to_string(),
            repo_link: String::new(),
            repo_branch: "main".to_string(),
            commit_sha: "abc123".to_string(),
            commit_ref: "refs/heads/dev".to_string(),
            commit_branch: "dev".to_string(),
            commit_message: String::new(),
            commit_author: String::new(),
            build_number: 42,
            build_event: "push".to_string(),
            build_link: String::new(),
        };

        let metadata = Metadata::from(args);
        assert_eq!(metadata.repo.name, "rocket");
        assert_eq!(metadata.commit.branch, "dev");
        assert_eq!(metadata.build.number, 42);
    }
}
