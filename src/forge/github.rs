//! forge::github
//!
//! GitHub backend using the REST v3 API.
//!
//! # Design
//!
//! - Pull requests map to `/repos/{owner}/{repo}/pulls`; a closed PR with a
//!   `merged_at` timestamp is reported as `Merged`.
//! - The discussion thread is the issue comment list, which GitHub returns
//!   oldest first. That list also exists for plain issues, so the number is
//!   checked against `pulls/{id}` first and an issue number is `NotFound`.
//! - Inline comments become review comments and need commit, filename and
//!   row together; a partial position is `UnsupportedOperation`.
//! - Forking is idempotent: GitHub answers a fork request for an already
//!   forked repository with the existing fork, and so does this backend.
//!
//! GitHub Enterprise is reached through [`GitHubForge::for_host`] or
//! [`GitHubForge::with_api_base`].
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::github::GitHubForge;
//! use polyforge::forge::{Forge, FromRemoteUrl, PullRequestStatus};
//!
//! let forge = GitHubForge::from_remote_url("git@github.com:octocat/hello-world.git", token)?;
//! let repo = forge.repository("octocat", "hello-world");
//! for pr in repo.list_pull_requests(PullRequestStatus::Open).await? {
//!     println!("#{} {}", pr.id, pr.title);
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::{transition_error, ApiClient, AuthScheme};
use super::remote::RemoteUrl;
use super::traits::{
    require_open, Account, CommentRequest, CreatePullRequest, Forge, ForgeError, FromRemoteUrl,
    Repository,
};
use crate::core::types::{PrComment, PullRequest, PullRequestStatus};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Public GitHub web URL.
const DEFAULT_INSTANCE: &str = "https://github.com";

const ACCEPT_VALUE: &str = "application/vnd.github+json";

/// GitHub forge.
#[derive(Debug)]
pub struct GitHubForge {
    api: ApiClient,
    instance_url: String,
}

impl GitHubForge {
    /// Forge for github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_INSTANCE, DEFAULT_API_BASE)
    }

    /// Forge with explicit web and API base URLs (GitHub Enterprise, tests).
    pub fn with_api_base(
        token: impl Into<String>,
        instance_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiClient::new(api_base, token, AuthScheme::Bearer, ACCEPT_VALUE),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Forge for a host: `github.com` uses the public API, any other host
    /// is treated as GitHub Enterprise at `https://{host}/api/v3`.
    pub fn for_host(host: &str, token: impl Into<String>) -> Self {
        if is_github_host(host) {
            Self::new(token)
        } else {
            Self::with_api_base(
                token,
                format!("https://{}", host),
                format!("https://{}/api/v3", host),
            )
        }
    }

    /// The API base URL in use.
    pub fn api_base(&self) -> &str {
        self.api.api_base()
    }
}

/// Whether `host` is public GitHub.
pub fn is_github_host(host: &str) -> bool {
    matches!(host, "github.com" | "www.github.com")
}

impl FromRemoteUrl for GitHubForge {
    fn from_remote_url(remote_url: &str, token: &str) -> Result<Self, ForgeError> {
        let remote = RemoteUrl::parse(remote_url)?;
        if !is_github_host(&remote.host) {
            return Err(ForgeError::UnsupportedRemote(remote_url.to_string()));
        }
        Ok(Self::new(token))
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn repository(&self, namespace: &str, name: &str) -> Box<dyn Repository> {
        Box::new(GitHubRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            owner: namespace.to_string(),
            repo: name.to_string(),
        })
    }

    fn current_account(&self) -> Box<dyn Account> {
        Box::new(GitHubAccount {
            api: self.api.clone(),
        })
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }
}

/// The authenticated GitHub user.
#[derive(Debug)]
pub struct GitHubAccount {
    api: ApiClient,
}

#[async_trait]
impl Account for GitHubAccount {
    async fn username(&self) -> Result<String, ForgeError> {
        let user: GitHubUser = self.api.get("user").await?;
        Ok(user.login)
    }
}

/// One GitHub repository.
#[derive(Debug)]
pub struct GitHubRepository {
    api: ApiClient,
    instance_url: String,
    owner: String,
    repo: String,
}

impl GitHubRepository {
    fn path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("repos/{}/{}", self.owner, self.repo)
        } else {
            format!("repos/{}/{}/{}", self.owner, self.repo, suffix)
        }
    }

    async fn info(&self) -> Result<GitHubRepo, ForgeError> {
        self.api.get(&self.path("")).await
    }

    fn sibling(&self, owner: String, repo: String) -> Box<dyn Repository> {
        Box::new(GitHubRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            owner,
            repo,
        })
    }
}

#[async_trait]
impl Repository for GitHubRepository {
    fn forge_name(&self) -> &'static str {
        "github"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn namespace(&self) -> &str {
        &self.owner
    }

    fn name(&self) -> &str {
        &self.repo
    }

    async fn is_fork(&self) -> Result<bool, ForgeError> {
        Ok(self.info().await?.fork)
    }

    async fn branches(&self) -> Result<Vec<String>, ForgeError> {
        let branches: Vec<GitHubBranch> = self.api.get_all_pages(&self.path("branches"), &[]).await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn description(&self) -> Result<String, ForgeError> {
        Ok(self.info().await?.description.unwrap_or_default())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_fork(&self) -> Result<Option<Box<dyn Repository>>, ForgeError> {
        let user: GitHubUser = self.api.get("user").await?;
        let candidate: GitHubRepo = match self
            .api
            .get(&format!("repos/{}/{}", user.login, self.repo))
            .await
        {
            Ok(repo) => repo,
            Err(ForgeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let is_our_fork = candidate.fork
            && candidate
                .parent
                .as_ref()
                .is_some_and(|p| p.full_name.eq_ignore_ascii_case(&self.full_name()));
        Ok(is_our_fork.then(|| self.sibling(candidate.owner.login, candidate.name)))
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_pull_requests(
        &self,
        status: PullRequestStatus,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let state = match status {
            PullRequestStatus::Open => "open",
            PullRequestStatus::Closed | PullRequestStatus::Merged => "closed",
            PullRequestStatus::All => "all",
        };
        let pulls: Vec<GitHubPullRequest> = self
            .api
            .get_all_pages(&self.path("pulls"), &[("state", state.to_string())])
            .await?;

        Ok(pulls
            .into_iter()
            .map(PullRequest::from)
            .filter(|pr| status.accepts(pr.status))
            .collect())
    }

    async fn get_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let pr: GitHubPullRequest = self.api.get(&self.path(&format!("pulls/{}", id))).await?;
        Ok(pr.into())
    }

    #[instrument(level = "debug", skip(self, request))]
    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let body = CreatePrBody {
            title: &request.title,
            body: &request.body,
            head: &request.source_branch,
            base: &request.target_branch,
        };
        let pr: GitHubPullRequest = self
            .api
            .send_json(Method::POST, &self.path("pulls"), &body)
            .await?;
        Ok(pr.into())
    }

    #[instrument(level = "debug", skip(self, comment))]
    async fn post_comment(
        &self,
        pr_id: u64,
        comment: CommentRequest,
    ) -> Result<PrComment, ForgeError> {
        let created: GitHubComment = match comment.full_position()? {
            Some(position) => {
                let body = ReviewCommentBody {
                    body: &comment.body,
                    commit_id: &position.commit,
                    path: &position.filename,
                    line: position.row,
                    side: "RIGHT",
                };
                self.api
                    .send_json(Method::POST, &self.path(&format!("pulls/{}/comments", pr_id)), &body)
                    .await?
            }
            None => {
                let body = IssueCommentBody {
                    body: &comment.body,
                };
                self.api
                    .send_json(Method::POST, &self.path(&format!("issues/{}/comments", pr_id)), &body)
                    .await?
            }
        };
        Ok(created.into())
    }

    async fn close_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "close")?;

        let pr: GitHubPullRequest = self
            .api
            .send_json(
                Method::PATCH,
                &self.path(&format!("pulls/{}", id)),
                &UpdateStateBody { state: "closed" },
            )
            .await
            .map_err(transition_error)?;
        Ok(pr.into())
    }

    async fn merge_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "merge")?;

        self.api
            .send_unit(
                Method::PUT,
                &self.path(&format!("pulls/{}/merge", id)),
                &serde_json::json!({}),
            )
            .await
            .map_err(transition_error)?;
        self.get_pull_request(id).await
    }

    async fn git_urls(&self) -> Result<BTreeMap<String, String>, ForgeError> {
        let info = self.info().await?;
        Ok(BTreeMap::from([
            ("git".to_string(), info.clone_url),
            ("ssh".to_string(), info.ssh_url),
        ]))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fork(&self) -> Result<Box<dyn Repository>, ForgeError> {
        let fork: GitHubRepo = self
            .api
            .send_json(Method::POST, &self.path("forks"), &serde_json::json!({}))
            .await?;
        Ok(self.sibling(fork.owner.login, fork.name))
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_all_comments(&self, pr_id: u64) -> Result<Vec<PrComment>, ForgeError> {
        // Issues and pull requests share a number space and a comments endpoint.
        self.get_pull_request(pr_id).await?;
        let comments: Vec<GitHubComment> = self
            .api
            .get_all_pages(&self.path(&format!("issues/{}/comments", pr_id)), &[])
            .await?;
        Ok(comments.into_iter().map(PrComment::from).collect())
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreatePrBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Serialize)]
struct IssueCommentBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct ReviewCommentBody<'a> {
    body: &'a str,
    commit_id: &'a str,
    path: &'a str,
    line: u64,
    side: &'a str,
}

#[derive(Serialize)]
struct UpdateStateBody<'a> {
    state: &'a str,
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Deserialize)]
struct GitHubBranch {
    name: String,
}

#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubUser,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    parent: Option<GitHubParent>,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
}

#[derive(Deserialize)]
struct GitHubParent {
    full_name: String,
}

#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    state: String,
    title: String,
    body: Option<String>,
    user: GitHubUser,
    head: GitHubRef,
    base: GitHubRef,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GitHubComment {
    body: Option<String>,
    user: GitHubUser,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        let status = if pr.merged_at.is_some() {
            PullRequestStatus::Merged
        } else if pr.state == "closed" {
            PullRequestStatus::Closed
        } else {
            PullRequestStatus::Open
        };

        PullRequest {
            title: pr.title,
            id: pr.number,
            status,
            url: pr.html_url,
            description: pr.body.unwrap_or_default(),
            author: pr.user.login,
            source_branch: pr.head.ref_name,
            target_branch: pr.base.ref_name,
            created: pr.created_at,
        }
    }
}

impl From<GitHubComment> for PrComment {
    fn from(c: GitHubComment) -> Self {
        PrComment {
            body: c.body.unwrap_or_default(),
            author: c.user.login,
            created: c.created_at,
            edited: c.updated_at.unwrap_or(c.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull(state: &str, merged: bool) -> GitHubPullRequest {
        GitHubPullRequest {
            number: 42,
            html_url: "https://github.com/owner/repo/pull/42".to_string(),
            state: state.to_string(),
            title: "Add feature".to_string(),
            body: Some("PR description".to_string()),
            user: GitHubUser {
                login: "octocat".to_string(),
            },
            head: GitHubRef {
                ref_name: "feature".to_string(),
            },
            base: GitHubRef {
                ref_name: "main".to_string(),
            },
            created_at: "2024-03-01T10:00:00Z".parse().unwrap(),
            merged_at: merged.then(|| "2024-03-02T10:00:00Z".parse().unwrap()),
        }
    }

    mod github_forge {
        use super::*;

        #[test]
        fn new_targets_public_api() {
            let forge = GitHubForge::new("token");
            assert_eq!(forge.name(), "github");
            assert_eq!(forge.instance_url(), "https://github.com");
            assert_eq!(forge.api_base(), "https://api.github.com");
        }

        #[test]
        fn for_enterprise_host() {
            let forge = GitHubForge::for_host("github.example.com", "token");
            assert_eq!(forge.instance_url(), "https://github.example.com");
            assert_eq!(forge.api_base(), "https://github.example.com/api/v3");
        }

        #[test]
        fn from_remote_url_accepts_github() {
            assert!(GitHubForge::from_remote_url("git@github.com:owner/repo.git", "t").is_ok());
            assert!(GitHubForge::from_remote_url("https://github.com/owner/repo", "t").is_ok());
        }

        #[test]
        fn from_remote_url_rejects_other_hosts() {
            let result = GitHubForge::from_remote_url("https://gitlab.com/owner/repo", "t");
            assert!(matches!(result, Err(ForgeError::UnsupportedRemote(_))));
        }

        #[test]
        fn debug_redacts_token() {
            let forge = GitHubForge::new("secret_token_abc123");
            let out = format!("{:?}", forge);
            assert!(!out.contains("secret_token_abc123"));
        }

        #[test]
        fn repository_identity() {
            let forge = GitHubForge::new("token");
            let repo = forge.repository("octocat", "hello-world");
            assert_eq!(repo.forge_name(), "github");
            assert_eq!(repo.namespace(), "octocat");
            assert_eq!(repo.name(), "hello-world");
            assert_eq!(repo.full_name(), "octocat/hello-world");
        }
    }

    mod conversions {
        use super::*;

        #[test]
        fn open_pr() {
            let pr: PullRequest = pull("open", false).into();
            assert_eq!(pr.id, 42);
            assert_eq!(pr.status, PullRequestStatus::Open);
            assert_eq!(pr.author, "octocat");
            assert_eq!(pr.source_branch, "feature");
            assert_eq!(pr.target_branch, "main");
            assert_eq!(pr.description, "PR description");
        }

        #[test]
        fn closed_pr() {
            let pr: PullRequest = pull("closed", false).into();
            assert_eq!(pr.status, PullRequestStatus::Closed);
        }

        #[test]
        fn merged_pr() {
            let pr: PullRequest = pull("closed", true).into();
            assert_eq!(pr.status, PullRequestStatus::Merged);
        }

        #[test]
        fn missing_body_is_empty_description() {
            let mut gh = pull("open", false);
            gh.body = None;
            let pr: PullRequest = gh.into();
            assert_eq!(pr.description, "");
        }

        #[test]
        fn unedited_comment() {
            let c: PrComment = GitHubComment {
                body: Some("hi".into()),
                user: GitHubUser {
                    login: "alice".into(),
                },
                created_at: "2024-03-01T10:00:00Z".parse().unwrap(),
                updated_at: None,
            }
            .into();
            assert_eq!(c.edited, c.created);
        }
    }
}
