//! forge::gitlab
//!
//! GitLab backend using the REST v4 API.
//!
//! # Design
//!
//! - Projects are addressed by their URL-encoded full path, so nested
//!   groups (`group/subgroup`) work as namespaces unchanged.
//! - Pull requests are merge requests, identified by their project-local
//!   `iid`.
//! - The discussion thread is the merge request's note list, requested in
//!   ascending creation order.
//! - Inline (diff) comments need GitLab's discussion positions and are not
//!   offered: any inline field yields `UnsupportedOperation`.
//! - Forking is not idempotent: when the account already owns a fork,
//!   [`Repository::fork`] fails with `AlreadyForked`.

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

/// Public GitLab web URL.
const DEFAULT_INSTANCE: &str = "https://gitlab.com";

/// Default GitLab API base URL.
const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";

const ACCEPT_VALUE: &str = "application/json";

/// GitLab forge.
#[derive(Debug)]
pub struct GitLabForge {
    api: ApiClient,
    instance_url: String,
}

impl GitLabForge {
    /// Forge for gitlab.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_INSTANCE, DEFAULT_API_BASE)
    }

    /// Forge with explicit web and API base URLs (self-hosted GitLab).
    pub fn with_api_base(
        token: impl Into<String>,
        instance_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiClient::new(api_base, token, AuthScheme::PrivateToken, ACCEPT_VALUE),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Forge for the instance at `https://{host}`.
    pub fn for_host(host: &str, token: impl Into<String>) -> Self {
        Self::with_api_base(
            token,
            format!("https://{}", host),
            format!("https://{}/api/v4", host),
        )
    }

    /// The API base URL in use.
    pub fn api_base(&self) -> &str {
        self.api.api_base()
    }
}

/// Whether `host` looks like a GitLab instance (`gitlab.com`, `gitlab.*`).
pub fn is_gitlab_host(host: &str) -> bool {
    host == "gitlab.com" || host.starts_with("gitlab.")
}

impl FromRemoteUrl for GitLabForge {
    fn from_remote_url(remote_url: &str, token: &str) -> Result<Self, ForgeError> {
        let remote = RemoteUrl::parse(remote_url)?;
        if !is_gitlab_host(&remote.host) {
            return Err(ForgeError::UnsupportedRemote(remote_url.to_string()));
        }
        Ok(Self::for_host(&remote.host, token))
    }
}

#[async_trait]
impl Forge for GitLabForge {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn repository(&self, namespace: &str, name: &str) -> Box<dyn Repository> {
        Box::new(GitLabRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            namespace: namespace.to_string(),
            project: name.to_string(),
        })
    }

    fn current_account(&self) -> Box<dyn Account> {
        Box::new(GitLabAccount {
            api: self.api.clone(),
        })
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }
}

/// The authenticated GitLab user.
#[derive(Debug)]
pub struct GitLabAccount {
    api: ApiClient,
}

#[async_trait]
impl Account for GitLabAccount {
    async fn username(&self) -> Result<String, ForgeError> {
        let user: GitLabUser = self.api.get("user").await?;
        Ok(user.username)
    }
}

/// One GitLab project.
#[derive(Debug)]
pub struct GitLabRepository {
    api: ApiClient,
    instance_url: String,
    namespace: String,
    project: String,
}

impl GitLabRepository {
    fn path(&self, suffix: &str) -> String {
        let id = encode_project_path(&self.full_name());
        if suffix.is_empty() {
            format!("projects/{}", id)
        } else {
            format!("projects/{}/{}", id, suffix)
        }
    }

    async fn info(&self) -> Result<GitLabProject, ForgeError> {
        self.api.get(&self.path("")).await
    }

    fn sibling(&self, project: GitLabProject) -> Box<dyn Repository> {
        Box::new(GitLabRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            namespace: project.namespace.full_path,
            project: project.path,
        })
    }
}

/// Percent-encode a project path for use as a GitLab project id.
fn encode_project_path(path: &str) -> String {
    path.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl Repository for GitLabRepository {
    fn forge_name(&self) -> &'static str {
        "gitlab"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.project
    }

    async fn is_fork(&self) -> Result<bool, ForgeError> {
        Ok(self.info().await?.forked_from_project.is_some())
    }

    async fn branches(&self) -> Result<Vec<String>, ForgeError> {
        let branches: Vec<GitLabBranch> = self
            .api
            .get_all_pages(&self.path("repository/branches"), &[])
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn description(&self) -> Result<String, ForgeError> {
        Ok(self.info().await?.description.unwrap_or_default())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_fork(&self) -> Result<Option<Box<dyn Repository>>, ForgeError> {
        let forks: Vec<GitLabProject> = self
            .api
            .get_query(&self.path("forks"), &[("owned", "true")])
            .await?;
        Ok(forks.into_iter().next().map(|p| self.sibling(p)))
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_pull_requests(
        &self,
        status: PullRequestStatus,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let state = match status {
            PullRequestStatus::Open => "opened",
            PullRequestStatus::Closed => "closed",
            PullRequestStatus::Merged => "merged",
            PullRequestStatus::All => "all",
        };
        let mrs: Vec<GitLabMergeRequest> = self
            .api
            .get_all_pages(&self.path("merge_requests"), &[("state", state.to_string())])
            .await?;
        Ok(mrs.into_iter().map(PullRequest::from).collect())
    }

    async fn get_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let mr: GitLabMergeRequest = self
            .api
            .get(&self.path(&format!("merge_requests/{}", id)))
            .await?;
        Ok(mr.into())
    }

    #[instrument(level = "debug", skip(self, request))]
    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let body = CreateMrBody {
            title: &request.title,
            description: &request.body,
            source_branch: &request.source_branch,
            target_branch: &request.target_branch,
        };
        let mr: GitLabMergeRequest = self
            .api
            .send_json(Method::POST, &self.path("merge_requests"), &body)
            .await?;
        Ok(mr.into())
    }

    #[instrument(level = "debug", skip(self, comment))]
    async fn post_comment(
        &self,
        pr_id: u64,
        comment: CommentRequest,
    ) -> Result<PrComment, ForgeError> {
        if comment.is_inline() {
            return Err(ForgeError::UnsupportedOperation(
                "GitLab inline merge request comments are not supported".into(),
            ));
        }
        let note: GitLabNote = self
            .api
            .send_json(
                Method::POST,
                &self.path(&format!("merge_requests/{}/notes", pr_id)),
                &NoteBody {
                    body: &comment.body,
                },
            )
            .await?;
        Ok(note.into())
    }

    async fn close_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "close")?;

        let mr: GitLabMergeRequest = self
            .api
            .send_json(
                Method::PUT,
                &self.path(&format!("merge_requests/{}", id)),
                &StateEventBody {
                    state_event: "close",
                },
            )
            .await
            .map_err(transition_error)?;
        Ok(mr.into())
    }

    async fn merge_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "merge")?;

        let mr: GitLabMergeRequest = self
            .api
            .send_json(
                Method::PUT,
                &self.path(&format!("merge_requests/{}/merge", id)),
                &serde_json::json!({}),
            )
            .await
            .map_err(transition_error)?;
        Ok(mr.into())
    }

    async fn git_urls(&self) -> Result<BTreeMap<String, String>, ForgeError> {
        let info = self.info().await?;
        Ok(BTreeMap::from([
            ("git".to_string(), info.http_url_to_repo),
            ("ssh".to_string(), info.ssh_url_to_repo),
        ]))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fork(&self) -> Result<Box<dyn Repository>, ForgeError> {
        if let Some(existing) = self.get_fork().await? {
            return Err(ForgeError::AlreadyForked(existing.full_name()));
        }

        let project: GitLabProject = self
            .api
            .send_json(Method::POST, &self.path("fork"), &serde_json::json!({}))
            .await
            .map_err(|e| match e {
                ForgeError::ApiError { status: 409, message } => ForgeError::AlreadyForked(message),
                other => other,
            })?;
        Ok(self.sibling(project))
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_all_comments(&self, pr_id: u64) -> Result<Vec<PrComment>, ForgeError> {
        let notes: Vec<GitLabNote> = self
            .api
            .get_all_pages(
                &self.path(&format!("merge_requests/{}/notes", pr_id)),
                &[
                    ("sort", "asc".to_string()),
                    ("order_by", "created_at".to_string()),
                ],
            )
            .await?;
        Ok(notes.into_iter().map(PrComment::from).collect())
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateMrBody<'a> {
    title: &'a str,
    description: &'a str,
    source_branch: &'a str,
    target_branch: &'a str,
}

#[derive(Serialize)]
struct NoteBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct StateEventBody<'a> {
    state_event: &'a str,
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Deserialize)]
struct GitLabBranch {
    name: String,
}

#[derive(Deserialize)]
struct GitLabNamespace {
    full_path: String,
}

#[derive(Deserialize)]
struct GitLabProject {
    path: String,
    namespace: GitLabNamespace,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    forked_from_project: Option<serde_json::Value>,
    #[serde(default)]
    http_url_to_repo: String,
    #[serde(default)]
    ssh_url_to_repo: String,
}

#[derive(Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    title: String,
    state: String,
    web_url: String,
    description: Option<String>,
    author: GitLabUser,
    source_branch: String,
    target_branch: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct GitLabNote {
    body: String,
    author: GitLabUser,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

fn status_from_state(state: &str) -> PullRequestStatus {
    match state {
        "merged" => PullRequestStatus::Merged,
        "closed" | "locked" => PullRequestStatus::Closed,
        _ => PullRequestStatus::Open,
    }
}

impl From<GitLabMergeRequest> for PullRequest {
    fn from(mr: GitLabMergeRequest) -> Self {
        PullRequest {
            title: mr.title,
            id: mr.iid,
            status: status_from_state(&mr.state),
            url: mr.web_url,
            description: mr.description.unwrap_or_default(),
            author: mr.author.username,
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            created: mr.created_at,
        }
    }
}

impl From<GitLabNote> for PrComment {
    fn from(note: GitLabNote) -> Self {
        PrComment {
            body: note.body,
            author: note.author.username,
            created: note.created_at,
            edited: note.updated_at.unwrap_or(note.created_at),
        }
    }
}
