//! forge::pagure
//!
//! Pagure backend using API version 0.
//!
//! # Design
//!
//! - A project path is `namespace/repo`, or just `repo` on instances
//!   without namespaces. Forks live under `fork/<user>/...`, so whether a
//!   handle points at a fork is read off the namespace without any request.
//! - A pull request record embeds its comments, so fetching the discussion
//!   is a single request.
//! - Write endpoints take form bodies and answer with a short status
//!   message; the resulting record is re-read afterwards.
//! - Inline comments accept any subset of commit, filename and row.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use super::http::{transition_error, ApiClient, AuthScheme};
use super::remote::RemoteUrl;
use super::traits::{
    require_open, Account, CommentRequest, CreatePullRequest, Forge, ForgeError, FromRemoteUrl,
    Repository,
};
use crate::core::types::{PrComment, PullRequest, PullRequestStatus};

/// Public Pagure instance.
const DEFAULT_INSTANCE: &str = "https://pagure.io";

const ACCEPT_VALUE: &str = "application/json";

/// Form body with no fields.
const NO_FIELDS: &[(&str, &str)] = &[];

/// Pagure forge.
#[derive(Debug)]
pub struct PagureForge {
    api: ApiClient,
    instance_url: String,
}

impl PagureForge {
    /// Forge for pagure.io.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(
            token,
            DEFAULT_INSTANCE,
            format!("{}/api/0", DEFAULT_INSTANCE),
        )
    }

    /// Forge with explicit web and API base URLs.
    pub fn with_api_base(
        token: impl Into<String>,
        instance_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiClient::new(api_base, token, AuthScheme::Token, ACCEPT_VALUE),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Forge for the instance at `https://{host}`.
    pub fn for_host(host: &str, token: impl Into<String>) -> Self {
        Self::with_api_base(
            token,
            format!("https://{}", host),
            format!("https://{}/api/0", host),
        )
    }

    /// The API base URL in use.
    pub fn api_base(&self) -> &str {
        self.api.api_base()
    }
}

/// Whether `host` is a known Pagure instance.
pub fn is_pagure_host(host: &str) -> bool {
    matches!(host, "pagure.io" | "src.fedoraproject.org")
}

impl FromRemoteUrl for PagureForge {
    fn from_remote_url(remote_url: &str, token: &str) -> Result<Self, ForgeError> {
        let remote = RemoteUrl::parse(remote_url)?;
        if !is_pagure_host(&remote.host) {
            return Err(ForgeError::UnsupportedRemote(remote_url.to_string()));
        }
        Ok(Self::for_host(&remote.host, token))
    }
}

#[async_trait]
impl Forge for PagureForge {
    fn name(&self) -> &'static str {
        "pagure"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn repository(&self, namespace: &str, name: &str) -> Box<dyn Repository> {
        Box::new(PagureRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            namespace: namespace.to_string(),
            repo: name.to_string(),
        })
    }

    fn current_account(&self) -> Box<dyn Account> {
        Box::new(PagureAccount {
            api: self.api.clone(),
        })
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }
}

async fn whoami(api: &ApiClient) -> Result<String, ForgeError> {
    let me: PagureWhoAmI = api.send_form("-/whoami", NO_FIELDS).await?;
    Ok(me.username)
}

/// The user owning the Pagure API token.
#[derive(Debug)]
pub struct PagureAccount {
    api: ApiClient,
}

#[async_trait]
impl Account for PagureAccount {
    async fn username(&self) -> Result<String, ForgeError> {
        whoami(&self.api).await
    }
}

/// One Pagure project.
#[derive(Debug)]
pub struct PagureRepository {
    api: ApiClient,
    instance_url: String,
    namespace: String,
    repo: String,
}

impl PagureRepository {
    fn path(&self, suffix: &str) -> String {
        let base = self.full_name();
        if suffix.is_empty() {
            base
        } else {
            format!("{}/{}", base, suffix)
        }
    }

    fn pr_url(&self, id: u64) -> String {
        format!("{}/{}/pull-request/{}", self.instance_url, self.full_name(), id)
    }

    /// The namespace a fork of this project lives in for `user`.
    fn fork_namespace(&self, user: &str) -> String {
        if self.namespace.is_empty() {
            format!("fork/{}", user)
        } else {
            format!("fork/{}/{}", user, self.namespace)
        }
    }

    fn sibling(&self, namespace: String) -> Box<dyn Repository> {
        Box::new(PagureRepository {
            api: self.api.clone(),
            instance_url: self.instance_url.clone(),
            namespace,
            repo: self.repo.clone(),
        })
    }

    async fn raw_pull_request(&self, id: u64) -> Result<PagurePullRequest, ForgeError> {
        self.api
            .get(&self.path(&format!("pull-request/{}", id)))
            .await
    }

    fn to_pull_request(&self, raw: PagurePullRequest) -> PullRequest {
        PullRequest {
            url: self.pr_url(raw.id),
            title: raw.title,
            id: raw.id,
            status: status_from_str(&raw.status),
            description: raw.initial_comment.unwrap_or_default(),
            author: raw.user.name,
            source_branch: raw.branch_from,
            target_branch: raw.branch,
            created: raw.date_created,
        }
    }
}

#[async_trait]
impl Repository for PagureRepository {
    fn forge_name(&self) -> &'static str {
        "pagure"
    }

    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.repo
    }

    async fn is_fork(&self) -> Result<bool, ForgeError> {
        Ok(self.namespace == "fork" || self.namespace.starts_with("fork/"))
    }

    async fn branches(&self) -> Result<Vec<String>, ForgeError> {
        let body: PagureBranches = self.api.get(&self.path("git/branches")).await?;
        Ok(body.branches)
    }

    async fn description(&self) -> Result<String, ForgeError> {
        let info: PagureProject = self.api.get(&self.path("")).await?;
        Ok(info.description.unwrap_or_default())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_fork(&self) -> Result<Option<Box<dyn Repository>>, ForgeError> {
        let user = whoami(&self.api).await?;
        let namespace = self.fork_namespace(&user);
        let path = format!("{}/{}", namespace, self.repo);

        match self.api.get::<PagureProject>(&path).await {
            Ok(_) => Ok(Some(self.sibling(namespace))),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_pull_requests(
        &self,
        status: PullRequestStatus,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let mut requests = Vec::new();
        let mut page: u32 = 1;
        loop {
            let query = [
                ("status", status.as_str().to_string()),
                ("page", page.to_string()),
            ];
            let body: PagureRequestList = self
                .api
                .get_query(&self.path("pull-requests"), &query)
                .await?;
            requests.extend(body.requests);

            match body.pagination {
                Some(PagurePagination { next: Some(_) }) => page += 1,
                _ => break,
            }
        }

        // Closed listings on Pagure include merged requests.
        Ok(requests
            .into_iter()
            .map(|raw| self.to_pull_request(raw))
            .filter(|pr| status.accepts(pr.status))
            .collect())
    }

    async fn get_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let raw = self.raw_pull_request(id).await?;
        Ok(self.to_pull_request(raw))
    }

    #[instrument(level = "debug", skip(self, request))]
    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let form = NewPullRequestForm {
            title: &request.title,
            branch_to: &request.target_branch,
            branch_from: &request.source_branch,
            initial_comment: &request.body,
        };
        let raw: PagurePullRequest = self
            .api
            .send_form(&self.path("pull-request/new"), &form)
            .await?;
        Ok(self.to_pull_request(raw))
    }

    #[instrument(level = "debug", skip(self, comment))]
    async fn post_comment(
        &self,
        pr_id: u64,
        comment: CommentRequest,
    ) -> Result<PrComment, ForgeError> {
        let form = CommentForm {
            comment: &comment.body,
            commit: comment.commit.as_deref(),
            filename: comment.filename.as_deref(),
            row: comment.row,
        };
        let _: PagureMessage = self
            .api
            .send_form(&self.path(&format!("pull-request/{}/comment", pr_id)), &form)
            .await?;

        let raw = self.raw_pull_request(pr_id).await?;
        raw.comments
            .into_iter()
            .rev()
            .find(|c| c.comment == comment.body)
            .map(PrComment::from)
            .ok_or_else(|| {
                ForgeError::NotFound(format!("posted comment on pull request #{}", pr_id))
            })
    }

    async fn close_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "close")?;

        let answer: PagureMessage = self
            .api
            .send_form(&self.path(&format!("pull-request/{}/close", id)), NO_FIELDS)
            .await
            .map_err(transition_error)?;
        debug!(message = ?answer.message, "pull request closed");

        self.get_pull_request(id).await
    }

    async fn merge_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        require_open(&self.get_pull_request(id).await?, "merge")?;

        let answer: PagureMessage = self
            .api
            .send_form(&self.path(&format!("pull-request/{}/merge", id)), NO_FIELDS)
            .await
            .map_err(transition_error)?;
        debug!(message = ?answer.message, "pull request merged");

        self.get_pull_request(id).await
    }

    async fn git_urls(&self) -> Result<BTreeMap<String, String>, ForgeError> {
        let body: PagureUrls = self.api.get(&self.path("git/urls")).await?;
        Ok(body.urls)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fork(&self) -> Result<Box<dyn Repository>, ForgeError> {
        if let Some(existing) = self.get_fork().await? {
            debug!(fork = %existing.full_name(), "reusing existing fork");
            return Ok(existing);
        }

        let user = whoami(&self.api).await?;
        let form = ForkForm {
            repo: &self.repo,
            namespace: (!self.namespace.is_empty()).then_some(self.namespace.as_str()),
            wait: "true",
        };
        let _: PagureMessage = self.api.send_form("fork", &form).await?;
        Ok(self.sibling(self.fork_namespace(&user)))
    }

    fn change_token(&self, new_token: &str) {
        self.api.set_token(new_token);
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_all_comments(&self, pr_id: u64) -> Result<Vec<PrComment>, ForgeError> {
        let raw = self.raw_pull_request(pr_id).await?;
        Ok(raw.comments.into_iter().map(PrComment::from).collect())
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct NewPullRequestForm<'a> {
    title: &'a str,
    branch_to: &'a str,
    branch_from: &'a str,
    initial_comment: &'a str,
}

#[derive(Serialize)]
struct CommentForm<'a> {
    comment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<u64>,
}

#[derive(Serialize)]
struct ForkForm<'a> {
    repo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    wait: &'a str,
}

#[derive(Deserialize)]
struct PagureWhoAmI {
    username: String,
}

#[derive(Deserialize)]
struct PagureMessage {
    #[serde(default)]
    message: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PagureProject {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct PagureBranches {
    branches: Vec<String>,
}

#[derive(Deserialize)]
struct PagureUrls {
    urls: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PagurePagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct PagureRequestList {
    requests: Vec<PagurePullRequest>,
    #[serde(default)]
    pagination: Option<PagurePagination>,
}

#[derive(Deserialize)]
struct PagureUser {
    name: String,
}

#[derive(Deserialize)]
struct PagurePullRequest {
    id: u64,
    title: String,
    status: String,
    #[serde(default)]
    initial_comment: Option<String>,
    user: PagureUser,
    /// Target branch
    branch: String,
    branch_from: String,
    #[serde(deserialize_with = "unix_timestamp")]
    date_created: DateTime<Utc>,
    #[serde(default)]
    comments: Vec<PagureComment>,
}

#[derive(Deserialize)]
struct PagureComment {
    comment: String,
    user: PagureUser,
    #[serde(deserialize_with = "unix_timestamp")]
    date_created: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_unix_timestamp")]
    edited_on: Option<DateTime<Utc>>,
}

/// Pagure timestamps are seconds since the epoch, usually as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Number(i64),
}

impl RawTimestamp {
    fn to_datetime<E: serde::de::Error>(&self) -> Result<DateTime<Utc>, E> {
        let secs = match self {
            RawTimestamp::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("invalid timestamp: {}", s)))?,
            RawTimestamp::Number(n) => *n,
        };
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", secs)))
    }
}

fn unix_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    RawTimestamp::deserialize(d)?.to_datetime()
}

fn optional_unix_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Option::<RawTimestamp>::deserialize(d)?
        .map(|raw| raw.to_datetime())
        .transpose()
}

fn status_from_str(status: &str) -> PullRequestStatus {
    match status.to_ascii_lowercase().as_str() {
        "merged" => PullRequestStatus::Merged,
        "closed" => PullRequestStatus::Closed,
        _ => PullRequestStatus::Open,
    }
}

impl From<PagureComment> for PrComment {
    fn from(c: PagureComment) -> Self {
        PrComment {
            body: c.comment,
            author: c.user.name,
            created: c.date_created,
            edited: c.edited_on.unwrap_or(c.date_created),
        }
    }
}
