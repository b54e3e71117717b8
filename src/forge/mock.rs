//! forge::mock
//!
//! In-memory forge for deterministic testing.
//!
//! # Design
//!
//! The mock forge implements the full provider contract against state held
//! in memory. All handles obtained from one `MockForge` (repositories,
//! forks, accounts) share that state, so a test can seed data through the
//! forge and observe the effects of calls made through a repository.
//!
//! Each handle still keeps its own token, following the same snapshot rules
//! as the network backends.
//!
//! Failures can be injected per operation with [`FailOn`], and every call is
//! recorded as a [`MockOperation`] for later verification.
//!
//! # Example
//!
//! ```
//! use polyforge::forge::mock::MockForge;
//! use polyforge::forge::{CommentQuery, Forge, PullRequestStatus};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//! let pr = forge.add_pull_request("owner", "repo", "Add feature", "Closes #1");
//! forge.add_comment("owner", "repo", pr.id, "alice", "LGTM");
//!
//! let repo = forge.repository("owner", "repo");
//! let listed = repo.list_pull_requests(PullRequestStatus::Open).await.unwrap();
//! assert_eq!(listed.len(), 1);
//!
//! let comments = repo.get_comments(pr.id, CommentQuery::default()).await.unwrap();
//! assert_eq!(comments[0].body, "LGTM");
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::traits::{
    require_open, Account, CommentRequest, CreatePullRequest, Forge, ForgeError, Repository,
};
use crate::core::types::{PrComment, PullRequest, PullRequestStatus};

/// Web URL reported by the mock instance.
pub const MOCK_INSTANCE_URL: &str = "https://forge.mock";

/// Default username of the mock account.
pub const MOCK_USER: &str = "mock-user";

/// What [`Repository::fork`] does when the account already owns a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForkPolicy {
    /// Return the existing fork (GitHub, Pagure).
    #[default]
    Idempotent,
    /// Fail with `AlreadyForked` (GitLab).
    RejectExisting,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `Account::username`.
    Username(ForgeError),
    /// Fail `branches`.
    Branches(ForgeError),
    /// Fail `description`.
    Description(ForgeError),
    /// Fail `list_pull_requests`.
    ListPullRequests(ForgeError),
    /// Fail `get_pull_request`.
    GetPullRequest(ForgeError),
    /// Fail `create_pull_request`.
    CreatePullRequest(ForgeError),
    /// Fail `post_comment`.
    PostComment(ForgeError),
    /// Fail `close_pull_request`.
    ClosePullRequest(ForgeError),
    /// Fail `merge_pull_request`.
    MergePullRequest(ForgeError),
    /// Fail `fork`.
    Fork(ForgeError),
    /// Fail `fetch_all_comments`.
    FetchComments(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Username,
    IsFork { repo: String },
    Branches { repo: String },
    Description { repo: String },
    GetFork { repo: String },
    ListPullRequests { repo: String, status: PullRequestStatus },
    GetPullRequest { repo: String, id: u64 },
    CreatePullRequest { repo: String, title: String, source: String, target: String },
    PostComment { repo: String, pr_id: u64, body: String, inline: bool },
    ClosePullRequest { repo: String, id: u64 },
    MergePullRequest { repo: String, id: u64 },
    GitUrls { repo: String },
    Fork { repo: String },
    FetchComments { repo: String, pr_id: u64 },
}

type RepoKey = (String, String);

/// One stored project.
#[derive(Debug, Default)]
struct MockProject {
    description: String,
    branches: Vec<String>,
    pull_requests: BTreeMap<u64, PullRequest>,
    comments: BTreeMap<u64, Vec<PrComment>>,
    next_pr_id: u64,
    fork_of: Option<RepoKey>,
}

impl MockProject {
    fn new() -> Self {
        Self {
            branches: vec!["main".to_string()],
            next_pr_id: 1,
            ..Default::default()
        }
    }
}

/// Shared mutable state.
#[derive(Debug)]
struct MockState {
    projects: BTreeMap<RepoKey, MockProject>,
    username: String,
    fork_policy: ForkPolicy,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
    /// Timestamp handed to the next created record.
    clock: DateTime<Utc>,
}

impl MockState {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = self.clock;
        self.clock += Duration::minutes(1);
        now
    }

    fn project(&self, key: &RepoKey) -> Result<&MockProject, ForgeError> {
        self.projects
            .get(key)
            .ok_or_else(|| ForgeError::NotFound(format!("repository {}", display_key(key))))
    }

    fn project_mut(&mut self, key: &RepoKey) -> Result<&mut MockProject, ForgeError> {
        self.projects
            .get_mut(key)
            .ok_or_else(|| ForgeError::NotFound(format!("repository {}", display_key(key))))
    }

    fn check_fail<F>(&self, select: F) -> Result<(), ForgeError>
    where
        F: Fn(&FailOn) -> Option<&ForgeError>,
    {
        match self.fail_on.as_ref().and_then(select) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn display_key((namespace, name): &RepoKey) -> String {
    if namespace.is_empty() {
        name.clone()
    } else {
        format!("{}/{}", namespace, name)
    }
}

fn key(namespace: &str, name: &str) -> RepoKey {
    (namespace.to_string(), name.to_string())
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock forge for testing.
///
/// Clones share stored data but snapshot the token.
#[derive(Debug)]
pub struct MockForge {
    state: Arc<Mutex<MockState>>,
    token: RwLock<String>,
}

impl Clone for MockForge {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            token: RwLock::new(self.token()),
        }
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self::with_token("mock-token")
    }

    /// Create an empty mock forge holding `token`.
    ///
    /// An empty token makes `Account::username` fail with `AuthRequired`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                projects: BTreeMap::new(),
                username: MOCK_USER.to_string(),
                fork_policy: ForkPolicy::default(),
                fail_on: None,
                operations: Vec::new(),
                clock: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            })),
            token: RwLock::new(token.into()),
        }
    }

    /// Set how `fork` treats an existing fork.
    pub fn with_fork_policy(self, policy: ForkPolicy) -> Self {
        lock(&self.state).fork_policy = policy;
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::mock::{FailOn, MockForge};
    /// use polyforge::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::FetchComments(ForgeError::NetworkError("offline".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        lock(&self.state).fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        lock(&self.state).fail_on = None;
    }

    /// Current token of this forge handle.
    pub fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rename the authenticated account.
    pub fn set_username(&self, username: impl Into<String>) {
        lock(&self.state).username = username.into();
    }

    /// Create an empty project if it does not exist yet.
    pub fn add_repository(&self, namespace: &str, name: &str) {
        lock(&self.state)
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
    }

    /// Set a project's description, creating the project if needed.
    pub fn set_description(&self, namespace: &str, name: &str, description: impl Into<String>) {
        let mut state = lock(&self.state);
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
        project.description = description.into();
    }

    /// Replace a project's branch list, creating the project if needed.
    pub fn set_branches(&self, namespace: &str, name: &str, branches: &[&str]) {
        let mut state = lock(&self.state);
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
        project.branches = branches.iter().map(|b| b.to_string()).collect();
    }

    /// Store a pull request as given, creating the project if needed.
    ///
    /// Later generated ids continue after the highest stored id.
    pub fn seed_pull_request(&self, namespace: &str, name: &str, pr: PullRequest) {
        let mut state = lock(&self.state);
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
        project.next_pr_id = project.next_pr_id.max(pr.id.saturating_add(1));
        project.pull_requests.insert(pr.id, pr);
    }

    /// Open a pull request from `feature` into `main` authored by the mock
    /// account, creating the project if needed.
    pub fn add_pull_request(
        &self,
        namespace: &str,
        name: &str,
        title: &str,
        description: &str,
    ) -> PullRequest {
        let mut state = lock(&self.state);
        let created = state.tick();
        let author = state.username.clone();
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);

        new_pull_request(
            project,
            &key(namespace, name),
            CreatePullRequest {
                title: title.to_string(),
                body: description.to_string(),
                target_branch: "main".to_string(),
                source_branch: "feature".to_string(),
            },
            author,
            created,
        )
    }

    /// Append comments to a pull request's thread as given.
    pub fn seed_comments(&self, namespace: &str, name: &str, pr_id: u64, comments: Vec<PrComment>) {
        let mut state = lock(&self.state);
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
        project.comments.entry(pr_id).or_default().extend(comments);
    }

    /// Append one comment stamped with the mock clock.
    pub fn add_comment(
        &self,
        namespace: &str,
        name: &str,
        pr_id: u64,
        author: &str,
        body: &str,
    ) -> PrComment {
        let mut state = lock(&self.state);
        let comment = PrComment::new(body, author, state.tick());
        let project = state
            .projects
            .entry(key(namespace, name))
            .or_insert_with(MockProject::new);
        project
            .comments
            .entry(pr_id)
            .or_default()
            .push(comment.clone());
        comment
    }

    /// Stored pull request, bypassing failure injection and the log.
    pub fn pull_request(&self, namespace: &str, name: &str, id: u64) -> Option<PullRequest> {
        lock(&self.state)
            .projects
            .get(&key(namespace, name))
            .and_then(|p| p.pull_requests.get(&id).cloned())
    }

    /// Stored comments of a pull request, bypassing failure injection and
    /// the log.
    pub fn comments(&self, namespace: &str, name: &str, pr_id: u64) -> Vec<PrComment> {
        lock(&self.state)
            .projects
            .get(&key(namespace, name))
            .and_then(|p| p.comments.get(&pr_id).cloned())
            .unwrap_or_default()
    }

    /// Whether a project exists.
    pub fn has_repository(&self, namespace: &str, name: &str) -> bool {
        lock(&self.state)
            .projects
            .contains_key(&key(namespace, name))
    }

    /// All recorded operations, in call order.
    pub fn operations(&self) -> Vec<MockOperation> {
        lock(&self.state).operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        lock(&self.state).operations.clear();
    }

    /// Concrete repository handle, for tests that inspect its token.
    pub fn mock_repository(&self, namespace: &str, name: &str) -> MockRepository {
        MockRepository {
            state: Arc::clone(&self.state),
            namespace: namespace.to_string(),
            name: name.to_string(),
            token: RwLock::new(self.token()),
        }
    }
}

fn new_pull_request(
    project: &mut MockProject,
    repo: &RepoKey,
    request: CreatePullRequest,
    author: String,
    created: DateTime<Utc>,
) -> PullRequest {
    let id = project.next_pr_id;
    project.next_pr_id += 1;

    let pr = PullRequest {
        title: request.title,
        id,
        status: PullRequestStatus::Open,
        url: format!("{}/{}/pull/{}", MOCK_INSTANCE_URL, display_key(repo), id),
        description: request.body,
        author,
        source_branch: request.source_branch,
        target_branch: request.target_branch,
        created,
    };
    project.pull_requests.insert(id, pr.clone());
    pr
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn instance_url(&self) -> &str {
        MOCK_INSTANCE_URL
    }

    fn repository(&self, namespace: &str, name: &str) -> Box<dyn Repository> {
        Box::new(self.mock_repository(namespace, name))
    }

    fn current_account(&self) -> Box<dyn Account> {
        Box::new(MockAccount {
            state: Arc::clone(&self.state),
            token: self.token(),
        })
    }

    fn change_token(&self, new_token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = new_token.to_string();
    }
}

/// The mock account.
#[derive(Debug)]
pub struct MockAccount {
    state: Arc<Mutex<MockState>>,
    token: String,
}

#[async_trait]
impl Account for MockAccount {
    async fn username(&self) -> Result<String, ForgeError> {
        let mut state = lock(&self.state);
        state.operations.push(MockOperation::Username);
        state.check_fail(|f| match f {
            FailOn::Username(e) => Some(e),
            _ => None,
        })?;

        if self.token.is_empty() {
            return Err(ForgeError::AuthRequired);
        }
        Ok(state.username.clone())
    }
}

/// Repository handle on a [`MockForge`].
#[derive(Debug)]
pub struct MockRepository {
    state: Arc<Mutex<MockState>>,
    namespace: String,
    name: String,
    token: RwLock<String>,
}

impl MockRepository {
    /// Current token of this handle.
    pub fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn key(&self) -> RepoKey {
        key(&self.namespace, &self.name)
    }

    fn handle(&self, namespace: String, name: String) -> MockRepository {
        MockRepository {
            state: Arc::clone(&self.state),
            namespace,
            name,
            token: RwLock::new(self.token()),
        }
    }

    /// Lock the state and log `op`.
    fn begin(&self, op: MockOperation) -> MutexGuard<'_, MockState> {
        let mut state = lock(&self.state);
        state.operations.push(op);
        state
    }

    fn find_fork(&self, state: &MockState) -> Option<RepoKey> {
        let own = self.key();
        state
            .projects
            .iter()
            .find(|((ns, _), p)| *ns == state.username && p.fork_of.as_ref() == Some(&own))
            .map(|(k, _)| k.clone())
    }
}

#[async_trait]
impl Repository for MockRepository {
    fn forge_name(&self) -> &'static str {
        "mock"
    }

    fn instance_url(&self) -> &str {
        MOCK_INSTANCE_URL
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_fork(&self) -> Result<bool, ForgeError> {
        let state = self.begin(MockOperation::IsFork {
            repo: self.full_name(),
        });
        Ok(state.project(&self.key())?.fork_of.is_some())
    }

    async fn branches(&self) -> Result<Vec<String>, ForgeError> {
        let state = self.begin(MockOperation::Branches {
            repo: self.full_name(),
        });
        state.check_fail(|f| match f {
            FailOn::Branches(e) => Some(e),
            _ => None,
        })?;
        Ok(state.project(&self.key())?.branches.clone())
    }

    async fn description(&self) -> Result<String, ForgeError> {
        let state = self.begin(MockOperation::Description {
            repo: self.full_name(),
        });
        state.check_fail(|f| match f {
            FailOn::Description(e) => Some(e),
            _ => None,
        })?;
        Ok(state.project(&self.key())?.description.clone())
    }

    async fn get_fork(&self) -> Result<Option<Box<dyn Repository>>, ForgeError> {
        let state = self.begin(MockOperation::GetFork {
            repo: self.full_name(),
        });
        state.project(&self.key())?;
        Ok(self
            .find_fork(&state)
            .map(|(ns, name)| Box::new(self.handle(ns, name)) as Box<dyn Repository>))
    }

    async fn list_pull_requests(
        &self,
        status: PullRequestStatus,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let state = self.begin(MockOperation::ListPullRequests {
            repo: self.full_name(),
            status,
        });
        state.check_fail(|f| match f {
            FailOn::ListPullRequests(e) => Some(e),
            _ => None,
        })?;
        Ok(state
            .project(&self.key())?
            .pull_requests
            .values()
            .filter(|pr| status.accepts(pr.status))
            .cloned()
            .collect())
    }

    async fn get_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let state = self.begin(MockOperation::GetPullRequest {
            repo: self.full_name(),
            id,
        });
        state.check_fail(|f| match f {
            FailOn::GetPullRequest(e) => Some(e),
            _ => None,
        })?;
        state
            .project(&self.key())?
            .pull_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("pull request #{}", id)))
    }

    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let mut state = self.begin(MockOperation::CreatePullRequest {
            repo: self.full_name(),
            title: request.title.clone(),
            source: request.source_branch.clone(),
            target: request.target_branch.clone(),
        });
        state.check_fail(|f| match f {
            FailOn::CreatePullRequest(e) => Some(e),
            _ => None,
        })?;

        let created = state.tick();
        let author = state.username.clone();
        let repo = self.key();
        let project = state.project_mut(&repo)?;
        if !project.branches.contains(&request.target_branch) {
            return Err(ForgeError::NotFound(format!(
                "branch {}",
                request.target_branch
            )));
        }
        Ok(new_pull_request(project, &repo, request, author, created))
    }

    async fn post_comment(
        &self,
        pr_id: u64,
        comment: CommentRequest,
    ) -> Result<PrComment, ForgeError> {
        let mut state = self.begin(MockOperation::PostComment {
            repo: self.full_name(),
            pr_id,
            body: comment.body.clone(),
            inline: comment.is_inline(),
        });
        state.check_fail(|f| match f {
            FailOn::PostComment(e) => Some(e),
            _ => None,
        })?;
        comment.full_position()?;

        let created = state.tick();
        let posted = PrComment::new(comment.body, state.username.clone(), created);
        let project = state.project_mut(&self.key())?;
        if !project.pull_requests.contains_key(&pr_id) {
            return Err(ForgeError::NotFound(format!("pull request #{}", pr_id)));
        }
        project
            .comments
            .entry(pr_id)
            .or_default()
            .push(posted.clone());
        Ok(posted)
    }

    async fn close_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let mut state = self.begin(MockOperation::ClosePullRequest {
            repo: self.full_name(),
            id,
        });
        state.check_fail(|f| match f {
            FailOn::ClosePullRequest(e) => Some(e),
            _ => None,
        })?;
        transition(&mut state, &self.key(), id, "close", PullRequestStatus::Closed)
    }

    async fn merge_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError> {
        let mut state = self.begin(MockOperation::MergePullRequest {
            repo: self.full_name(),
            id,
        });
        state.check_fail(|f| match f {
            FailOn::MergePullRequest(e) => Some(e),
            _ => None,
        })?;
        transition(&mut state, &self.key(), id, "merge", PullRequestStatus::Merged)
    }

    async fn git_urls(&self) -> Result<BTreeMap<String, String>, ForgeError> {
        let state = self.begin(MockOperation::GitUrls {
            repo: self.full_name(),
        });
        state.project(&self.key())?;
        let full_name = self.full_name();
        Ok(BTreeMap::from([
            (
                "git".to_string(),
                format!("{}/{}.git", MOCK_INSTANCE_URL, full_name),
            ),
            ("ssh".to_string(), format!("git@forge.mock:{}.git", full_name)),
        ]))
    }

    async fn fork(&self) -> Result<Box<dyn Repository>, ForgeError> {
        let mut state = self.begin(MockOperation::Fork {
            repo: self.full_name(),
        });
        state.check_fail(|f| match f {
            FailOn::Fork(e) => Some(e),
            _ => None,
        })?;

        if let Some(existing) = self.find_fork(&state) {
            return match state.fork_policy {
                ForkPolicy::Idempotent => Ok(Box::new(self.handle(existing.0, existing.1))),
                ForkPolicy::RejectExisting => {
                    Err(ForgeError::AlreadyForked(display_key(&existing)))
                }
            };
        }

        let fork_key = key(&state.username, &self.name);
        if fork_key == self.key() {
            return Err(ForgeError::InvalidState(format!(
                "{} is owned by {} and cannot be forked into the same account",
                self.full_name(),
                state.username
            )));
        }
        if state.projects.contains_key(&fork_key) {
            return Err(ForgeError::InvalidState(format!(
                "{} already exists and is not a fork of {}",
                display_key(&fork_key),
                self.full_name()
            )));
        }

        let parent = state.project(&self.key())?;
        let fork = MockProject {
            description: parent.description.clone(),
            branches: parent.branches.clone(),
            fork_of: Some(self.key()),
            ..MockProject::new()
        };
        state.projects.insert(fork_key.clone(), fork);
        Ok(Box::new(self.handle(fork_key.0, fork_key.1)))
    }

    fn change_token(&self, new_token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = new_token.to_string();
    }

    async fn fetch_all_comments(&self, pr_id: u64) -> Result<Vec<PrComment>, ForgeError> {
        let state = self.begin(MockOperation::FetchComments {
            repo: self.full_name(),
            pr_id,
        });
        state.check_fail(|f| match f {
            FailOn::FetchComments(e) => Some(e),
            _ => None,
        })?;
        let project = state.project(&self.key())?;
        if !project.pull_requests.contains_key(&pr_id) {
            return Err(ForgeError::NotFound(format!("pull request #{}", pr_id)));
        }
        Ok(project.comments.get(&pr_id).cloned().unwrap_or_default())
    }
}

fn transition(
    state: &mut MockState,
    repo: &RepoKey,
    id: u64,
    action: &str,
    to: PullRequestStatus,
) -> Result<PullRequest, ForgeError> {
    let pr = state
        .project_mut(repo)?
        .pull_requests
        .get_mut(&id)
        .ok_or_else(|| ForgeError::NotFound(format!("pull request #{}", id)))?;
    require_open(pr, action)?;
    pr.status = to;
    Ok(pr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MockForge, PullRequest) {
        let forge = MockForge::new();
        let pr = forge.add_pull_request("owner", "repo", "Add feature", "body");
        (forge, pr)
    }

    mod pull_requests {
        use super::*;

        #[tokio::test]
        async fn ids_are_sequential() {
            let forge = MockForge::new();
            forge.add_repository("owner", "repo");
            let repo = forge.repository("owner", "repo");

            for expected in 1..=3u64 {
                let pr = repo
                    .create_pull_request(CreatePullRequest {
                        title: format!("PR {}", expected),
                        body: String::new(),
                        target_branch: "main".into(),
                        source_branch: format!("topic-{}", expected),
                    })
                    .await
                    .unwrap();
                assert_eq!(pr.id, expected);
                assert_eq!(pr.status, PullRequestStatus::Open);
                assert_eq!(pr.author, MOCK_USER);
            }
        }

        #[tokio::test]
        async fn create_into_unknown_branch_fails() {
            let forge = MockForge::new();
            forge.add_repository("owner", "repo");
            let result = forge
                .repository("owner", "repo")
                .create_pull_request(CreatePullRequest {
                    title: "x".into(),
                    body: String::new(),
                    target_branch: "release".into(),
                    source_branch: "topic".into(),
                })
                .await;
            assert!(matches!(result, Err(ForgeError::NotFound(_))));
        }

        #[test]
        fn seeding_max_id_does_not_overflow() {
            let (forge, mut last) = seeded();
            last.id = u64::MAX;
            forge.seed_pull_request("owner", "repo", last);
            assert!(forge.pull_request("owner", "repo", u64::MAX).is_some());
        }

        #[tokio::test]
        async fn seeded_ids_advance_counter() {
            let (forge, pr) = seeded();
            let mut old = pr.clone();
            old.id = 41;
            forge.seed_pull_request("owner", "repo", old);
            let next = forge.add_pull_request("owner", "repo", "next", "");
            assert_eq!(next.id, 42);
        }

        #[tokio::test]
        async fn list_filters_by_status() {
            let (forge, first) = seeded();
            let second = forge.add_pull_request("owner", "repo", "Second", "");
            let repo = forge.repository("owner", "repo");
            repo.merge_pull_request(second.id).await.unwrap();

            let open = repo.list_pull_requests(PullRequestStatus::Open).await.unwrap();
            assert_eq!(open.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first.id]);

            let merged = repo.list_pull_requests(PullRequestStatus::Merged).await.unwrap();
            assert_eq!(merged.len(), 1);
            assert!(repo
                .list_pull_requests(PullRequestStatus::Closed)
                .await
                .unwrap()
                .is_empty());
            assert_eq!(
                repo.list_pull_requests(PullRequestStatus::All).await.unwrap().len(),
                2
            );
        }

        #[tokio::test]
        async fn get_missing_pull_request() {
            let (forge, _) = seeded();
            let result = forge.repository("owner", "repo").get_pull_request(99).await;
            assert!(matches!(result, Err(ForgeError::NotFound(_))));
        }

        #[tokio::test]
        async fn unknown_repository_is_not_found() {
            let forge = MockForge::new();
            let result = forge.repository("nobody", "nothing").branches().await;
            assert!(matches!(result, Err(ForgeError::NotFound(_))));
        }

        #[tokio::test]
        async fn close_returns_new_state() {
            let (forge, pr) = seeded();
            let repo = forge.repository("owner", "repo");
            let closed = repo.close_pull_request(pr.id).await.unwrap();
            assert_eq!(closed.status, PullRequestStatus::Closed);
            // The earlier snapshot is untouched
            assert_eq!(pr.status, PullRequestStatus::Open);
        }

        #[tokio::test]
        async fn merge_after_close_is_invalid() {
            let (forge, pr) = seeded();
            let repo = forge.repository("owner", "repo");
            repo.close_pull_request(pr.id).await.unwrap();
            let result = repo.merge_pull_request(pr.id).await;
            assert!(matches!(result, Err(ForgeError::InvalidState(_))));
        }

        #[tokio::test]
        async fn close_twice_is_invalid() {
            let (forge, pr) = seeded();
            let repo = forge.repository("owner", "repo");
            repo.close_pull_request(pr.id).await.unwrap();
            let result = repo.close_pull_request(pr.id).await;
            assert!(matches!(result, Err(ForgeError::InvalidState(_))));
        }
    }

    mod comments {
        use super::*;

        #[tokio::test]
        async fn post_appends_to_thread() {
            let (forge, pr) = seeded();
            let repo = forge.repository("owner", "repo");
            repo.post_comment(pr.id, CommentRequest::new("first")).await.unwrap();
            repo.post_comment(pr.id, CommentRequest::new("second")).await.unwrap();

            let thread = repo.fetch_all_comments(pr.id).await.unwrap();
            let bodies: Vec<_> = thread.iter().map(|c| c.body.as_str()).collect();
            assert_eq!(bodies, vec!["first", "second"]);
            assert!(thread[0].created < thread[1].created);
        }

        #[tokio::test]
        async fn partial_inline_position_is_unsupported() {
            let (forge, pr) = seeded();
            let mut request = CommentRequest::new("nit");
            request.filename = Some("src/lib.rs".into());
            let result = forge
                .repository("owner", "repo")
                .post_comment(pr.id, request)
                .await;
            assert!(matches!(result, Err(ForgeError::UnsupportedOperation(_))));
            assert!(forge.comments("owner", "repo", pr.id).is_empty());
        }

        #[tokio::test]
        async fn full_inline_position_is_accepted() {
            let (forge, pr) = seeded();
            let posted = forge
                .repository("owner", "repo")
                .post_comment(pr.id, CommentRequest::new("nit").inline("abc", "src/lib.rs", 3))
                .await
                .unwrap();
            assert_eq!(posted.body, "nit");
            assert!(!posted.is_edited());
        }

        #[tokio::test]
        async fn comments_on_missing_pr() {
            let (forge, _) = seeded();
            let result = forge.repository("owner", "repo").fetch_all_comments(7).await;
            assert!(matches!(result, Err(ForgeError::NotFound(_))));
        }

        #[tokio::test]
        async fn fail_on_fetch_comments() {
            let (forge, pr) = seeded();
            let forge = forge.fail_on(FailOn::FetchComments(ForgeError::NetworkError(
                "offline".into(),
            )));
            let result = forge.repository("owner", "repo").fetch_all_comments(pr.id).await;
            assert_eq!(result, Err(ForgeError::NetworkError("offline".into())));

            forge.clear_fail_on();
            assert!(forge
                .repository("owner", "repo")
                .fetch_all_comments(pr.id)
                .await
                .is_ok());
        }
    }

    mod forks {
        use super::*;

        #[tokio::test]
        async fn fork_creates_then_reuses() {
            let (forge, _) = seeded();
            forge.set_description("owner", "repo", "upstream");
            let repo = forge.repository("owner", "repo");
            assert!(!repo.is_forked().await.unwrap());

            let fork = repo.fork().await.unwrap();
            assert_eq!(fork.full_name(), format!("{}/repo", MOCK_USER));
            assert!(fork.is_fork().await.unwrap());
            assert_eq!(fork.description().await.unwrap(), "upstream");
            assert!(repo.is_forked().await.unwrap());

            let again = repo.fork().await.unwrap();
            assert_eq!(again.full_name(), fork.full_name());
        }

        #[tokio::test]
        async fn reject_existing_policy() {
            let forge = MockForge::new().with_fork_policy(ForkPolicy::RejectExisting);
            forge.add_repository("owner", "repo");
            let repo = forge.repository("owner", "repo");
            repo.fork().await.unwrap();
            let result = repo.fork().await;
            assert_eq!(
                result.err(),
                Some(ForgeError::AlreadyForked(format!("{}/repo", MOCK_USER)))
            );
        }

        #[tokio::test]
        async fn own_repository_cannot_be_forked() {
            let forge = MockForge::new();
            let pr = forge.add_pull_request(MOCK_USER, "repo", "Keep me", "");
            let repo = forge.repository(MOCK_USER, "repo");

            let result = repo.fork().await;
            assert!(matches!(result, Err(ForgeError::InvalidState(_))));
            assert!(forge.pull_request(MOCK_USER, "repo", pr.id).is_some());
            assert!(!repo.is_fork().await.unwrap());
        }

        #[tokio::test]
        async fn unrelated_project_at_fork_path_is_kept() {
            let forge = MockForge::new();
            let mine = forge.add_pull_request(MOCK_USER, "repo", "Unrelated", "");
            forge.add_repository("upstream", "repo");

            let result = forge.repository("upstream", "repo").fork().await;
            assert!(matches!(result, Err(ForgeError::InvalidState(_))));
            assert!(forge.pull_request(MOCK_USER, "repo", mine.id).is_some());
            assert!(!forge
                .repository(MOCK_USER, "repo")
                .is_fork()
                .await
                .unwrap());
        }
    }

    mod tokens {
        use super::*;

        #[tokio::test]
        async fn forge_change_does_not_reach_issued_handles() {
            let forge = MockForge::with_token("old");
            let issued = forge.mock_repository("owner", "repo");
            forge.change_token("new");

            assert_eq!(issued.token(), "old");
            assert_eq!(forge.mock_repository("owner", "repo").token(), "new");
        }

        #[tokio::test]
        async fn repository_change_is_local() {
            let forge = MockForge::with_token("old");
            let a = forge.mock_repository("owner", "repo");
            let b = forge.mock_repository("owner", "repo");
            a.change_token("rotated");

            assert_eq!(a.token(), "rotated");
            assert_eq!(b.token(), "old");
            assert_eq!(forge.token(), "old");
        }

        #[tokio::test]
        async fn empty_token_requires_auth() {
            let forge = MockForge::with_token("");
            let result = forge.current_account().username().await;
            assert_eq!(result, Err(ForgeError::AuthRequired));

            forge.change_token("t");
            assert_eq!(forge.current_account().username().await.unwrap(), MOCK_USER);
        }
    }

    #[tokio::test]
    async fn operations_recorded() {
        let (forge, pr) = seeded();
        forge.clear_operations();
        let repo = forge.repository("owner", "repo");
        repo.get_pull_request(pr.id).await.unwrap();
        repo.fetch_all_comments(pr.id).await.unwrap();

        assert_eq!(
            forge.operations(),
            vec![
                MockOperation::GetPullRequest {
                    repo: "owner/repo".into(),
                    id: pr.id
                },
                MockOperation::FetchComments {
                    repo: "owner/repo".into(),
                    pr_id: pr.id
                },
            ]
        );
    }

    #[test]
    fn forge_name() {
        let forge = MockForge::new();
        assert_eq!(forge.name(), "mock");
        assert_eq!(forge.instance_url(), MOCK_INSTANCE_URL);
    }
}
