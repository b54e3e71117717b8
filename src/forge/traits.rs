//! forge::traits
//!
//! Provider contract for git hosting services.
//!
//! # Design
//!
//! Three roles, one trait each:
//! - [`Forge`]: a connection to one forge instance, hands out repositories
//! - [`Repository`]: one project on that instance
//! - [`Account`]: the authenticated identity
//!
//! The traits are async because backends do network I/O. Every fetching
//! method returns `Result` and maps failures onto [`ForgeError`].
//!
//! [`Repository::get_comments`] and [`Repository::search_in_pull_request`]
//! are provided methods built on the single required primitive
//! [`Repository::fetch_all_comments`]; backends do not reimplement them.
//!
//! # Credentials
//!
//! `change_token` swaps the credential in place. A `Forge` snapshots its
//! current token into every repository it hands out, so a later change on
//! the forge does not reach existing handles. Concurrent calls on one
//! instance while a token change is in flight may use either token: last
//! write wins, with no atomicity guarantee.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::{open_repository, CommentQuery, SearchQuery};
//! use regex::Regex;
//!
//! let repo = open_repository("https://github.com/owner/repo.git", token, None)?;
//!
//! let retest = Regex::new("/retest")?;
//! let newest_first = repo
//!     .get_comments(42, CommentQuery { filter: Some(&retest), reverse: true })
//!     .await?;
//!
//! if let Some(hit) = repo.search_in_pull_request(42, SearchQuery::new(&retest)).await? {
//!     println!("found '{}'", hit.as_str());
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::core::comments::{self, CommentMatch, CommentPattern};
use crate::core::types::{PrComment, PullRequest, PullRequestStatus};

/// Errors from forge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    /// The backend does not implement this capability.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The referenced pull request, branch, repository or fork does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition conflicts with the current pull request state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The backend cannot perform the requested variant of an operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The remote URL does not belong to a forge this backend serves.
    #[error("unsupported remote: {0}")]
    UnsupportedRemote(String),

    /// A fork already exists and this backend treats re-forking as an error.
    #[error("already forked: {0}")]
    AlreadyForked(String),

    /// No credential is configured.
    #[error("authentication required")]
    AuthRequired,

    /// The credential was rejected or lacks permissions.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The API answered with an unexpected error status.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Request to create a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequest {
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: String,
    /// Branch to merge into
    pub target_branch: String,
    /// Branch with the changes
    pub source_branch: String,
}

/// A new comment on a pull request.
///
/// `commit`, `filename` and `row` together place the comment on a diff line.
/// A backend either honours whatever subset is given or fails with
/// [`ForgeError::UnsupportedOperation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentRequest {
    /// Comment body
    pub body: String,
    /// Commit the inline comment refers to
    pub commit: Option<String>,
    /// File path within the diff
    pub filename: Option<String>,
    /// Line within `filename`
    pub row: Option<u64>,
}

/// Fully specified diff position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePosition {
    pub commit: String,
    pub filename: String,
    pub row: u64,
}

impl CommentRequest {
    /// A plain (non-inline) comment.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Place the comment on a diff line.
    pub fn inline(mut self, commit: impl Into<String>, filename: impl Into<String>, row: u64) -> Self {
        self.commit = Some(commit.into());
        self.filename = Some(filename.into());
        self.row = Some(row);
        self
    }

    /// True if any inline placement field is set.
    pub fn is_inline(&self) -> bool {
        self.commit.is_some() || self.filename.is_some() || self.row.is_some()
    }

    /// The inline position for backends that need all three fields.
    ///
    /// Returns `Ok(None)` for a plain comment and
    /// [`ForgeError::UnsupportedOperation`] when only some fields are set.
    pub fn full_position(&self) -> Result<Option<InlinePosition>, ForgeError> {
        match (&self.commit, &self.filename, self.row) {
            (None, None, None) => Ok(None),
            (Some(commit), Some(filename), Some(row)) => Ok(Some(InlinePosition {
                commit: commit.clone(),
                filename: filename.clone(),
                row,
            })),
            _ => Err(ForgeError::UnsupportedOperation(
                "inline comments need commit, filename and row together".into(),
            )),
        }
    }
}

/// Fail with `InvalidState` unless the pull request is open.
pub(crate) fn require_open(pr: &PullRequest, action: &str) -> Result<(), ForgeError> {
    if pr.status == PullRequestStatus::Open {
        Ok(())
    } else {
        Err(ForgeError::InvalidState(format!(
            "cannot {} pull request #{}: it is {}",
            action, pr.id, pr.status
        )))
    }
}

/// Options for [`Repository::get_comments`].
#[derive(Clone, Copy, Default)]
pub struct CommentQuery<'a> {
    /// Keep only comments whose body matches
    pub filter: Option<&'a dyn CommentPattern>,
    /// Return newest first instead of forge-native order
    pub reverse: bool,
}

impl std::fmt::Debug for CommentQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentQuery")
            .field("has_filter", &self.filter.is_some())
            .field("reverse", &self.reverse)
            .finish()
    }
}

/// Options for [`Repository::search_in_pull_request`].
#[derive(Clone, Copy)]
pub struct SearchQuery<'a> {
    /// Pattern applied to every candidate
    pub pattern: &'a dyn CommentPattern,
    /// Scan newest first
    pub reverse: bool,
    /// Include the pull request description as a candidate
    pub include_description: bool,
}

impl<'a> SearchQuery<'a> {
    /// Forward search including the description.
    pub fn new(pattern: &'a dyn CommentPattern) -> Self {
        Self {
            pattern,
            reverse: false,
            include_description: true,
        }
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn include_description(mut self, include: bool) -> Self {
        self.include_description = include;
        self
    }
}

impl std::fmt::Debug for SearchQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchQuery")
            .field("reverse", &self.reverse)
            .field("include_description", &self.include_description)
            .finish()
    }
}

/// A connection to one forge instance.
///
/// Construction from a remote URL lives on [`FromRemoteUrl`], since it is
/// not object safe.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Backend name (e.g., "github", "gitlab").
    fn name(&self) -> &'static str;

    /// Web base URL of the instance (e.g., `https://github.com`).
    fn instance_url(&self) -> &str;

    /// Handle for `namespace/name` on this instance.
    ///
    /// Does not contact the forge; a missing repository surfaces as
    /// `NotFound` on the first call that needs it.
    fn repository(&self, namespace: &str, name: &str) -> Box<dyn Repository>;

    /// The authenticated identity.
    fn current_account(&self) -> Box<dyn Account>;

    /// Replace the credential for this instance and repositories obtained
    /// from it afterwards.
    fn change_token(&self, new_token: &str);
}

/// Construct a forge from a git remote URL.
pub trait FromRemoteUrl: Sized {
    /// # Errors
    ///
    /// `UnsupportedRemote` if the URL does not match this backend's hosts.
    fn from_remote_url(remote_url: &str, token: &str) -> Result<Self, ForgeError>;
}

/// The authenticated identity on a forge.
#[async_trait]
pub trait Account: Send + Sync {
    async fn username(&self) -> Result<String, ForgeError>;
}

/// One repository on a forge.
///
/// Identified by `(instance, namespace, name)`. The namespace is opaque to
/// this crate: an owner, an organisation, a nested group path, or a
/// structured fork path such as `fork/<user>/<namespace>`.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Backend name (e.g., "github").
    fn forge_name(&self) -> &'static str;

    /// Web base URL of the instance.
    fn instance_url(&self) -> &str;

    fn namespace(&self) -> &str;

    fn name(&self) -> &str;

    /// `namespace/name`, for display.
    ///
    /// A top-level project has an empty namespace (common on Pagure) and its
    /// full name is just `name`, with no leading slash.
    fn full_name(&self) -> String {
        if self.namespace().is_empty() {
            self.name().to_string()
        } else {
            format!("{}/{}", self.namespace(), self.name())
        }
    }

    /// True if this repository is itself a fork.
    async fn is_fork(&self) -> Result<bool, ForgeError>;

    /// True if the authenticated account already has a fork of this repository.
    async fn is_forked(&self) -> Result<bool, ForgeError> {
        Ok(self.get_fork().await?.is_some())
    }

    async fn branches(&self) -> Result<Vec<String>, ForgeError>;

    /// Repository description.
    async fn description(&self) -> Result<String, ForgeError>;

    /// The authenticated account's fork, or `None` if there is none.
    async fn get_fork(&self) -> Result<Option<Box<dyn Repository>>, ForgeError>;

    async fn list_pull_requests(
        &self,
        status: PullRequestStatus,
    ) -> Result<Vec<PullRequest>, ForgeError>;

    /// # Errors
    ///
    /// `NotFound` if no pull request with `id` exists here.
    async fn get_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError>;

    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<PullRequest, ForgeError>;

    /// # Errors
    ///
    /// `UnsupportedOperation` if inline placement was requested and the
    /// backend cannot honour it.
    async fn post_comment(
        &self,
        pr_id: u64,
        comment: CommentRequest,
    ) -> Result<PrComment, ForgeError>;

    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless the PR is open.
    async fn close_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError>;

    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless the PR is open.
    async fn merge_pull_request(&self, id: u64) -> Result<PullRequest, ForgeError>;

    /// Clone URLs keyed by protocol (e.g., "git", "ssh").
    async fn git_urls(&self) -> Result<BTreeMap<String, String>, ForgeError>;

    /// Fork into the authenticated account. Backends document whether an
    /// existing fork is returned or reported as `AlreadyForked`.
    async fn fork(&self) -> Result<Box<dyn Repository>, ForgeError>;

    /// Replace the credential for this handle only.
    fn change_token(&self, new_token: &str);

    /// Every comment on the pull request, unfiltered, in forge-native
    /// order (oldest first).
    async fn fetch_all_comments(&self, pr_id: u64) -> Result<Vec<PrComment>, ForgeError>;

    /// Comments, optionally reversed and then filtered.
    ///
    /// An empty result is not an error.
    async fn get_comments(
        &self,
        pr_id: u64,
        query: CommentQuery<'_>,
    ) -> Result<Vec<PrComment>, ForgeError> {
        let mut all = self.fetch_all_comments(pr_id).await?;
        debug!(pr_id, fetched = all.len(), reverse = query.reverse, "fetched comments");

        if query.reverse {
            all.reverse();
        }
        Ok(match query.filter {
            Some(pattern) => comments::filter_comments(all, pattern),
            None => all,
        })
    }

    /// First match of the pattern across comments and, optionally, the
    /// description.
    ///
    /// On a forward scan the description is examined before any comment;
    /// on a reverse scan it is examined last. `Ok(None)` means no match.
    async fn search_in_pull_request(
        &self,
        pr_id: u64,
        query: SearchQuery<'_>,
    ) -> Result<Option<CommentMatch>, ForgeError> {
        let thread = self
            .get_comments(
                pr_id,
                CommentQuery {
                    filter: None,
                    reverse: query.reverse,
                },
            )
            .await?;

        let description = if query.include_description {
            Some(self.get_pull_request(pr_id).await?.description)
        } else {
            None
        };

        let candidates = comments::search_candidates(thread, description, query.reverse);
        let examined = candidates.len();
        let found = comments::find_first(candidates, query.pattern);
        debug!(pr_id, examined, matched = found.is_some(), "searched pull request");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::NotFound("PR #123".into())),
            "not found: PR #123"
        );
        assert_eq!(
            format!("{}", ForgeError::InvalidState("PR #1 is merged".into())),
            "invalid state: PR #1 is merged"
        );
        assert_eq!(
            format!("{}", ForgeError::UnsupportedRemote("ftp://x".into())),
            "unsupported remote: ftp://x"
        );
        assert_eq!(
            format!("{}", ForgeError::AuthRequired),
            "authentication required"
        );
        assert_eq!(
            format!(
                "{}",
                ForgeError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
    }

    mod comment_request {
        use super::*;

        #[test]
        fn plain_comment_has_no_position() {
            let req = CommentRequest::new("hello");
            assert!(!req.is_inline());
            assert_eq!(req.full_position(), Ok(None));
        }

        #[test]
        fn full_inline_position() {
            let req = CommentRequest::new("nit").inline("abc123", "src/lib.rs", 7);
            assert!(req.is_inline());
            assert_eq!(
                req.full_position(),
                Ok(Some(InlinePosition {
                    commit: "abc123".into(),
                    filename: "src/lib.rs".into(),
                    row: 7,
                }))
            );
        }

        #[test]
        fn partial_position_is_unsupported() {
            let req = CommentRequest {
                body: "nit".into(),
                filename: Some("src/lib.rs".into()),
                ..Default::default()
            };
            assert!(req.is_inline());
            assert!(matches!(
                req.full_position(),
                Err(ForgeError::UnsupportedOperation(_))
            ));
        }
    }

    mod queries {
        use super::*;
        use crate::core::comments::Literal;

        #[test]
        fn comment_query_default() {
            let q = CommentQuery::default();
            assert!(q.filter.is_none());
            assert!(!q.reverse);
        }

        #[test]
        fn search_query_defaults_include_description() {
            let lit = Literal::new("x");
            let q = SearchQuery::new(&lit);
            assert!(!q.reverse);
            assert!(q.include_description);

            let q = q.reverse(true).include_description(false);
            assert!(q.reverse);
            assert!(!q.include_description);
        }

        #[test]
        fn debug_omits_pattern() {
            let lit = Literal::new("secret-ish");
            let out = format!("{:?}", SearchQuery::new(&lit));
            assert!(out.contains("include_description"));
            assert!(!out.contains("secret-ish"));
        }
    }

    mod full_name {
        use super::*;
        use crate::forge::mock::MockForge;

        #[test]
        fn joins_namespace_and_name() {
            let forge = MockForge::new();
            assert_eq!(forge.repository("owner", "repo").full_name(), "owner/repo");
            assert_eq!(
                forge.repository("group/sub", "repo").full_name(),
                "group/sub/repo"
            );
        }

        #[test]
        fn empty_namespace_is_bare_name() {
            let forge = MockForge::new();
            assert_eq!(forge.repository("", "ogr-tests").full_name(), "ogr-tests");
        }
    }
}
