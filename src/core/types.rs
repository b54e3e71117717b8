//! core::types
//!
//! Domain records shared by every forge backend.
//!
//! # Design
//!
//! These are plain value types. A backend constructs them in response to a
//! fetch or a state-changing call and never mutates them afterwards: closing
//! or merging a pull request yields a *new* [`PullRequest`] describing the
//! post-operation state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a pull request, also used as a listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestStatus {
    /// Open and awaiting review or merge
    #[default]
    Open,
    /// Closed without being merged
    Closed,
    /// Merged into the target branch
    Merged,
    /// Any state (listing filter only)
    All,
}

impl PullRequestStatus {
    /// All variants, in declaration order.
    pub fn all() -> &'static [PullRequestStatus] {
        &[
            PullRequestStatus::Open,
            PullRequestStatus::Closed,
            PullRequestStatus::Merged,
            PullRequestStatus::All,
        ]
    }

    /// Lowercase name used on the command line and in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestStatus::Open => "open",
            PullRequestStatus::Closed => "closed",
            PullRequestStatus::Merged => "merged",
            PullRequestStatus::All => "all",
        }
    }

    /// Whether a pull request in `self` state passes a listing filter.
    ///
    /// `All` accepts everything; every other filter accepts only itself.
    pub fn accepts(&self, state: PullRequestStatus) -> bool {
        *self == PullRequestStatus::All || *self == state
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown pull request status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pull request status '{0}', expected one of: open, closed, merged, all")]
pub struct ParseStatusError(pub String);

impl FromStr for PullRequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(PullRequestStatus::Open),
            "closed" => Ok(PullRequestStatus::Closed),
            "merged" => Ok(PullRequestStatus::Merged),
            "all" => Ok(PullRequestStatus::All),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Snapshot of one pull (merge) request as reported by the forge.
///
/// `status` reflects the forge's state at fetch time and is never
/// live-updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR title
    pub title: String,
    /// Identifier, unique within the repository
    pub id: u64,
    /// State at fetch time
    pub status: PullRequestStatus,
    /// Absolute web URL
    pub url: String,
    /// Description body (may be empty)
    pub description: String,
    /// Account identifier of the author
    pub author: String,
    /// Branch with the changes
    pub source_branch: String,
    /// Branch the changes merge into
    pub target_branch: String,
    /// Creation time
    pub created: DateTime<Utc>,
}

/// One comment on a pull request.
///
/// Comments carry no identifier at this layer; their position in the
/// sequence returned by the backend is their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrComment {
    /// Comment body
    pub body: String,
    /// Account identifier of the author
    pub author: String,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Last edit time, equal to `created` if never edited
    pub edited: DateTime<Utc>,
}

impl PrComment {
    /// Create a comment that has never been edited.
    pub fn new(
        body: impl Into<String>,
        author: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            body: body.into(),
            author: author.into(),
            created,
            edited: created,
        }
    }

    /// Whether the comment was edited after creation.
    pub fn is_edited(&self) -> bool {
        self.edited != self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    mod pull_request_status {
        use super::*;

        #[test]
        fn default_is_open() {
            assert_eq!(PullRequestStatus::default(), PullRequestStatus::Open);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", PullRequestStatus::Open), "open");
            assert_eq!(format!("{}", PullRequestStatus::Closed), "closed");
            assert_eq!(format!("{}", PullRequestStatus::Merged), "merged");
            assert_eq!(format!("{}", PullRequestStatus::All), "all");
        }

        #[test]
        fn parse_is_case_insensitive() {
            assert_eq!("OPEN".parse(), Ok(PullRequestStatus::Open));
            assert_eq!("Merged".parse(), Ok(PullRequestStatus::Merged));
        }

        #[test]
        fn parse_unknown() {
            let err = "draft".parse::<PullRequestStatus>().unwrap_err();
            assert_eq!(err, ParseStatusError("draft".into()));
            assert!(err.to_string().contains("open, closed, merged, all"));
        }

        #[test]
        fn all_accepts_every_state() {
            for state in PullRequestStatus::all() {
                assert!(PullRequestStatus::All.accepts(*state));
            }
        }

        #[test]
        fn concrete_filter_accepts_only_itself() {
            assert!(PullRequestStatus::Open.accepts(PullRequestStatus::Open));
            assert!(!PullRequestStatus::Open.accepts(PullRequestStatus::Merged));
            assert!(!PullRequestStatus::Merged.accepts(PullRequestStatus::Closed));
        }

        #[test]
        fn serde_uses_lowercase() {
            let json = serde_json::to_string(&PullRequestStatus::Merged).unwrap();
            assert_eq!(json, "\"merged\"");
        }
    }

    mod pr_comment {
        use super::*;

        #[test]
        fn new_is_not_edited() {
            let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
            let comment = PrComment::new("LGTM", "alice", at);
            assert_eq!(comment.edited, comment.created);
            assert!(!comment.is_edited());
        }

        #[test]
        fn edited_after_creation() {
            let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
            let mut comment = PrComment::new("LGTM", "alice", at);
            comment.edited = at + chrono::Duration::minutes(5);
            assert!(comment.is_edited());
        }
    }
}
