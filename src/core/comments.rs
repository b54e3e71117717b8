//! core::comments
//!
//! Filtering and searching of pull-request discussion threads.
//!
//! # Design
//!
//! Everything here is pure computation over already-fetched data. The
//! [`Repository`](crate::forge::Repository) default methods fetch comments
//! through the backend and hand them to these functions, so the ordering and
//! matching rules live in exactly one place.
//!
//! Patterns are opaque: anything implementing [`CommentPattern`] can drive a
//! filter or a search. Matching is unanchored (a hit anywhere in the text
//! qualifies) and performs no normalisation of its own.
//!
//! # Example
//!
//! ```
//! use polyforge::core::comments::{find_first, search_candidates, MatchSource};
//! use regex::Regex;
//!
//! let pattern = Regex::new("match").unwrap();
//! let candidates = search_candidates(Vec::new(), Some("desc-match".to_string()), false);
//! let found = find_first(candidates, &pattern).unwrap();
//! assert_eq!(found.source, MatchSource::Description);
//! assert_eq!(found.as_str(), "match");
//! ```

use std::ops::Range;

use serde::Serialize;
use tracing::trace;

use super::types::PrComment;

/// Something that can locate a match inside comment text.
pub trait CommentPattern: Send + Sync {
    /// Byte range of the first match in `text`, if any.
    fn find(&self, text: &str) -> Option<Range<usize>>;

    /// Whether `text` contains a match anywhere.
    fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }
}

impl CommentPattern for regex::Regex {
    fn find(&self, text: &str) -> Option<Range<usize>> {
        regex::Regex::find(self, text).map(|m| m.range())
    }

    fn is_match(&self, text: &str) -> bool {
        regex::Regex::is_match(self, text)
    }
}

/// Plain, case-sensitive substring pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal(pub String);

impl Literal {
    pub fn new(needle: impl Into<String>) -> Self {
        Self(needle.into())
    }
}

impl CommentPattern for Literal {
    fn find(&self, text: &str) -> Option<Range<usize>> {
        text.find(&self.0).map(|start| start..start + self.0.len())
    }
}

/// Where a search candidate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "comment", rename_all = "lowercase")]
pub enum MatchSource {
    /// The pull request description
    Description,
    /// A comment in the discussion thread
    Comment(PrComment),
}

/// One piece of text examined by a search, in scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub source: MatchSource,
    pub text: String,
}

/// First match found by [`find_first`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentMatch {
    /// Where the matching text came from
    pub source: MatchSource,
    /// The full candidate text the pattern was applied to
    pub haystack: String,
    /// Byte range of the match within `haystack`
    pub range: Range<usize>,
}

impl CommentMatch {
    /// The matched text.
    pub fn as_str(&self) -> &str {
        &self.haystack[self.range.clone()]
    }
}

/// Keep only the comments whose body matches `pattern`, preserving order.
pub fn filter_comments(comments: Vec<PrComment>, pattern: &dyn CommentPattern) -> Vec<PrComment> {
    let before = comments.len();
    let kept: Vec<PrComment> = comments
        .into_iter()
        .filter(|c| pattern.is_match(&c.body))
        .collect();
    trace!(before, after = kept.len(), "filtered comments");
    kept
}

/// Build the ordered candidate list for a search.
///
/// `comments` must already be in scan order (reversed by the caller when
/// `reverse` is set). The description, when present, is examined first on a
/// forward scan and last on a reverse scan: it is logically the oldest entry
/// of the thread.
pub fn search_candidates(
    comments: Vec<PrComment>,
    description: Option<String>,
    reverse: bool,
) -> Vec<SearchCandidate> {
    let mut candidates: Vec<SearchCandidate> = comments
        .into_iter()
        .map(|c| SearchCandidate {
            text: c.body.clone(),
            source: MatchSource::Comment(c),
        })
        .collect();

    if let Some(text) = description {
        let entry = SearchCandidate {
            source: MatchSource::Description,
            text,
        };
        if reverse {
            candidates.push(entry);
        } else {
            candidates.insert(0, entry);
        }
    }

    candidates
}

/// Scan candidates in order and return the first match.
///
/// Absence of a match is a normal outcome, not an error.
pub fn find_first(
    candidates: Vec<SearchCandidate>,
    pattern: &dyn CommentPattern,
) -> Option<CommentMatch> {
    candidates.into_iter().find_map(|candidate| {
        pattern.find(&candidate.text).map(|range| CommentMatch {
            source: candidate.source,
            haystack: candidate.text,
            range,
        })
    })
}
