//! forge
//!
//! Provider-agnostic access to git hosting services (GitHub, GitLab,
//! Pagure).
//!
//! # Architecture
//!
//! The [`Forge`], [`Repository`] and [`Account`] traits define the interface
//! every backend implements. Callers use the [`create_forge`] and
//! [`open_repository`] factory functions rather than importing a backend
//! directly.
//!
//! Comment listing and searching are provided methods on [`Repository`], so
//! every backend behaves identically once it can fetch a thread.
//!
//! # Modules
//!
//! - `traits`: the provider contract, request types and [`ForgeError`]
//! - [`github`]: GitHub REST v3
//! - [`gitlab`]: GitLab REST v4
//! - [`pagure`]: Pagure API 0
//! - [`mock`]: in-memory backend for deterministic testing
//! - `remote`: git remote URL parsing
//! - `factory`: forge selection and creation
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::{open_repository, CommentQuery, Literal};
//!
//! let repo = open_repository("git@github.com:owner/repo.git", token, None)?;
//! let lgtm = Literal::new("LGTM");
//! let approvals = repo
//!     .get_comments(42, CommentQuery { filter: Some(&lgtm), reverse: false })
//!     .await?;
//! println!("{} approvals", approvals.len());
//! ```

mod factory;
pub mod github;
pub mod gitlab;
mod http;
pub mod mock;
pub mod pagure;
mod remote;
mod traits;

pub use factory::{
    create_forge, create_forge_for, detect_host, detect_provider, open_repository,
    valid_forge_names, ForgeProvider,
};
pub(crate) use factory::resolve_provider_override;
pub use remote::RemoteUrl;
pub use traits::{
    Account, CommentQuery, CommentRequest, CreatePullRequest, Forge, ForgeError, FromRemoteUrl,
    InlinePosition, Repository, SearchQuery,
};

pub use crate::core::comments::{CommentMatch, CommentPattern, Literal, MatchSource};
pub use crate::core::types::{ParseStatusError, PrComment, PullRequest, PullRequestStatus};
