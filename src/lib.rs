//! Polyforge - one contract for repositories, pull requests and comments
//! across GitHub, GitLab and Pagure
//!
//! Callers write against the [`forge::Forge`], [`forge::Repository`] and
//! [`forge::Account`] traits. Each backend maps its provider's REST API onto
//! the same records ([`forge::PullRequest`], [`forge::PrComment`]) and the
//! same error type ([`forge::ForgeError`]). Comment filtering and search are
//! implemented once, on top of each backend's raw comment fetch.
//!
//! # Architecture
//!
//! - [`forge`] - Traits, backends (GitHub, GitLab, Pagure, in-memory mock)
//!   and remote URL detection
//! - [`core`] - Shared records, the comment engine and configuration
//! - [`git`] - Remote lookup in a local checkout
//! - [`cli`] - The `polyforge` command line
//!
//! # Example
//!
//! ```no_run
//! use polyforge::forge::{open_repository, CommentQuery, Literal};
//!
//! # async fn demo() -> Result<(), polyforge::forge::ForgeError> {
//! let repo = open_repository("https://github.com/rust-lang/rust", "token", None)?;
//! let needle = Literal::new("LGTM");
//! let approvals = repo
//!     .get_comments(42, CommentQuery { filter: Some(&needle), reverse: false })
//!     .await?;
//! println!("{} approvals", approvals.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod forge;
pub mod git;
