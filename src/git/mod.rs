//! git
//!
//! Read access to the local checkout.
//!
//! # Architecture
//!
//! This module is the only place that imports `git2`. The rest of the crate
//! asks it for remote names and URLs, which is all a forge client needs to
//! find "the current repository" on its forge.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! if let Some(remote) = git.default_remote("origin")? {
//!     println!("{} -> {:?}", remote, git.remote_url(&remote)?);
//! }
//! ```

mod interface;

pub use interface::{Git, GitError};
