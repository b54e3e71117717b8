//! git::interface
//!
//! Git interface implementation using git2.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::Internal`]: Any other libgit2 failure

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Handle on a local repository.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository. Bare
    /// repositories are accepted.
    ///
    /// # Errors
    ///
    /// [`GitError::NotARepo`] if no repository is found.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        debug!(git_dir = %repo.path().display(), "opened repository");
        Ok(Self { repo })
    }

    /// Path of the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Names of all configured remotes.
    pub fn remote_names(&self) -> Result<Vec<String>, GitError> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(String::from).collect())
    }

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Pick the remote to act on.
    ///
    /// Prefers `preferred`, then "origin", then the first remote. Returns
    /// `None` if no remotes exist.
    pub fn default_remote(&self, preferred: &str) -> Result<Option<String>, GitError> {
        let names = self.remote_names()?;
        for wanted in [preferred, "origin"] {
            if names.iter().any(|n| n == wanted) {
                return Ok(Some(wanted.to_string()));
            }
        }
        Ok(names.into_iter().next())
    }
}
