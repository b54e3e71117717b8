//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves the target repository through [`Context`]
//! 2. Calls the forge library
//! 3. Formats and displays output (text, or JSON with `--json`)
//!
//! # Async Commands
//!
//! Forge calls are async because they involve network I/O. Handlers are
//! synchronous wrappers that drive their async implementation on a Tokio
//! runtime with `block_on`.

mod comments;
mod completion;
mod pulls;
mod repo;

pub use comments::{comment, comments, search};
pub use completion::completion;
pub use pulls::{close, create, merge, prs, show};
pub use repo::{branches, fork, info, whoami};

use std::future::Future;
use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use serde::Serialize;
use tracing::debug;

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::forge::{
    create_forge_for, resolve_provider_override, Forge, ForgeError, RemoteUrl, Repository,
};
use crate::git::Git;

/// Everything a handler needs besides its own arguments.
pub struct Context {
    /// Directory to look for a local checkout in
    pub cwd: Option<PathBuf>,
    /// Print JSON instead of text
    pub json: bool,
    /// Token given on the command line
    pub token: Option<String>,
    /// Provider override
    pub forge: Option<String>,
    /// Remote URL or remote name
    pub remote: Option<String>,
    /// Loaded configuration
    pub config: Config,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cwd", &self.cwd)
            .field("json", &self.json)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("forge", &self.forge)
            .field("remote", &self.remote)
            .field("config", &self.config)
            .finish()
    }
}

impl Context {
    /// URL of the repository to act on.
    ///
    /// `--remote` may be a URL, used as is, or the name of a remote in the
    /// local checkout. Without it, the configured default remote (or the
    /// checkout's first remote) is used.
    pub fn remote_url(&self) -> Result<String> {
        if let Some(remote) = &self.remote {
            if RemoteUrl::parse(remote).is_ok() {
                return Ok(remote.clone());
            }
        }

        let cwd = match &self.cwd {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let git = Git::open(&cwd)
            .context("not in a git checkout; pass --remote with a repository URL")?;

        let name = match &self.remote {
            Some(name) => name.clone(),
            None => git
                .default_remote(self.config.default_remote())?
                .ok_or_else(|| anyhow!("no remotes configured in {}", git.git_dir().display()))?,
        };

        git.remote_url(&name)?
            .ok_or_else(|| anyhow!("remote '{}' not found", name))
    }

    /// Forge serving the remote, with the resolved token.
    pub fn open_forge(&self) -> Result<(Box<dyn Forge>, RemoteUrl)> {
        let url = self.remote_url()?;
        let remote = RemoteUrl::parse(&url)?;

        let provider = match &self.forge {
            Some(name) => resolve_provider_override(name)?,
            None => self
                .config
                .provider_for_host(&remote.host)
                .ok_or_else(|| ForgeError::UnsupportedRemote(url.clone()))?,
        };

        let token = self
            .config
            .resolve_token(&remote.host, provider, self.token.as_deref())
            .unwrap_or_default();
        debug!(%provider, host = %remote.host, has_token = !token.is_empty(), "opening forge");

        let forge = create_forge_for(
            provider,
            &remote.host,
            &token,
            self.config.api_base(&remote.host),
        );
        Ok((forge, remote))
    }

    /// Repository the remote points at.
    pub fn open_repository(&self) -> Result<Box<dyn Repository>> {
        let (forge, remote) = self.open_forge()?;
        Ok(forge.repository(&remote.namespace, &remote.repo))
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Whoami => whoami(ctx),
        Command::Info => info(ctx),
        Command::Branches => branches(ctx),
        Command::Prs { status } => prs(ctx, status),
        Command::Show { id, open } => show(ctx, id, open),
        Command::Create {
            title,
            body,
            target,
            source,
        } => create(ctx, title, body, target, source),
        Command::Comments {
            id,
            filter,
            fixed_strings,
            reverse,
        } => comments(ctx, id, filter.as_deref(), fixed_strings, reverse),
        Command::Search {
            id,
            pattern,
            fixed_strings,
            reverse,
            no_description,
        } => search(ctx, id, &pattern, fixed_strings, reverse, !no_description),
        Command::Comment {
            id,
            body,
            commit,
            file,
            row,
        } => comment(ctx, id, body, commit, file, row),
        Command::Close { id } => close(ctx, id),
        Command::Merge { id } => merge(ctx, id),
        Command::Fork => fork(ctx),
        Command::Completion { shell } => completion(shell),
    }
}

/// Run an async handler to completion.
fn block_on<F>(future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

/// Print a value as pretty JSON.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
