//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--json`: Machine-readable output
//! - `--token <token>`: Forge token, overriding config and environment
//! - `--forge <name>`: Provider for the remote's host
//! - `--remote <url|name>`: Remote URL, or name of a remote in the checkout

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::types::PullRequestStatus;

/// polyforge - one command line for GitHub, GitLab and Pagure
#[derive(Parser, Debug)]
#[command(name = "polyforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if polyforge was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print records as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Forge API token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Forge provider for the remote's host (github, gitlab, pagure)
    #[arg(long, global = true, value_name = "NAME")]
    pub forge: Option<String>,

    /// Remote URL, or the name of a remote in the local checkout
    #[arg(long, global = true, value_name = "URL|NAME")]
    pub remote: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the authenticated account
    Whoami,

    /// Show repository details
    #[command(
        long_about = "Show repository details.\n\n\
            Prints the full name, description, whether the repository is a fork, \
            whether you already own a fork of it, and its clone URLs."
    )]
    Info,

    /// List branches
    Branches,

    /// List pull requests
    Prs {
        /// Only pull requests in this state
        #[arg(long, default_value = "open")]
        status: PullRequestStatus,
    },

    /// Show one pull request
    Show {
        /// Pull request id
        id: u64,

        /// Open the pull request in a browser
        #[arg(long)]
        open: bool,
    },

    /// Open a pull request
    Create {
        /// Title
        #[arg(long)]
        title: String,

        /// Description
        #[arg(long, default_value = "")]
        body: String,

        /// Branch to merge into
        #[arg(long)]
        target: String,

        /// Branch with the changes
        #[arg(long)]
        source: String,
    },

    /// List comments on a pull request
    #[command(
        long_about = "List comments on a pull request.\n\n\
            Comments are printed oldest first. With --reverse the order is newest \
            first. With --filter only comments whose body matches the pattern are \
            printed; the order is kept.",
        after_help = "\
EXAMPLES:
    # Every comment
    polyforge comments 42

    # Newest retest request first
    polyforge comments 42 --filter '^/retest' --reverse"
    )]
    Comments {
        /// Pull request id
        id: u64,

        /// Only comments whose body matches this pattern
        #[arg(long, value_name = "PATTERN")]
        filter: Option<String>,

        /// Treat the pattern as a plain substring
        #[arg(short = 'F', long)]
        fixed_strings: bool,

        /// Newest first
        #[arg(long)]
        reverse: bool,
    },

    /// Find the first match of a pattern in a pull request
    #[command(
        long_about = "Find the first match of a pattern in a pull request.\n\n\
            The description is examined before any comment, then comments from \
            oldest to newest. With --reverse comments are examined newest first and \
            the description last.",
        after_help = "\
EXAMPLES:
    # Which commit did the bot report?
    polyforge search 42 'built commit ([0-9a-f]{7,40})' --reverse

    # Ignore the description
    polyforge search 42 LGTM -F --no-description"
    )]
    Search {
        /// Pull request id
        id: u64,

        /// Pattern to look for
        pattern: String,

        /// Treat the pattern as a plain substring
        #[arg(short = 'F', long)]
        fixed_strings: bool,

        /// Examine the newest comment first and the description last
        #[arg(long)]
        reverse: bool,

        /// Do not examine the description
        #[arg(long)]
        no_description: bool,
    },

    /// Comment on a pull request
    Comment {
        /// Pull request id
        id: u64,

        /// Comment body
        body: String,

        /// Commit an inline comment refers to
        #[arg(long)]
        commit: Option<String>,

        /// File an inline comment refers to
        #[arg(long)]
        file: Option<String>,

        /// Line an inline comment refers to
        #[arg(long)]
        row: Option<u64>,
    },

    /// Close a pull request without merging
    Close {
        /// Pull request id
        id: u64,
    },

    /// Merge a pull request
    Merge {
        /// Pull request id
        id: u64,
    },

    /// Fork the repository into your account
    Fork,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
