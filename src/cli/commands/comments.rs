//! cli::commands::comments
//!
//! Comment commands: `comments`, `search`, `comment`.

use anyhow::{Context as _, Result};
use regex::Regex;

use super::{block_on, print_json, Context};
use crate::core::comments::{CommentMatch, CommentPattern, Literal, MatchSource};
use crate::core::types::PrComment;
use crate::forge::{CommentQuery, CommentRequest, SearchQuery};

/// Build a pattern from the command line: a regex, or a plain substring
/// with `-F`.
fn pattern(text: &str, fixed_strings: bool) -> Result<Box<dyn CommentPattern>> {
    if fixed_strings {
        Ok(Box::new(Literal::new(text)))
    } else {
        let re = Regex::new(text).with_context(|| format!("invalid pattern '{}'", text))?;
        Ok(Box::new(re))
    }
}

/// List comments on a pull request.
pub fn comments(
    ctx: &Context,
    id: u64,
    filter: Option<&str>,
    fixed_strings: bool,
    reverse: bool,
) -> Result<()> {
    let filter = filter.map(|f| pattern(f, fixed_strings)).transpose()?;

    block_on(async {
        let repo = ctx.open_repository()?;
        let comments = repo
            .get_comments(
                id,
                CommentQuery {
                    filter: filter.as_deref(),
                    reverse,
                },
            )
            .await?;

        if ctx.json {
            return print_json(&comments);
        }
        if comments.is_empty() {
            println!("No comments.");
        }
        for comment in &comments {
            print_comment(comment);
        }
        Ok(())
    })
}

/// Print the first match of a pattern in a pull request.
pub fn search(
    ctx: &Context,
    id: u64,
    text: &str,
    fixed_strings: bool,
    reverse: bool,
    include_description: bool,
) -> Result<()> {
    let pattern = pattern(text, fixed_strings)?;

    block_on(async {
        let repo = ctx.open_repository()?;
        let found = repo
            .search_in_pull_request(
                id,
                SearchQuery::new(pattern.as_ref())
                    .reverse(reverse)
                    .include_description(include_description),
            )
            .await?;

        if ctx.json {
            return print_json(&found);
        }
        match found {
            Some(hit) => print_match(&hit),
            None => println!("No match."),
        }
        Ok(())
    })
}

/// Post a comment, inline when a position is given.
pub fn comment(
    ctx: &Context,
    id: u64,
    body: String,
    commit: Option<String>,
    file: Option<String>,
    row: Option<u64>,
) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let posted = repo
            .post_comment(
                id,
                CommentRequest {
                    body,
                    commit,
                    filename: file,
                    row,
                },
            )
            .await?;

        if ctx.json {
            return print_json(&posted);
        }
        println!("Commented on #{} as {}", id, posted.author);
        Ok(())
    })
}

fn print_comment(comment: &PrComment) {
    let edited = if comment.is_edited() { " (edited)" } else { "" };
    println!(
        "{} at {}{}:",
        comment.author,
        comment.created.format("%Y-%m-%d %H:%M UTC"),
        edited
    );
    for line in comment.body.lines() {
        println!("    {}", line);
    }
    println!();
}

fn print_match(hit: &CommentMatch) {
    match &hit.source {
        MatchSource::Description => println!("Found in description: {}", hit.as_str()),
        MatchSource::Comment(comment) => println!(
            "Found in comment by {} at {}: {}",
            comment.author,
            comment.created.format("%Y-%m-%d %H:%M UTC"),
            hit.as_str()
        ),
    }
}
