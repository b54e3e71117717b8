//! cli::commands::pulls
//!
//! Pull request commands: `prs`, `show`, `create`, `close`, `merge`.

use anyhow::Result;

use super::{block_on, print_json, Context};
use crate::core::types::{PullRequest, PullRequestStatus};
use crate::forge::CreatePullRequest;

/// List pull requests in a state.
pub fn prs(ctx: &Context, status: PullRequestStatus) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let prs = repo.list_pull_requests(status).await?;

        if ctx.json {
            return print_json(&prs);
        }
        if prs.is_empty() {
            println!("No {} pull requests.", status);
        }
        for pr in &prs {
            println!("{}", summary_line(pr));
        }
        Ok(())
    })
}

/// Show one pull request, optionally opening it in a browser.
pub fn show(ctx: &Context, id: u64, open_in_browser: bool) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let pr = repo.get_pull_request(id).await?;

        if ctx.json {
            print_json(&pr)?;
        } else {
            print_details(&pr);
        }

        if open_in_browser {
            if let Err(e) = open::that(&pr.url) {
                // Fall back to printing
                eprintln!("Could not open browser: {}", e);
                println!("{}", pr.url);
            }
        }
        Ok(())
    })
}

/// Open a pull request.
pub fn create(
    ctx: &Context,
    title: String,
    body: String,
    target: String,
    source: String,
) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let pr = repo
            .create_pull_request(CreatePullRequest {
                title,
                body,
                target_branch: target,
                source_branch: source,
            })
            .await?;

        if ctx.json {
            return print_json(&pr);
        }
        println!("Created #{}: {}", pr.id, pr.url);
        Ok(())
    })
}

/// Close a pull request without merging.
pub fn close(ctx: &Context, id: u64) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let pr = repo.close_pull_request(id).await?;
        report_transition(ctx, &pr)
    })
}

/// Merge a pull request.
pub fn merge(ctx: &Context, id: u64) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let pr = repo.merge_pull_request(id).await?;
        report_transition(ctx, &pr)
    })
}

fn report_transition(ctx: &Context, pr: &PullRequest) -> Result<()> {
    if ctx.json {
        return print_json(pr);
    }
    println!("#{} is now {}", pr.id, pr.status);
    Ok(())
}

fn summary_line(pr: &PullRequest) -> String {
    format!(
        "#{:<5} [{}] {} ({} -> {}) by {}",
        pr.id, pr.status, pr.title, pr.source_branch, pr.target_branch, pr.author
    )
}

fn print_details(pr: &PullRequest) {
    println!("#{} {}", pr.id, pr.title);
    println!("  status:  {}", pr.status);
    println!("  author:  {}", pr.author);
    println!("  branch:  {} -> {}", pr.source_branch, pr.target_branch);
    println!("  created: {}", pr.created.format("%Y-%m-%d %H:%M UTC"));
    println!("  url:     {}", pr.url);
    if !pr.description.is_empty() {
        println!();
        for line in pr.description.lines() {
            println!("    {}", line);
        }
    }
}
