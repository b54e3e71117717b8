//! cli::commands::repo
//!
//! Repository and account commands: `whoami`, `info`, `branches`, `fork`.

use anyhow::Result;
use serde_json::json;

use super::{block_on, print_json, Context};

/// Print the authenticated account's username.
pub fn whoami(ctx: &Context) -> Result<()> {
    block_on(async {
        let (forge, _) = ctx.open_forge()?;
        let username = forge.current_account().username().await?;

        if ctx.json {
            print_json(&json!({ "forge": forge.name(), "username": username }))
        } else {
            println!("{}", username);
            Ok(())
        }
    })
}

/// Print repository details.
pub fn info(ctx: &Context) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let description = repo.description().await?;
        let is_fork = repo.is_fork().await?;
        let is_forked = repo.is_forked().await?;
        let urls = repo.git_urls().await?;

        if ctx.json {
            return print_json(&json!({
                "forge": repo.forge_name(),
                "instance_url": repo.instance_url(),
                "full_name": repo.full_name(),
                "description": description,
                "is_fork": is_fork,
                "is_forked": is_forked,
                "git_urls": urls,
            }));
        }

        println!("{} ({})", repo.full_name(), repo.instance_url());
        if !description.is_empty() {
            println!("  {}", description);
        }
        println!("  fork:      {}", yes_no(is_fork));
        println!("  forked:    {}", yes_no(is_forked));
        for (kind, url) in &urls {
            println!("  {:<10} {}", format!("{}:", kind), url);
        }
        Ok(())
    })
}

/// List branch names.
pub fn branches(ctx: &Context) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let branches = repo.branches().await?;

        if ctx.json {
            return print_json(&branches);
        }
        for branch in branches {
            println!("{}", branch);
        }
        Ok(())
    })
}

/// Fork the repository and print where the fork lives.
pub fn fork(ctx: &Context) -> Result<()> {
    block_on(async {
        let repo = ctx.open_repository()?;
        let fork = repo.fork().await?;
        let urls = fork.git_urls().await?;

        if ctx.json {
            return print_json(&json!({
                "full_name": fork.full_name(),
                "git_urls": urls,
            }));
        }

        println!("Forked {} to {}", repo.full_name(), fork.full_name());
        for (kind, url) in &urls {
            println!("  {:<10} {}", format!("{}:", kind), url);
        }
        Ok(())
    })
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
