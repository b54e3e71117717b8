//! Read-only checks against real forge instances.
//!
//! Enabled with the `live_forge_tests` feature. Each test skips itself unless
//! `POLYFORGE_TEST_REMOTE` names a repository and the provider's token
//! variable (`GITHUB_TOKEN`, `GITLAB_TOKEN` or `PAGURE_TOKEN`) is set.

#![cfg(feature = "live_forge_tests")]

use polyforge::forge::{
    detect_provider, open_repository, CommentQuery, ForgeError, PullRequestStatus, Repository,
};

fn live_repository() -> Option<Box<dyn Repository>> {
    let Ok(remote) = std::env::var("POLYFORGE_TEST_REMOTE") else {
        eprintln!("Skipping: POLYFORGE_TEST_REMOTE not set");
        return None;
    };
    let provider = detect_provider(&remote)?;
    let Ok(token) = std::env::var(provider.token_env_var()) else {
        eprintln!("Skipping: {} not set", provider.token_env_var());
        return None;
    };
    open_repository(&remote, &token, None).ok()
}

#[tokio::test]
async fn live_nonexistent_pull_request() {
    let Some(repo) = live_repository() else {
        return;
    };

    let err = repo.get_pull_request(999_999_999).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
}

#[tokio::test]
async fn live_listing_and_comments() {
    let Some(repo) = live_repository() else {
        return;
    };

    let prs = repo
        .list_pull_requests(PullRequestStatus::All)
        .await
        .unwrap();
    let Some(pr) = prs.first() else {
        eprintln!("Skipping: repository has no pull requests");
        return;
    };

    let native = repo.fetch_all_comments(pr.id).await.unwrap();
    let listed = repo
        .get_comments(pr.id, CommentQuery::default())
        .await
        .unwrap();
    assert_eq!(listed, native);
}

#[tokio::test]
async fn live_branches_not_empty() {
    let Some(repo) = live_repository() else {
        return;
    };

    assert!(!repo.branches().await.unwrap().is_empty());
}
