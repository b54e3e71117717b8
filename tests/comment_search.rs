//! Comment listing and search through the `Repository` default methods,
//! driven by the in-memory forge.

use polyforge::forge::mock::{FailOn, MockForge, MockOperation};
use polyforge::forge::{
    CommentQuery, Forge, ForgeError, Literal, MatchSource, Repository, SearchQuery,
};
use regex::Regex;

const NS: &str = "packit";
const REPO: &str = "ogr";

/// A forge holding one pull request with the given description and thread.
fn forge_with(description: &str, thread: &[&str]) -> (MockForge, u64) {
    let forge = MockForge::new();
    let pr = forge.add_pull_request(NS, REPO, "Under test", description);
    for (i, body) in thread.iter().enumerate() {
        forge.add_comment(NS, REPO, pr.id, &format!("user{}", i), body);
    }
    forge.clear_operations();
    (forge, pr.id)
}

fn bodies(comments: &[polyforge::forge::PrComment]) -> Vec<&str> {
    comments.iter().map(|c| c.body.as_str()).collect()
}

mod get_comments {
    use super::*;

    #[tokio::test]
    async fn unfiltered_matches_native_order() {
        let (forge, id) = forge_with("", &["one", "two", "three"]);
        let repo = forge.repository(NS, REPO);

        let native = repo.fetch_all_comments(id).await.unwrap();
        let listed = repo.get_comments(id, CommentQuery::default()).await.unwrap();
        assert_eq!(listed, native);
        assert_eq!(bodies(&listed), ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn reverse_then_filter() {
        let (forge, id) = forge_with("", &["ci: passed", "lgtm", "ci: failed"]);
        let repo = forge.repository(NS, REPO);

        let ci = Regex::new("^ci:").unwrap();
        let listed = repo
            .get_comments(
                id,
                CommentQuery {
                    filter: Some(&ci),
                    reverse: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(bodies(&listed), ["ci: failed", "ci: passed"]);
    }

    #[tokio::test]
    async fn matching_is_case_sensitive() {
        let (forge, id) = forge_with("", &["LGTM", "lgtm"]);
        let repo = forge.repository(NS, REPO);

        let needle = Literal::new("lgtm");
        let listed = repo
            .get_comments(
                id,
                CommentQuery {
                    filter: Some(&needle),
                    reverse: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(bodies(&listed), ["lgtm"]);
    }

    #[tokio::test]
    async fn empty_thread_is_empty_not_error() {
        let (forge, id) = forge_with("", &[]);
        let listed = forge
            .repository(NS, REPO)
            .get_comments(id, CommentQuery::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn no_filter_match_is_empty() {
        let (forge, id) = forge_with("", &["a", "b"]);
        let needle = Literal::new("zzz");
        let listed = forge
            .repository(NS, REPO)
            .get_comments(
                id,
                CommentQuery {
                    filter: Some(&needle),
                    reverse: false,
                },
            )
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn fetch_error_propagates_unchanged() {
        let (forge, id) = forge_with("", &["a"]);
        let forge = forge.fail_on(FailOn::FetchComments(ForgeError::NetworkError(
            "connection reset".into(),
        )));
        let err = forge
            .repository(NS, REPO)
            .get_comments(id, CommentQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err, ForgeError::NetworkError("connection reset".into()));
    }
}

mod search {
    use super::*;

    #[tokio::test]
    async fn first_occurrence_in_scan_direction() {
        let (forge, id) = forge_with("", &["alpha", "beta-match", "gamma-match"]);
        let repo = forge.repository(NS, REPO);
        let pattern = Regex::new("match").unwrap();

        let forward = repo
            .search_in_pull_request(id, SearchQuery::new(&pattern).include_description(false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forward.haystack, "beta-match");

        let backward = repo
            .search_in_pull_request(
                id,
                SearchQuery::new(&pattern)
                    .reverse(true)
                    .include_description(false),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(backward.haystack, "gamma-match");
    }

    #[tokio::test]
    async fn description_examined_first_on_forward_scan() {
        let (forge, id) = forge_with("desc-match", &["alpha"]);
        let pattern = Regex::new("match").unwrap();

        let found = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.source, MatchSource::Description);
        assert_eq!(found.haystack, "desc-match");
        assert_eq!(found.as_str(), "match");
    }

    #[tokio::test]
    async fn description_examined_last_on_reverse_scan() {
        let (forge, id) = forge_with("desc-match", &["match-x"]);
        let pattern = Regex::new("match").unwrap();

        let found = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern).reverse(true))
            .await
            .unwrap()
            .unwrap();
        match found.source {
            MatchSource::Comment(comment) => assert_eq!(comment.body, "match-x"),
            MatchSource::Description => panic!("description should be examined last"),
        }
    }

    #[tokio::test]
    async fn no_match_is_none() {
        let (forge, id) = forge_with("nothing here", &["a", "b"]);
        let pattern = Literal::new("zzz-nonexistent");

        let found = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn empty_thread_without_description_never_matches() {
        let (forge, id) = forge_with("would match", &[]);
        let pattern = Regex::new("").unwrap();

        let found = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern).include_description(false))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn empty_thread_still_searches_description() {
        let (forge, id) = forge_with("only the description", &[]);
        let pattern = Literal::new("description");

        let found = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.source, MatchSource::Description);
    }

    #[tokio::test]
    async fn description_fetched_only_when_included() {
        let (forge, id) = forge_with("desc", &["x"]);
        let pattern = Literal::new("x");
        let repo = forge.repository(NS, REPO);

        repo.search_in_pull_request(id, SearchQuery::new(&pattern).include_description(false))
            .await
            .unwrap();
        assert!(!forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::GetPullRequest { .. })));

        forge.clear_operations();
        repo.search_in_pull_request(id, SearchQuery::new(&pattern))
            .await
            .unwrap();
        assert!(forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::GetPullRequest { id: got, .. } if *got == id)));
    }

    #[tokio::test]
    async fn description_error_propagates() {
        let (forge, id) = forge_with("desc", &["x"]);
        let forge = forge.fail_on(FailOn::GetPullRequest(ForgeError::NotFound(
            "pull request".into(),
        )));
        let pattern = Literal::new("nope");

        let err = forge
            .repository(NS, REPO)
            .search_in_pull_request(id, SearchQuery::new(&pattern))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn boxed_repository_uses_same_engine() {
        let (forge, id) = forge_with("", &["first hit", "second hit"]);
        let repo: Box<dyn Repository> = forge.repository(NS, REPO);
        let pattern = Literal::new("hit");

        let found = repo
            .search_in_pull_request(id, SearchQuery::new(&pattern).reverse(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.haystack, "second hit");
    }
}
