//! forge::factory
//!
//! Forge selection and creation.
//!
//! # Design
//!
//! Callers use [`create_forge`] or [`open_repository`] instead of naming a
//! backend type, so provider detection lives in one place.
//!
//! # Provider Detection
//!
//! The factory detects the forge from the host of a remote URL:
//! - `github.com` → `GitHubForge`
//! - `gitlab.com` and `gitlab.*` hosts → `GitLabForge`
//! - `pagure.io`, `src.fedoraproject.org` → `PagureForge`
//!
//! Any other host needs an explicit provider, either from the caller or
//! from an `[instances]` entry in the configuration.
//!
//! # Example
//!
//! ```ignore
//! use polyforge::forge::{create_forge, open_repository};
//!
//! // Auto-detect from URL
//! let forge = create_forge("git@github.com:owner/repo.git", "ghp_token", None)?;
//!
//! // Self-hosted GitLab, provider given explicitly
//! let repo = open_repository(
//!     "https://git.example.com/team/tool.git",
//!     "glpat_token",
//!     Some("gitlab"),
//! )?;
//! ```

use tracing::debug;

use super::github::{is_github_host, GitHubForge};
use super::gitlab::{is_gitlab_host, GitLabForge};
use super::pagure::{is_pagure_host, PagureForge};
use super::remote::RemoteUrl;
use super::traits::{Forge, ForgeError, FromRemoteUrl, Repository};

/// Supported forge providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForgeProvider {
    GitHub,
    GitLab,
    Pagure,
}

impl ForgeProvider {
    /// All providers.
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::ForgeProvider;
    ///
    /// let providers = ForgeProvider::all();
    /// assert!(providers.contains(&ForgeProvider::Pagure));
    /// ```
    pub fn all() -> &'static [ForgeProvider] {
        &[
            ForgeProvider::GitHub,
            ForgeProvider::GitLab,
            ForgeProvider::Pagure,
        ]
    }

    /// The provider name as used in configuration files and `--forge`.
    pub fn name(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "github",
            ForgeProvider::GitLab => "gitlab",
            ForgeProvider::Pagure => "pagure",
        }
    }

    /// Parse a provider from a string, case-insensitively.
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::ForgeProvider;
    ///
    /// assert_eq!(ForgeProvider::parse("GitLab"), Some(ForgeProvider::GitLab));
    /// assert_eq!(ForgeProvider::parse("unknown"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(ForgeProvider::GitHub),
            "gitlab" => Some(ForgeProvider::GitLab),
            "pagure" => Some(ForgeProvider::Pagure),
            _ => None,
        }
    }

    /// Environment variable consulted for a token when nothing else
    /// provides one.
    pub fn token_env_var(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "GITHUB_TOKEN",
            ForgeProvider::GitLab => "GITLAB_TOKEN",
            ForgeProvider::Pagure => "PAGURE_TOKEN",
        }
    }
}

impl std::fmt::Display for ForgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the forge provider from a remote URL.
///
/// # Example
///
/// ```
/// use polyforge::forge::{detect_provider, ForgeProvider};
///
/// assert_eq!(
///     detect_provider("git@github.com:owner/repo.git"),
///     Some(ForgeProvider::GitHub)
/// );
/// assert_eq!(detect_provider("https://example.com/a/b"), None);
/// ```
pub fn detect_provider(remote_url: &str) -> Option<ForgeProvider> {
    let remote = RemoteUrl::parse(remote_url).ok()?;
    detect_host(&remote.host)
}

/// Detect the forge provider from a host name.
pub fn detect_host(host: &str) -> Option<ForgeProvider> {
    if is_github_host(host) {
        Some(ForgeProvider::GitHub)
    } else if is_gitlab_host(host) {
        Some(ForgeProvider::GitLab)
    } else if is_pagure_host(host) {
        Some(ForgeProvider::Pagure)
    } else {
        None
    }
}

/// Create a forge from a remote URL and token.
///
/// With `provider_override`, the URL's host is served by that provider
/// whatever its name; without it the host must be a known one.
///
/// # Errors
///
/// - `ForgeError::UnsupportedRemote` if the URL cannot be parsed or its
///   host is not recognised
/// - `ForgeError::NotFound` if the override names no known provider
pub fn create_forge(
    remote_url: &str,
    token: &str,
    provider_override: Option<&str>,
) -> Result<Box<dyn Forge>, ForgeError> {
    let remote = RemoteUrl::parse(remote_url)?;

    if let Some(name) = provider_override {
        let provider = resolve_provider_override(name)?;
        return Ok(create_forge_for(provider, &remote.host, token, None));
    }

    let provider = detect_host(&remote.host)
        .ok_or_else(|| ForgeError::UnsupportedRemote(remote_url.to_string()))?;
    debug!(host = %remote.host, %provider, "detected forge");

    Ok(match provider {
        ForgeProvider::GitHub => Box::new(GitHubForge::from_remote_url(remote_url, token)?),
        ForgeProvider::GitLab => Box::new(GitLabForge::from_remote_url(remote_url, token)?),
        ForgeProvider::Pagure => Box::new(PagureForge::from_remote_url(remote_url, token)?),
    })
}

/// Create a forge for a provider on a given host.
///
/// `api_base` overrides the provider's conventional API location for that
/// host.
pub fn create_forge_for(
    provider: ForgeProvider,
    host: &str,
    token: &str,
    api_base: Option<&str>,
) -> Box<dyn Forge> {
    let instance_url = format!("https://{}", host);
    match (provider, api_base) {
        (ForgeProvider::GitHub, Some(base)) => {
            Box::new(GitHubForge::with_api_base(token, instance_url, base))
        }
        (ForgeProvider::GitHub, None) => Box::new(GitHubForge::for_host(host, token)),
        (ForgeProvider::GitLab, Some(base)) => {
            Box::new(GitLabForge::with_api_base(token, instance_url, base))
        }
        (ForgeProvider::GitLab, None) => Box::new(GitLabForge::for_host(host, token)),
        (ForgeProvider::Pagure, Some(base)) => {
            Box::new(PagureForge::with_api_base(token, instance_url, base))
        }
        (ForgeProvider::Pagure, None) => Box::new(PagureForge::for_host(host, token)),
    }
}

/// Open the repository a remote URL points at.
///
/// # Example
///
/// ```
/// use polyforge::forge::open_repository;
///
/// let repo = open_repository("git@gitlab.com:group/sub/project.git", "", None).unwrap();
/// assert_eq!(repo.forge_name(), "gitlab");
/// assert_eq!(repo.full_name(), "group/sub/project");
/// ```
pub fn open_repository(
    remote_url: &str,
    token: &str,
    provider_override: Option<&str>,
) -> Result<Box<dyn Repository>, ForgeError> {
    let remote = RemoteUrl::parse(remote_url)?;
    let forge = create_forge(remote_url, token, provider_override)?;
    Ok(forge.repository(&remote.namespace, &remote.repo))
}

/// Resolve a provider override string to a ForgeProvider.
pub(crate) fn resolve_provider_override(name: &str) -> Result<ForgeProvider, ForgeError> {
    ForgeProvider::parse(name).ok_or_else(|| {
        ForgeError::NotFound(format!(
            "Unknown forge provider '{}'. Available providers: {}",
            name,
            valid_forge_names().join(", ")
        ))
    })
}

/// Valid forge names for configuration validation.
pub fn valid_forge_names() -> &'static [&'static str] {
    &["github", "gitlab", "pagure"]
}

#[cfg(test)]
mod tests {
    use super::*;

    mod forge_provider {
        use super::*;

        #[test]
        fn all_lists_every_provider() {
            assert_eq!(ForgeProvider::all().len(), 3);
            for provider in ForgeProvider::all() {
                assert_eq!(ForgeProvider::parse(provider.name()), Some(*provider));
            }
        }

        #[test]
        fn parse_is_case_insensitive() {
            assert_eq!(ForgeProvider::parse("github"), Some(ForgeProvider::GitHub));
            assert_eq!(ForgeProvider::parse("GitHub"), Some(ForgeProvider::GitHub));
            assert_eq!(ForgeProvider::parse("PAGURE"), Some(ForgeProvider::Pagure));
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(ForgeProvider::parse("unknown"), None);
            assert_eq!(ForgeProvider::parse(""), None);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ForgeProvider::GitLab), "gitlab");
        }

        #[test]
        fn token_env_vars() {
            assert_eq!(ForgeProvider::GitHub.token_env_var(), "GITHUB_TOKEN");
            assert_eq!(ForgeProvider::Pagure.token_env_var(), "PAGURE_TOKEN");
        }
    }

    mod detect_provider {
        use super::*;

        #[test]
        fn known_hosts() {
            let cases = [
                ("git@github.com:owner/repo.git", ForgeProvider::GitHub),
                ("https://github.com/owner/repo", ForgeProvider::GitHub),
                ("git@gitlab.com:group/project.git", ForgeProvider::GitLab),
                ("https://gitlab.gnome.org/GNOME/gtk", ForgeProvider::GitLab),
                ("https://pagure.io/ogr-tests.git", ForgeProvider::Pagure),
                (
                    "ssh://git@src.fedoraproject.org/rpms/python-docker.git",
                    ForgeProvider::Pagure,
                ),
            ];
            for (url, expected) in cases {
                assert_eq!(detect_provider(url), Some(expected), "{}", url);
            }
        }

        #[test]
        fn unknown_url() {
            assert_eq!(detect_provider("git@unknown.com:owner/repo.git"), None);
            assert_eq!(detect_provider("not a url"), None);
        }
    }

    mod create_forge {
        use super::*;

        #[test]
        fn auto_detect() {
            let forge = create_forge("git@github.com:owner/repo.git", "token", None).unwrap();
            assert_eq!(forge.name(), "github");
            let forge = create_forge("https://pagure.io/ogr-tests", "token", None).unwrap();
            assert_eq!(forge.name(), "pagure");
            assert_eq!(forge.instance_url(), "https://pagure.io");
        }

        #[test]
        fn override_serves_unknown_host() {
            let forge =
                create_forge("https://git.example.com/team/tool.git", "t", Some("gitlab")).unwrap();
            assert_eq!(forge.name(), "gitlab");
            assert_eq!(forge.instance_url(), "https://git.example.com");
        }

        #[test]
        fn unknown_host_is_unsupported() {
            let result = create_forge("git@unknown.com:owner/repo.git", "token", None);
            assert!(matches!(result, Err(ForgeError::UnsupportedRemote(_))));
        }

        #[test]
        fn unknown_provider_override_is_not_found() {
            let result = create_forge("git@github.com:owner/repo.git", "token", Some("bitbucket"));
            match result {
                Err(ForgeError::NotFound(msg)) => assert!(msg.contains("github, gitlab, pagure")),
                other => panic!("expected NotFound, got {:?}", other.map(|f| f.name())),
            }
        }

        #[test]
        fn explicit_api_base() {
            let forge = create_forge_for(
                ForgeProvider::Pagure,
                "pagure.example.org",
                "t",
                Some("http://localhost:8080/api/0"),
            );
            assert_eq!(forge.instance_url(), "https://pagure.example.org");
        }
    }

    mod open_repository {
        use super::*;

        #[test]
        fn splits_namespace_and_name() {
            let repo =
                open_repository("https://src.fedoraproject.org/fork/alice/rpms/python-docker", "", None)
                    .unwrap();
            assert_eq!(repo.forge_name(), "pagure");
            assert_eq!(repo.namespace(), "fork/alice/rpms");
            assert_eq!(repo.name(), "python-docker");
        }

        #[test]
        fn rejects_garbage() {
            assert!(matches!(
                open_repository("nonsense", "", None),
                Err(ForgeError::UnsupportedRemote(_))
            ));
        }
    }

    #[test]
    fn valid_forge_names_cover_providers() {
        for provider in ForgeProvider::all() {
            assert!(valid_forge_names().contains(&provider.name()));
        }
    }
}
