//! forge::remote
//!
//! Parsing of git remote URLs into `(host, namespace, repository)`.
//!
//! Supported shapes:
//! - `https://host/ns/repo.git` (and `http://`)
//! - `ssh://[user@]host[:port]/ns/repo.git`
//! - `user@host:ns/repo.git` (scp-like)
//!
//! The last path segment is the repository name; everything before it is
//! the namespace, kept verbatim so nested groups (`group/subgroup`) and
//! structured fork paths (`fork/user/rpms`) survive.

use reqwest::Url;

use super::traits::ForgeError;

/// A parsed git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// Host name, lowercase, without port
    pub host: String,
    /// Path before the repository name; may be empty
    pub namespace: String,
    /// Repository name without `.git`
    pub repo: String,
}

impl RemoteUrl {
    /// Parse a remote URL.
    ///
    /// # Example
    ///
    /// ```
    /// use polyforge::forge::RemoteUrl;
    ///
    /// let remote = RemoteUrl::parse("git@gitlab.com:group/sub/project.git").unwrap();
    /// assert_eq!(remote.host, "gitlab.com");
    /// assert_eq!(remote.namespace, "group/sub");
    /// assert_eq!(remote.repo, "project");
    /// ```
    ///
    /// # Errors
    ///
    /// `UnsupportedRemote` if the URL has no host or no repository segment.
    pub fn parse(remote_url: &str) -> Result<Self, ForgeError> {
        let unsupported = || ForgeError::UnsupportedRemote(remote_url.to_string());
        let trimmed = remote_url.trim();

        let (host, path) = if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|_| unsupported())?;
            match url.scheme() {
                "http" | "https" | "ssh" | "git" => {}
                _ => return Err(unsupported()),
            }
            let host = url.host_str().ok_or_else(unsupported)?.to_string();
            (host, url.path().to_string())
        } else {
            // scp-like: [user@]host:path
            let (authority, path) = trimmed.split_once(':').ok_or_else(unsupported)?;
            let host = authority.rsplit('@').next().unwrap_or(authority);
            if host.is_empty() || host.contains('/') || path.starts_with("//") {
                return Err(unsupported());
            }
            (host.to_string(), path.to_string())
        };

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (namespace, repo) = match path.rsplit_once('/') {
            Some((ns, repo)) => (ns.to_string(), repo.to_string()),
            None => (String::new(), path.to_string()),
        };
        if repo.is_empty() {
            return Err(unsupported());
        }

        Ok(Self {
            host: host.to_lowercase(),
            namespace,
            repo,
        })
    }

    /// `namespace/repo`, or just `repo` for a top-level project.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.repo.clone()
        } else {
            format!("{}/{}", self.namespace, self.repo)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(url: &str) -> (String, String, String) {
        let r = RemoteUrl::parse(url).unwrap();
        (r.host, r.namespace, r.repo)
    }

    fn triple(h: &str, n: &str, r: &str) -> (String, String, String) {
        (h.to_string(), n.to_string(), r.to_string())
    }

    #[test]
    fn scp_with_git_suffix() {
        assert_eq!(
            parsed("git@github.com:octocat/hello-world.git"),
            triple("github.com", "octocat", "hello-world")
        );
    }

    #[test]
    fn scp_without_git_suffix() {
        assert_eq!(
            parsed("git@github.com:octocat/hello-world"),
            triple("github.com", "octocat", "hello-world")
        );
    }

    #[test]
    fn https_with_and_without_suffix() {
        assert_eq!(
            parsed("https://github.com/octocat/hello-world.git"),
            triple("github.com", "octocat", "hello-world")
        );
        assert_eq!(
            parsed("https://github.com/octocat/hello-world/"),
            triple("github.com", "octocat", "hello-world")
        );
    }

    #[test]
    fn ssh_scheme_with_port() {
        assert_eq!(
            parsed("ssh://git@git.example.com:2222/team/tool.git"),
            triple("git.example.com", "team", "tool")
        );
    }

    #[test]
    fn nested_namespace() {
        assert_eq!(
            parsed("https://gitlab.com/group/subgroup/project.git"),
            triple("gitlab.com", "group/subgroup", "project")
        );
    }

    #[test]
    fn pagure_fork_namespace() {
        assert_eq!(
            parsed("https://src.fedoraproject.org/fork/alice/rpms/python-docker"),
            triple("src.fedoraproject.org", "fork/alice/rpms", "python-docker")
        );
    }

    #[test]
    fn top_level_project_has_empty_namespace() {
        let r = RemoteUrl::parse("https://pagure.io/ogr-tests").unwrap();
        assert_eq!(r.namespace, "");
        assert_eq!(r.repo, "ogr-tests");
        assert_eq!(r.full_name(), "ogr-tests");
    }

    #[test]
    fn host_is_lowercased() {
        assert_eq!(parsed("https://GitHub.com/o/r").0, "github.com");
    }

    #[test]
    fn repo_with_dots() {
        assert_eq!(parsed("git@github.com:owner/repo.name.git").2, "repo.name");
    }

    #[test]
    fn invalid_format() {
        for url in [
            "not a url",
            "github.com/owner/repo",
            "https://github.com/",
            "ftp://github.com/o/r",
            "",
        ] {
            assert!(
                matches!(RemoteUrl::parse(url), Err(ForgeError::UnsupportedRemote(_))),
                "{} should be rejected",
                url
            );
        }
    }
}
