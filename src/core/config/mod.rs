//! core::config
//!
//! Configuration loading and token resolution.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$POLYFORGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/polyforge/config.toml`
//! 3. `~/.polyforge/config.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Token Resolution
//!
//! For a given host, the first available of:
//! 1. the token passed on the command line
//! 2. the instance's literal `token`
//! 3. the variable named by the instance's `token_env`
//! 4. the provider's default variable (`GITHUB_TOKEN`, `GITLAB_TOKEN`,
//!    `PAGURE_TOKEN`)
//!
//! # Example
//!
//! ```no_run
//! use polyforge::core::config::Config;
//! use polyforge::forge::ForgeProvider;
//!
//! let config = Config::load().unwrap();
//! println!("Remote: {}", config.default_remote());
//! let token = config.resolve_token("github.com", ForgeProvider::GitHub, None);
//! println!("Authenticated: {}", token.is_some());
//! ```

pub mod schema;

pub use schema::{ConfigFile, InstanceConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::forge::{detect_host, ForgeProvider};

/// Default remote name.
pub const DEFAULT_REMOTE: &str = "origin";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "POLYFORGE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults when no file exists)
    pub file: ConfigFile,
    /// Path the configuration was read from
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |name: &str| std::env::var(name).ok();
        match locate(&env, dirs::home_dir()) {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        debug!(path = %path.display(), instances = file.instances.len(), "loaded config");
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// The file the configuration came from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Remote consulted when no URL is given.
    pub fn default_remote(&self) -> &str {
        self.file.default_remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }

    /// Configured instance for a host.
    pub fn instance(&self, host: &str) -> Option<&InstanceConfig> {
        self.file.instances.get(&host.to_lowercase())
    }

    /// Provider serving a host: configured instances first, then the
    /// built-in host list.
    pub fn provider_for_host(&self, host: &str) -> Option<ForgeProvider> {
        self.instance(host)
            .and_then(InstanceConfig::provider)
            .or_else(|| detect_host(host))
    }

    /// API base override for a host.
    pub fn api_base(&self, host: &str) -> Option<&str> {
        self.instance(host).and_then(|i| i.api_base.as_deref())
    }

    /// Resolve the token for a host using the process environment.
    pub fn resolve_token(
        &self,
        host: &str,
        provider: ForgeProvider,
        cli_token: Option<&str>,
    ) -> Option<String> {
        self.resolve_token_with(host, provider, cli_token, |name| std::env::var(name).ok())
    }

    /// Resolve the token for a host with an explicit environment lookup.
    pub fn resolve_token_with<F>(
        &self,
        host: &str,
        provider: ForgeProvider,
        cli_token: Option<&str>,
        env: F,
    ) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        if let Some(token) = cli_token.map(str::to_string).and_then(non_empty) {
            debug!(host, "token from command line");
            return Some(token);
        }

        if let Some(instance) = self.instance(host) {
            if let Some(token) = instance.token.clone().and_then(non_empty) {
                debug!(host, "token from config");
                return Some(token);
            }
            if let Some(token) = instance.token_env.as_deref().and_then(&env).and_then(non_empty) {
                debug!(host, "token from instance token_env");
                return Some(token);
            }
        }

        let token = env(provider.token_env_var()).and_then(non_empty);
        if token.is_some() {
            debug!(host, var = provider.token_env_var(), "token from environment");
        }
        token
    }
}

/// First existing config file among the standard locations.
fn locate<F>(env: &F, home: Option<PathBuf>) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = Vec::new();
    if let Some(path) = env(CONFIG_ENV) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(xdg_home).join("polyforge/config.toml"));
    }
    if let Some(home) = home {
        candidates.push(home.join(".polyforge/config.toml"));
    }

    candidates.into_iter().find(|path| path.exists())
}
