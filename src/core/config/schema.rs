//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$POLYFORGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/polyforge/config.toml`
//! 3. `~/.polyforge/config.toml`
//!
//! # Validation
//!
//! Unknown keys are rejected at parse time. Forge names and URLs are
//! checked after parsing by [`ConfigFile::validate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::forge::{valid_forge_names, ForgeProvider};

/// Contents of the configuration file.
///
/// # Example
///
/// ```toml
/// default_remote = "upstream"
///
/// [instances."git.example.com"]
/// forge = "gitlab"
/// api_base = "https://git.example.com/api/v4"
/// token_env = "EXAMPLE_TOKEN"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote consulted when no URL is given (default: "origin")
    pub default_remote: Option<String>,

    /// Self-hosted or otherwise unrecognised instances, keyed by host
    pub instances: BTreeMap<String, InstanceConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.default_remote {
            if remote.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "default_remote must not be empty".into(),
                ));
            }
        }

        for (host, instance) in &self.instances {
            if host.is_empty() || host.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid instance host '{}', expected a bare host name",
                    host
                )));
            }
            instance.validate(host)?;
        }

        Ok(())
    }
}

/// Settings for one forge instance.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// Provider name: github, gitlab or pagure
    pub forge: String,

    /// API base URL, when not at the provider's usual location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Literal token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("forge", &self.forge)
            .field("api_base", &self.api_base)
            .field("has_token", &self.token.is_some())
            .field("token_env", &self.token_env)
            .finish()
    }
}

impl InstanceConfig {
    /// The configured provider, if the name is valid.
    pub fn provider(&self) -> Option<ForgeProvider> {
        ForgeProvider::parse(&self.forge)
    }

    fn validate(&self, host: &str) -> Result<(), ConfigError> {
        if self.provider().is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "invalid forge '{}' for instance '{}', must be one of: {}",
                self.forge,
                host,
                valid_forge_names().join(", ")
            )));
        }

        if let Some(base) = &self.api_base {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base for instance '{}' must be an http(s) URL, got '{}'",
                    host, base
                )));
            }
        }

        if let Some(var) = &self.token_env {
            if var.is_empty() || var.contains('=') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid token_env '{}' for instance '{}'",
                    var, host
                )));
            }
        }

        Ok(())
    }
}
