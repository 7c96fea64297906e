//! Runtime configuration.
//!
//! Values come from the process environment (optionally seeded from a
//! `.env` file by `main`) and can be overridden by command-line flags.
//!
//! | variable                     | default   |
//! |------------------------------|-----------|
//! | `SCOREBOOK_HOST`             | `0.0.0.0` |
//! | `SCOREBOOK_PORT`             | `3000`    |
//! | `SCOREBOOK_SNAPSHOT`         | unset (memory only) |
//! | `SCOREBOOK_REMOVAL_POLICY`   | `reject`  |
//! | `SCOREBOOK_MAX_COMMENT_LEN`  | `1000`    |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::services::compositions::RemovalPolicy;
use crate::validation::DEFAULT_COMMENT_MAX_CHARS;

pub const HOST_VAR: &str = "SCOREBOOK_HOST";
pub const PORT_VAR: &str = "SCOREBOOK_PORT";
pub const SNAPSHOT_VAR: &str = "SCOREBOOK_SNAPSHOT";
pub const REMOVAL_POLICY_VAR: &str = "SCOREBOOK_REMOVAL_POLICY";
pub const MAX_COMMENT_LEN_VAR: &str = "SCOREBOOK_MAX_COMMENT_LEN";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// JSON snapshot backing the store. `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
    pub removal_policy: RemovalPolicy,
    /// Upper bound on comment content, in characters.
    pub max_comment_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            snapshot_path: None,
            removal_policy: RemovalPolicy::default(),
            max_comment_len: DEFAULT_COMMENT_MAX_CHARS,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = value(HOST_VAR).unwrap_or(defaults.host);
        let port = parsed(PORT_VAR, value(PORT_VAR))?.unwrap_or(defaults.port);
        let snapshot_path = value(SNAPSHOT_VAR).map(PathBuf::from);
        let removal_policy = parsed(REMOVAL_POLICY_VAR, value(REMOVAL_POLICY_VAR))?
            .unwrap_or(defaults.removal_policy);
        let max_comment_len = parsed(MAX_COMMENT_LEN_VAR, value(MAX_COMMENT_LEN_VAR))?
            .unwrap_or(defaults.max_comment_len);

        let config = Self {
            host,
            port,
            snapshot_path,
            removal_policy,
            max_comment_len,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_comment_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: MAX_COMMENT_LEN_VAR.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|raw| {
        raw.trim().parse::<T>().map_err(|err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: err.to_string(),
        })
    })
    .transpose()
}
