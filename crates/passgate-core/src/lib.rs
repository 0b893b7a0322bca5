use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Header echoing the CSRF value embedded in the session cookie.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

pub const DEFAULT_COOKIE_NAME: &str = "passgate_token";

/// Process-wide guard settings. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub cookie_name: String,
    pub ignore_csrf: bool,
    pub unserialize_cookies: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            ignore_csrf: false,
            unserialize_cookies: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    guard: GuardConfig,
}

pub fn validate_config(config: &GuardConfig) -> Result<(), ConfigError> {
    if config.cookie_name.is_empty() {
        return Err(ConfigError::Invalid("cookie_name must not be empty".to_string()));
    }
    if let Some(c) = config.cookie_name.chars().find(|c| !is_cookie_token_char(*c)) {
        return Err(ConfigError::Invalid(format!(
            "cookie_name {:?} contains illegal character {c:?}",
            config.cookie_name
        )));
    }
    Ok(())
}

// RFC 6265 cookie-name is an RFC 2616 token.
fn is_cookie_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

/// Parse a `[guard]` table from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let raw: RawFile = toml::from_str(content)?;
    validate_config(&raw.guard)?;
    Ok(raw.guard)
}

pub fn load_config_from_file(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

pub fn load_config_from_dir(dir: &Path) -> Result<GuardConfig, ConfigError> {
    load_config_from_file(&dir.join("guard.toml"))
}
