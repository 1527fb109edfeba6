use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, TITLE_MIN_CHARS};
use crate::utils::url::{is_http_url, normalize_base_url};

/// Environment variable that overrides the configured base address.
pub const BASE_URL_ENV: &str = "SYNAPSE_API_URL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base address of the chat backend (e.g., "http://localhost:8000")
    pub base_url: Option<String>,
    /// Connect timeout in seconds for backend requests
    pub connect_timeout_secs: Option<u64>,
    /// Minimum length, in characters, of a first message that gets an inferred title
    pub title_min_chars: Option<usize>,
    /// Transcript log file enabled on startup
    pub log_file: Option<String>,
}

/// Effective settings after applying CLI flags, environment, and the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub title_min_chars: usize,
    pub log_file: Option<String>,
}

impl Config {
    /// Resolve effective settings. Precedence: CLI flag, then `env_base_url`, then the
    /// file, then built-in defaults.
    pub fn resolve(
        &self,
        cli_base_url: Option<&str>,
        env_base_url: Option<&str>,
        cli_log_file: Option<&str>,
    ) -> Settings {
        let base_url = [cli_base_url, env_base_url, self.base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);

        Settings {
            base_url: normalize_base_url(base_url),
            connect_timeout: Duration::from_secs(
                self.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            title_min_chars: self.title_min_chars.unwrap_or(TITLE_MIN_CHARS),
            log_file: cli_log_file
                .map(str::to_string)
                .or_else(|| self.log_file.clone()),
        }
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), InvalidValue> {
        let value = value.trim();
        let invalid = |reason: &str| InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        };
        match key {
            ConfigKey::BaseUrl => {
                if !is_http_url(value) {
                    return Err(invalid("expected an http:// or https:// address"));
                }
                self.base_url = Some(normalize_base_url(value));
            }
            ConfigKey::ConnectTimeout => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| invalid("expected a positive number of seconds"))?;
                self.connect_timeout_secs = Some(secs);
            }
            ConfigKey::TitleMinChars => {
                let chars = value
                    .parse::<usize>()
                    .map_err(|_| invalid("expected a whole number"))?;
                self.title_min_chars = Some(chars);
            }
            ConfigKey::LogFile => {
                if value.is_empty() {
                    return Err(invalid("expected a file path"));
                }
                self.log_file = Some(value.to_string());
            }
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::ConnectTimeout => self.connect_timeout_secs = None,
            ConfigKey::TitleMinChars => self.title_min_chars = None,
            ConfigKey::LogFile => self.log_file = None,
        }
    }
}

/// Keys accepted by `synapse set` and `synapse unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    ConnectTimeout,
    TitleMinChars,
    LogFile,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::BaseUrl,
        ConfigKey::ConnectTimeout,
        ConfigKey::TitleMinChars,
        ConfigKey::LogFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::ConnectTimeout => "connect-timeout",
            ConfigKey::TitleMinChars => "title-min-chars",
            ConfigKey::LogFile => "log-file",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = UnknownKey;

    /// Accepts the hyphenated CLI spelling and the underscored file spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "base-url" => Ok(ConfigKey::BaseUrl),
            "connect-timeout" | "connect-timeout-secs" => Ok(ConfigKey::ConnectTimeout),
            "title-min-chars" => Ok(ConfigKey::TitleMinChars),
            "log-file" => Ok(ConfigKey::LogFile),
            _ => Err(UnknownKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = ConfigKey::ALL.iter().map(|key| key.as_str()).collect();
        write!(
            f,
            "Unknown config key '{}'. Available keys: {}",
            self.0,
            known.join(", ")
        )
    }
}

impl std::error::Error for UnknownKey {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub key: ConfigKey,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value '{}' for {}: {}",
            self.value, self.key, self.reason
        )
    }
}

impl std::error::Error for InvalidValue {}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/synapse/config.toml` → `~/.config/synapse/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
