//! Configuration management.
//!
//! Configuration lives in `~/.shepherd/config.yaml` (the directory can be
//! moved with `SHEPHERD_HOME`). A missing file means defaults. Credentials
//! can also come from the environment, which wins over the file:
//! `AIOBS_API_KEY` for AIOBS, `LANGFUSE_PUBLIC_KEY`, `LANGFUSE_SECRET_KEY`
//! and `LANGFUSE_HOST` for Langfuse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::format::OutputFormat;
use crate::provider::langfuse::{self, HOST_ENV, PUBLIC_KEY_ENV, SECRET_KEY_ENV};
use crate::provider::{self, Provider, AIOBS_PROVIDER, API_KEY_ENV, DEFAULT_ENDPOINT};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SHEPHERD_HOME";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "No API key configured. Run 'shepherd config init' or set the {API_KEY_ENV} environment variable."
    )]
    MissingApiKey,

    #[error(
        "Langfuse API keys not configured. Run 'shepherd config init' or set the {PUBLIC_KEY_ENV} and {SECRET_KEY_ENV} environment variables."
    )]
    MissingLangfuseKeys,

    #[error("Unknown config key '{0}'. Known keys: {}", ConfigKey::names().join(", "))]
    UnknownKey(String),

    #[error("Config key '{0}' is not set")]
    UnsetKey(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Provider '{provider}' does not support {operation}. {hint}")]
    Unsupported {
        provider: Provider,
        operation: &'static str,
        hint: &'static str,
    },

    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used by session commands
    pub default_provider: String,

    /// AIOBS connection settings
    pub aiobs: AiobsConfig,

    /// Langfuse connection settings
    pub langfuse: LangfuseConfig,

    /// Terminal output preferences
    pub cli: CliConfig,
}

/// Connection settings for the AIOBS service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiobsConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Connection settings for Langfuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LangfuseConfig {
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub host: String,
    pub timeout_secs: u64,
}

/// Resolved Langfuse credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangfuseCredentials {
    pub public_key: String,
    pub secret_key: String,
    pub host: String,
}

/// Terminal output preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub output_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: AIOBS_PROVIDER.to_string(),
            aiobs: AiobsConfig::default(),
            langfuse: LangfuseConfig::default(),
            cli: CliConfig::default(),
        }
    }
}

impl Default for AiobsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            secret_key: None,
            host: langfuse::DEFAULT_HOST.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Keys addressable through `config get` and `config set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DefaultProvider,
    ApiKey,
    Endpoint,
    TimeoutSecs,
    LangfusePublicKey,
    LangfuseSecretKey,
    LangfuseHost,
    OutputFormat,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::DefaultProvider,
        ConfigKey::ApiKey,
        ConfigKey::Endpoint,
        ConfigKey::TimeoutSecs,
        ConfigKey::LangfusePublicKey,
        ConfigKey::LangfuseSecretKey,
        ConfigKey::LangfuseHost,
        ConfigKey::OutputFormat,
    ];

    /// Canonical dotted name.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::DefaultProvider => "default_provider",
            ConfigKey::ApiKey => "aiobs.api_key",
            ConfigKey::Endpoint => "aiobs.endpoint",
            ConfigKey::TimeoutSecs => "aiobs.timeout_secs",
            ConfigKey::LangfusePublicKey => "langfuse.public_key",
            ConfigKey::LangfuseSecretKey => "langfuse.secret_key",
            ConfigKey::LangfuseHost => "langfuse.host",
            ConfigKey::OutputFormat => "cli.output_format",
        }
    }

    /// Short alias accepted in addition to the canonical name.
    fn alias(self) -> &'static str {
        match self {
            ConfigKey::DefaultProvider => "provider",
            ConfigKey::ApiKey => "api_key",
            ConfigKey::Endpoint => "endpoint",
            ConfigKey::TimeoutSecs => "timeout",
            ConfigKey::LangfusePublicKey => "public_key",
            ConfigKey::LangfuseSecretKey => "secret_key",
            ConfigKey::LangfuseHost => "host",
            ConfigKey::OutputFormat => "output_format",
        }
    }

    /// Keys whose values are masked on display.
    pub fn is_secret(self) -> bool {
        matches!(self, ConfigKey::ApiKey | ConfigKey::LangfuseSecretKey)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.name() == wanted || key.alias() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Config {
    /// Loads the config from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads the config from a specific path. A missing or empty file
    /// yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_saphyr::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Saves the config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = serde_saphyr::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(io_error)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Directory holding the config and history files.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(".shepherd"))
    }

    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Path of the shell history file.
    pub fn history_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("history"))
    }

    /// The selected default provider.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        self.default_provider
            .parse()
            .map_err(|reason| ConfigError::InvalidValue {
                key: ConfigKey::DefaultProvider.name().to_string(),
                value: self.default_provider.clone(),
                reason,
            })
    }

    /// Returns the API key, preferring the environment over the file.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key(env_var(API_KEY_ENV))
    }

    /// Resolves the API key given the environment's value.
    pub fn resolve_api_key(&self, from_env: Option<String>) -> Result<String, ConfigError> {
        pick(from_env, &self.aiobs.api_key).ok_or(ConfigError::MissingApiKey)
    }

    /// Returns the Langfuse keys and host, preferring the environment.
    pub fn langfuse_credentials(&self) -> Result<LangfuseCredentials, ConfigError> {
        self.resolve_langfuse(env_var)
    }

    /// Resolves the Langfuse settings given an environment lookup.
    pub fn resolve_langfuse<F>(&self, env: F) -> Result<LangfuseCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_key = pick(env(PUBLIC_KEY_ENV), &self.langfuse.public_key);
        let secret_key = pick(env(SECRET_KEY_ENV), &self.langfuse.secret_key);
        let host = pick(env(HOST_ENV), &Some(self.langfuse.host.clone()))
            .unwrap_or_else(|| langfuse::DEFAULT_HOST.to_string());

        match (public_key, secret_key) {
            (Some(public_key), Some(secret_key)) => Ok(LangfuseCredentials {
                public_key,
                secret_key,
                host: host.trim_end_matches('/').to_string(),
            }),
            _ => Err(ConfigError::MissingLangfuseKeys),
        }
    }

    /// Reads the effective value of a key. Environment overrides apply and
    /// secrets come back masked.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.get_with_env(key, env_var)
    }

    /// `get` with an explicit environment lookup.
    pub fn get_with_env<F>(&self, key: &str, env: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key: ConfigKey = key.parse()?;
        let unset = || ConfigError::UnsetKey(key.name().to_string());
        let value = match key {
            ConfigKey::DefaultProvider => self.default_provider.clone(),
            ConfigKey::ApiKey => pick(env(API_KEY_ENV), &self.aiobs.api_key).ok_or_else(unset)?,
            ConfigKey::Endpoint => self.aiobs.endpoint.clone(),
            ConfigKey::TimeoutSecs => self.aiobs.timeout_secs.to_string(),
            ConfigKey::LangfusePublicKey => {
                pick(env(PUBLIC_KEY_ENV), &self.langfuse.public_key).ok_or_else(unset)?
            }
            ConfigKey::LangfuseSecretKey => {
                pick(env(SECRET_KEY_ENV), &self.langfuse.secret_key).ok_or_else(unset)?
            }
            ConfigKey::LangfuseHost => {
                pick(env(HOST_ENV), &Some(self.langfuse.host.clone())).ok_or_else(unset)?
            }
            ConfigKey::OutputFormat => self.cli.output_format.to_string(),
        };

        if key.is_secret() {
            Ok(mask_secret(&value))
        } else {
            Ok(value)
        }
    }

    /// Validates and stores a value by key name. Returns the canonical key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<ConfigKey, ConfigError> {
        let key: ConfigKey = key.parse()?;
        let value = value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.name().to_string(),
            value: value.to_string(),
            reason,
        };

        match key {
            ConfigKey::DefaultProvider => {
                let provider: Provider = value.parse().map_err(invalid)?;
                self.default_provider = provider.name().to_string();
            }
            ConfigKey::ApiKey => {
                if value.is_empty() {
                    return Err(invalid("API key cannot be empty".to_string()));
                }
                self.aiobs.api_key = Some(value.to_string());
            }
            ConfigKey::LangfusePublicKey | ConfigKey::LangfuseSecretKey => {
                if value.is_empty() {
                    return Err(invalid("key cannot be empty".to_string()));
                }
                let slot = if key == ConfigKey::LangfusePublicKey {
                    &mut self.langfuse.public_key
                } else {
                    &mut self.langfuse.secret_key
                };
                *slot = Some(value.to_string());
            }
            ConfigKey::LangfuseHost => {
                provider::client::parse_endpoint(value).map_err(|e| invalid(e.to_string()))?;
                self.langfuse.host = value.trim_end_matches('/').to_string();
            }
            ConfigKey::Endpoint => {
                provider::client::parse_endpoint(value).map_err(|e| invalid(e.to_string()))?;
                self.aiobs.endpoint = value.trim_end_matches('/').to_string();
            }
            ConfigKey::TimeoutSecs => {
                self.aiobs.timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| invalid("expected a positive number of seconds".to_string()))?;
            }
            ConfigKey::OutputFormat => {
                self.cli.output_format = value.parse().map_err(invalid)?;
            }
        }
        Ok(key)
    }
}

/// Reads a non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// The environment value when set, otherwise the stored one. Blank values
/// count as unset.
fn pick(from_env: Option<String>, stored: &Option<String>) -> Option<String> {
    from_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| stored.clone().filter(|v| !v.trim().is_empty()))
}

/// Masks a secret for display, keeping the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("...{tail}")
    } else {
        "****".to_string()
    }
}
