use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{env, fmt, fs, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_PREFIX: &str = "/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = "caradvisor-client";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported configuration format {0:?}; use 'yaml' or 'json'")]
    UnsupportedFormat(String),
    #[error("invalid {key} value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Where the backend lives and how requests are shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend origin, e.g. `http://localhost:8000`.
    pub base_url: Url,
    /// Version prefix every request path is normalized to carry once.
    pub prefix: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            prefix: DEFAULT_PREFIX.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Durable session storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Explicit session file; defaults to a per-origin file in the user config dir.
    pub storage_path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// The main configuration structure for the CarAdvisor client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

fn default_base_url() -> Url {
    // The literal is a valid absolute URL.
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("default base URL is valid"))
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Precedence: defaults, then the file, then environment variables for
    /// values the file left at their defaults, then `server_override`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// value is malformed, or the result fails [`Config::validate`].
    pub fn load_config(
        config_path: Option<PathBuf>,
        server_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;

        if let Some(server) = server_override {
            config.api.base_url = server;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Fills values still at their defaults from `CARADVISOR_*` variables.
    ///
    /// `lookup` abstracts the environment so callers can supply any source.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::with_defaults();

        if self.api.base_url == defaults.api.base_url {
            if let Some(value) = lookup("CARADVISOR_API_URL") {
                self.api.base_url =
                    Url::parse(&value).map_err(|err| ConfigError::InvalidValue {
                        key: "CARADVISOR_API_URL",
                        value: value.clone(),
                        reason: err.to_string(),
                    })?;
            }
        }
        if self.api.prefix == defaults.api.prefix {
            if let Some(value) = lookup("CARADVISOR_API_PREFIX") {
                self.api.prefix = value;
            }
        }
        if self.api.timeout_secs == defaults.api.timeout_secs {
            if let Some(value) = lookup("CARADVISOR_TIMEOUT_SECS") {
                self.api.timeout_secs =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "CARADVISOR_TIMEOUT_SECS",
                        value: value.clone(),
                        reason: "must be a whole number of seconds".to_string(),
                    })?;
            }
        }
        if self.session.storage_path.is_none() {
            if let Some(value) = lookup("CARADVISOR_SESSION_PATH") {
                self.session.storage_path = Some(PathBuf::from(value));
            }
        }
        if self.logging.level == defaults.logging.level {
            if let Some(value) = lookup("CARADVISOR_LOG_LEVEL") {
                self.logging.level = value;
            }
        }
        if self.logging.format == defaults.logging.format {
            if let Some(value) = lookup("CARADVISOR_LOG_FORMAT") {
                self.logging.format =
                    value.parse().map_err(|reason| ConfigError::InvalidValue {
                        key: "CARADVISOR_LOG_FORMAT",
                        value: value.clone(),
                        reason,
                    })?;
            }
        }

        Ok(())
    }

    /// Validate the complete configuration, collecting every problem.
    ///
    /// # Errors
    /// Returns the list of problems found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.api.base_url.scheme(), "http" | "https") {
            errors.push(format!(
                "API base URL must use http or https, got {}",
                self.api.base_url
            ));
        }
        if self.api.base_url.host_str().is_none() {
            errors.push(format!("API base URL has no host: {}", self.api.base_url));
        }
        if !self.api.prefix.is_empty() && !self.api.prefix.starts_with('/') {
            errors.push(format!(
                "API prefix must start with '/', got {:?}",
                self.api.prefix
            ));
        }
        if self.api.prefix.len() > 1 && self.api.prefix.ends_with('/') {
            errors.push(format!(
                "API prefix must not end with '/', got {:?}",
                self.api.prefix
            ));
        }
        if self.api.timeout_secs == 0 {
            errors.push("Request timeout must be greater than 0 seconds.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Session file location: the configured path, else a file scoped to the
    /// backend origin under the user's config directory.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.session.storage_path {
            return path.clone();
        }

        let file_name = format!("{}.json", origin_slug(&self.api.base_url));
        BaseDirs::new().map_or_else(
            || PathBuf::from(".caradvisor").join("sessions").join(&file_name),
            |dirs| {
                dirs.config_dir()
                    .join("caradvisor")
                    .join("sessions")
                    .join(&file_name)
            },
        )
    }
}

/// Filesystem-safe name for the scheme, host and port of `url`.
#[must_use]
pub fn origin_slug(url: &Url) -> String {
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port_or_known_default().unwrap_or(0);
    let raw = format!("{}_{}_{}", url.scheme(), host, port);
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}
