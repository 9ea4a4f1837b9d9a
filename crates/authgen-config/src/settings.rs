use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Generated Envoy resources
    #[serde(default)]
    pub envoy: EnvoySettings,
    /// Identity provider discovery
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        // Envoy validations
        if self.envoy.cluster_name.trim().is_empty() {
            return Err(ConfigError::validation("envoy.cluster_name must not be empty"));
        }
        if self.envoy.client_id.trim().is_empty() {
            return Err(ConfigError::validation("envoy.client_id must not be empty"));
        }
        if self.envoy.connect_timeout.is_zero() || self.envoy.token_timeout.is_zero() {
            return Err(ConfigError::validation("envoy timeouts must be > 0"));
        }
        for (key, value) in [
            ("hmac_secret_path", &self.envoy.hmac_secret_path),
            ("token_secret_path", &self.envoy.token_secret_path),
            ("credentials_dir", &self.envoy.credentials_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::validation(format!(
                    "envoy.{key} must not be empty"
                )));
            }
        }

        // Discovery validations
        if self.discovery.max_response_size == 0 {
            return Err(ConfigError::validation(
                "discovery.max_response_size must be > 0",
            ));
        }
        for provider in &self.discovery.offline_providers {
            provider.validate()?;
        }

        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    /// Effective settings rendered as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::parse(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvoySettings {
    /// Name of the identity-provider cluster the OAuth2 filter calls.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Timeout of the token endpoint call made by the OAuth2 filter.
    #[serde(default = "default_token_timeout", with = "humantime_serde")]
    pub token_timeout: Duration,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// SDS file holding the HMAC secret for cookie signing.
    #[serde(default = "default_hmac_secret_path")]
    pub hmac_secret_path: String,
    /// SDS file holding the OAuth2 client secret.
    #[serde(default = "default_token_secret_path")]
    pub token_secret_path: String,
    /// Directory watched for secret rotation.
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,
}

fn default_cluster_name() -> String {
    "oauth".into()
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_token_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_client_id() -> String {
    "entraid_server".into()
}
fn default_hmac_secret_path() -> String {
    "/etc/istio/config/hmac-secret.yaml".into()
}
fn default_token_secret_path() -> String {
    "/etc/istio/config/token-secret.yaml".into()
}
fn default_credentials_dir() -> String {
    "/etc/istio/config".into()
}

impl Default for EnvoySettings {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            connect_timeout: default_connect_timeout(),
            token_timeout: default_token_timeout(),
            client_id: default_client_id(),
            hmac_secret_path: default_hmac_secret_path(),
            token_secret_path: default_token_secret_path(),
            credentials_dir: default_credentials_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Maximum discovery response size in bytes.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra providers resolved without network access, tried after the
    /// built-in mock provider.
    #[serde(default)]
    pub offline_providers: Vec<OfflineProviderSettings>,
}

fn default_max_response_size() -> usize {
    1024 * 1024
}
fn default_user_agent() -> String {
    concat!("authgen/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_response_size: default_max_response_size(),
            user_agent: default_user_agent(),
            offline_providers: Vec::new(),
        }
    }
}

/// A provider recognised by URI pattern. The pattern must define a `base`
/// capture group; endpoints are `base` plus the suffixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineProviderSettings {
    pub name: String,
    pub pattern: String,
    #[serde(default = "default_authorize_suffix")]
    pub authorize_suffix: String,
    #[serde(default = "default_token_suffix")]
    pub token_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_suffix: Option<String>,
}

fn default_authorize_suffix() -> String {
    "/authorize".into()
}
fn default_token_suffix() -> String {
    "/token".into()
}

impl OfflineProviderSettings {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "discovery.offline_providers entries need a name",
            ));
        }
        let regex = Regex::new(&self.pattern).map_err(|e| {
            ConfigError::validation(format!(
                "discovery.offline_providers[{}].pattern is invalid: {e}",
                self.name
            ))
        })?;
        if !regex.capture_names().flatten().any(|n| n == "base") {
            return Err(ConfigError::validation(format!(
                "discovery.offline_providers[{}].pattern must define a `base` group",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Document format written by `compile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::validation(format!(
                "unknown output format '{other}', expected yaml or json"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => f.write_str("yaml"),
            Self::Json => f.write_str("json"),
        }
    }
}
