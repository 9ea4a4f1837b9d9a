//! Settings for the authgen policy compiler.
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`authgen.toml` in the working directory, or an explicit path)
//! 3. `AUTHGEN__<SECTION>__<KEY>` environment variables
//!
//! ```toml
//! [envoy]
//! cluster_name = "oauth"
//! connect_timeout = "10s"
//!
//! [[discovery.offline_providers]]
//! name = "keycloak-dev"
//! pattern = '^(?P<base>http://keycloak\.dev/realms/[^/]+)/\.well-known/openid-configuration$'
//! authorize_suffix = "/protocol/openid-connect/auth"
//! token_suffix = "/protocol/openid-connect/token"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{SettingsLoader, load_settings};
pub use settings::{
    DiscoverySettings, EnvoySettings, LoggingSettings, OfflineProviderSettings, OutputFormat,
    OutputSettings, Settings,
};

/// Error types for settings operations. File reads happen inside the
/// `config` crate, so unreadable files surface as [`ConfigError::Parse`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, ConfigError>;
