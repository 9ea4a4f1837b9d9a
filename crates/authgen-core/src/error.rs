use thiserror::Error;

/// Errors that abort a policy compilation.
///
/// Compilation is all-or-nothing: every variant is fatal and no partial
/// output is produced once one of them has been raised.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Required input is missing or has the wrong shape.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The discovery document could not be retrieved or parsed.
    #[error("Failed to fetch discovery document from {uri}: {reason}")]
    DiscoveryFetch { uri: String, reason: String },

    /// The discovery document was retrieved but lacks required endpoints.
    #[error(
        "Discovery document at {uri} is missing required fields: {}",
        .missing.join(", ")
    )]
    DiscoveryValidation { uri: String, missing: Vec<String> },

    /// The compiled bundle could not be rendered to its output form.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CompileError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new DiscoveryFetch error
    pub fn discovery_fetch(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::DiscoveryFetch {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new DiscoveryValidation error
    pub fn discovery_validation<I, S>(uri: impl Into<String>, missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::DiscoveryValidation {
            uri: uri.into(),
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Stable, machine-friendly name of the error kind (used in log fields).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::DiscoveryFetch { .. } => "discovery_fetch",
            Self::DiscoveryValidation { .. } => "discovery_validation",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Check if this error originates from the identity provider rather than the policy
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFetch { .. } | Self::DiscoveryValidation { .. }
        )
    }
}

impl From<serde_yaml::Error> for CompileError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("invalid policy document: {err}"))
    }
}

impl From<serde_json::Error> for CompileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("invalid policy document: {err}"))
    }
}
