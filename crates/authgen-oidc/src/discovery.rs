//! OpenID Connect discovery document fetching.
//!
//! Only the three endpoints the proxy needs are read from the document;
//! everything else the provider publishes is ignored.
//!
//! # References
//!
//! - [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html)
//! - [RFC 8414 - OAuth 2.0 Authorization Server Metadata](https://tools.ietf.org/html/rfc8414)

use async_trait::async_trait;
use authgen_core::CompileError;
use serde::{Deserialize, Serialize};

use crate::types::IdentityEndpoints;

/// Default cap on the discovery response body.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Default `User-Agent` sent with discovery requests.
pub const DEFAULT_USER_AGENT: &str = concat!("authgen/", env!("CARGO_PKG_VERSION"));

/// Subset of the OIDC discovery document used for compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

impl DiscoveryDocument {
    /// Validate required fields and convert into [`IdentityEndpoints`].
    ///
    /// Every missing or empty required field is reported at once.
    pub fn into_endpoints(self, uri: &str) -> Result<IdentityEndpoints, CompileError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let authorize = non_empty(self.authorization_endpoint);
        let token = non_empty(self.token_endpoint);

        match (authorize, token) {
            (Some(authorize), Some(token)) => Ok(IdentityEndpoints::new(
                authorize,
                token,
                non_empty(self.end_session_endpoint),
            )),
            (authorize, token) => {
                let mut missing = Vec::new();
                if authorize.is_none() {
                    missing.push("authorization_endpoint");
                }
                if token.is_none() {
                    missing.push("token_endpoint");
                }
                Err(CompileError::discovery_validation(uri, missing))
            }
        }
    }
}

/// Retrieves discovery documents.
#[async_trait]
pub trait DiscoveryFetcher: Send + Sync {
    /// Fetch and parse the document published at `uri`.
    async fn fetch(&self, uri: &str) -> Result<DiscoveryDocument, CompileError>;
}

/// Configuration for [`HttpDiscoveryFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpFetcherConfig {
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetches discovery documents over HTTP with a single GET.
///
/// No timeout or retry is applied; the first failure is returned.
pub struct HttpDiscoveryFetcher {
    http_client: reqwest::Client,
    config: HttpFetcherConfig,
}

impl HttpDiscoveryFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, CompileError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CompileError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn with_defaults() -> Result<Self, CompileError> {
        Self::new(HttpFetcherConfig::default())
    }

    fn too_large(&self, uri: &str) -> CompileError {
        CompileError::discovery_fetch(
            uri,
            format!(
                "response exceeds maximum size of {} bytes",
                self.config.max_response_size
            ),
        )
    }
}

#[async_trait]
impl DiscoveryFetcher for HttpDiscoveryFetcher {
    async fn fetch(&self, uri: &str) -> Result<DiscoveryDocument, CompileError> {
        tracing::info!(uri, "Fetching OIDC discovery document");

        let response = self
            .http_client
            .get(uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch OIDC discovery from {}: {}", uri, e);
                CompileError::discovery_fetch(uri, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("OIDC discovery at {} returned HTTP {}", uri, status.as_u16());
            return Err(CompileError::discovery_fetch(
                uri,
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(self.too_large(uri));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CompileError::discovery_fetch(uri, e))?;

        // Chunked responses carry no Content-Length.
        if body.len() > self.config.max_response_size {
            return Err(self.too_large(uri));
        }

        let malformed = |reason: String| {
            tracing::warn!(
                "Failed to parse OIDC discovery document from {}: {}",
                uri,
                reason
            );
            CompileError::discovery_fetch(uri, format!("malformed discovery document: {reason}"))
        };

        // Derived struct visitors also accept JSON arrays.
        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(malformed("expected a JSON object".to_string()));
        }
        let document: DiscoveryDocument =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        tracing::debug!("Fetched OIDC discovery document from {}", uri);
        Ok(document)
    }
}
