use serde::{Deserialize, Serialize};

/// Endpoints of the identity provider the generated filter talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEndpoints {
    /// Where browsers are redirected to log in.
    pub authorize_endpoint: String,

    /// Where the proxy exchanges authorization codes for tokens.
    pub token_endpoint: String,

    /// Where browsers are sent on sign-out, if the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

impl IdentityEndpoints {
    pub fn new(
        authorize_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        end_session_endpoint: Option<String>,
    ) -> Self {
        Self {
            authorize_endpoint: authorize_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            end_session_endpoint,
        }
    }

    /// End-session endpoint, or `""` when the provider has none.
    pub fn end_session_or_empty(&self) -> &str {
        self.end_session_endpoint.as_deref().unwrap_or("")
    }
}
