//! Offline identity providers.
//!
//! A known provider maps a well-known URI straight to endpoints, skipping the
//! network. The built-in entry covers the in-cluster `mock-oauth2` server used
//! by test environments; more can be declared in settings.

use std::fmt;
use std::sync::LazyLock;

use authgen_core::CompileError;
use regex::Regex;

use crate::types::IdentityEndpoints;

/// Capture group every provider pattern must define.
pub const BASE_GROUP: &str = "base";

static MOCK_OAUTH2_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>http://mock-oauth2\.auth:8080/[^/]+)/\.well-known/openid-configuration$")
        .expect("Invalid mock-oauth2 regex")
});

/// Resolves well-known URIs without I/O.
pub trait KnownProvider: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Endpoints for `well_known_uri`, or `None` if this provider does not
    /// recognise it.
    fn resolve(&self, well_known_uri: &str) -> Option<IdentityEndpoints>;
}

/// Provider recognised by a regex with a `base` capture group. Endpoints are
/// the captured base followed by fixed suffixes.
#[derive(Debug, Clone)]
pub struct PatternProvider {
    name: String,
    pattern: Regex,
    authorize_suffix: String,
    token_suffix: String,
    end_session_suffix: Option<String>,
}

impl PatternProvider {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        authorize_suffix: impl Into<String>,
        token_suffix: impl Into<String>,
        end_session_suffix: Option<String>,
    ) -> Result<Self, CompileError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            CompileError::config(format!("invalid pattern for known provider {name}: {e}"))
        })?;

        if !pattern.capture_names().flatten().any(|n| n == BASE_GROUP) {
            return Err(CompileError::config(format!(
                "pattern for known provider {name} has no `{BASE_GROUP}` capture group"
            )));
        }

        Ok(Self {
            name,
            pattern,
            authorize_suffix: authorize_suffix.into(),
            token_suffix: token_suffix.into(),
            end_session_suffix,
        })
    }

    /// The local `mock-oauth2` server:
    /// `http://mock-oauth2.auth:8080/<issuer>/.well-known/openid-configuration`.
    pub fn mock_oauth2() -> Self {
        Self {
            name: "mock-oauth2".to_string(),
            pattern: MOCK_OAUTH2_REGEX.clone(),
            authorize_suffix: "/authorize".to_string(),
            token_suffix: "/token".to_string(),
            end_session_suffix: Some("/endsession".to_string()),
        }
    }
}

impl KnownProvider for PatternProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, well_known_uri: &str) -> Option<IdentityEndpoints> {
        let captures = self.pattern.captures(well_known_uri)?;
        let base = captures.name(BASE_GROUP)?.as_str();

        Some(IdentityEndpoints::new(
            format!("{base}{}", self.authorize_suffix),
            format!("{base}{}", self.token_suffix),
            self.end_session_suffix
                .as_ref()
                .map(|suffix| format!("{base}{suffix}")),
        ))
    }
}

/// Ordered list of known providers; the first match wins.
#[derive(Debug, Default)]
pub struct KnownProviders {
    providers: Vec<Box<dyn KnownProvider>>,
}

impl KnownProviders {
    /// An empty list, so every URI goes to live discovery.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Only the built-in `mock-oauth2` provider.
    pub fn builtin() -> Self {
        let mut providers = Self::empty();
        providers.push(PatternProvider::mock_oauth2());
        providers
    }

    pub fn push(&mut self, provider: impl KnownProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    #[must_use]
    pub fn with(mut self, provider: impl KnownProvider + 'static) -> Self {
        self.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Endpoints from the first provider recognising the URI, with its name.
    pub fn resolve(&self, well_known_uri: &str) -> Option<(&str, IdentityEndpoints)> {
        self.providers.iter().find_map(|provider| {
            provider
                .resolve(well_known_uri)
                .map(|endpoints| (provider.name(), endpoints))
        })
    }
}
