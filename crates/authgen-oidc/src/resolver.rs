use std::sync::Arc;

use authgen_core::CompileError;

use crate::discovery::{DiscoveryFetcher, HttpDiscoveryFetcher};
use crate::provider::KnownProviders;
use crate::types::IdentityEndpoints;

/// Turns a well-known URI into identity provider endpoints.
///
/// Known providers are consulted first, in order; only when none of them
/// recognises the URI is the discovery document fetched. At most one network
/// request is made per call.
pub struct IdentityResolver {
    providers: KnownProviders,
    fetcher: Arc<dyn DiscoveryFetcher>,
}

impl IdentityResolver {
    pub fn new(providers: KnownProviders, fetcher: Arc<dyn DiscoveryFetcher>) -> Self {
        Self { providers, fetcher }
    }

    /// Built-in providers plus an HTTP fetcher with default settings.
    pub fn with_defaults() -> Result<Self, CompileError> {
        Ok(Self::new(
            KnownProviders::builtin(),
            Arc::new(HttpDiscoveryFetcher::with_defaults()?),
        ))
    }

    pub fn providers(&self) -> &KnownProviders {
        &self.providers
    }

    pub async fn resolve(&self, well_known_uri: &str) -> Result<IdentityEndpoints, CompileError> {
        let uri = well_known_uri.trim();
        if uri.is_empty() {
            return Err(CompileError::config(
                "spec.wellKnownURI must be set on AuthPolicy",
            ));
        }

        if let Some((provider, endpoints)) = self.providers.resolve(uri) {
            tracing::debug!(uri, provider, "Resolved identity provider without discovery");
            return Ok(endpoints);
        }

        let document = self.fetcher.fetch(uri).await?;
        let endpoints = document.into_endpoints(uri)?;

        tracing::debug!(
            uri,
            authorize = %endpoints.authorize_endpoint,
            token = %endpoints.token_endpoint,
            "Resolved identity provider from discovery"
        );

        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::discovery::DiscoveryDocument;

    /// Fetcher returning a fixed document and counting calls.
    struct StaticFetcher {
        document: Result<DiscoveryDocument, String>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn ok(document: DiscoveryDocument) -> Arc<Self> {
            Arc::new(Self {
                document: Ok(document),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                document: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiscoveryFetcher for StaticFetcher {
        async fn fetch(&self, uri: &str) -> Result<DiscoveryDocument, CompileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document
                .clone()
                .map_err(|reason| CompileError::discovery_fetch(uri, reason))
        }
    }

    fn full_document() -> DiscoveryDocument {
        DiscoveryDocument {
            authorization_endpoint: Some("https://idp/authorize".into()),
            token_endpoint: Some("https://idp/token".into()),
            end_session_endpoint: None,
        }
    }

    #[tokio::test]
    async fn test_known_provider_skips_network() {
        let fetcher = StaticFetcher::ok(full_document());
        let resolver = IdentityResolver::new(KnownProviders::builtin(), fetcher.clone());

        let endpoints = resolver
            .resolve("http://mock-oauth2.auth:8080/tenant/.well-known/openid-configuration")
            .await
            .unwrap();

        assert_eq!(
            endpoints.authorize_endpoint,
            "http://mock-oauth2.auth:8080/tenant/authorize"
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_live_discovery_single_fetch() {
        let fetcher = StaticFetcher::ok(full_document());
        let resolver = IdentityResolver::new(KnownProviders::builtin(), fetcher.clone());

        let endpoints = resolver
            .resolve("https://idp/.well-known/openid-configuration")
            .await
            .unwrap();

        assert_eq!(endpoints.token_endpoint, "https://idp/token");
        assert_eq!(endpoints.end_session_endpoint, None);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_uri_is_config_error() {
        let fetcher = StaticFetcher::ok(full_document());
        let resolver = IdentityResolver::new(KnownProviders::builtin(), fetcher.clone());

        for uri in ["", "   "] {
            let err = resolver.resolve(uri).await.unwrap_err();
            assert!(matches!(err, CompileError::Config(_)));
        }
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let resolver = IdentityResolver::new(
            KnownProviders::builtin(),
            StaticFetcher::failing("connection refused"),
        );

        let err = resolver.resolve("https://idp/.well-known").await.unwrap_err();
        assert_eq!(err.kind(), "discovery_fetch");
    }

    #[tokio::test]
    async fn test_missing_fields_are_validation_error() {
        let fetcher = StaticFetcher::ok(DiscoveryDocument {
            authorization_endpoint: Some("https://idp/authorize".into()),
            ..Default::default()
        });
        let resolver = IdentityResolver::new(KnownProviders::builtin(), fetcher);

        match resolver.resolve("https://idp/.well-known").await {
            Err(CompileError::DiscoveryValidation { missing, .. }) => {
                assert_eq!(missing, vec!["token_endpoint"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_uri_fetched_when_no_providers() {
        let fetcher = StaticFetcher::ok(full_document());
        let resolver = IdentityResolver::new(KnownProviders::empty(), fetcher.clone());

        resolver
            .resolve("http://mock-oauth2.auth:8080/tenant/.well-known/openid-configuration")
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), 1);
    }
}
