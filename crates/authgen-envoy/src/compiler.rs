use std::sync::Arc;

use authgen_config::Settings;
use authgen_core::{AuthPolicy, CompileError};
use authgen_oidc::{
    DiscoveryFetcher, HttpDiscoveryFetcher, HttpFetcherConfig, IdentityResolver, KnownProviders,
    NetworkTarget, PatternProvider,
};

use crate::assembler::{BundleInputs, CompiledPolicy, assemble, validate_policy};
use crate::model::EnvoyFilter;
use crate::render::FilterRenderer;

/// Runs one compilation pass: validate, resolve, derive, assemble, render.
///
/// Nothing is retried and the first error aborts the pass.
pub struct PolicyCompiler {
    resolver: IdentityResolver,
    renderer: FilterRenderer,
}

impl PolicyCompiler {
    pub fn new(resolver: IdentityResolver, renderer: FilterRenderer) -> Self {
        Self { resolver, renderer }
    }

    /// Compiler wired from settings: built-in plus configured offline
    /// providers, and an HTTP fetcher for everything else.
    pub fn from_settings(settings: &Settings) -> Result<Self, CompileError> {
        let fetcher = HttpDiscoveryFetcher::new(
            HttpFetcherConfig::default()
                .with_max_response_size(settings.discovery.max_response_size)
                .with_user_agent(settings.discovery.user_agent.clone()),
        )?;
        Self::with_fetcher(settings, Arc::new(fetcher))
    }

    /// Like [`Self::from_settings`] but with a caller-supplied fetcher.
    pub fn with_fetcher(
        settings: &Settings,
        fetcher: Arc<dyn DiscoveryFetcher>,
    ) -> Result<Self, CompileError> {
        Ok(Self::new(
            IdentityResolver::new(known_providers(settings)?, fetcher),
            FilterRenderer::new(settings.envoy.clone()),
        ))
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Compile a policy into its immutable bundle.
    pub async fn compile(&self, policy: &AuthPolicy) -> Result<CompiledPolicy, CompileError> {
        let well_known_uri = policy.spec.well_known_uri.trim();
        tracing::info!(policy = policy.name(), uri = well_known_uri, "Compiling AuthPolicy");

        // Before any network I/O.
        validate_policy(policy)?;
        let endpoints = self.resolver.resolve(well_known_uri).await?;
        let target = NetworkTarget::derive(&endpoints.token_endpoint, well_known_uri)?;
        tracing::debug!(idp = %target, tls = target.tls, "Derived identity provider target");

        let compiled = assemble(BundleInputs {
            policy,
            endpoints,
            target,
        })?;
        tracing::debug!(
            ignore = compiled.ignore.len(),
            require = compiled.require.len(),
            "Compiled request rules"
        );
        Ok(compiled)
    }

    /// Compile and render in one go.
    pub async fn compile_filter(&self, policy: &AuthPolicy) -> Result<EnvoyFilter, CompileError> {
        let compiled = self.compile(policy).await?;
        self.renderer.render(&compiled)
    }
}

fn known_providers(settings: &Settings) -> Result<KnownProviders, CompileError> {
    let mut providers = KnownProviders::builtin();
    for provider in &settings.discovery.offline_providers {
        providers.push(PatternProvider::new(
            provider.name.clone(),
            &provider.pattern,
            provider.authorize_suffix.clone(),
            provider.token_suffix.clone(),
            provider.end_session_suffix.clone(),
        )?);
    }
    Ok(providers)
}
