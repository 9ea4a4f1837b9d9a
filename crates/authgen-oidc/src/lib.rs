//! Identity provider resolution for authgen.
//!
//! - [`resolver::IdentityResolver`] turns a well-known URI into endpoints,
//!   consulting [`provider::KnownProviders`] before live discovery
//! - [`discovery`] fetches and validates OIDC discovery documents
//! - [`target::NetworkTarget`] derives the cluster address the proxy dials

pub mod discovery;
pub mod provider;
pub mod resolver;
pub mod target;
pub mod types;

pub use discovery::{DiscoveryDocument, DiscoveryFetcher, HttpDiscoveryFetcher, HttpFetcherConfig};
pub use provider::{KnownProvider, KnownProviders, PatternProvider};
pub use resolver::IdentityResolver;
pub use target::NetworkTarget;
pub use types::IdentityEndpoints;
