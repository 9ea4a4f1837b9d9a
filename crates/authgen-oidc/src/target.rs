//! Network target of the identity-provider cluster.

use std::fmt;

use authgen_core::CompileError;
use serde::Serialize;
use url::{Host, Url};

/// Where the proxy connects to reach the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl NetworkTarget {
    /// Derive the target from the token endpoint, falling back to the
    /// well-known URI when the token endpoint has no scheme or host.
    ///
    /// TLS is used iff the scheme is `https`. An explicit port is always
    /// kept; without one the port defaults to 443 with TLS and 80 without.
    pub fn derive(token_endpoint: &str, well_known_uri: &str) -> Result<Self, CompileError> {
        let basis = parse_absolute(token_endpoint)
            .or_else(|| parse_absolute(well_known_uri))
            .ok_or_else(|| {
                CompileError::config(format!(
                    "could not determine identity provider host from \
                     token_endpoint={token_endpoint} or wellKnownURI={well_known_uri}"
                ))
            })?;

        Ok(Self::from_basis(basis))
    }

    fn from_basis(basis: Basis) -> Self {
        let Basis {
            url,
            host,
            explicit_port,
        } = basis;
        let scheme = url.scheme().to_string();
        let tls = scheme == "https";
        // `Url::port` hides a port equal to the scheme default.
        let port = url
            .port()
            .or_else(|| explicit_port.then(|| url.port_or_known_default()).flatten())
            .unwrap_or(if tls { 443 } else { 80 });

        Self {
            scheme,
            host,
            port,
            tls,
        }
    }
}

impl fmt::Display for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

struct Basis {
    url: Url,
    host: String,
    explicit_port: bool,
}

/// Parse `input` if it carries both a scheme and a host. Scheme-relative
/// references (`//host/path`) are read as `https`.
fn parse_absolute(input: &str) -> Option<Basis> {
    let input = input.trim();
    let url = if input.starts_with("//") {
        Url::parse(&format!("https:{input}")).ok()?
    } else {
        Url::parse(input).ok()?
    };

    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    if host.is_empty() {
        return None;
    }

    Some(Basis {
        url,
        host,
        explicit_port: has_explicit_port(input),
    })
}

/// Whether the authority of `input` spells out a `:port`.
fn has_explicit_port(input: &str) -> bool {
    let rest = match input.find("//") {
        Some(idx) => &input[idx + 2..],
        None => return false,
    };
    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let after_host = match host_port.rfind(']') {
        Some(idx) => &host_port[idx + 1..],
        None => host_port,
    };
    after_host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}
