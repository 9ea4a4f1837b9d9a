//! Typed `networking.istio.io/v1alpha3` EnvoyFilter document.
//!
//! Istio fields are camelCase; everything inside a patch `value` is Envoy
//! configuration and stays snake_case. Field order follows the order the
//! documents are conventionally written in, since serializers emit fields in
//! declaration order.

use std::collections::BTreeMap;

use serde::Serialize;

pub const ENVOY_FILTER_API_VERSION: &str = "networking.istio.io/v1alpha3";
pub const ENVOY_FILTER_KIND: &str = "EnvoyFilter";

pub const HTTP_CONNECTION_MANAGER: &str = "envoy.filters.network.http_connection_manager";
pub const JWT_AUTHN_FILTER: &str = "envoy.filters.http.jwt_authn";
pub const LUA_FILTER: &str = "envoy.filters.http.lua";
pub const OAUTH2_FILTER: &str = "envoy.filters.http.oauth2";
pub const TLS_TRANSPORT_SOCKET: &str = "envoy.transport_sockets.tls";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyFilter {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: EnvoyFilterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyFilterSpec {
    pub config_patches: Vec<ConfigPatch>,
    pub workload_selector: WorkloadSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSelector {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub apply_to: ApplyTo,
    #[serde(rename = "match")]
    pub match_: PatchMatch,
    pub patch: Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyTo {
    HttpFilter,
    Cluster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchContext {
    SidecarInbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchOperation {
    InsertBefore,
    Add,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PatchMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PatchContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener: Option<ListenerMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterMatch>,
}

impl PatchMatch {
    /// Inbound HTTP filter chain, optionally anchored on a sub-filter.
    pub fn inbound_http_filter(sub_filter: Option<&str>) -> Self {
        Self {
            context: Some(PatchContext::SidecarInbound),
            listener: Some(ListenerMatch {
                filter_chain: FilterChainMatch {
                    filter: FilterMatch {
                        name: HTTP_CONNECTION_MANAGER.to_string(),
                        sub_filter: sub_filter.map(|name| SubFilterMatch {
                            name: name.to_string(),
                        }),
                    },
                },
            }),
            cluster: None,
        }
    }

    pub fn cluster_service(service: &str) -> Self {
        Self {
            cluster: Some(ClusterMatch {
                service: service.to_string(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerMatch {
    pub filter_chain: FilterChainMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChainMatch {
    pub filter: FilterMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMatch {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_filter: Option<SubFilterMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubFilterMatch {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMatch {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub operation: PatchOperation,
    pub value: PatchValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    HttpFilter(HttpFilter),
    Cluster(Box<Cluster>),
}

// ---- HTTP filters ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpFilter {
    pub name: String,
    pub typed_config: HttpFilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum HttpFilterConfig {
    #[serde(rename = "type.googleapis.com/envoy.extensions.filters.http.lua.v3.Lua")]
    Lua(LuaFilter),
    #[serde(rename = "type.googleapis.com/envoy.extensions.filters.http.oauth2.v3.OAuth2")]
    OAuth2(Box<OAuth2Filter>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuaFilter {
    pub default_source_code: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSource {
    pub inline_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuth2Filter {
    pub config: OAuth2Config,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuth2Config {
    pub auth_scopes: Vec<String>,
    pub authorization_endpoint: String,
    pub credentials: OAuth2Credentials,
    pub deny_redirect_matcher: Vec<HeaderMatcher>,
    pub end_session_endpoint: String,
    pub forward_bearer_token: bool,
    pub pass_through_matcher: Vec<HeaderMatcher>,
    pub redirect_path_matcher: PathMatcher,
    pub redirect_uri: String,
    /// RFC 8707 resource indicators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    pub retry_policy: RetryPolicy,
    pub signout_path: PathMatcher,
    pub token_endpoint: HttpUri,
    pub use_refresh_token: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuth2Credentials {
    pub client_id: String,
    pub hmac_secret: SdsSecret,
    pub token_secret: SdsSecret,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdsSecret {
    pub name: String,
    pub sds_config: SdsConfig,
}

impl SdsSecret {
    /// Secret read from a file, reloaded when `watched_directory` changes.
    pub fn from_file(name: &str, path: &str, watched_directory: &str) -> Self {
        Self {
            name: name.to_string(),
            sds_config: SdsConfig {
                path_config_source: PathConfigSource {
                    path: path.to_string(),
                    watched_directory: WatchedDirectory {
                        path: watched_directory.to_string(),
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdsConfig {
    pub path_config_source: PathConfigSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathConfigSource {
    pub path: String,
    pub watched_directory: WatchedDirectory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchedDirectory {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderMatcher {
    pub name: String,
    pub string_match: StringMatcher,
}

impl HeaderMatcher {
    pub fn exact(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            string_match: StringMatcher::exact(value),
        }
    }

    pub fn prefix(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            string_match: StringMatcher {
                exact: None,
                prefix: Some(value.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringMatcher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl StringMatcher {
    pub fn exact(value: &str) -> Self {
        Self {
            exact: Some(value.to_string()),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMatcher {
    pub path: StringMatcher,
}

impl PathMatcher {
    pub fn exact(path: &str) -> Self {
        Self {
            path: StringMatcher::exact(path),
        }
    }
}

/// Serialized as `{}`: Envoy's default retry behaviour.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RetryPolicy {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpUri {
    pub cluster: String,
    pub timeout: String,
    pub uri: String,
}

// ---- Cluster --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub connect_timeout: String,
    pub dns_lookup_family: String,
    pub lb_policy: String,
    pub load_assignment: LoadAssignment,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_socket: Option<TransportSocket>,
    #[serde(rename = "type")]
    pub discovery_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<LocalityLbEndpoints>,
}

impl LoadAssignment {
    /// A single endpoint at `address:port`.
    pub fn single(cluster_name: &str, address: &str, port: u16) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![LbEndpoint {
                    endpoint: Endpoint {
                        address: Address {
                            socket_address: SocketAddress {
                                address: address.to_string(),
                                port_value: port,
                            },
                        },
                    },
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityLbEndpoints {
    pub lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LbEndpoint {
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port_value: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportSocket {
    pub name: String,
    pub typed_config: TransportSocketConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum TransportSocketConfig {
    #[serde(
        rename = "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext"
    )]
    UpstreamTls { sni: String },
}

impl TransportSocket {
    pub fn upstream_tls(sni: &str) -> Self {
        Self {
            name: TLS_TRANSPORT_SOCKET.to_string(),
            typed_config: TransportSocketConfig::UpstreamTls {
                sni: sni.to_string(),
            },
        }
    }
}
