use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use authgen_config::Settings;
use authgen_core::{AuthPolicy, CompileError};
use authgen_envoy::{
    DocumentSerializer, JsonSerializer, PolicyCompiler, ScriptParams, YamlSerializer,
};
use authgen_oidc::{DiscoveryDocument, DiscoveryFetcher};
use serde_json::{Value, json};

const MOCK_WELL_KNOWN: &str =
    "http://mock-oauth2.auth:8080/default/.well-known/openid-configuration";

/// Fetcher serving one fixed document, counting calls.
struct FixedFetcher {
    document: DiscoveryDocument,
    calls: AtomicUsize,
}

impl FixedFetcher {
    fn new(authorize: &str, token: &str, end_session: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            document: DiscoveryDocument {
                authorization_endpoint: Some(authorize.to_string()),
                token_endpoint: Some(token.to_string()),
                end_session_endpoint: end_session.map(str::to_string),
            },
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DiscoveryFetcher for FixedFetcher {
    async fn fetch(&self, _uri: &str) -> Result<DiscoveryDocument, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone())
    }
}

fn compiler_with(fetcher: Arc<FixedFetcher>) -> PolicyCompiler {
    PolicyCompiler::with_fetcher(&Settings::default(), fetcher).unwrap()
}

fn offline_compiler() -> (PolicyCompiler, Arc<FixedFetcher>) {
    let fetcher = FixedFetcher::new("unused", "unused", None);
    (compiler_with(fetcher.clone()), fetcher)
}

fn policy(yaml: &str) -> AuthPolicy {
    AuthPolicy::from_yaml_str(yaml).unwrap()
}

fn full_policy() -> AuthPolicy {
    policy(&format!(
        r#"
apiVersion: ztoperator.kartverket.no/v1alpha1
kind: AuthPolicy
metadata:
  name: shop
spec:
  wellKnownURI: {MOCK_WELL_KNOWN}
  ignoreAuthRules:
    - paths: ["/public/*", "/health"]
      methods: ["GET"]
  authRules:
    - paths: ["/admin/*"]
      when:
        - claim: groups
          values: ["admins"]
  autoLogin:
    loginPath: /login
    loginParams:
      prompt: login
    postLogoutRedirectUri: https://shop.example.com/
  selector:
    matchLabels:
      app: shop
"#
    ))
}

async fn compile_json(compiler: &PolicyCompiler, policy: &AuthPolicy) -> Value {
    let filter = compiler.compile_filter(policy).await.unwrap();
    serde_json::to_value(&filter).unwrap()
}

#[tokio::test]
async fn mock_provider_document_shape() {
    let (compiler, fetcher) = offline_compiler();
    let document = compile_json(&compiler, &full_policy()).await;

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

    assert_json_include!(
        actual: document.clone(),
        expected: json!({
            "apiVersion": "networking.istio.io/v1alpha3",
            "kind": "EnvoyFilter",
            "metadata": {"name": "shop-login"},
            "spec": {
                "workloadSelector": {"labels": {"app": "shop"}}
            }
        })
    );

    let patches = document["spec"]["configPatches"].as_array().unwrap();
    assert_eq!(patches.len(), 3);

    assert_json_include!(
        actual: patches[0].clone(),
        expected: json!({
            "applyTo": "HTTP_FILTER",
            "match": {
                "context": "SIDECAR_INBOUND",
                "listener": {"filterChain": {"filter": {
                    "name": "envoy.filters.network.http_connection_manager"
                }}}
            },
            "patch": {
                "operation": "INSERT_BEFORE",
                "value": {
                    "name": "envoy.filters.http.lua",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.filters.http.lua.v3.Lua"
                    }
                }
            }
        })
    );

    assert_eq!(
        patches[1],
        json!({
            "applyTo": "CLUSTER",
            "match": {"cluster": {"service": "oauth"}},
            "patch": {
                "operation": "ADD",
                "value": {
                    "connect_timeout": "10s",
                    "dns_lookup_family": "V4_ONLY",
                    "lb_policy": "ROUND_ROBIN",
                    "load_assignment": {
                        "cluster_name": "oauth",
                        "endpoints": [{"lb_endpoints": [{"endpoint": {"address": {
                            "socket_address": {"address": "mock-oauth2.auth", "port_value": 8080}
                        }}}]}]
                    },
                    "name": "oauth",
                    "type": "LOGICAL_DNS"
                }
            }
        })
    );

    assert_eq!(
        patches[2],
        json!({
            "applyTo": "HTTP_FILTER",
            "match": {
                "context": "SIDECAR_INBOUND",
                "listener": {"filterChain": {"filter": {
                    "name": "envoy.filters.network.http_connection_manager",
                    "subFilter": {"name": "envoy.filters.http.jwt_authn"}
                }}}
            },
            "patch": {
                "operation": "INSERT_BEFORE",
                "value": {
                    "name": "envoy.filters.http.oauth2",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.filters.http.oauth2.v3.OAuth2",
                        "config": {
                            "auth_scopes": ["openid", "offline_access", "User.Read"],
                            "authorization_endpoint": "http://mock-oauth2.auth:8080/default/authorize",
                            "credentials": {
                                "client_id": "entraid_server",
                                "hmac_secret": {
                                    "name": "hmac",
                                    "sds_config": {"path_config_source": {
                                        "path": "/etc/istio/config/hmac-secret.yaml",
                                        "watched_directory": {"path": "/etc/istio/config"}
                                    }}
                                },
                                "token_secret": {
                                    "name": "token",
                                    "sds_config": {"path_config_source": {
                                        "path": "/etc/istio/config/token-secret.yaml",
                                        "watched_directory": {"path": "/etc/istio/config"}
                                    }}
                                }
                            },
                            "deny_redirect_matcher": [
                                {"name": "x-deny-redirect", "string_match": {"exact": "true"}}
                            ],
                            "end_session_endpoint": "http://mock-oauth2.auth:8080/default/endsession",
                            "forward_bearer_token": true,
                            "pass_through_matcher": [
                                {"name": "authorization", "string_match": {"prefix": "Bearer "}},
                                {"name": "x-bypass-login", "string_match": {"exact": "true"}}
                            ],
                            "redirect_path_matcher": {"path": {"exact": "/oauth2/callback"}},
                            "redirect_uri": "https://%REQ(:authority)%/oauth2/callback",
                            "retry_policy": {},
                            "signout_path": {"path": {"exact": "/logout"}},
                            "token_endpoint": {
                                "cluster": "oauth",
                                "timeout": "5s",
                                "uri": "http://mock-oauth2.auth:8080/default/token"
                            },
                            "use_refresh_token": true
                        }
                    }
                }
            }
        })
    );
}

#[tokio::test]
async fn lua_script_carries_compiled_tables() {
    let (compiler, _) = offline_compiler();
    let document = compile_json(&compiler, &full_policy()).await;
    let script = document["spec"]["configPatches"][0]["patch"]["value"]["typed_config"]
        ["default_source_code"]["inline_string"]
        .as_str()
        .unwrap();

    assert!(script.contains(
        r#"local ignore_rules = {{regex="^/public/.*",methods={["GET"]=true}},{regex="^/health$",methods={["GET"]=true}}}"#
    ));
    assert!(script.contains(
        r#"local require_rules = {{regex="^/admin/.*",methods={}},{regex="^/oauth2/callback$",methods={}},{regex="^/logout$",methods={}},{regex="^/login$",methods={}}}"#
    ));
    assert!(script.contains("local deny_redirect_rules = {}"));
    assert!(script.contains(
        r#"local authorize_endpoint = "http://mock-oauth2.auth:8080/default/authorize""#
    ));
    assert!(script.contains(r#"local login_params = {["prompt"]="login"}"#));
    assert!(script.contains(
        r#"local end_session_endpoint = "http://mock-oauth2.auth:8080/default/endsession""#
    ));
    assert!(script.contains(
        r#"local post_logout_redirect_uri = "https%3A%2F%2Fshop.example.com%2F""#
    ));
    for name in ScriptParams::ORDER {
        let placeholder = format!("{{{{{name}}}}}");
        assert!(!script.contains(&placeholder), "unfilled {placeholder}");
    }
}

#[tokio::test]
async fn compilation_is_deterministic() {
    let (compiler, _) = offline_compiler();
    let policy = full_policy();

    let first = compiler.compile_filter(&policy).await.unwrap();
    let second = compiler.compile_filter(&policy).await.unwrap();

    assert_eq!(
        YamlSerializer.serialize(&first).unwrap(),
        YamlSerializer.serialize(&second).unwrap()
    );
    assert_eq!(
        JsonSerializer.serialize(&first).unwrap(),
        JsonSerializer.serialize(&second).unwrap()
    );
}

#[tokio::test]
async fn live_discovery_with_tls() {
    let fetcher = FixedFetcher::new(
        "https://login.example.com/oauth2/authorize",
        "https://login.example.com/oauth2/token",
        None,
    );
    let compiler = compiler_with(fetcher.clone());
    let policy = policy(
        r#"
spec:
  wellKnownURI: https://login.example.com/.well-known/openid-configuration
  acceptedResources:
    - https://api.example.com
"#,
    );

    let document = compile_json(&compiler, &policy).await;
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let cluster = &document["spec"]["configPatches"][1]["patch"]["value"];
    assert_eq!(
        cluster["transport_socket"],
        json!({
            "name": "envoy.transport_sockets.tls",
            "typed_config": {
                "@type": "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext",
                "sni": "login.example.com"
            }
        })
    );
    assert_eq!(
        cluster["load_assignment"]["endpoints"][0]["lb_endpoints"][0]["endpoint"]["address"]
            ["socket_address"]["port_value"],
        443
    );

    let config = &document["spec"]["configPatches"][2]["patch"]["value"]["typed_config"]["config"];
    assert_eq!(config["end_session_endpoint"], "");
    assert_eq!(config["resources"], json!(["https://api.example.com"]));
}

#[tokio::test]
async fn resources_omitted_without_accepted_resources() {
    let (compiler, _) = offline_compiler();
    let document = compile_json(&compiler, &full_policy()).await;
    let config = &document["spec"]["configPatches"][2]["patch"]["value"]["typed_config"]["config"];
    assert!(config.get("resources").is_none());
    assert!(document["spec"]["configPatches"][1]["patch"]["value"]
        .get("transport_socket")
        .is_none());
}

#[tokio::test]
async fn yaml_output_matches_json_structure() {
    let (compiler, _) = offline_compiler();
    let filter = compiler.compile_filter(&full_policy()).await.unwrap();
    let yaml = YamlSerializer.serialize(&filter).unwrap();

    assert!(yaml.starts_with("apiVersion: networking.istio.io/v1alpha3\n"));
    assert!(yaml.contains("inline_string:"));
    assert!(yaml.contains("type.googleapis.com/envoy.extensions.filters.http.lua.v3.Lua"));

    // Round-trips to the same structure as the JSON rendering.
    let from_yaml: Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(from_yaml, serde_json::to_value(&filter).unwrap());
}

#[tokio::test]
async fn missing_well_known_uri_is_config_error() {
    let (compiler, fetcher) = offline_compiler();
    let err = compiler
        .compile_filter(&policy("metadata:\n  name: x\nspec: {}\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::Config(_)));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bad_accepted_resources_is_config_error() {
    let (compiler, _) = offline_compiler();
    let policy = policy(&format!(
        "spec:\n  wellKnownURI: {MOCK_WELL_KNOWN}\n  acceptedResources: not-a-list\n"
    ));
    let err = compiler.compile_filter(&policy).await.unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn malformed_policy_is_rejected_before_discovery() {
    let fetcher = FixedFetcher::new("https://idp/authorize", "https://idp/token", None);
    let compiler = compiler_with(fetcher.clone());

    for body in [
        "acceptedResources: not-a-list",
        "acceptedResources: [https://api.a, 3]",
        "ignoreAuthRules:\n    - paths: [\"relative/*\"]",
        "authRules:\n    - paths: [\"/api/{**}/{*}\"]",
    ] {
        let policy = policy(&format!(
            "spec:\n  wellKnownURI: https://idp.example.com/.well-known/openid-configuration\n  {body}\n"
        ));
        let err = compiler.compile_filter(&policy).await.unwrap_err();
        assert_eq!(err.kind(), "config", "{body}");
    }
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn template_paths_reach_the_script() {
    let (compiler, _) = offline_compiler();
    let policy = policy(&format!(
        r#"
spec:
  wellKnownURI: {MOCK_WELL_KNOWN}
  ignoreAuthRules:
    - paths: ["/users/{{*}}/avatar", "/assets/{{**}}"]
"#
    ));
    let document = compile_json(&compiler, &policy).await;
    let script = document["spec"]["configPatches"][0]["patch"]["value"]["typed_config"]
        ["default_source_code"]["inline_string"]
        .as_str()
        .unwrap();
    assert!(script.contains(
        r#"local ignore_rules = {{regex="^/users/[^/]+/avatar$",methods={}},{regex="^/assets/.*$",methods={}}}"#
    ));
}
