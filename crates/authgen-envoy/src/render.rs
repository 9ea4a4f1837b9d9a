use std::time::Duration;

use authgen_config::EnvoySettings;
use authgen_core::CompileError;

use crate::assembler::CompiledPolicy;
use crate::model::*;
use crate::script::{BYPASS_LOGIN_HEADER, DENY_REDIRECT_HEADER, ScriptParams, render_script};

/// Builds the EnvoyFilter for a compiled policy.
///
/// Produces three patches in a fixed order: the Lua classifier in front of the
/// connection manager, the identity-provider cluster, and the OAuth2 filter in
/// front of `jwt_authn`.
#[derive(Debug, Clone, Default)]
pub struct FilterRenderer {
    settings: EnvoySettings,
}

impl FilterRenderer {
    pub fn new(settings: EnvoySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EnvoySettings {
        &self.settings
    }

    pub fn render(&self, policy: &CompiledPolicy) -> Result<EnvoyFilter, CompileError> {
        let script = render_script(&ScriptParams::from_policy(policy))?;

        Ok(EnvoyFilter {
            api_version: ENVOY_FILTER_API_VERSION.to_string(),
            kind: ENVOY_FILTER_KIND.to_string(),
            metadata: ObjectMeta {
                name: policy.filter_name(),
                namespace: policy.namespace.clone(),
            },
            spec: EnvoyFilterSpec {
                config_patches: vec![
                    lua_patch(script),
                    self.cluster_patch(policy),
                    self.oauth2_patch(policy),
                ],
                workload_selector: WorkloadSelector {
                    labels: policy.workload_labels.clone(),
                },
            },
        })
    }

    fn cluster_patch(&self, policy: &CompiledPolicy) -> ConfigPatch {
        let target = &policy.target;
        let cluster_name = &self.settings.cluster_name;

        let cluster = Cluster {
            connect_timeout: format_duration(self.settings.connect_timeout),
            dns_lookup_family: "V4_ONLY".to_string(),
            lb_policy: "ROUND_ROBIN".to_string(),
            load_assignment: LoadAssignment::single(cluster_name, &target.host, target.port),
            name: cluster_name.clone(),
            transport_socket: target
                .tls
                .then(|| TransportSocket::upstream_tls(&target.host)),
            discovery_type: "LOGICAL_DNS".to_string(),
        };

        ConfigPatch {
            apply_to: ApplyTo::Cluster,
            match_: PatchMatch::cluster_service(cluster_name),
            patch: Patch {
                operation: PatchOperation::Add,
                value: PatchValue::Cluster(Box::new(cluster)),
            },
        }
    }

    fn oauth2_patch(&self, policy: &CompiledPolicy) -> ConfigPatch {
        let settings = &self.settings;

        let config = OAuth2Config {
            auth_scopes: policy.scopes.clone(),
            authorization_endpoint: policy.endpoints.authorize_endpoint.clone(),
            credentials: OAuth2Credentials {
                client_id: settings.client_id.clone(),
                hmac_secret: SdsSecret::from_file(
                    "hmac",
                    &settings.hmac_secret_path,
                    &settings.credentials_dir,
                ),
                token_secret: SdsSecret::from_file(
                    "token",
                    &settings.token_secret_path,
                    &settings.credentials_dir,
                ),
            },
            deny_redirect_matcher: vec![HeaderMatcher::exact(DENY_REDIRECT_HEADER, "true")],
            end_session_endpoint: policy.endpoints.end_session_or_empty().to_string(),
            forward_bearer_token: true,
            pass_through_matcher: vec![
                HeaderMatcher::prefix("authorization", "Bearer "),
                HeaderMatcher::exact(BYPASS_LOGIN_HEADER, "true"),
            ],
            redirect_path_matcher: PathMatcher::exact(&policy.redirect_path),
            redirect_uri: format!("https://%REQ(:authority)%{}", policy.redirect_path),
            resources: policy.accepted_resources.clone(),
            retry_policy: RetryPolicy::default(),
            signout_path: PathMatcher::exact(&policy.logout_path),
            token_endpoint: HttpUri {
                cluster: settings.cluster_name.clone(),
                timeout: format_duration(settings.token_timeout),
                uri: policy.endpoints.token_endpoint.clone(),
            },
            use_refresh_token: true,
        };

        ConfigPatch {
            apply_to: ApplyTo::HttpFilter,
            match_: PatchMatch::inbound_http_filter(Some(JWT_AUTHN_FILTER)),
            patch: Patch {
                operation: PatchOperation::InsertBefore,
                value: PatchValue::HttpFilter(HttpFilter {
                    name: OAUTH2_FILTER.to_string(),
                    typed_config: HttpFilterConfig::OAuth2(Box::new(OAuth2Filter { config })),
                }),
            },
        }
    }
}

fn lua_patch(script: String) -> ConfigPatch {
    ConfigPatch {
        apply_to: ApplyTo::HttpFilter,
        match_: PatchMatch::inbound_http_filter(None),
        patch: Patch {
            operation: PatchOperation::InsertBefore,
            value: PatchValue::HttpFilter(HttpFilter {
                name: LUA_FILTER.to_string(),
                typed_config: HttpFilterConfig::Lua(LuaFilter {
                    default_source_code: DataSource {
                        inline_string: script,
                    },
                }),
            }),
        },
    }
}

/// Protobuf JSON duration, e.g. `10s` or `2.5s`.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}s", duration.as_secs_f64())
    }
}
