//! Combines the parsed policy with the resolved identity provider into one
//! immutable bundle. No I/O happens here.

use std::collections::BTreeMap;

use authgen_core::encoding::{encode_login_params, encode_post_logout};
use authgen_core::{
    AuthPolicy, AutoLoginConfig, CompileError, PatternTable, RequestMatcher, validate_matchers,
};
use authgen_oidc::{IdentityEndpoints, NetworkTarget};
use serde_json::Value;

/// Everything the assembler waits on.
#[derive(Debug, Clone)]
pub struct BundleInputs<'a> {
    pub policy: &'a AuthPolicy,
    pub endpoints: IdentityEndpoints,
    pub target: NetworkTarget,
}

/// A fully compiled policy, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPolicy {
    pub name: String,
    pub namespace: Option<String>,

    /// Requests that skip login.
    pub ignore: PatternTable,
    /// Requests that always need a session, including the filter's own paths.
    pub require: PatternTable,
    /// Requests answered with 401 instead of a redirect. Always empty for now.
    pub deny: PatternTable,

    pub endpoints: IdentityEndpoints,
    pub target: NetworkTarget,

    /// Form-encoded, ascending key order.
    pub login_params: BTreeMap<String, String>,
    /// Form-encoded; `""` when not configured.
    pub post_logout_redirect_uri: String,
    pub scopes: Vec<String>,

    pub redirect_path: String,
    pub logout_path: String,
    pub login_path: Option<String>,

    pub workload_labels: BTreeMap<String, String>,
    pub accepted_resources: Option<Vec<String>>,
}

impl CompiledPolicy {
    /// Name of the generated EnvoyFilter.
    pub fn filter_name(&self) -> String {
        format!("{}-login", self.name)
    }
}

/// Reject a malformed policy before anything is resolved: rule paths must use
/// supported syntax and `acceptedResources` must be a list of strings.
pub fn validate_policy(policy: &AuthPolicy) -> Result<(), CompileError> {
    validate_rule_paths(policy)?;
    accepted_resources(policy.spec.accepted_resources.as_ref())?;
    Ok(())
}

fn validate_rule_paths(policy: &AuthPolicy) -> Result<(), CompileError> {
    let spec = &policy.spec;
    validate_matchers(&spec.ignore_auth_rules)?;
    validate_matchers(spec.auth_rules.iter().map(|rule| &rule.matcher))
}

pub fn assemble(inputs: BundleInputs<'_>) -> Result<CompiledPolicy, CompileError> {
    let BundleInputs {
        policy,
        endpoints,
        target,
    } = inputs;
    validate_rule_paths(policy)?;
    let spec = &policy.spec;
    let auto_login = AutoLoginConfig::resolve(spec.auto_login.as_ref());

    let mut require_matchers = spec.auth_rule_matchers();
    require_matchers.push(RequestMatcher::any_method(auto_login.implied_paths()));

    let accepted_resources = accepted_resources(spec.accepted_resources.as_ref())?;

    Ok(CompiledPolicy {
        name: policy.name().to_string(),
        namespace: policy.metadata.namespace.clone().filter(|ns| !ns.is_empty()),
        ignore: PatternTable::compile(&spec.ignore_auth_rules),
        require: PatternTable::compile(&require_matchers),
        deny: PatternTable::default(),
        endpoints,
        target,
        login_params: encode_login_params(&auto_login.login_params),
        post_logout_redirect_uri: encode_post_logout(
            auto_login.post_logout_redirect_uri.as_deref(),
        ),
        scopes: auto_login.scopes,
        redirect_path: auto_login.redirect_path,
        logout_path: auto_login.logout_path,
        login_path: auto_login.login_path,
        workload_labels: spec.selector.match_labels.clone(),
        accepted_resources,
    })
}

/// `acceptedResources` must be a list of strings. Absent, `null` and `[]`
/// all mean no resource indicators.
fn accepted_resources(value: Option<&Value>) -> Result<Option<Vec<String>>, CompileError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(CompileError::config(format!(
                "spec.acceptedResources must be a list of strings, got {other}"
            )));
        }
    };

    let resources = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                CompileError::config(format!(
                    "spec.acceptedResources must contain only strings, got {item}"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((!resources.is_empty()).then_some(resources))
}
