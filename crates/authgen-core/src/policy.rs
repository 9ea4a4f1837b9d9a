//! AuthPolicy document model.
//!
//! The policy arrives as a Kubernetes-style object (usually YAML). Non-object
//! entries in rule lists are dropped, scalar login parameters are stringified
//! and `null` sections count as absent. Shapes that cannot be interpreted at
//! all are reported as [`CompileError::Config`].

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CompileError;

/// Name used for the generated resources when `metadata.name` is absent.
pub const DEFAULT_POLICY_NAME: &str = "auth-policy";
/// Callback path the OAuth2 filter listens on by default.
pub const DEFAULT_REDIRECT_PATH: &str = "/oauth2/callback";
/// Sign-out path by default.
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";
/// Scopes requested when the policy does not list any.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "offline_access", "User.Read"];

/// Root policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: AuthPolicySpec,
}

impl AuthPolicy {
    /// Parse a policy from YAML text.
    pub fn from_yaml_str(input: &str) -> Result<Self, CompileError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Parse a policy from an already-decoded JSON value.
    pub fn from_json_value(value: Value) -> Result<Self, CompileError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Policy name, falling back to [`DEFAULT_POLICY_NAME`].
    pub fn name(&self) -> &str {
        self.metadata
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_POLICY_NAME)
    }
}

/// Subset of Kubernetes object metadata the compiler cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Desired state of an AuthPolicy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicySpec {
    /// Location of the provider's discovery document.
    #[serde(rename = "wellKnownURI", default, deserialize_with = "null_as_default")]
    pub well_known_uri: String,

    /// Requests that bypass login entirely.
    #[serde(default, deserialize_with = "lenient_list")]
    pub ignore_auth_rules: Vec<RequestMatcher>,

    /// Requests that must be authenticated. Claim conditions are carried
    /// along but play no part in compilation.
    #[serde(default, deserialize_with = "lenient_list")]
    pub auth_rules: Vec<RequestAuthRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_login: Option<AutoLogin>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub selector: WorkloadSelector,

    /// RFC 8707 resource indicators. Kept untyped so the shape check happens
    /// during assembly and reports a precise error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_resources: Option<Value>,
}

impl AuthPolicySpec {
    /// Matchers of `authRules` with their `when` clauses stripped.
    pub fn auth_rule_matchers(&self) -> Vec<RequestMatcher> {
        self.auth_rules
            .iter()
            .map(|rule| rule.matcher.clone())
            .collect()
    }
}

/// Paths and methods identifying a set of HTTP requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMatcher {
    #[serde(default, deserialize_with = "null_as_default")]
    pub paths: Vec<String>,

    /// Empty means every method.
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<String>,
}

impl RequestMatcher {
    /// Matcher covering every method on the given paths.
    pub fn any_method<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            methods: Vec::new(),
        }
    }
}

/// An `authRules` entry: a matcher plus optional claim conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestAuthRule {
    #[serde(flatten)]
    pub matcher: RequestMatcher,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,
}

/// Browser login settings as written in the policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLogin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_path: Option<String>,

    #[serde(default, deserialize_with = "scalar_map")]
    pub login_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

/// [`AutoLogin`] with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLoginConfig {
    pub login_path: Option<String>,
    pub redirect_path: String,
    pub logout_path: String,
    pub login_params: BTreeMap<String, String>,
    pub post_logout_redirect_uri: Option<String>,
    pub scopes: Vec<String>,
}

impl AutoLoginConfig {
    /// Resolve defaults. Empty strings and empty scope lists count as unset.
    pub fn resolve(auto_login: Option<&AutoLogin>) -> Self {
        let auto_login = auto_login.cloned().unwrap_or_default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        Self {
            login_path: non_empty(auto_login.login_path),
            redirect_path: non_empty(auto_login.redirect_path)
                .unwrap_or_else(|| DEFAULT_REDIRECT_PATH.to_string()),
            logout_path: non_empty(auto_login.logout_path)
                .unwrap_or_else(|| DEFAULT_LOGOUT_PATH.to_string()),
            login_params: auto_login.login_params,
            post_logout_redirect_uri: non_empty(auto_login.post_logout_redirect_uri),
            scopes: auto_login
                .scopes
                .filter(|scopes| !scopes.is_empty())
                .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Paths the OAuth2 filter itself handles, in the order they are
    /// appended to the `require` rules: redirect, logout, then login.
    pub fn implied_paths(&self) -> Vec<String> {
        let mut paths = vec![self.redirect_path.clone(), self.logout_path.clone()];
        if let Some(login_path) = &self.login_path {
            paths.push(login_path.clone());
        }
        paths
    }
}

/// Label selector choosing the workloads a policy applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSelector {
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_labels: BTreeMap<String, String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a list, silently dropping entries that are not objects.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    entries
        .into_iter()
        .filter(Value::is_object)
        .map(|entry| serde_json::from_value(entry).map_err(D::Error::custom))
        .collect()
}

/// Deserialize a string map whose values may be any scalar.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                other => {
                    return Err(D::Error::custom(format!(
                        "value of `{key}` must be a scalar, got {other}"
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}
