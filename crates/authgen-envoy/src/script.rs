//! The Lua script embedded in the generated filter.
//!
//! The script body is a fixed template; per-policy values are substituted
//! into `{{name}}` placeholders in a single pass, so substituted text is never
//! re-scanned for placeholders.

use authgen_core::encoding::login_params_to_lua;
use authgen_core::{CompileError, lua};

use crate::assembler::CompiledPolicy;

const TEMPLATE: &str = include_str!("resources/auth_router.lua");

/// Header the script sets on requests that may skip login.
pub const BYPASS_LOGIN_HEADER: &str = "x-bypass-login";

/// Header the script sets on requests that must get a 401 instead of a
/// login redirect.
pub const DENY_REDIRECT_HEADER: &str = "x-deny-redirect";

/// Values substituted into the script, in template order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams {
    pub ignore_rules: String,
    pub require_rules: String,
    pub deny_redirect_rules: String,
    pub authorize_endpoint: String,
    pub login_params: String,
    pub end_session_endpoint: String,
    pub post_logout_redirect_uri: String,
    pub bypass_header: String,
    pub deny_redirect_header: String,
}

impl ScriptParams {
    /// Placeholder names, in the order they are declared in the script.
    pub const ORDER: [&'static str; 9] = [
        "ignore_rules",
        "require_rules",
        "deny_redirect_rules",
        "authorize_endpoint",
        "login_params",
        "end_session_endpoint",
        "post_logout_redirect_uri",
        "bypass_header",
        "deny_redirect_header",
    ];

    pub fn from_policy(policy: &CompiledPolicy) -> Self {
        Self {
            ignore_rules: policy.ignore.to_lua(),
            require_rules: policy.require.to_lua(),
            deny_redirect_rules: policy.deny.to_lua(),
            authorize_endpoint: lua::quote(&policy.endpoints.authorize_endpoint),
            login_params: login_params_to_lua(&policy.login_params),
            end_session_endpoint: lua::quote(policy.endpoints.end_session_or_empty()),
            post_logout_redirect_uri: lua::quote(&policy.post_logout_redirect_uri),
            bypass_header: lua::quote(BYPASS_LOGIN_HEADER),
            deny_redirect_header: lua::quote(DENY_REDIRECT_HEADER),
        }
    }

    /// `(placeholder, Lua expression)` pairs in [`Self::ORDER`].
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("ignore_rules", self.ignore_rules.as_str()),
            ("require_rules", self.require_rules.as_str()),
            ("deny_redirect_rules", self.deny_redirect_rules.as_str()),
            ("authorize_endpoint", self.authorize_endpoint.as_str()),
            ("login_params", self.login_params.as_str()),
            ("end_session_endpoint", self.end_session_endpoint.as_str()),
            ("post_logout_redirect_uri", self.post_logout_redirect_uri.as_str()),
            ("bypass_header", self.bypass_header.as_str()),
            ("deny_redirect_header", self.deny_redirect_header.as_str()),
        ]
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Fill the script template.
pub fn render_script(params: &ScriptParams) -> Result<String, CompileError> {
    fill_template(TEMPLATE, params)
}

fn fill_template(template: &str, params: &ScriptParams) -> Result<String, CompileError> {
    let mut out = String::with_capacity(template.len() + 512);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            CompileError::serialization("unterminated placeholder in script template")
        })?;
        let name = after[..end].trim();
        let value = params.lookup(name).ok_or_else(|| {
            CompileError::serialization(format!("unknown placeholder `{name}` in script template"))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
