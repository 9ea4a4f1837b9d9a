//! Query parameter encoding for the login redirect and the sign-out flow.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::lua;

/// Form-encode a single query value (space becomes `+`).
pub fn encode_query_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Encode every value of `params`. Keys are kept as-is and the result is
/// always in ascending key order.
pub fn encode_login_params<I, K, V>(params: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    params
        .into_iter()
        .map(|(key, value)| (key.into(), encode_query_value(value.as_ref())))
        .collect()
}

/// Encode the post-logout redirect target; absent encodes to `""`.
pub fn encode_post_logout(uri: Option<&str>) -> String {
    uri.map(encode_query_value).unwrap_or_default()
}

/// Render already-encoded login params as a Lua table.
pub fn login_params_to_lua(params: &BTreeMap<String, String>) -> String {
    lua::string_table(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}
