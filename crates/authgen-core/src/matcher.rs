//! Request matcher compilation.
//!
//! Turns `{paths, methods}` matchers into the ordered rule table the sidecar
//! script walks on every request. Patterns use Lua pattern syntax, so every
//! character Lua treats as an operator is escaped with `%` before the
//! wildcard translation runs.
//!
//! Three wildcard forms are understood:
//!
//! * a trailing `*` matches any suffix (`/api/*`)
//! * `{*}` matches exactly one path segment (`/users/{*}/profile`)
//! * `{**}` matches any remaining suffix and must be the last operator
//!   (`/static/{**}`, `/v1{**}`)

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use crate::error::CompileError;
use crate::lua;
use crate::policy::RequestMatcher;

/// Template matching one path segment.
pub const MATCH_ONE: &str = "{*}";
/// Template matching any suffix.
pub const MATCH_ANY: &str = "{**}";

/// Characters that must be prefixed with `%` to match literally.
const LUA_MAGIC: &[char] = &['%', '-', '.', '+', '?', '(', ')', '[', ']'];

/// RFC 3986 `pchar`, minus `*` which is reserved for wildcards.
static LITERAL_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-._~%!$&'()+,;:@=]+$").expect("Invalid path literal regex")
});

/// Push `ch`, escaped with `%` if Lua treats it as a pattern operator.
///
/// `*` never reaches this since it is the wildcard marker, and `^`/`$` only
/// carry meaning at the edges of a pattern, which [`compile_path`] controls.
fn push_literal(out: &mut String, ch: char) {
    if LUA_MAGIC.contains(&ch) {
        out.push('%');
    }
    out.push(ch);
}

/// Compile a single path into an anchored Lua pattern.
///
/// * `/api/*` becomes `^/api/.*` (prefix match).
/// * `/health` becomes `^/health$` (exact match).
/// * `/users/{*}` becomes `^/users/[^/]+$` and `/static/{**}` becomes
///   `^/static/.*$`.
/// * A path that already starts with `^` is used verbatim apart from escaping
///   and wildcard translation.
///
/// This never fails; [`validate_path`] decides which paths a policy may
/// declare.
pub fn compile_path(path: &str) -> String {
    let pre_anchored = path.starts_with('^');
    let mut body = String::with_capacity(path.len() + 8);
    let mut prefix_match = false;

    let mut rest = path;
    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix(MATCH_ANY) {
            body.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(MATCH_ONE) {
            body.push_str("[^/]+");
            rest = tail;
        } else {
            if ch == '*' {
                body.push_str(".*");
                prefix_match = true;
            } else {
                push_literal(&mut body, ch);
            }
            rest = &rest[ch.len_utf8()..];
        }
    }

    match (pre_anchored, prefix_match) {
        (true, _) => body,
        (false, true) => format!("^{body}"),
        (false, false) => format!("^{body}$"),
    }
}

/// Check that a declared rule path uses supported syntax.
///
/// Paths must start with `/`, and every literal segment must be a valid
/// RFC 3986 `pchar` sequence. A raw `*` may appear once, at the end, and
/// cannot be mixed with `{*}`/`{**}` templates. `{**}` must be the last
/// operator, either as its own segment or as the suffix of the last one.
/// Paths starting with `^` are raw patterns and are not checked.
pub fn validate_path(path: &str) -> Result<(), CompileError> {
    if path.starts_with('^') {
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err(CompileError::config(format!(
            "invalid path {path}: must start with '/'"
        )));
    }

    let has_braces = path.contains(['{', '}']);
    if has_raw_star(path) {
        if has_braces {
            return Err(beyond_template(path));
        }
        if path.matches('*').count() > 1 || !path.ends_with('*') {
            return Err(CompileError::config(format!(
                "invalid path {path}: '*' must appear only once, at the end"
            )));
        }
        return validate_literals(path, path.trim_end_matches('*'));
    }

    if has_braces {
        validate_template(path)
    } else {
        validate_literals(path, path)
    }
}

/// [`validate_path`] for every path of every matcher.
pub fn validate_matchers<'a, I>(matchers: I) -> Result<(), CompileError>
where
    I: IntoIterator<Item = &'a RequestMatcher>,
{
    matchers
        .into_iter()
        .flat_map(|matcher| &matcher.paths)
        .try_for_each(|path| validate_path(path))
}

fn has_raw_star(path: &str) -> bool {
    let mut in_braces = false;
    for ch in path.chars() {
        match ch {
            '{' => in_braces = true,
            '}' => in_braces = false,
            '*' if !in_braces => return true,
            _ => {}
        }
    }
    false
}

fn segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

fn validate_literals(path: &str, plain: &str) -> Result<(), CompileError> {
    segments(plain)
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .try_for_each(|segment| check_literal(path, segment, segment))
}

fn validate_template(path: &str) -> Result<(), CompileError> {
    let segments = segments(path);
    let mut seen_one = false;
    let mut seen_any = false;

    for (idx, segment) in segments.iter().enumerate() {
        let is_last = idx + 1 == segments.len();
        match *segment {
            MATCH_ONE | MATCH_ANY if seen_any => return Err(any_not_last(path)),
            MATCH_ONE => seen_one = true,
            MATCH_ANY => seen_any = true,
            segment if segment.ends_with(MATCH_ANY) => {
                let prefix = &segment[..segment.len() - MATCH_ANY.len()];
                if prefix.contains(['{', '}']) {
                    return Err(beyond_template(path));
                }
                check_literal(path, segment, prefix)?;
                if !is_last || seen_one || seen_any {
                    return Err(any_not_last(path));
                }
                seen_any = true;
            }
            segment if segment.contains(['{', '}']) => return Err(beyond_template(path)),
            segment => check_literal(path, segment, segment)?,
        }
    }
    Ok(())
}

fn check_literal(path: &str, segment: &str, literal: &str) -> Result<(), CompileError> {
    if LITERAL_SEGMENT.is_match(literal) {
        Ok(())
    } else {
        Err(CompileError::config(format!(
            "invalid path {path}: segment {segment:?} contains characters outside a path literal"
        )))
    }
}

fn beyond_template(path: &str) -> CompileError {
    CompileError::config(format!(
        "invalid path {path}: '{{' or '}}' outside a {MATCH_ONE} or {MATCH_ANY} template"
    ))
}

fn any_not_last(path: &str) -> CompileError {
    CompileError::config(format!(
        "invalid path {path}: {MATCH_ANY} must be the last operator"
    ))
}

/// One compiled path paired with the methods it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub pattern: String,
    /// Declared order, duplicates removed. Empty means every method.
    pub methods: IndexSet<String>,
}

impl CompiledRule {
    pub fn to_lua(&self) -> String {
        let methods: Vec<String> = self
            .methods
            .iter()
            .map(|method| format!("[{}]=true", lua::quote(method)))
            .collect();
        format!(
            "{{regex={},methods={{{}}}}}",
            lua::quote(&self.pattern),
            methods.join(",")
        )
    }
}

/// Ordered rule table produced from a list of matchers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTable {
    rules: Vec<CompiledRule>,
}

impl PatternTable {
    /// Compile matchers in declaration order, one rule per path.
    pub fn compile<'a, I>(matchers: I) -> Self
    where
        I: IntoIterator<Item = &'a RequestMatcher>,
    {
        let mut rules = Vec::new();
        for matcher in matchers {
            let methods: IndexSet<String> = matcher.methods.iter().cloned().collect();
            for path in &matcher.paths {
                rules.push(CompiledRule {
                    pattern: compile_path(path),
                    methods: methods.clone(),
                });
            }
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Lua table literal, `{}` when there are no rules.
    pub fn to_lua(&self) -> String {
        let parts: Vec<String> = self.rules.iter().map(CompiledRule::to_lua).collect();
        format!("{{{}}}", parts.join(","))
    }
}

impl fmt::Display for PatternTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lua())
    }
}
