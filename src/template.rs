//! Recursive `{name}` placeholder substitution over arbitrary
//! string/mapping/sequence structures.
//!
//! Substitution is deliberately best-effort: if any placeholder in
//! a string references a name absent from the environment, that
//! string is returned byte-for-byte unchanged. Failure is silent,
//! never fatal, and never partial — literal `{...}` text passes
//! through. See [`resolve`].

use crate::environment::Environment;
use crate::model::TestStep;
use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Matches a single `{name}` placeholder and captures the name.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}]+)\}")
        .expect("failed to compile placeholder regex")
});

/// Resolve placeholders in `value` against `env`, recursively:
///
/// - strings are substitution targets;
/// - object values are resolved recursively, keys unchanged;
/// - array elements are resolved when they are strings or objects,
///   anything else (including nested arrays) passes through;
/// - all other value types are returned unchanged.
///
/// Pure: never mutates the environment.
pub fn resolve(value: &Value, env: &Environment) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_text(s, env)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, env)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => {
                        Value::String(resolve_text(s, env))
                    }
                    Value::Object(_) => resolve(item, env),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute placeholders in a single string. Returns the input
/// unchanged when it contains no placeholders or when any
/// referenced name is absent from the environment.
pub fn resolve_text(text: &str, env: &Environment) -> String {
    let names: Vec<&str> = PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    if names.is_empty() {
        return text.to_string();
    }
    // A single unknown name aborts substitution for this string
    // only, not for the rest of the tree.
    if names.iter().any(|name| !env.contains(name)) {
        return text.to_string();
    }

    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| {
            match env.get(&caps[1]) {
                Some(value) => render(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Render an environment value for interpolation into a string:
/// strings verbatim, everything else as compact JSON text.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a whole step against the current environment snapshot.
///
/// The step is round-tripped through a JSON tree, which doubles as
/// the per-repetition deep copy: per-iteration substitution can
/// never leak into the declared step or into sibling steps.
pub fn resolve_step(step: &TestStep, env: &Environment) -> Result<TestStep> {
    let tree = serde_json::to_value(step)?;
    let resolved = resolve(&tree, env);
    Ok(serde_json::from_value(resolved)?)
}
