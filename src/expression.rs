//! Sandboxed CEL expression hook for `exec` assertions and
//! `setenv` extraction rules.
//!
//! Test cases are externally authored data, not trusted code, so
//! the hook is a narrow expression grammar (field access,
//! comparisons, literals) bound only to the read-only response
//! context — never full host-language execution.

use anyhow::{anyhow, Result};
use cel::{Context, Program};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Evaluate an `exec` assertion against the response-context
/// bindings. Non-boolean results are coerced: non-zero/non-empty
/// is truthy.
pub fn evaluate_assertion(
    expr: &str,
    bindings: &HashMap<String, Value>,
) -> Result<bool> {
    let program = compile(expr)?;
    let context = build_context(bindings)?;
    let result = program
        .execute(&context)
        .map_err(|e| anyhow!("expression execution error: {e}"))?;

    Ok(value_is_truthy(&result))
}

/// Resolve a `setenv` expression to a JSON value, e.g.
/// `rjson['id']` to the extracted field.
pub fn resolve_value(
    expr: &str,
    bindings: &HashMap<String, Value>,
) -> Result<Value> {
    let program = compile(expr)?;
    let context = build_context(bindings)?;
    let result = program
        .execute(&context)
        .map_err(|e| anyhow!("expression execution error: {e}"))?;

    result
        .json()
        .map_err(|e| anyhow!("failed to convert result to JSON: {e}"))
}

/// Rewrite `len(x)` to CEL's `size(x)` so case authors can use
/// the conventional spelling.
fn preprocess_expr(expr: &str) -> String {
    use regex::Regex;
    use std::sync::LazyLock;

    static LEN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\blen\(").expect("failed to compile len regex")
    });

    LEN_RE.replace_all(expr, "size(").into_owned()
}

fn compile(expr: &str) -> Result<Program> {
    let processed = preprocess_expr(expr);
    debug!("Compiling expression: {processed}");
    Program::compile(&processed)
        .map_err(|e| anyhow!("expression compile error for '{processed}': {e}"))
}

fn build_context<'a>(
    bindings: &HashMap<String, Value>,
) -> Result<Context<'a>> {
    let mut context = Context::default();

    for (key, value) in bindings {
        context
            .add_variable(key.as_str(), value.clone())
            .map_err(|e| {
                anyhow!("failed to bind '{key}' into expression context: {e}")
            })?;
    }

    // type_of(x) - type name as a string; `type` is a CEL keyword
    context.add_function("type_of", |v: cel::Value| -> Arc<String> {
        let t = match v {
            cel::Value::Int(_) => "int",
            cel::Value::UInt(_) => "uint",
            cel::Value::Float(_) => "double",
            cel::Value::String(_) => "string",
            cel::Value::Bool(_) => "bool",
            cel::Value::List(_) => "list",
            cel::Value::Map(_) => "map",
            cel::Value::Null => "null",
            cel::Value::Bytes(_) => "bytes",
            _ => "unknown",
        };
        Arc::new(t.to_string())
    });

    Ok(context)
}

fn value_is_truthy(value: &cel::Value) -> bool {
    match value {
        cel::Value::Bool(b) => *b,
        cel::Value::Int(i) => *i != 0,
        cel::Value::UInt(u) => *u != 0,
        cel::Value::Float(f) => *f != 0.0,
        cel::Value::String(s) => !s.is_empty(),
        cel::Value::Null => false,
        cel::Value::List(list) => !list.is_empty(),
        cel::Value::Map(map) => !map.map.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_bindings(
        pairs: Vec<(&str, Value)>,
    ) -> HashMap<String, Value> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn response_bindings() -> HashMap<String, Value> {
        make_bindings(vec![
            (
                "r",
                json!({
                    "status": 200,
                    "headers": {"content-type": "application/json"},
                    "body": "{\"id\": \"42\"}"
                }),
            ),
            ("rjson", json!({"id": "42", "tags": ["a", "b"]})),
            ("rxml", Value::Null),
            ("rhtml", Value::Null),
        ])
    }

    #[test]
    fn field_access_and_comparison() {
        let bindings = response_bindings();
        assert!(
            evaluate_assertion("r.status == 200", &bindings).unwrap()
        );
        assert!(evaluate_assertion(
            "rjson['id'] == \"42\"",
            &bindings
        )
        .unwrap());
        assert!(!evaluate_assertion(
            "rjson.id == \"other\"",
            &bindings
        )
        .unwrap());
    }

    #[test]
    fn logical_operators() {
        let bindings = response_bindings();
        assert!(evaluate_assertion(
            "r.status == 200 && rjson.id == \"42\"",
            &bindings
        )
        .unwrap());
        assert!(evaluate_assertion(
            "r.status == 500 || size(rjson.tags) == 2",
            &bindings
        )
        .unwrap());
    }

    #[test]
    fn len_is_an_alias_for_size() {
        let bindings = response_bindings();
        assert!(
            evaluate_assertion("len(rjson.tags) == 2", &bindings)
                .unwrap()
        );
    }

    #[test]
    fn null_bindings_are_falsy() {
        let bindings = response_bindings();
        assert!(!evaluate_assertion("rxml", &bindings).unwrap());
    }

    #[test]
    fn string_functions() {
        let bindings = response_bindings();
        assert!(evaluate_assertion(
            "r.headers['content-type'].startsWith(\"application/\")",
            &bindings
        )
        .unwrap());
        assert!(evaluate_assertion(
            "r.body.contains(\"42\")",
            &bindings
        )
        .unwrap());
    }

    #[test]
    fn type_of_function() {
        let bindings = response_bindings();
        assert!(evaluate_assertion(
            "type_of(rjson.id) == \"string\"",
            &bindings
        )
        .unwrap());
        assert!(evaluate_assertion(
            "type_of(rjson.tags) == \"list\"",
            &bindings
        )
        .unwrap());
    }

    #[test]
    fn resolve_value_extracts_fields() {
        let bindings = response_bindings();
        let v = resolve_value("rjson['id']", &bindings).unwrap();
        assert_eq!(v, json!("42"));

        let v = resolve_value("rjson.tags[1]", &bindings).unwrap();
        assert_eq!(v, json!("b"));
    }

    #[test]
    fn unknown_binding_is_an_error() {
        let bindings = response_bindings();
        assert!(resolve_value("nosuch.field", &bindings).is_err());
    }

    #[test]
    fn compile_error_is_reported() {
        let bindings = HashMap::new();
        assert!(
            evaluate_assertion("invalid %%% expr", &bindings).is_err()
        );
    }
}
