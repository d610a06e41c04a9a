//! Assertion evaluation against an observed response.
//!
//! Two independent checks: header assertions and reply assertions
//! (status code plus optional `exec` expression). Any failure
//! here aborts the entire case, not just the step.

use crate::expression;
use crate::model::{Asserts, ReplyAssert};
use crate::response::ResponseContext;

/// Evaluate every declared assertion. Returns the first failure
/// reason, or `None` when all checks pass.
pub fn evaluate(
    asserts: &Asserts,
    ctx: &ResponseContext,
) -> Option<String> {
    if let Some(reason) = check_headers(asserts, ctx) {
        return Some(reason);
    }
    if let Some(reply) = &asserts.reply {
        if let Some(reason) = check_reply(reply, ctx) {
            return Some(reason);
        }
    }
    None
}

/// Exact string equality per declared header; an absent header is
/// a failure. Names compare case-insensitively.
fn check_headers(
    asserts: &Asserts,
    ctx: &ResponseContext,
) -> Option<String> {
    for (name, expected) in &asserts.headers {
        match ctx.header(name) {
            Some(actual) if actual == expected => {}
            Some(actual) => {
                return Some(format!(
                    "header '{name}' mismatch: expected '{expected}', \
                     received '{actual}'"
                ));
            }
            None => {
                return Some(format!(
                    "header '{name}' missing from response"
                ));
            }
        }
    }
    None
}

fn check_reply(
    reply: &ReplyAssert,
    ctx: &ResponseContext,
) -> Option<String> {
    if let Some(expected) = reply.status_code {
        if expected != ctx.status {
            return Some(format!(
                "status mismatch: expected {expected}, received {}",
                ctx.status
            ));
        }
    }

    if let Some(expr) = &reply.exec {
        let bindings = ctx.bindings();
        match expression::evaluate_assertion(expr, &bindings) {
            Ok(true) => {}
            Ok(false) => {
                return Some(format!(
                    "assertion expression failed: {expr}"
                ));
            }
            Err(e) => {
                return Some(format!(
                    "assertion expression error for '{expr}': {e}"
                ));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn json_response(status: u16, body: &str) -> ResponseContext {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/json".to_string(),
        );
        ResponseContext::decode(status, headers, body.to_string())
    }

    fn asserts_from_yaml(yaml: &str) -> Asserts {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn passes_when_nothing_declared() {
        let asserts = Asserts::default();
        let ctx = json_response(200, "{}");
        assert!(evaluate(&asserts, &ctx).is_none());
    }

    #[test]
    fn header_equality_is_exact() {
        let asserts = asserts_from_yaml(
            "headers:\n  content-type: application/json\n",
        );
        let ctx = json_response(200, "{}");
        assert!(evaluate(&asserts, &ctx).is_none());

        let mismatched = asserts_from_yaml(
            "headers:\n  content-type: text/plain\n",
        );
        let reason = evaluate(&mismatched, &ctx).unwrap();
        assert!(reason.contains("mismatch"));
    }

    #[test]
    fn header_names_compare_case_insensitively() {
        let asserts = asserts_from_yaml(
            "headers:\n  Content-Type: application/json\n",
        );
        let ctx = json_response(200, "{}");
        assert!(evaluate(&asserts, &ctx).is_none());
    }

    #[test]
    fn missing_header_fails() {
        let asserts =
            asserts_from_yaml("headers:\n  x-request-id: abc\n");
        let ctx = json_response(200, "{}");
        let reason = evaluate(&asserts, &ctx).unwrap();
        assert!(reason.contains("missing"));
    }

    #[test]
    fn status_code_mismatch_fails() {
        let asserts =
            asserts_from_yaml("reply:\n  status_code: 200\n");
        assert!(evaluate(&asserts, &json_response(200, "{}")).is_none());
        let reason =
            evaluate(&asserts, &json_response(404, "{}")).unwrap();
        assert!(reason.contains("404"));
    }

    #[test]
    fn exec_expression_pass_and_fail() {
        let ctx = json_response(200, r#"{"id": "42"}"#);

        let passing = asserts_from_yaml(
            "reply:\n  exec: \"rjson['id'] == '42'\"\n",
        );
        assert!(evaluate(&passing, &ctx).is_none());

        let failing = asserts_from_yaml(
            "reply:\n  exec: \"rjson['id'] == 'other'\"\n",
        );
        assert!(evaluate(&failing, &ctx).is_some());
    }

    #[test]
    fn exec_evaluation_error_fails_the_assertion() {
        let ctx = json_response(200, r#"{"id": "42"}"#);
        let broken =
            asserts_from_yaml("reply:\n  exec: \"%%% nope\"\n");
        let reason = evaluate(&broken, &ctx).unwrap();
        assert!(reason.contains("error"));
    }
}
