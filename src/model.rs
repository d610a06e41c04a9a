//! Case/step data model for the input document.
//!
//! serde deserialization doubles as the structural validation
//! layer: unknown methods, a wrong-arity `auth` array, or a
//! missing `testSteps` sequence are load errors, not runtime
//! errors.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One test document: an ordered, non-empty sequence of steps
/// plus optional seed variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub name: Option<String>,
    /// Seed environment. Added to the run environment with
    /// first-write-wins semantics.
    #[serde(default)]
    pub globals: Option<Globals>,
    /// Step order is execution order; no reordering, no
    /// parallelism.
    #[serde(rename = "testSteps")]
    pub test_steps: Vec<TestStep>,
}

/// Declared globals. `env` is the current spelling, `variables`
/// the legacy one; `env` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Globals {
    #[serde(default)]
    pub env: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub variables: Option<HashMap<String, Value>>,
}

impl Globals {
    /// The mapping to seed the environment with, if any.
    pub fn seed(&self) -> Option<&HashMap<String, Value>> {
        self.env.as_ref().or(self.variables.as_ref())
    }
}

/// One declared HTTP interaction plus optional control, assertion
/// and extraction directives. Immutable as declared; each
/// repetition executes against an independent deep copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Legacy alias for `url`; `url` wins when both are present.
    #[serde(
        rename = "apiUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_url: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Basic-auth credential pair. Any other shape is rejected at
    /// load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<(String, String)>,
    /// Urlencoded form body. Takes priority over `form` and
    /// `json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, Value>>,
    /// JSON body, sent when neither `data` nor `form` is
    /// declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Query string parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, Value>>,
    /// Multipart form field groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Vec<HashMap<String, FormValue>>>,
    /// Pause directive: sleep for this many seconds and move on
    /// without issuing a request. A bare `sleep:` means one
    /// second.
    #[serde(
        default,
        deserialize_with = "sleep_directive",
        skip_serializing_if = "Option::is_none"
    )]
    pub sleep: Option<f64>,
    /// Skip directive: any declared value (even `false`) skips
    /// the step.
    #[serde(
        default,
        deserialize_with = "flag_present",
        skip_serializing_if = "is_false"
    )]
    pub skip: bool,
    /// Number of times to execute the step. Each repetition sees
    /// its own `$count`.
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// When false, the shared cookie jar is cleared before this
    /// step's request — dropping cookies accumulated from all
    /// prior steps, not just suppressing them once.
    #[serde(default = "default_true")]
    pub cookies: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asserts: Option<Asserts>,
    /// Extraction rules: variable name → expression evaluated
    /// against the response context, in declaration order. An
    /// entry's templated name may reference values set by earlier
    /// entries of the same step.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub setenv: IndexMap<String, String>,
}

impl TestStep {
    /// The request URL, honoring the legacy `apiUrl` alias.
    pub fn target_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.api_url.as_deref())
    }
}

/// HTTP method, lowercase in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

/// A multipart form field: either a literal scalar or a
/// `[file path, mime type]` pair read as binary file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    File([String; 2]),
    Scalar(Value),
}

/// Declared response assertions. Either block failing aborts the
/// whole case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asserts {
    /// Expected header values, exact string equality.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyAssert>,
}

/// Assertions on the reply itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyAssert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Sandboxed expression evaluated against the response
    /// context; a falsy result or an evaluation error aborts the
    /// case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
}

/// Terminal state of one case run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum CaseOutcome {
    /// All steps processed; the final environment stays with the
    /// caller for chaining.
    Completed,
    /// Communication error or failed assertion; remaining steps
    /// were not executed.
    Aborted { reason: String },
}

impl CaseOutcome {
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

fn default_repeat() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn is_false(flag: &bool) -> bool {
    !flag
}

/// Any declared value counts as presence.
fn flag_present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let _ = Value::deserialize(deserializer)?;
    Ok(true)
}

/// A finite, non-negative number is a duration in seconds; any
/// other declared value (a bare `sleep:`, a negative or NaN
/// number) means the default of one second.
fn sleep_directive<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let secs = match value.as_f64() {
        Some(secs) if secs.is_finite() && secs >= 0.0 => secs,
        _ => 1.0,
    };
    Ok(Some(secs))
}

impl TestCase {
    /// Deserialize a case from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Deserialize a case from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
