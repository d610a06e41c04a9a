//! Response context: the transient, per-request view handed to
//! the assertion evaluator and the extraction rules.
//!
//! Body decoding is driven by the observed content type. A body
//! that fails to decode simply leaves the corresponding slot
//! absent — decode failures are swallowed, never propagated.

use serde_json::{json, Map, Number, Value};
use std::collections::HashMap;

/// Observed status, headers and body for one request, plus the
/// optional decoded views of the body. Discarded after the step's
/// post-processing; nothing response-derived outlives the step
/// except values copied into the environment.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: u16,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
    pub json: Option<Value>,
    pub xml: Option<Value>,
    pub html: Option<Value>,
}

impl ResponseContext {
    /// Build a context from raw response parts, decoding the body
    /// according to the `content-type` header.
    pub fn decode(
        status: u16,
        headers: HashMap<String, String>,
        body: String,
    ) -> Self {
        let content_type = headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("");

        let mut json = None;
        let mut xml = None;
        let mut html = None;
        if content_type.starts_with("application/json") {
            json = serde_json::from_str(&body).ok();
        } else if content_type.starts_with("text/xml") {
            xml = parse_xml(&body);
        } else if content_type.starts_with("text/html") {
            html = parse_html(&body);
        }

        Self {
            status,
            headers,
            body,
            json,
            xml,
            html,
        }
    }

    /// Case-insensitive header lookup (stored names are already
    /// lowercase).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The fixed read-only binding set exposed to `exec`
    /// assertions and `setenv` expressions: `r` (status, headers,
    /// body), `rjson` (alias `recv_json`), `rxml` and `rhtml`.
    /// Absent decoded views bind as null.
    pub fn bindings(&self) -> HashMap<String, Value> {
        let mut headers = Map::new();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), Value::String(value.clone()));
        }

        let mut r = Map::new();
        r.insert(
            "status".into(),
            Value::Number(Number::from(self.status)),
        );
        r.insert("headers".into(), Value::Object(headers));
        r.insert("body".into(), Value::String(self.body.clone()));

        let rjson = self.json.clone().unwrap_or(Value::Null);
        let mut bindings = HashMap::new();
        bindings.insert("r".to_string(), Value::Object(r));
        bindings.insert("rjson".to_string(), rjson.clone());
        bindings.insert("recv_json".to_string(), rjson);
        bindings.insert(
            "rxml".to_string(),
            self.xml.clone().unwrap_or(Value::Null),
        );
        bindings.insert(
            "rhtml".to_string(),
            self.html.clone().unwrap_or(Value::Null),
        );
        bindings
    }
}

/// Parse an XML body into a JSON-shaped tree rooted at the
/// document element: `{tag, attrs, text, children}`.
fn parse_xml(text: &str) -> Option<Value> {
    let doc = roxmltree::Document::parse(text).ok()?;
    Some(element_to_value(doc.root_element()))
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let attrs: Map<String, Value> = node
        .attributes()
        .map(|a| (a.name().to_string(), Value::String(a.value().to_string())))
        .collect();

    let text: String = node
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect::<String>()
        .trim()
        .to_string();

    let children: Vec<Value> = node
        .children()
        .filter(|c| c.is_element())
        .map(element_to_value)
        .collect();

    json!({
        "tag": node.tag_name().name(),
        "attrs": attrs,
        "text": text,
        "children": children,
    })
}

/// Project an HTML body to `{title, text}`. The parser is
/// error-tolerant, so this only yields `None` for pathological
/// inputs upstream of it.
fn parse_html(text: &str) -> Option<Value> {
    let doc = scraper::Html::parse_document(text);
    let title_selector = scraper::Selector::parse("title").ok()?;
    let title = doc
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>());

    let body_text = doc
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(json!({
        "title": title,
        "text": body_text,
    }))
}
