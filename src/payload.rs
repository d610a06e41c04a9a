//! Request body construction from a resolved step.
//!
//! Priority: `data` (urlencoded) over `form` (multipart) over
//! `json` over no body. A missing file in a multipart field list
//! is fatal for the step — a partially populated multipart body
//! must never be sent.

use crate::model::{FormValue, TestStep};
use crate::template;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use std::collections::HashMap;
use std::fs;

/// The outgoing body for one request. The multipart variant
/// carries its own content type (with boundary), applied by the
/// transport when the request is built.
#[derive(Debug)]
pub enum Payload {
    Empty,
    UrlEncoded(HashMap<String, String>),
    Json(serde_json::Value),
    Multipart(Form),
}

/// Build the payload declared by `step`.
pub fn build(step: &TestStep) -> Result<Payload> {
    if let Some(data) = &step.data {
        let fields = data
            .iter()
            .map(|(k, v)| (k.clone(), template::render(v)))
            .collect();
        return Ok(Payload::UrlEncoded(fields));
    }

    if let Some(groups) = &step.form {
        let mut form = Form::new();
        for group in groups {
            for (field, value) in group {
                form = match value {
                    FormValue::File([path, mime]) => {
                        let bytes =
                            fs::read(path).with_context(|| {
                                format!(
                                    "failed to read form file '{path}' \
                                     for field '{field}'"
                                )
                            })?;
                        let part = Part::bytes(bytes)
                            .file_name(path.clone())
                            .mime_str(mime)
                            .with_context(|| {
                                format!(
                                    "invalid mime type '{mime}' for \
                                     field '{field}'"
                                )
                            })?;
                        form.part(field.clone(), part)
                    }
                    FormValue::Scalar(v) => {
                        form.text(field.clone(), template::render(v))
                    }
                };
            }
        }
        return Ok(Payload::Multipart(form));
    }

    if let Some(json) = &step.json {
        return Ok(Payload::Json(json.clone()));
    }

    Ok(Payload::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestCase;
    use std::io::Write;

    fn step_from_yaml(yaml: &str) -> TestStep {
        TestCase::from_yaml(yaml)
            .unwrap()
            .test_steps
            .remove(0)
    }

    #[test]
    fn no_declared_body_means_empty() {
        let step = step_from_yaml(
            "testSteps:\n\
             - url: /x\n\
             \x20 method: get\n",
        );
        assert!(matches!(build(&step).unwrap(), Payload::Empty));
    }

    #[test]
    fn data_takes_priority_over_json_and_form() {
        let step = step_from_yaml(
            "testSteps:\n\
             - url: /x\n\
             \x20 method: post\n\
             \x20 data: {a: 1, b: two}\n\
             \x20 json: {ignored: true}\n\
             \x20 form:\n\
             \x20 - ignored: too\n",
        );
        match build(&step).unwrap() {
            Payload::UrlEncoded(fields) => {
                assert_eq!(fields.get("a").unwrap(), "1");
                assert_eq!(fields.get("b").unwrap(), "two");
            }
            _ => panic!("expected urlencoded payload"),
        }
    }

    #[test]
    fn json_body_used_when_nothing_else_declared() {
        let step = step_from_yaml(
            "testSteps:\n\
             - url: /x\n\
             \x20 method: post\n\
             \x20 json: {id: 7}\n",
        );
        match build(&step).unwrap() {
            Payload::Json(v) => {
                assert_eq!(v, serde_json::json!({"id": 7}))
            }
            _ => panic!("expected json payload"),
        }
    }

    #[test]
    fn multipart_reads_file_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file-content").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let step = step_from_yaml(&format!(
            "testSteps:\n\
             - url: /upload\n\
             \x20 method: post\n\
             \x20 form:\n\
             \x20 - note: hello\n\
             \x20 - attachment: [\"{path}\", text/plain]\n"
        ));
        assert!(matches!(
            build(&step).unwrap(),
            Payload::Multipart(_)
        ));
    }

    #[test]
    fn missing_form_file_is_fatal() {
        let step = step_from_yaml(
            "testSteps:\n\
             - url: /upload\n\
             \x20 method: post\n\
             \x20 form:\n\
             \x20 - attachment: [/no/such/file.bin, text/plain]\n",
        );
        let err = build(&step).unwrap_err();
        assert!(err.to_string().contains("/no/such/file.bin"));
    }
}
