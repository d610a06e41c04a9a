//! HTTP transport: a connection-pooling client plus an explicit
//! cookie jar, owned by the case runner for the lifetime of one
//! case.
//!
//! Cookies captured from `Set-Cookie` headers are replayed on
//! every subsequent request of the same case, so steps see prior
//! state by default. The jar supports `clear()` so a step can
//! drop all accumulated cookies before its request.

use crate::model::{HttpMethod, TestStep};
use crate::payload::Payload;
use crate::response::ResponseContext;
use crate::template;
use anyhow::{Context, Result};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method};
use std::collections::HashMap;
use tracing::debug;

/// Name→value cookie store. Attributes (path, expiry, flags) are
/// ignored; within one case the origin is the endpoint under
/// test.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture cookies from a response's `Set-Cookie` headers.
    pub fn store(&mut self, headers: &reqwest::header::HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or("");
            if let Some((name, value)) = pair.split_once('=') {
                self.cookies.insert(
                    name.trim().to_string(),
                    value.trim().to_string(),
                );
            }
        }
    }

    /// The `Cookie` header value for the next request, if any
    /// cookies are held.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Drop every held cookie, including ones accumulated from
    /// prior steps.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Shared transport for one case: reqwest client plus jar.
#[derive(Debug)]
pub struct Session {
    client: Client,
    pub jar: CookieJar,
}

impl Session {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            jar: CookieJar::new(),
        }
    }

    /// Issue one request for a resolved step and decode the
    /// response into a [`ResponseContext`]. Any transport-level
    /// failure surfaces as an error — a communication error, fatal
    /// to the whole case.
    pub async fn execute(
        &mut self,
        step: &TestStep,
        url: &str,
        payload: Payload,
    ) -> Result<ResponseContext> {
        let mut builder =
            self.client.request(convert_method(step.method), url);

        for (name, value) in &step.headers {
            builder = builder.header(name, value);
        }
        if let Some((user, pass)) = &step.auth {
            builder = builder.basic_auth(user, Some(pass));
        }
        if let Some(params) = &step.params {
            let query: Vec<(String, String)> = params
                .iter()
                .map(|(k, v)| (k.clone(), template::render(v)))
                .collect();
            builder = builder.query(&query);
        }
        if let Some(cookie) = self.jar.header_value() {
            builder = builder.header(COOKIE, cookie);
        }
        builder = match payload {
            Payload::Empty => builder,
            Payload::UrlEncoded(fields) => builder.form(&fields),
            Payload::Json(body) => builder.json(&body),
            Payload::Multipart(form) => builder.multipart(form),
        };

        debug!("Sending {:?} {}", step.method, url);
        let response = builder
            .send()
            .await
            .with_context(|| format!("{:?} {url} failed", step.method))?;
        debug!("Received status {}", response.status());

        self.jar.store(response.headers());

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        Ok(ResponseContext::decode(status, headers, body))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Options => Method::OPTIONS,
    }
}
