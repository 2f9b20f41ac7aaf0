//! Request/response model and the transport seam every component talks through.

use crate::error::{Result, SearchError};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Characters escaped inside a single path segment (index names, document ids).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// PUT.
    Put,
    /// POST.
    Post,
    /// DELETE.
    Delete,
    /// HEAD.
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A single JSON document.
    Json(Value),
    /// Newline-delimited JSON, one value per line (bulk API).
    NdJson(Vec<Value>),
}

impl Body {
    /// Content type the engine expects for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::NdJson(_) => "application/x-ndjson",
        }
    }

    /// Serialize the body into its wire form.
    pub fn to_payload(&self) -> Result<String> {
        match self {
            Body::Json(value) => Ok(serde_json::to_string(value)?),
            Body::NdJson(lines) => {
                let mut payload = String::new();
                for line in lines {
                    payload.push_str(&serde_json::to_string(line)?);
                    payload.push('\n');
                }
                Ok(payload)
            }
        }
    }
}

/// An immutable request against the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Body>,
}

impl Request {
    /// Create a request from a method and raw path segments.
    ///
    /// Each segment is percent-encoded on its own, so ids containing `/` stay one segment.
    /// Segments starting with `_` (`_doc`, `_search`, ...) pass through unchanged.
    pub fn new<S: AsRef<str>>(method: Method, segments: &[S]) -> Self {
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.extend(utf8_percent_encode(segment.as_ref(), PATH_SEGMENT));
        }
        if path.is_empty() {
            path.push('/');
        }

        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request.
    pub fn get<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::Get, segments)
    }

    /// PUT request.
    pub fn put<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::Put, segments)
    }

    /// POST request.
    pub fn post<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::Post, segments)
    }

    /// DELETE request.
    pub fn delete<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::Delete, segments)
    }

    /// HEAD request.
    pub fn head<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(Method::Head, segments)
    }

    /// Add a query-string parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    /// Attach an NDJSON body.
    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = Some(Body::NdJson(lines));
        self
    }

    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Encoded path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query-string parameters in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Body, if any.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }
}

/// Response as handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    body: Value,
}

impl Response {
    /// Create a response. Use `Value::Null` for empty bodies.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Build a response from a raw body; empty bodies become `Null`, non-JSON bodies a string.
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Parsed body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 404.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Engine error type (`error.type`), if the body carries one.
    pub fn error_type(&self) -> Option<&str> {
        self.body["error"]["type"].as_str()
    }

    /// Engine error reason (`error.reason`), falling back to a plain-string error.
    pub fn error_reason(&self) -> Option<&str> {
        self.body["error"]["reason"]
            .as_str()
            .or_else(|| self.body["error"].as_str())
    }

    /// Whether a 404 is about a missing index rather than a missing document.
    pub fn is_index_missing(&self) -> bool {
        self.is_not_found() && self.error_type() == Some("index_not_found_exception")
    }

    /// Turn a non-2xx response into [`SearchError::Engine`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_engine_error())
    }

    /// Convert this response into an engine error without checking the status.
    pub fn into_engine_error(self) -> SearchError {
        SearchError::Engine {
            status: self.status,
            error_type: self.error_type().unwrap_or("unknown").to_string(),
            reason: self.error_reason().unwrap_or("Unknown error").to_string(),
        }
    }

    /// Deserialize the body into a typed response.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.body)?)
    }

    /// Take the raw body.
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// Sends requests to the cluster.
///
/// Implementations own connection pooling and timeouts. Non-2xx answers are returned as
/// ordinary [`Response`]s; only failures to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request.
    async fn send(&self, request: Request) -> Result<Response>;
}
