//! Response type produced by handlers and the terminal fallback

use crate::error::{DispatchError, DispatchResult};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use waypoint_routing::HttpMethod;

/// Response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(serde_json::Value),
}

/// An outgoing response
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok().with_text(body)
    }

    /// JSON response. Serialization failures produce a 500.
    pub fn json<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok().with_body(ResponseBody::Json(value)),
            Err(err) => {
                tracing::error!("JSON serialization failed in Response::json: {}", err);
                Self::internal_server_error()
            }
        }
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_text("Bad Request")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND).with_text("Not Found")
    }

    /// 405 with an `Allow` header listing `allowed`
    pub fn method_not_allowed(allowed: &[HttpMethod]) -> Self {
        let allow = allowed
            .iter()
            .map(HttpMethod::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
            .with_text("Method Not Allowed")
            .with_header(header::ALLOW.as_str(), &allow)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED).with_text("Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN).with_text("Forbidden")
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR).with_text("Internal Server Error")
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_text(self, body: impl Into<String>) -> Self {
        self.with_body(ResponseBody::Text(body.into()))
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    /// Set a header, failing on an invalid name or value
    pub fn header(mut self, name: &str, value: &str) -> DispatchResult<Self> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| DispatchError::InvalidHeader {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| DispatchError::InvalidHeader {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Set a header; an invalid one turns the response into a 500
    pub fn with_header(self, name: &str, value: &str) -> Self {
        self.header(name, value).unwrap_or_else(|err| {
            tracing::error!("Header creation failed in with_header: {}", err);
            Response::internal_server_error()
        })
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Body rendered as text; JSON bodies are serialized
    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Empty => String::new(),
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Json(value) => value.to_string(),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
