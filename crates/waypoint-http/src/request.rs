//! Request type flowing through the dispatch pipeline

use crate::authorization::Principal;
use crate::endpoint::{AllowedMethods, EndpointFeature};
use crate::error::{DispatchError, DispatchResult};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use percent_encoding::percent_decode_str;
use waypoint_routing::HttpMethod;

/// An incoming request.
///
/// `path` is what routing sees and is never rewritten. It is expected to be
/// normalized already (percent-decoded per segment, dot segments removed);
/// [`Request::from_uri`] does the decoding for wire URIs. `uri` is transport
/// data and is absent when the path has no URI form. Stages communicate
/// through `extensions`.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub uri: Option<Uri>,
    pub headers: HeaderMap,
    pub extensions: Extensions,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request for an already-normalized `path`, kept verbatim
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let uri = path.parse::<Uri>().ok();
        Self {
            method,
            path,
            uri,
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            body: Vec::new(),
        }
    }

    pub fn from_path(method: Method, path: &str) -> Self {
        Self::new(method, path)
    }

    /// Build a request from a wire URI, percent-decoding each path segment.
    ///
    /// A segment that decodes to text containing `/` stays encoded so the
    /// segment count is preserved. Segments that are not UTF-8 once decoded
    /// fail with [`DispatchError::InvalidPath`].
    pub fn from_uri(method: Method, uri: Uri) -> DispatchResult<Self> {
        let raw = uri.path();
        let mut path = String::with_capacity(raw.len());
        for (index, segment) in raw.split('/').enumerate() {
            if index > 0 {
                path.push('/');
            }
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|err| DispatchError::InvalidPath {
                    path: raw.to_string(),
                    reason: err.to_string(),
                })?;
            if decoded.contains('/') {
                path.push_str(segment);
            } else {
                path.push_str(&decoded);
            }
        }

        Ok(Self {
            uri: Some(uri),
            ..Self::new(method, path)
        })
    }

    pub fn get(path: &str) -> Self {
        Self::from_path(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::from_path(Method::POST, path)
    }

    /// Add a header. Invalid names or values are logged and skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::error!("Skipping invalid request header '{}'", name),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn with_principal(self, principal: Principal) -> Self {
        self.with_extension(principal)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string of the transport URI
    pub fn query(&self) -> Option<&str> {
        self.uri.as_ref().and_then(Uri::query)
    }

    /// The method as the router sees it
    pub fn routing_method(&self) -> HttpMethod {
        HttpMethod::from(&self.method)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The endpoint selected by routing, if any
    pub fn endpoint(&self) -> Option<&EndpointFeature> {
        self.extensions.get::<EndpointFeature>()
    }

    /// Methods accepted at this path when routing found no endpoint for
    /// the request method
    pub fn allowed_methods(&self) -> Option<&[HttpMethod]> {
        self.extensions
            .get::<AllowedMethods>()
            .map(|allowed| allowed.0.as_slice())
    }

    pub fn route_value(&self, key: &str) -> Option<&str> {
        self.endpoint().and_then(|feature| feature.values.get(key))
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.extensions.get::<Principal>()
    }

    pub fn body_text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}
