//! Endpoint routing for waypoint
//!
//! This module provides:
//! - Route template parsing (literal, parameter, optional, catch-all and composite segments)
//! - Allocation-light path tokenizing and template matching
//! - Parameter constraints resolved through an explicit registry
//! - An immutable, precedence-ordered route table with first-win selection
//! - Atomically swappable route table snapshots

pub mod constraints;
pub mod matcher;
pub mod metadata;
pub mod pattern;
pub mod segments;
pub mod snapshot;
pub mod table;
pub mod values;

pub use constraints::{
    Constraint, ConstraintContext, ConstraintRegistry, ConstraintSet, CustomConstraint,
    RouteDirection,
};
pub use matcher::{match_path, TemplateMatcher};
pub use metadata::EndpointMetadata;
pub use pattern::{ParameterKind, ParameterPart, PathSegment, RoutePart, RoutePattern, SegmentKind};
pub use segments::RequestPath;
pub use snapshot::SharedRouteTable;
pub use table::{
    ConstraintReference, RouteDefinition, RouteEntry, RouteMatch, RouteTable, RouteTableBuilder,
    RouteTableStats,
};
pub use values::RouteValues;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods understood by the router
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
    TRACE,
    CONNECT,
    /// Any other method token, stored upper-cased
    Extension(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
            HttpMethod::Extension(token) => token,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = std::convert::Infallible;

    /// Method names are matched case-insensitively; unknown tokens become
    /// [`HttpMethod::Extension`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => HttpMethod::GET,
            "POST" => HttpMethod::POST,
            "PUT" => HttpMethod::PUT,
            "DELETE" => HttpMethod::DELETE,
            "PATCH" => HttpMethod::PATCH,
            "HEAD" => HttpMethod::HEAD,
            "OPTIONS" => HttpMethod::OPTIONS,
            "TRACE" => HttpMethod::TRACE,
            "CONNECT" => HttpMethod::CONNECT,
            _ => HttpMethod::Extension(upper),
        })
    }
}

impl From<&http::Method> for HttpMethod {
    fn from(method: &http::Method) -> Self {
        match *method {
            http::Method::GET => HttpMethod::GET,
            http::Method::POST => HttpMethod::POST,
            http::Method::PUT => HttpMethod::PUT,
            http::Method::DELETE => HttpMethod::DELETE,
            http::Method::PATCH => HttpMethod::PATCH,
            http::Method::HEAD => HttpMethod::HEAD,
            http::Method::OPTIONS => HttpMethod::OPTIONS,
            http::Method::TRACE => HttpMethod::TRACE,
            http::Method::CONNECT => HttpMethod::CONNECT,
            ref other => HttpMethod::Extension(other.as_str().to_ascii_uppercase()),
        }
    }
}

/// Identity of an endpoint: its registration index in the route configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub usize);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The HTTP methods an endpoint accepts. Attached to endpoint metadata when a
/// route restricts its methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodMetadata {
    pub methods: Vec<HttpMethod>,
}

impl HttpMethodMetadata {
    pub fn accepts(&self, method: &HttpMethod) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

/// The unit returned by a successful match: an identity, a display name and
/// an opaque metadata bag (handler reference, authorization data, methods).
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    display_name: String,
    metadata: EndpointMetadata,
}

impl Endpoint {
    pub fn new(id: EndpointId, display_name: impl Into<String>, metadata: EndpointMetadata) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            metadata,
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }
}

/// Case-insensitive comparison used for literals, route names and values.
pub(crate) fn text_eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Substring test under the same case rule as [`text_eq_ignore_case`]
pub(crate) fn text_contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if haystack.is_ascii() && needle.is_ascii() {
        return haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase());
    }
    let haystack: String = haystack.chars().flat_map(char::to_lowercase).collect();
    let needle: String = needle.chars().flat_map(char::to_lowercase).collect();
    haystack.contains(&needle)
}
