//! Error types for template parsing, route table construction, constraint
//! evaluation, link generation and options loading.

use crate::routing::EndpointId;
use thiserror::Error;

/// Errors raised while parsing a route template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Invalid template syntax: {0}")]
    InvalidSyntax(String),
    #[error("Unbalanced '{{' or '}}' at byte {0}; use '{{{{' or '}}}}' for a literal brace")]
    UnbalancedBrace(usize),
    #[error("Empty path segments are not allowed")]
    EmptySegment,
    #[error("Parameter name cannot be empty")]
    EmptyParameterName,
    #[error("Invalid parameter name: '{0}'")]
    InvalidParameterName(String),
    #[error("Duplicate parameter name: {0}")]
    DuplicateParameter(String),
    #[error("Catch-all parameter '{0}' must be in the last segment")]
    CatchAllNotLast(String),
    #[error("Catch-all parameter '{0}' cannot share its segment with other parts")]
    CatchAllInComposite(String),
    #[error("Catch-all parameter '{0}' cannot be marked optional")]
    OptionalCatchAll(String),
    #[error("Optional parameter '{0}' cannot have a default value")]
    OptionalWithDefault(String),
    #[error("Segment '{0}' contains two consecutive parameters")]
    ConsecutiveParameters(String),
    #[error("Optional parameter '{0}' in a composite segment must be last and preceded by '.'")]
    OptionalInComposite(String),
    #[error("Parameter '{parameter}' has conflicting defaults '{inline}' and '{explicit}'")]
    DefaultConflict {
        parameter: String,
        inline: String,
        explicit: String,
    },
    #[error("Invalid constraint syntax: {0}")]
    InvalidConstraint(String),
}

/// Errors detected while building a route table. A failed build is never
/// published.
#[derive(Error, Debug)]
pub enum RouteConfigError {
    #[error("Route template '{template}' is invalid: {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: TemplateError,
    },
    #[error("Route '{template}' references unknown constraint '{constraint}' for parameter '{parameter}'")]
    UnknownConstraint {
        template: String,
        parameter: String,
        constraint: String,
    },
    #[error("Invalid arguments for constraint '{constraint}': {reason}")]
    InvalidConstraintArgument { constraint: String, reason: String },
    #[error("Route name '{name}' is used by more than one link-generating route")]
    DuplicateRouteName { name: String },
}

/// Error reported by a custom constraint. Evaluation treats it as a failed
/// match for the candidate that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Constraint '{constraint}' failed: {message}")]
pub struct ConstraintError {
    pub constraint: String,
    pub message: String,
}

impl ConstraintError {
    pub fn new(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// Reasons a URL could not be generated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("No route named '{0}'")]
    UnknownRouteName(String),
    #[error("No link-generating route for endpoint {0}")]
    UnknownEndpoint(EndpointId),
    #[error("Missing value for route parameter '{parameter}'")]
    MissingValue { parameter: String },
    #[error("Value '{value}' for '{parameter}' does not satisfy the route constraints")]
    ConstraintRejected { parameter: String, value: String },
    #[error("Value '{value}' for '{parameter}' contains the separator of an omitted optional part")]
    AmbiguousValue { parameter: String, value: String },
    #[error("Supplied value for '{key}' does not match the route's required value")]
    RequiredValueMismatch { key: String },
    #[error("No route can generate a link for the supplied values")]
    NoMatchingRoute,
}

impl LinkError {
    /// True when the address itself could not be resolved, as opposed to the
    /// supplied values not fitting the route.
    pub fn is_unknown_address(&self) -> bool {
        matches!(
            self,
            LinkError::UnknownRouteName(_) | LinkError::UnknownEndpoint(_)
        )
    }
}

/// Errors raised while loading or validating [`RouterOptions`](crate::RouterOptions)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl ConfigError {
    pub fn validation_failed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_address_classification() {
        assert!(LinkError::UnknownRouteName("home".into()).is_unknown_address());
        assert!(LinkError::UnknownEndpoint(EndpointId(3)).is_unknown_address());
        assert!(!LinkError::MissingValue {
            parameter: "id".into()
        }
        .is_unknown_address());
        assert!(!LinkError::ConstraintRejected {
            parameter: "id".into(),
            value: "abc".into()
        }
        .is_unknown_address());
    }

    #[test]
    fn test_config_error_messages() {
        let err = RouteConfigError::InvalidTemplate {
            template: "/a/{".into(),
            source: TemplateError::UnbalancedBrace(3),
        };
        assert!(err.to_string().contains("/a/{"));

        let err = ConfigError::validation_failed("pool_capacity", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Validation failed for pool_capacity: must be greater than 0"
        );
    }
}
