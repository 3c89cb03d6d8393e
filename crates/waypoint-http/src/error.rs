//! Dispatch error types

use crate::response::Response;
use thiserror::Error;
use waypoint_routing::{ConfigError, RouteConfigError};

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures inside the dispatch pipeline.
///
/// Routing absence is never one of these; the terminal fallback answers it
/// with 404 or 405.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Authorization policy '{name}' is not registered")]
    UnknownPolicy { name: String },

    #[error("Authorization requirement '{requirement}' failed to evaluate: {message}")]
    RequirementFailed { requirement: String, message: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Request path '{path}' cannot be routed: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl DispatchError {
    pub fn requirement_failed(requirement: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::RequirementFailed {
            requirement: requirement.into(),
            message: message.into(),
        }
    }

    /// The response sent to the client. Details stay in the logs.
    pub fn to_response(&self) -> Response {
        match self {
            DispatchError::InvalidPath { .. } => Response::bad_request(),
            _ => Response::internal_server_error(),
        }
    }
}

/// Failures assembling an [`App`](crate::App)
#[derive(Error, Debug)]
pub enum AppBuildError {
    #[error("Route configuration error: {0}")]
    Routes(#[from] RouteConfigError),

    #[error("Router options error: {0}")]
    Options(#[from] ConfigError),
}
