//! # waypoint-routing
//!
//! Endpoint routing core for waypoint.
//!
//! This crate provides:
//! - Route templates with literal, parameter, optional, catch-all and composite segments
//! - Built-in and custom parameter constraints resolved through a registry
//! - Immutable route tables with deterministic first-win selection
//! - Atomically published route table snapshots
//! - Link generation with pooled, reset-on-return builder contexts
//!
//! Everything here is synchronous and performs no I/O.

pub mod config;
pub mod error;
pub mod link;
pub mod routing;

pub use config::{ConfigSource, RouterDefaults, RouterOptions};
pub use error::{ConfigError, ConstraintError, LinkError, RouteConfigError, TemplateError};
pub use link::{LinkAddress, LinkGenerator};
pub use routing::{
    match_path, Constraint, ConstraintContext, ConstraintReference, ConstraintRegistry,
    CustomConstraint, Endpoint, EndpointId, EndpointMetadata, HttpMethod, HttpMethodMetadata,
    RouteDefinition, RouteDirection, RouteEntry, RouteMatch, RoutePattern, RouteTable,
    RouteTableBuilder, RouteTableStats, RouteValues, SharedRouteTable,
};
