//! Link generation (reverse routing)
//!
//! URLs are rebuilt from a route name, an endpoint id or a bare value set.
//! Every substituted value is re-checked against the route's constraints so
//! a generated URL always routes back to the same endpoint.

pub mod context;
pub mod encoding;
pub mod generator;

pub use context::{
    ContextPool, DefaultUriContextPolicy, PooledContext, UriBuildingContext, UriContextPolicy,
};
pub use generator::{LinkAddress, LinkGenerator};
