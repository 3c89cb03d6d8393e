//! # waypoint-http
//!
//! Request dispatch on top of `waypoint-routing`: a `handle(request, next)`
//! middleware pipeline, endpoint selection, metadata-driven authorization and
//! endpoint invocation.

pub mod app;
pub mod authorization;
pub mod builder;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod response;

pub use app::{App, AppBuilder};
pub use authorization::{
    AllowAnonymous, AuthorizationMiddleware, AuthorizationPolicy, AuthorizationPolicyBuilder,
    AuthorizationRequirement, Authorize, ClaimRequirement, PolicyRegistry, Principal,
    RolesRequirement,
};
pub use builder::{EndpointRouteBuilder, RouteConventions};
pub use endpoint::{
    AllowedMethods, EndpointFeature, EndpointMiddleware, EndpointRoutingMiddleware, HandlerMetadata,
    RequestHandler,
};
pub use error::{AppBuildError, DispatchError, DispatchResult};
pub use logging::{init_logging, LoggingConfig};
pub use middleware::{Middleware, MiddlewarePipeline, Next, NextFuture, RequestLoggingMiddleware};
pub use request::Request;
pub use response::{Response, ResponseBody};

pub use waypoint_routing;
