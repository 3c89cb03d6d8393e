//! Bridge between the route table and request handlers
//!
//! [`EndpointRoutingMiddleware`] selects an endpoint and records it on the
//! request as an [`EndpointFeature`], or as [`AllowedMethods`] when only the
//! method failed to match. Later stages read the endpoint's
//! metadata; [`EndpointMiddleware`] finally invokes its handler.

use crate::middleware::{Middleware, Next, NextFuture};
use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;
use waypoint_routing::{Endpoint, HttpMethod, RouteValues, SharedRouteTable};

/// Handles requests routed to an endpoint
pub trait RequestHandler: Send + Sync {
    fn call(&self, request: Request) -> NextFuture<'static>;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> NextFuture<'static> {
        Box::pin((self)(request))
    }
}

/// Endpoint metadata item carrying the handler
#[derive(Clone)]
pub struct HandlerMetadata(pub Arc<dyn RequestHandler>);

impl HandlerMetadata {
    pub fn new(handler: impl RequestHandler + 'static) -> Self {
        Self(Arc::new(handler))
    }
}

impl fmt::Debug for HandlerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerMetadata")
    }
}

/// The endpoint selected for a request and its route values
#[derive(Debug, Clone)]
pub struct EndpointFeature {
    pub endpoint: Arc<Endpoint>,
    pub values: RouteValues,
}

impl EndpointFeature {
    /// Latest metadata item of type `T`
    pub fn metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.endpoint.metadata().get::<T>()
    }

    /// Every metadata item of type `T`, in registration order
    pub fn get_ordered_metadata<T: Send + Sync + 'static>(&self) -> Vec<&T> {
        self.endpoint.metadata().get_ordered::<T>()
    }

    pub fn handler(&self) -> Option<Arc<dyn RequestHandler>> {
        self.metadata::<HandlerMetadata>()
            .map(|handler| Arc::clone(&handler.0))
    }
}

/// Methods accepted at a path that matched no endpoint for the request
/// method, taken from the same snapshot routing used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethods(pub Vec<HttpMethod>);

/// Selects the endpoint for each request from the current route table
/// snapshot. On a miss, the methods the snapshot accepts at the path are
/// recorded instead so a reload later in the pipeline cannot change the
/// answer.
#[derive(Debug, Clone)]
pub struct EndpointRoutingMiddleware {
    routes: SharedRouteTable,
}

impl EndpointRoutingMiddleware {
    pub fn new(routes: SharedRouteTable) -> Self {
        Self { routes }
    }
}

impl Middleware for EndpointRoutingMiddleware {
    fn handle(&self, mut request: Request, next: Next) -> NextFuture<'static> {
        let table = self.routes.load();
        let method = request.routing_method();
        if let Some(matched) = table.select_best_match(request.path(), &method) {
            trace!(
                "Attaching endpoint for {} {}: {}",
                request.method,
                request.path(),
                matched.endpoint.display_name()
            );
            request.extensions.insert(EndpointFeature {
                endpoint: matched.endpoint,
                values: matched.values,
            });
        } else {
            let allowed = table.allowed_methods(request.path());
            if !allowed.is_empty() {
                request.extensions.insert(AllowedMethods(allowed));
            }
        }
        Box::pin(next.run(request))
    }

    fn name(&self) -> &'static str {
        "EndpointRoutingMiddleware"
    }
}

/// Invokes the selected endpoint's handler, or the next stage when no
/// endpoint with a handler was selected
#[derive(Debug, Clone, Default)]
pub struct EndpointMiddleware;

impl Middleware for EndpointMiddleware {
    fn handle(&self, request: Request, next: Next) -> NextFuture<'static> {
        let handler = request.endpoint().and_then(EndpointFeature::handler);
        match handler {
            Some(handler) => handler.call(request),
            None => Box::pin(next.run(request)),
        }
    }

    fn name(&self) -> &'static str {
        "EndpointMiddleware"
    }
}
