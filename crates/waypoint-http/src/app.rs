//! Application assembly
//!
//! An [`App`] runs every request through
//! routing, request logging, user middleware, authorization and the endpoint,
//! in that order. Requests no endpoint handled get 405 with an `Allow`
//! header when the path exists for other methods, otherwise 404. Both
//! answers come from the route table snapshot routing selected against.

use crate::authorization::{AuthorizationMiddleware, AuthorizationPolicy, PolicyRegistry};
use crate::builder::EndpointRouteBuilder;
use crate::endpoint::{EndpointMiddleware, EndpointRoutingMiddleware};
use crate::error::AppBuildError;
use crate::middleware::{Middleware, MiddlewarePipeline, RequestLoggingMiddleware};
use crate::request::Request;
use crate::response::Response;
use http::{Method, Uri};
use std::sync::Arc;
use tracing::{info, warn};
use waypoint_routing::{LinkGenerator, RouteConfigError, RouterOptions, SharedRouteTable};

/// Configures an [`App`]
#[derive(Debug, Default)]
pub struct AppBuilder {
    endpoints: EndpointRouteBuilder,
    middleware: Vec<Arc<dyn Middleware>>,
    policies: PolicyRegistry,
    options: RouterOptions,
    request_logging: bool,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoints(mut self, endpoints: EndpointRouteBuilder) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints_mut(&mut self) -> &mut EndpointRouteBuilder {
        &mut self.endpoints
    }

    /// Add middleware between routing and authorization. First added runs first.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn policy(mut self, name: impl Into<String>, policy: AuthorizationPolicy) -> Self {
        self.policies.add(name, policy);
        self
    }

    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Validate options, build the route table and assemble the pipeline
    pub fn build(self) -> Result<App, AppBuildError> {
        self.options.validate()?;
        let table = self.endpoints.build()?;
        let routes = SharedRouteTable::new(table);

        let mut pipeline = MiddlewarePipeline::new().add(EndpointRoutingMiddleware::new(routes.clone()));
        if self.request_logging {
            pipeline = pipeline.add(RequestLoggingMiddleware::new());
        }
        for middleware in self.middleware {
            pipeline.push(middleware);
        }
        let pipeline = pipeline
            .add(AuthorizationMiddleware::new(self.policies))
            .add(EndpointMiddleware);

        let links = Arc::new(LinkGenerator::new(routes.clone(), self.options));
        info!(stages = ?pipeline.names(), "Application assembled");

        Ok(App {
            routes,
            pipeline,
            links,
        })
    }
}

/// A routed application
#[derive(Debug, Clone)]
pub struct App {
    routes: SharedRouteTable,
    pipeline: MiddlewarePipeline,
    links: Arc<LinkGenerator>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub async fn handle(&self, request: Request) -> Response {
        self.pipeline
            .execute(request, |request| async move { fallback(&request) })
            .await
    }

    /// Dispatch a wire URI. Paths that cannot be decoded get 400.
    pub async fn handle_uri(&self, method: Method, uri: Uri) -> Response {
        match Request::from_uri(method, uri) {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                warn!("Rejecting request: {}", err);
                err.to_response()
            }
        }
    }

    pub fn routes(&self) -> &SharedRouteTable {
        &self.routes
    }

    /// Link generator bound to this application's routes
    pub fn links(&self) -> Arc<LinkGenerator> {
        Arc::clone(&self.links)
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    /// Replace the route table. On error the current routes stay in effect.
    pub fn reload(&self, endpoints: &EndpointRouteBuilder) -> Result<(), RouteConfigError> {
        self.routes.rebuild(&endpoints.table_builder())
    }
}

fn fallback(request: &Request) -> Response {
    if request.endpoint().is_some() {
        return Response::not_found();
    }
    match request.allowed_methods() {
        Some(allowed) => Response::method_not_allowed(allowed),
        None => Response::not_found(),
    }
}
