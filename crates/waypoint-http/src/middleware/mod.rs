//! Middleware with the `handle(request, next)` pattern
//!
//! A [`MiddlewarePipeline`] wraps a terminal handler in its middleware, first
//! added outermost. Each middleware decides whether to call [`Next::run`].

pub mod logging;

use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use logging::RequestLoggingMiddleware;

/// Boxed future returned by middleware and the rest of the chain
pub type NextFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

type Chain = Box<dyn FnOnce(Request) -> NextFuture<'static> + Send>;

/// The rest of the middleware chain
pub struct Next {
    handler: Chain,
}

impl Next {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnOnce(Request) -> NextFuture<'static> + Send + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Run the rest of the chain
    pub async fn run(self, request: Request) -> Response {
        (self.handler)(request).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// A pipeline stage
pub trait Middleware: Send + Sync + fmt::Debug {
    fn handle(&self, request: Request, next: Next) -> NextFuture<'static>;

    fn name(&self) -> &'static str {
        "Middleware"
    }
}

/// Ordered middleware around a terminal handler
#[derive(Debug, Clone, Default)]
pub struct MiddlewarePipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn add_boxed(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Run `request` through every middleware and then `handler`
    pub async fn execute<F, Fut>(&self, request: Request, handler: F) -> Response
    where
        F: FnOnce(Request) -> Fut + Send + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let mut chain: Chain = Box::new(move |req: Request| Box::pin(handler(req)) as NextFuture<'static>);

        for middleware in self.middleware.iter().rev() {
            let middleware = Arc::clone(middleware);
            let next_handler = chain;
            chain = Box::new(move |req: Request| middleware.handle(req, Next::new(next_handler)));
        }

        chain(request).await
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }
}

impl From<Vec<Arc<dyn Middleware>>> for MiddlewarePipeline {
    fn from(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Recorder {
        label: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn handle(&self, request: Request, next: Next) -> NextFuture<'static> {
            let label = self.label;
            let calls = Arc::clone(&self.calls);
            Box::pin(async move {
                calls.lock().unwrap().push(format!("{label}:before"));
                let response = next.run(request).await;
                calls.lock().unwrap().push(format!("{label}:after"));
                response
            })
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    #[derive(Debug)]
    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn handle(&self, _request: Request, _next: Next) -> NextFuture<'static> {
            Box::pin(async { Response::forbidden() })
        }
    }

    #[tokio::test]
    async fn test_first_added_runs_outermost() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = MiddlewarePipeline::new()
            .add(Recorder { label: "outer", calls: Arc::clone(&calls) })
            .add(Recorder { label: "inner", calls: Arc::clone(&calls) });

        let handler_calls = Arc::clone(&calls);
        let response = pipeline
            .execute(Request::get("/"), move |_req| async move {
                handler_calls.lock().unwrap().push("handler".to_string());
                Response::ok()
            })
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );
        assert_eq!(pipeline.names(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let pipeline = MiddlewarePipeline::new().add(ShortCircuit);
        let response = pipeline
            .execute(Request::get("/"), |_req| async { Response::ok() })
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(pipeline.len(), 1);
    }
}
