//! Request logging

use super::{Middleware, Next, NextFuture};
use crate::request::Request;
use std::time::Instant;
use tracing::{info, warn};

/// Logs method, path, matched endpoint, status and elapsed time of each
/// request. Place it after routing so the endpoint is known.
#[derive(Debug, Clone)]
pub struct RequestLoggingMiddleware {
    log_not_found: bool,
}

impl RequestLoggingMiddleware {
    pub fn new() -> Self {
        Self { log_not_found: true }
    }

    /// Skip requests that no route matched
    pub fn without_unmatched(mut self) -> Self {
        self.log_not_found = false;
        self
    }
}

impl Default for RequestLoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RequestLoggingMiddleware {
    fn handle(&self, request: Request, next: Next) -> NextFuture<'static> {
        let log_not_found = self.log_not_found;
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method.clone();
            let path = request.path().to_string();
            let endpoint = request
                .endpoint()
                .map(|feature| feature.endpoint.display_name().to_string());

            let response = next.run(request).await;
            let elapsed = start.elapsed();
            let status = response.status_code();

            match endpoint {
                Some(endpoint) => info!(
                    method = %method,
                    path = %path,
                    endpoint = %endpoint,
                    status = status.as_u16(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Request handled"
                ),
                None if log_not_found => warn!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Request matched no endpoint"
                ),
                None => {}
            }

            response
        })
    }

    fn name(&self) -> &'static str {
        "RequestLoggingMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewarePipeline;
    use crate::response::Response;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_logs_unmatched_requests() {
        let pipeline = MiddlewarePipeline::new().add(RequestLoggingMiddleware::new());
        let response = pipeline
            .execute(Request::get("/missing"), |_req| async { Response::not_found() })
            .await;
        assert_eq!(response.status_code().as_u16(), 404);
        assert!(logs_contain("Request matched no endpoint"));
        assert!(logs_contain("/missing"));
    }
}
