//! Authorization stage of the dispatch pipeline

use super::policy::{AuthorizationPolicy, PolicyRegistry, RolesRequirement};
use super::{AllowAnonymous, Authorize};
use crate::endpoint::EndpointFeature;
use crate::error::DispatchError;
use crate::middleware::{Middleware, Next, NextFuture};
use crate::request::Request;
use crate::response::Response;
use std::sync::Arc;
use tracing::{debug, error};

/// Enforces the [`Authorize`] metadata of the selected endpoint.
///
/// Requests without an endpoint, without `Authorize` items, or with
/// [`AllowAnonymous`] pass through. Otherwise a missing principal yields 401,
/// an unmet requirement 403, and an unknown policy name or a failing
/// requirement 500.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationMiddleware {
    policies: Arc<PolicyRegistry>,
}

impl AuthorizationMiddleware {
    pub fn new(policies: PolicyRegistry) -> Self {
        Self {
            policies: Arc::new(policies),
        }
    }

    pub fn from_shared(policies: Arc<PolicyRegistry>) -> Self {
        Self { policies }
    }

    /// The combined policy for an endpoint, or `None` when it is open
    pub fn effective_policy(
        &self,
        feature: &EndpointFeature,
    ) -> Result<Option<AuthorizationPolicy>, DispatchError> {
        if feature.metadata::<AllowAnonymous>().is_some() {
            return Ok(None);
        }
        let items = feature.get_ordered_metadata::<Authorize>();
        if items.is_empty() {
            return Ok(None);
        }

        let mut combined = AuthorizationPolicy::new();
        for item in items {
            if !item.roles.is_empty() {
                combined.push(Arc::new(RolesRequirement::any_of(item.roles.iter().cloned())));
            }
            if let Some(name) = &item.policy {
                let policy = self
                    .policies
                    .get(name)
                    .ok_or_else(|| DispatchError::UnknownPolicy { name: name.clone() })?;
                combined = AuthorizationPolicy::combine([&combined, policy]);
            }
        }
        Ok(Some(combined))
    }
}

impl Middleware for AuthorizationMiddleware {
    fn handle(&self, request: Request, next: Next) -> NextFuture<'static> {
        let policy = match request.endpoint().map(|feature| self.effective_policy(feature)) {
            None | Some(Ok(None)) => return Box::pin(next.run(request)),
            Some(Ok(Some(policy))) => policy,
            Some(Err(err)) => {
                error!("Authorization failed for {}: {}", request.path(), err);
                return Box::pin(async move { err.to_response() });
            }
        };

        Box::pin(async move {
            let Some(principal) = request.principal() else {
                debug!("Unauthenticated request to {}", request.path());
                return Response::unauthorized();
            };

            match policy.first_unmet(principal, &request).await {
                Ok(None) => {}
                Ok(Some(requirement)) => {
                    debug!(
                        "Principal {} failed requirement '{}' for {}",
                        principal.id,
                        requirement.name(),
                        request.path()
                    );
                    return Response::forbidden();
                }
                Err(err) => {
                    error!("Authorization failed for {}: {}", request.path(), err);
                    return err.to_response();
                }
            }

            next.run(request).await
        })
    }

    fn name(&self) -> &'static str {
        "AuthorizationMiddleware"
    }
}
