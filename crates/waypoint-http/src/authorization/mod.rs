//! Endpoint authorization driven by endpoint metadata
//!
//! Endpoints opt in with [`Authorize`] items and opt out with
//! [`AllowAnonymous`]. An upstream authentication stage places a
//! [`Principal`] into the request extensions.

pub mod middleware;
pub mod policy;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use middleware::AuthorizationMiddleware;
pub use policy::{
    AuthorizationPolicy, AuthorizationPolicyBuilder, AuthorizationRequirement, ClaimRequirement,
    PolicyRegistry, RolesRequirement,
};

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<String>,
    pub claims: HashMap<String, String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            claims: HashMap::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}

/// Endpoint metadata requiring authorization.
///
/// `roles` are any-of within one item. Several items on one endpoint must
/// all hold. With neither roles nor a policy, only authentication is
/// required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorize {
    pub roles: Vec<String>,
    pub policy: Option<String>,
}

impl Authorize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            policy: None,
        }
    }

    pub fn policy(name: impl Into<String>) -> Self {
        Self {
            roles: Vec::new(),
            policy: Some(name.into()),
        }
    }
}

/// Endpoint metadata that skips authorization entirely
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowAnonymous;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_roles_and_claims() {
        let principal = Principal::new("42")
            .with_role("admin")
            .with_claim("email", "a@example.com");
        assert!(principal.has_role("admin"));
        assert!(!principal.has_role("Admin"));
        assert_eq!(principal.claim("email"), Some("a@example.com"));
        assert_eq!(principal.claim("phone"), None);
    }

    #[test]
    fn test_authorize_constructors() {
        assert_eq!(Authorize::roles(["a", "b"]).roles, vec!["a", "b"]);
        assert_eq!(Authorize::policy("editors").policy.as_deref(), Some("editors"));
        assert_eq!(Authorize::new(), Authorize::default());
    }
}
