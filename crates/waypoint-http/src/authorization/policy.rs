//! Authorization requirements and policies

use super::Principal;
use crate::error::DispatchError;
use crate::request::Request;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One condition a principal must satisfy.
///
/// `Ok(false)` denies access; `Err` means the requirement could not be
/// evaluated and the request fails with a server error.
#[async_trait]
pub trait AuthorizationRequirement: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn evaluate(&self, principal: &Principal, request: &Request) -> Result<bool, DispatchError>;
}

/// Satisfied when the principal has any of the roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolesRequirement {
    pub roles: Vec<String>,
}

impl RolesRequirement {
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationRequirement for RolesRequirement {
    fn name(&self) -> &str {
        "roles"
    }

    async fn evaluate(&self, principal: &Principal, _request: &Request) -> Result<bool, DispatchError> {
        Ok(self.roles.iter().any(|role| principal.has_role(role)))
    }
}

/// Satisfied when the principal carries the claim, optionally with one of
/// the allowed values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequirement {
    pub claim: String,
    pub allowed_values: Vec<String>,
}

impl ClaimRequirement {
    pub fn present(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            allowed_values: Vec::new(),
        }
    }

    pub fn one_of<I, S>(claim: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claim: claim.into(),
            allowed_values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationRequirement for ClaimRequirement {
    fn name(&self) -> &str {
        "claim"
    }

    async fn evaluate(&self, principal: &Principal, _request: &Request) -> Result<bool, DispatchError> {
        Ok(match principal.claim(&self.claim) {
            None => false,
            Some(_) if self.allowed_values.is_empty() => true,
            Some(value) => self.allowed_values.iter().any(|allowed| allowed == value),
        })
    }
}

/// All requirements must hold. An empty policy only asks for an
/// authenticated principal.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    requirements: Vec<Arc<dyn AuthorizationRequirement>>,
}

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> AuthorizationPolicyBuilder {
        AuthorizationPolicyBuilder::default()
    }

    pub fn requirements(&self) -> &[Arc<dyn AuthorizationRequirement>] {
        &self.requirements
    }

    pub fn push(&mut self, requirement: Arc<dyn AuthorizationRequirement>) {
        self.requirements.push(requirement);
    }

    /// Every requirement of every policy, in order
    pub fn combine<'a>(policies: impl IntoIterator<Item = &'a AuthorizationPolicy>) -> Self {
        Self {
            requirements: policies
                .into_iter()
                .flat_map(|policy| policy.requirements.iter().cloned())
                .collect(),
        }
    }

    /// The first requirement that does not hold, if any
    pub async fn first_unmet(
        &self,
        principal: &Principal,
        request: &Request,
    ) -> Result<Option<&dyn AuthorizationRequirement>, DispatchError> {
        for requirement in &self.requirements {
            if !requirement.evaluate(principal, request).await? {
                return Ok(Some(requirement.as_ref()));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Default)]
pub struct AuthorizationPolicyBuilder {
    policy: AuthorizationPolicy,
}

impl AuthorizationPolicyBuilder {
    pub fn require_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.push(Arc::new(RolesRequirement::any_of(roles)));
        self
    }

    pub fn require_claim(mut self, claim: impl Into<String>) -> Self {
        self.policy.push(Arc::new(ClaimRequirement::present(claim)));
        self
    }

    pub fn require_claim_value<I, S>(mut self, claim: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.push(Arc::new(ClaimRequirement::one_of(claim, values)));
        self
    }

    pub fn require(mut self, requirement: impl AuthorizationRequirement + 'static) -> Self {
        self.policy.push(Arc::new(requirement));
        self
    }

    pub fn build(self) -> AuthorizationPolicy {
        self.policy
    }
}

/// Named policies. Names are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, AuthorizationPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` under `name`, replacing any earlier one
    pub fn add(&mut self, name: impl Into<String>, policy: AuthorizationPolicy) -> &mut Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn with(mut self, name: impl Into<String>, policy: AuthorizationPolicy) -> Self {
        self.add(name, policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AuthorizationPolicy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct HeaderRequirement;

    #[async_trait]
    impl AuthorizationRequirement for HeaderRequirement {
        fn name(&self) -> &str {
            "tenant-header"
        }

        async fn evaluate(&self, principal: &Principal, request: &Request) -> Result<bool, DispatchError> {
            Ok(request.header("x-tenant") == principal.claim("tenant"))
        }
    }

    fn editor() -> Principal {
        Principal::new("u1")
            .with_role("editor")
            .with_claim("tenant", "acme")
    }

    #[tokio::test]
    async fn test_roles_are_any_of() {
        let request = Request::get("/");
        let requirement = RolesRequirement::any_of(["admin", "editor"]);
        assert!(requirement.evaluate(&editor(), &request).await.unwrap());
        let requirement = RolesRequirement::any_of(["admin"]);
        assert!(!requirement.evaluate(&editor(), &request).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_requirements() {
        let request = Request::get("/");
        assert!(ClaimRequirement::present("tenant").evaluate(&editor(), &request).await.unwrap());
        assert!(ClaimRequirement::one_of("tenant", ["acme", "globex"])
            .evaluate(&editor(), &request)
            .await
            .unwrap());
        assert!(!ClaimRequirement::one_of("tenant", ["globex"])
            .evaluate(&editor(), &request)
            .await
            .unwrap());
        assert!(!ClaimRequirement::present("email").evaluate(&editor(), &request).await.unwrap());
    }

    #[tokio::test]
    async fn test_combined_policy_is_all_of() {
        let roles = AuthorizationPolicy::builder().require_roles(["editor"]).build();
        let tenant = AuthorizationPolicy::builder().require(HeaderRequirement).build();
        let combined = AuthorizationPolicy::combine([&roles, &tenant]);
        assert_eq!(combined.requirements().len(), 2);

        let matching = Request::get("/").with_header("x-tenant", "acme");
        assert!(combined.first_unmet(&editor(), &matching).await.unwrap().is_none());

        let other = Request::get("/").with_header("x-tenant", "globex");
        let unmet = combined.first_unmet(&editor(), &other).await.unwrap();
        assert_eq!(unmet.map(|r| r.name()), Some("tenant-header"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = PolicyRegistry::new()
            .with("editors", AuthorizationPolicy::builder().require_roles(["editor"]).build());
        assert!(registry.contains("editors"));
        assert!(registry.get("Editors").is_none());
        assert_eq!(registry.len(), 1);
    }
}
