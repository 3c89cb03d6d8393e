//! Endpoint registration with per-route conventions

use crate::authorization::{AllowAnonymous, Authorize};
use crate::endpoint::{HandlerMetadata, RequestHandler};
use waypoint_routing::{
    ConstraintReference, ConstraintRegistry, HttpMethod, RouteConfigError, RouteDefinition,
    RouteTable, RouteTableBuilder,
};

/// Collects endpoints for an application.
///
/// ```ignore
/// let mut routes = EndpointRouteBuilder::new();
/// routes
///     .map_get("/users/{id:int}", show_user)
///     .name("user")
///     .require_roles(["admin"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EndpointRouteBuilder {
    definitions: Vec<RouteDefinition>,
    registry: ConstraintRegistry,
}

impl EndpointRouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ConstraintRegistry) -> Self {
        Self {
            definitions: Vec::new(),
            registry,
        }
    }

    /// Constraint registry used when building; register custom constraints here
    pub fn registry_mut(&mut self) -> &mut ConstraintRegistry {
        &mut self.registry
    }

    /// Register `handler` for `template` and the given methods. An empty
    /// method list accepts any method.
    pub fn map<H>(
        &mut self,
        methods: impl IntoIterator<Item = HttpMethod>,
        template: &str,
        handler: H,
    ) -> RouteConventions<'_>
    where
        H: RequestHandler + 'static,
    {
        let definition = RouteDefinition::new(template)
            .with_methods(methods)
            .with_metadata(HandlerMetadata::new(handler));
        self.push(definition)
    }

    pub fn map_get<H: RequestHandler + 'static>(&mut self, template: &str, handler: H) -> RouteConventions<'_> {
        self.map([HttpMethod::GET], template, handler)
    }

    pub fn map_post<H: RequestHandler + 'static>(&mut self, template: &str, handler: H) -> RouteConventions<'_> {
        self.map([HttpMethod::POST], template, handler)
    }

    pub fn map_put<H: RequestHandler + 'static>(&mut self, template: &str, handler: H) -> RouteConventions<'_> {
        self.map([HttpMethod::PUT], template, handler)
    }

    pub fn map_delete<H: RequestHandler + 'static>(&mut self, template: &str, handler: H) -> RouteConventions<'_> {
        self.map([HttpMethod::DELETE], template, handler)
    }

    pub fn map_patch<H: RequestHandler + 'static>(&mut self, template: &str, handler: H) -> RouteConventions<'_> {
        self.map([HttpMethod::PATCH], template, handler)
    }

    /// Register a prepared definition
    pub fn push(&mut self, definition: RouteDefinition) -> RouteConventions<'_> {
        self.definitions.push(definition);
        let index = self.definitions.len() - 1;
        RouteConventions {
            definition: &mut self.definitions[index],
        }
    }

    pub fn definitions(&self) -> &[RouteDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn table_builder(&self) -> RouteTableBuilder {
        let mut builder = RouteTableBuilder::with_registry(self.registry.clone());
        for definition in &self.definitions {
            builder.add(definition.clone());
        }
        builder
    }

    pub fn build(&self) -> Result<RouteTable, RouteConfigError> {
        self.table_builder().build()
    }
}

/// Conventions applied to one registered route
#[derive(Debug)]
pub struct RouteConventions<'a> {
    definition: &'a mut RouteDefinition,
}

impl<'a> RouteConventions<'a> {
    /// Name used for link generation
    pub fn name(self, name: impl Into<String>) -> Self {
        self.definition.name = Some(name.into());
        self
    }

    pub fn order(self, order: i32) -> Self {
        self.definition.order = order;
        self
    }

    pub fn display_name(self, display_name: impl Into<String>) -> Self {
        self.definition.display_name = Some(display_name.into());
        self
    }

    /// Require an authenticated principal
    pub fn require_authorization(self) -> Self {
        self.with_metadata(Authorize::new())
    }

    /// Require any of `roles`
    pub fn require_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_metadata(Authorize::roles(roles))
    }

    pub fn require_policy(self, policy: impl Into<String>) -> Self {
        self.with_metadata(Authorize::policy(policy))
    }

    pub fn allow_anonymous(self) -> Self {
        self.with_metadata(AllowAnonymous)
    }

    pub fn with_metadata<T: Send + Sync + 'static>(self, item: T) -> Self {
        self.definition.metadata.push(item);
        self
    }

    pub fn default(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.defaults.insert(key.into(), value.into());
        self
    }

    pub fn constraint(self, parameter: impl Into<String>, constraint: impl Into<ConstraintReference>) -> Self {
        self.definition
            .constraints
            .push((parameter.into(), constraint.into()));
        self
    }

    pub fn suppress_link_generation(self) -> Self {
        self.definition.suppress_link_generation = true;
        self
    }

    pub fn suppress_matching(self) -> Self {
        self.definition.suppress_matching = true;
        self
    }
}
