//! Route table construction and candidate selection
//!
//! A [`RouteTableBuilder`] turns an ordered list of [`RouteDefinition`]s into
//! an immutable [`RouteTable`]. Entries are sorted once by order ascending,
//! then specificity descending; the sort is stable, so registration order
//! breaks remaining ties. Selection walks that order and the first entry
//! whose path, method and constraints all match wins.

use super::constraints::{Constraint, ConstraintRegistry, ConstraintSet, RouteDirection};
use super::matcher::TemplateMatcher;
use super::metadata::EndpointMetadata;
use super::pattern::RoutePattern;
use super::segments::RequestPath;
use super::values::RouteValues;
use super::{text_eq_ignore_case, Endpoint, EndpointId, HttpMethod, HttpMethodMetadata};
use crate::error::RouteConfigError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A constraint attached to a route outside its template
#[derive(Debug, Clone)]
pub enum ConstraintReference {
    /// Resolved through the registry at build time, e.g. `"range(1,10)"`
    Text(String),
    /// Used as is
    Resolved(Constraint),
}

impl From<&str> for ConstraintReference {
    fn from(text: &str) -> Self {
        ConstraintReference::Text(text.to_string())
    }
}

impl From<String> for ConstraintReference {
    fn from(text: String) -> Self {
        ConstraintReference::Text(text)
    }
}

impl From<Constraint> for ConstraintReference {
    fn from(constraint: Constraint) -> Self {
        ConstraintReference::Resolved(constraint)
    }
}

/// One route as configured by the application
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub template: String,
    pub order: i32,
    pub name: Option<String>,
    pub display_name: Option<String>,
    /// Empty means any method
    pub methods: Vec<HttpMethod>,
    pub defaults: RouteValues,
    pub constraints: Vec<(String, ConstraintReference)>,
    pub metadata: EndpointMetadata,
    pub suppress_link_generation: bool,
    pub suppress_matching: bool,
}

impl RouteDefinition {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            order: 0,
            name: None,
            display_name: None,
            methods: Vec::new(),
            defaults: RouteValues::new(),
            constraints: Vec::new(),
            metadata: EndpointMetadata::new(),
            suppress_link_generation: false,
            suppress_matching: false,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        for method in methods {
            self = self.with_method(method);
        }
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key, value);
        self
    }

    pub fn with_constraint(
        mut self,
        parameter: impl Into<String>,
        constraint: impl Into<ConstraintReference>,
    ) -> Self {
        self.constraints.push((parameter.into(), constraint.into()));
        self
    }

    pub fn with_metadata<T: std::any::Any + Send + Sync>(mut self, item: T) -> Self {
        self.metadata.push(item);
        self
    }

    pub fn suppress_link_generation(mut self) -> Self {
        self.suppress_link_generation = true;
        self
    }

    pub fn suppress_matching(mut self) -> Self {
        self.suppress_matching = true;
        self
    }
}

/// A built, immutable route
#[derive(Debug)]
pub struct RouteEntry {
    endpoint: Arc<Endpoint>,
    pattern: RoutePattern,
    order: i32,
    specificity: i32,
    name: Option<String>,
    methods: Vec<HttpMethod>,
    required_values: RouteValues,
    constraints: ConstraintSet,
    suppress_link_generation: bool,
    suppress_matching: bool,
}

impl RouteEntry {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn template(&self) -> &str {
        self.pattern.raw()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn specificity(&self) -> i32 {
        self.specificity
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.methods
    }

    /// Defaults for keys that are not template parameters
    pub fn required_values(&self) -> &RouteValues {
        &self.required_values
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn suppresses_link_generation(&self) -> bool {
        self.suppress_link_generation
    }

    pub fn suppresses_matching(&self) -> bool {
        self.suppress_matching
    }

    pub fn accepts_method(&self, method: &HttpMethod) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Match the path and evaluate constraints. The method is not checked.
    pub fn match_request(&self, path: &RequestPath<'_>) -> Option<RouteValues> {
        let mut values = TemplateMatcher::new(&self.pattern).match_request(path)?;
        for (key, value) in self.required_values.iter() {
            values.insert_if_absent(key, value);
        }

        if let Some(parameter) =
            self.constraints
                .first_failure(&values, RouteDirection::IncomingRequest, self.template())
        {
            trace!(
                route = %self.template(),
                parameter = %parameter,
                "Candidate rejected by constraint"
            );
            return None;
        }

        Some(values)
    }
}

/// A successful selection
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub endpoint: Arc<Endpoint>,
    pub values: RouteValues,
}

impl RouteMatch {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn values(&self) -> &RouteValues {
        &self.values
    }

    pub fn metadata(&self) -> &EndpointMetadata {
        self.endpoint.metadata()
    }
}

/// Counts describing a built table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTableStats {
    pub total_routes: usize,
    pub named_routes: usize,
    pub catch_all_routes: usize,
    /// Routes that only generate links
    pub link_generation_only: usize,
    /// Routes that only match requests
    pub match_only: usize,
}

/// An immutable, precedence-ordered set of routes
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    names: HashMap<String, usize>,
    endpoints: HashMap<EndpointId, usize>,
}

impl RouteTable {
    /// A table with no routes; every selection returns `None`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn select_best_match(&self, path: &str, method: &HttpMethod) -> Option<RouteMatch> {
        let request_path = RequestPath::parse(path);

        for entry in &self.entries {
            if entry.suppress_matching || !entry.accepts_method(method) {
                continue;
            }
            if let Some(values) = entry.match_request(&request_path) {
                debug!(
                    path = %path,
                    method = %method,
                    endpoint = %entry.endpoint.display_name(),
                    "Route matched"
                );
                return Some(RouteMatch {
                    endpoint: Arc::clone(&entry.endpoint),
                    values,
                });
            }
        }

        debug!(path = %path, method = %method, "No route matched");
        None
    }

    /// Methods of the restricted entries whose path and constraints match,
    /// regardless of the request method. Empty when nothing matches.
    pub fn allowed_methods(&self, path: &str) -> Vec<HttpMethod> {
        let request_path = RequestPath::parse(path);
        let mut allowed = Vec::new();

        for entry in &self.entries {
            if entry.suppress_matching || entry.methods.is_empty() {
                continue;
            }
            if entry.match_request(&request_path).is_some() {
                for method in &entry.methods {
                    if !allowed.contains(method) {
                        allowed.push(method.clone());
                    }
                }
            }
        }

        allowed
    }

    /// Link-generating entry registered under `name` (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&RouteEntry> {
        self.names
            .get(&name.to_lowercase())
            .map(|&index| &self.entries[index])
    }

    /// Link-generating entry for an endpoint
    pub fn find_by_endpoint(&self, id: EndpointId) -> Option<&RouteEntry> {
        self.endpoints.get(&id).map(|&index| &self.entries[index])
    }

    /// All entries in precedence order
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Entries that can generate links, in precedence order
    pub fn link_entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().filter(|e| !e.suppress_link_generation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RouteTableStats {
        RouteTableStats {
            total_routes: self.entries.len(),
            named_routes: self.entries.iter().filter(|e| e.name.is_some()).count(),
            catch_all_routes: self
                .entries
                .iter()
                .filter(|e| e.pattern.has_catch_all())
                .count(),
            link_generation_only: self.entries.iter().filter(|e| e.suppress_matching).count(),
            match_only: self
                .entries
                .iter()
                .filter(|e| e.suppress_link_generation)
                .count(),
        }
    }
}

/// Collects route definitions and builds route tables
#[derive(Debug, Clone, Default)]
pub struct RouteTableBuilder {
    definitions: Vec<RouteDefinition>,
    registry: ConstraintRegistry,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ConstraintRegistry) -> Self {
        Self {
            definitions: Vec::new(),
            registry,
        }
    }

    pub fn add(&mut self, definition: RouteDefinition) -> &mut Self {
        self.definitions.push(definition);
        self
    }

    pub fn route(mut self, definition: RouteDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn definitions(&self) -> &[RouteDefinition] {
        &self.definitions
    }

    pub fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ConstraintRegistry {
        &mut self.registry
    }

    /// Build an immutable table. Endpoint ids are registration indexes.
    pub fn build(&self) -> Result<RouteTable, RouteConfigError> {
        let mut entries = self
            .definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| self.build_entry(EndpointId(index), definition))
            .collect::<Result<Vec<_>, _>>()?;

        entries.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| b.specificity.cmp(&a.specificity))
        });

        let mut names = HashMap::new();
        let mut endpoints = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.suppress_link_generation {
                continue;
            }
            if let Some(name) = &entry.name {
                if names.insert(name.to_lowercase(), index).is_some() {
                    return Err(RouteConfigError::DuplicateRouteName { name: name.clone() });
                }
            }
            endpoints.entry(entry.endpoint.id()).or_insert(index);
        }

        debug!(routes = entries.len(), named = names.len(), "Built route table");

        Ok(RouteTable {
            entries,
            names,
            endpoints,
        })
    }

    fn build_entry(
        &self,
        id: EndpointId,
        definition: &RouteDefinition,
    ) -> Result<RouteEntry, RouteConfigError> {
        let template = definition.template.as_str();
        let invalid = |source| RouteConfigError::InvalidTemplate {
            template: template.to_string(),
            source,
        };

        let pattern = RoutePattern::parse(template)
            .and_then(|pattern| pattern.with_defaults(&definition.defaults))
            .map_err(invalid)?;

        let required_values: RouteValues = definition
            .defaults
            .iter()
            .filter(|(key, _)| pattern.parameter(key).is_none())
            .collect();

        let constraints = self.resolve_constraints(&pattern, definition)?;

        let mut metadata = definition.metadata.clone();
        if !definition.methods.is_empty() {
            metadata.push(HttpMethodMetadata {
                methods: definition.methods.clone(),
            });
        }

        let display_name = definition
            .display_name
            .clone()
            .unwrap_or_else(|| display_name_for(&definition.methods, template));

        Ok(RouteEntry {
            endpoint: Arc::new(Endpoint::new(id, display_name, metadata)),
            specificity: pattern.specificity(),
            pattern,
            order: definition.order,
            name: definition.name.clone(),
            methods: definition.methods.clone(),
            required_values,
            constraints,
            suppress_link_generation: definition.suppress_link_generation,
            suppress_matching: definition.suppress_matching,
        })
    }

    /// Inline constraints first, then explicit ones, parameter by parameter in
    /// template order. Explicit constraints on non-parameter keys go last.
    fn resolve_constraints(
        &self,
        pattern: &RoutePattern,
        definition: &RouteDefinition,
    ) -> Result<ConstraintSet, RouteConfigError> {
        let template = definition.template.as_str();
        let mut set = ConstraintSet::new();

        for param in pattern.parameters() {
            for reference in &param.constraints {
                set.push(
                    param.name.as_str(),
                    self.registry.resolve(template, &param.name, reference)?,
                );
            }
            for (key, reference) in &definition.constraints {
                if text_eq_ignore_case(key, &param.name) {
                    set.push(param.name.as_str(), self.resolve_reference(template, key, reference)?);
                }
            }
        }

        for (key, reference) in &definition.constraints {
            if pattern.parameter(key).is_none() {
                set.push(key.as_str(), self.resolve_reference(template, key, reference)?);
            }
        }

        Ok(set)
    }

    fn resolve_reference(
        &self,
        template: &str,
        parameter: &str,
        reference: &ConstraintReference,
    ) -> Result<Constraint, RouteConfigError> {
        match reference {
            ConstraintReference::Text(text) => self.registry.resolve(template, parameter, text),
            ConstraintReference::Resolved(constraint) => Ok(constraint.clone()),
        }
    }
}

fn display_name_for(methods: &[HttpMethod], template: &str) -> String {
    if methods.is_empty() {
        return template.to_string();
    }
    let methods: Vec<&str> = methods.iter().map(HttpMethod::as_str).collect();
    format!("{} {}", methods.join(","), template)
}
