//! Reverse routing: URLs from route names, endpoints or values

use super::context::{ContextPool, UriBuildingContext};
use crate::config::RouterOptions;
use crate::error::LinkError;
use crate::routing::{
    text_contains_ignore_case, text_eq_ignore_case, EndpointId, ParameterPart, RouteDirection, RouteEntry, RoutePart,
    RouteValues, SegmentKind, SharedRouteTable,
};
use tracing::debug;

/// What a link is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAddress<'a> {
    /// A route registered under this name
    Name(&'a str),
    /// The link-generating route of this endpoint
    Endpoint(EndpointId),
    /// The first link-generating route, in precedence order, that accepts the values
    Values,
}

impl<'a> From<&'a str> for LinkAddress<'a> {
    fn from(name: &'a str) -> Self {
        LinkAddress::Name(name)
    }
}

impl From<EndpointId> for LinkAddress<'_> {
    fn from(id: EndpointId) -> Self {
        LinkAddress::Endpoint(id)
    }
}

/// Generates URLs against the current route table snapshot.
///
/// Safe to share between threads; each call checks a scratch context out of
/// an internal pool and returns it when done.
#[derive(Debug)]
pub struct LinkGenerator {
    routes: SharedRouteTable,
    options: RouterOptions,
    pool: ContextPool,
}

impl LinkGenerator {
    pub fn new(routes: SharedRouteTable, options: RouterOptions) -> Self {
        let pool = ContextPool::from_options(&options);
        Self {
            routes,
            options,
            pool,
        }
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    pub fn build_url(&self, name: &str, values: &RouteValues) -> Result<String, LinkError> {
        self.generate(LinkAddress::Name(name), values)
    }

    pub fn build_url_for_endpoint(
        &self,
        id: EndpointId,
        values: &RouteValues,
    ) -> Result<String, LinkError> {
        self.generate(LinkAddress::Endpoint(id), values)
    }

    pub fn build_url_from_values(&self, values: &RouteValues) -> Result<String, LinkError> {
        self.generate(LinkAddress::Values, values)
    }

    /// Like [`generate`](Self::generate), discarding the failure reason
    pub fn try_build_url<'a>(
        &self,
        address: impl Into<LinkAddress<'a>>,
        values: &RouteValues,
    ) -> Option<String> {
        self.generate(address.into(), values).ok()
    }

    pub fn generate(&self, address: LinkAddress<'_>, values: &RouteValues) -> Result<String, LinkError> {
        let table = self.routes.load();
        let mut context = self.pool.acquire();

        let result = match address {
            LinkAddress::Name(name) => match table.find_by_name(name) {
                Some(entry) => self.bind(entry, values, &mut context),
                None => Err(LinkError::UnknownRouteName(name.to_string())),
            },
            LinkAddress::Endpoint(id) => match table.find_by_endpoint(id) {
                Some(entry) => self.bind(entry, values, &mut context),
                None => Err(LinkError::UnknownEndpoint(id)),
            },
            LinkAddress::Values => table
                .link_entries()
                .find_map(|entry| {
                    context.reset();
                    self.bind(entry, values, &mut context).ok()
                })
                .ok_or(LinkError::NoMatchingRoute),
        };

        if let Err(err) = &result {
            debug!(address = ?address, error = %err, "Link generation failed");
        }
        result
    }

    fn bind(
        &self,
        entry: &RouteEntry,
        supplied: &RouteValues,
        context: &mut UriBuildingContext,
    ) -> Result<String, LinkError> {
        let pattern = entry.pattern();

        for (key, required) in entry.required_values().iter() {
            if let Some(value) = supplied.get(key) {
                if !text_eq_ignore_case(value, required) {
                    return Err(LinkError::RequiredValueMismatch {
                        key: key.to_string(),
                    });
                }
            }
        }

        let mut accepted = RouteValues::with_capacity(supplied.len());
        for param in pattern.parameters() {
            match supplied.get(&param.name).filter(|v| !v.is_empty()) {
                Some(value) => {
                    accepted.insert(param.name.as_str(), value);
                }
                None => match &param.default {
                    Some(default) => {
                        accepted.insert(param.name.as_str(), default.as_str());
                    }
                    None if param.can_be_absent() => {}
                    None => {
                        return Err(LinkError::MissingValue {
                            parameter: param.name.clone(),
                        })
                    }
                },
            }
        }
        for (key, value) in entry.required_values().iter() {
            accepted.insert_if_absent(key, value);
        }
        for (key, value) in supplied.iter() {
            if pattern.parameter(key).is_none() && entry.constraints().constrains(key) {
                accepted.insert_if_absent(key, value);
            }
        }

        if let Some(parameter) =
            entry
                .constraints()
                .first_failure(&accepted, RouteDirection::UrlGeneration, entry.template())
        {
            return Err(LinkError::ConstraintRejected {
                parameter: parameter.to_string(),
                value: accepted.get(parameter).unwrap_or_default().to_string(),
            });
        }

        let mut unbound: Option<&ParameterPart> = None;
        for segment in pattern.segments() {
            context.begin_segment();
            let droppable = match (segment.kind(), segment.as_parameter()) {
                (SegmentKind::Parameter, Some(param)) => match accepted.get(&param.name) {
                    Some(value) => {
                        let keep_slashes = param.is_catch_all() && !param.encode_slashes;
                        context.write_value(value, keep_slashes);
                        param.can_be_absent()
                            && param
                                .default
                                .as_deref()
                                .map_or(false, |default| text_eq_ignore_case(value, default))
                    }
                    None => {
                        unbound.get_or_insert(param);
                        true
                    }
                },
                (SegmentKind::Composite, _) => {
                    write_composite(segment.parts(), &accepted, context)?;
                    false
                }
                _ => {
                    for part in segment.parts() {
                        if let RoutePart::Literal(text) = part {
                            context.write_value(text, false);
                        }
                    }
                    false
                }
            };

            if !droppable {
                if let Some(param) = unbound {
                    return Err(LinkError::MissingValue {
                        parameter: param.name.clone(),
                    });
                }
            }
            context.end_segment(droppable);
        }

        for (key, value) in supplied.iter() {
            let consumed = pattern.parameter(key).is_some()
                || entry.required_values().contains_key(key)
                || entry.constraints().constrains(key);
            if !consumed && !value.is_empty() {
                context.push_query(key, value);
            }
        }

        Ok(context.finish(&self.options))
    }
}

/// Write a composite segment. A trailing optional parameter without a value
/// is skipped together with the literal before it. The last value written
/// must then not contain that literal, or the link would match back with the
/// optional part bound.
fn write_composite(
    parts: &[RoutePart],
    values: &RouteValues,
    context: &mut UriBuildingContext,
) -> Result<(), LinkError> {
    let skipped_separator = match parts {
        [.., RoutePart::Literal(separator), RoutePart::Parameter(tail)]
            if tail.is_optional() && !values.contains_key(&tail.name) =>
        {
            Some(separator.as_str())
        }
        _ => None,
    };
    let visible = match skipped_separator {
        Some(_) => &parts[..parts.len() - 2],
        None => parts,
    };

    if let (Some(separator), Some(RoutePart::Parameter(last))) = (skipped_separator, visible.last()) {
        if let Some(value) = values.get(&last.name) {
            if text_contains_ignore_case(value, separator) {
                return Err(LinkError::AmbiguousValue {
                    parameter: last.name.clone(),
                    value: value.to_string(),
                });
            }
        }
    }

    for part in visible {
        match part {
            RoutePart::Literal(text) => context.write_value(text, false),
            RoutePart::Parameter(param) => {
                if let Some(value) = values.get(&param.name) {
                    context.write_value(value, false);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Constraint, RouteDefinition, RouteTableBuilder};

    fn generator(builder: RouteTableBuilder) -> LinkGenerator {
        generator_with(builder, RouterOptions::default())
    }

    fn generator_with(builder: RouteTableBuilder, options: RouterOptions) -> LinkGenerator {
        LinkGenerator::new(SharedRouteTable::new(builder.build().unwrap()), options)
    }

    #[test]
    fn test_build_by_name() {
        let links = generator(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/blog/{year:int}/{month:int}/{slug}").with_name("post")),
        );
        let url = links
            .build_url(
                "POST",
                &RouteValues::from([("year", "2023"), ("month", "08"), ("slug", "hello world")]),
            )
            .unwrap();
        assert_eq!(url, "/blog/2023/08/hello%20world");
    }

    #[test]
    fn test_unknown_name_is_distinguished_from_value_errors() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/users/{id:int}").with_name("user")),
        );
        let err = links.build_url("nope", &RouteValues::new()).unwrap_err();
        assert!(err.is_unknown_address());

        let err = links
            .build_url("user", &RouteValues::from([("id", "abc")]))
            .unwrap_err();
        assert_eq!(
            err,
            LinkError::ConstraintRejected {
                parameter: "id".into(),
                value: "abc".into()
            }
        );
        assert!(!err.is_unknown_address());

        let err = links.build_url("user", &RouteValues::new()).unwrap_err();
        assert_eq!(err, LinkError::MissingValue { parameter: "id".into() });
    }

    #[test]
    fn test_trailing_defaults_and_optionals_are_omitted() {
        let links = generator(RouteTableBuilder::new().route(
            RouteDefinition::new("/{controller=Home}/{action=Index}/{id?}").with_name("default"),
        ));
        let build = |pairs: &[(&str, &str)]| {
            links
                .build_url("default", &pairs.iter().copied().collect())
                .unwrap()
        };
        assert_eq!(build(&[]), "/");
        assert_eq!(build(&[("controller", "Products")]), "/Products");
        assert_eq!(
            build(&[("controller", "Home"), ("action", "About")]),
            "/Home/About"
        );
        assert_eq!(
            build(&[("controller", "Products"), ("action", "Index"), ("id", "7")]),
            "/Products/Index/7"
        );
    }

    #[test]
    fn test_unbound_optional_before_kept_segment_is_missing() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/{a?}/fixed").with_name("r")),
        );
        assert_eq!(
            links.build_url("r", &RouteValues::new()).unwrap_err(),
            LinkError::MissingValue { parameter: "a".into() }
        );
    }

    #[test]
    fn test_catch_all_slash_encoding() {
        let links = generator(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/files/{*path}").with_name("encoded"))
                .route(RouteDefinition::new("/raw/{**path}").with_name("raw")),
        );
        let values = RouteValues::from([("path", "a/b c")]);
        assert_eq!(links.build_url("encoded", &values).unwrap(), "/files/a%2Fb%20c");
        assert_eq!(links.build_url("raw", &values).unwrap(), "/raw/a/b%20c");
        assert_eq!(links.build_url("raw", &RouteValues::new()).unwrap(), "/raw");
    }

    #[test]
    fn test_composite_segments() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/dl/{name}.{ext?}").with_name("dl")),
        );
        assert_eq!(
            links
                .build_url("dl", &RouteValues::from([("name", "report"), ("ext", "pdf")]))
                .unwrap(),
            "/dl/report.pdf"
        );
        assert_eq!(
            links
                .build_url("dl", &RouteValues::from([("name", "report")]))
                .unwrap(),
            "/dl/report"
        );
    }

    #[test]
    fn test_omitted_composite_tail_must_read_back_the_same() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/dl/{name}.{ext?}").with_name("dl")),
        );
        let err = links
            .build_url("dl", &RouteValues::from([("name", "a.b")]))
            .unwrap_err();
        assert_eq!(
            err,
            LinkError::AmbiguousValue {
                parameter: "name".into(),
                value: "a.b".into()
            }
        );
        assert!(links
            .try_build_url("dl", &RouteValues::from([("name", "a.b")]))
            .is_none());

        let url = links
            .build_url("dl", &RouteValues::from([("name", "a.b"), ("ext", "c")]))
            .unwrap();
        assert_eq!(url, "/dl/a.b.c");
        let pattern = crate::routing::RoutePattern::parse("/dl/{name}.{ext?}").unwrap();
        let values = crate::routing::match_path(&pattern, &url).unwrap();
        assert_eq!(values.get("name"), Some("a.b"));
        assert_eq!(values.get("ext"), Some("c"));
    }

    #[test]
    fn test_extra_values_become_query_string() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/search/{term}").with_name("s")),
        );
        let url = links
            .build_url(
                "s",
                &RouteValues::from([("term", "rust"), ("page", "2"), ("q", "a&b")]),
            )
            .unwrap();
        assert_eq!(url, "/search/rust?page=2&q=a%26b");
    }

    #[test]
    fn test_required_values_select_route() {
        let links = generator(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/shop/{id}").with_default("area", "shop"))
                .route(RouteDefinition::new("/blog/{id}").with_default("area", "blog")),
        );
        let url = links
            .build_url_from_values(&RouteValues::from([("area", "BLOG"), ("id", "3")]))
            .unwrap();
        assert_eq!(url, "/blog/3");

        assert_eq!(
            links
                .build_url_from_values(&RouteValues::from([("area", "forum"), ("id", "3")]))
                .unwrap_err(),
            LinkError::NoMatchingRoute
        );
    }

    #[test]
    fn test_build_for_endpoint() {
        let links = generator(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/a"))
                .route(RouteDefinition::new("/b/{id}"))
                .route(RouteDefinition::new("/c").suppress_link_generation()),
        );
        assert_eq!(
            links
                .build_url_for_endpoint(EndpointId(1), &RouteValues::from([("id", "9")]))
                .unwrap(),
            "/b/9"
        );
        assert_eq!(
            links
                .build_url_for_endpoint(EndpointId(2), &RouteValues::new())
                .unwrap_err(),
            LinkError::UnknownEndpoint(EndpointId(2))
        );
    }

    #[test]
    fn test_lowercase_and_trailing_slash_options() {
        let links = generator_with(
            RouteTableBuilder::new()
                .route(RouteDefinition::new("/Products/{Name}").with_name("p")),
            RouterOptions {
                lowercase_urls: true,
                append_trailing_slash: true,
                ..RouterOptions::default()
            },
        );
        let url = links
            .build_url("p", &RouteValues::from([("name", "Widget"), ("Ref", "Mail")]))
            .unwrap();
        assert_eq!(url, "/products/widget/?Ref=Mail");
    }

    #[test]
    fn test_constraint_on_non_parameter_key_is_not_a_query_value() {
        let links = generator(RouteTableBuilder::new().route(
            RouteDefinition::new("/x")
                .with_name("x")
                .with_constraint("tenant", Constraint::Alpha),
        ));
        assert_eq!(
            links
                .build_url("x", &RouteValues::from([("tenant", "acme")]))
                .unwrap(),
            "/x"
        );
    }

    #[test]
    fn test_try_build_url() {
        let links = generator(
            RouteTableBuilder::new().route(RouteDefinition::new("/u/{id:int}").with_name("u")),
        );
        assert_eq!(
            links.try_build_url("u", &RouteValues::from([("id", "5")])).as_deref(),
            Some("/u/5")
        );
        assert!(links.try_build_url("u", &RouteValues::from([("id", "x")])).is_none());
        assert_eq!(links.pool().idle_count(), 1);
    }
}
