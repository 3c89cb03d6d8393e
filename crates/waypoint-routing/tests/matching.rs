//! End-to-end matching scenarios against built route tables

use waypoint_routing::{
    match_path, ConstraintContext, ConstraintError, ConstraintRegistry, HttpMethod,
    RouteDefinition, RoutePattern, RouteTableBuilder, RouteValues,
};

fn values_of(values: &RouteValues) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn blog_route_with_int_constraints() {
    let table = RouteTableBuilder::new()
        .route(RouteDefinition::new("/blog/{year:int}/{month:int}/{slug}").with_order(0))
        .build()
        .unwrap();

    let matched = table
        .select_best_match("/blog/2023/08/hello-world", &HttpMethod::GET)
        .unwrap();
    assert_eq!(
        values_of(&matched.values),
        vec![
            ("year".to_string(), "2023".to_string()),
            ("month".to_string(), "08".to_string()),
            ("slug".to_string(), "hello-world".to_string()),
        ]
    );

    assert!(table
        .select_best_match("/blog/2023/aug/hello", &HttpMethod::GET)
        .is_none());
}

#[test]
fn int_constraint_rejects_non_numeric_ids() {
    let table = RouteTableBuilder::new()
        .route(RouteDefinition::new("/users/{id:int}"))
        .build()
        .unwrap();
    assert!(table.select_best_match("/users/abc", &HttpMethod::GET).is_none());
    let matched = table.select_best_match("/users/42", &HttpMethod::GET).unwrap();
    assert_eq!(matched.values.get("id"), Some("42"));
}

#[test]
fn catch_all_takes_every_remaining_segment() {
    let pattern = RoutePattern::parse("/files/{*path}").unwrap();
    let values = match_path(&pattern, "/files/a/b/c").unwrap();
    assert_eq!(values.get("path"), Some("a/b/c"));
}

#[test]
fn optional_trailing_parameter() {
    let pattern = RoutePattern::parse("/items/{id?}").unwrap();
    assert!(match_path(&pattern, "/items").unwrap().get("id").is_none());
    assert_eq!(match_path(&pattern, "/items/5").unwrap().get("id"), Some("5"));
}

#[test]
fn literal_segments_ignore_case() {
    let pattern = RoutePattern::parse("/Api/Values").unwrap();
    assert!(match_path(&pattern, "/api/values").is_some());
}

#[test]
fn ambiguous_routes_resolve_the_same_way_every_time() {
    let mut builder = RouteTableBuilder::new();
    for index in 0..5 {
        builder.add(RouteDefinition::new("/things/{value}").with_display_name(format!("route-{index}")));
    }
    let table = builder.build().unwrap();

    for _ in 0..100 {
        let matched = table.select_best_match("/things/x", &HttpMethod::GET).unwrap();
        assert_eq!(matched.endpoint.display_name(), "route-0");
    }

    let rebuilt = builder.build().unwrap();
    let matched = rebuilt.select_best_match("/things/x", &HttpMethod::GET).unwrap();
    assert_eq!(matched.endpoint.display_name(), "route-0");
}

#[test]
fn misbehaving_custom_constraint_only_skips_its_own_route() {
    let mut registry = ConstraintRegistry::new();
    registry.register_custom("flaky", |_: &ConstraintContext<'_>| {
        Err(ConstraintError::new("flaky", "lookup table unavailable"))
    });
    registry.register_custom("explosive", |_: &ConstraintContext<'_>| -> Result<bool, ConstraintError> {
        panic!("constraint bug")
    });

    let table = RouteTableBuilder::with_registry(registry)
        .route(RouteDefinition::new("/tenants/{id:flaky}").with_display_name("flaky"))
        .route(RouteDefinition::new("/tenants/{id:explosive}").with_display_name("explosive"))
        .route(RouteDefinition::new("/tenants/{id}").with_display_name("plain"))
        .build()
        .unwrap();

    let matched = table.select_best_match("/tenants/7", &HttpMethod::GET).unwrap();
    assert_eq!(matched.endpoint.display_name(), "plain");
}

#[test]
fn conventional_route_with_defaults_and_required_values() {
    let table = RouteTableBuilder::new()
        .route(
            RouteDefinition::new("/admin/{action=Dashboard}/{id?}")
                .with_name("admin")
                .with_default("area", "Admin"),
        )
        .route(RouteDefinition::new("/{controller=Home}/{action=Index}/{id?}").with_name("default"))
        .build()
        .unwrap();

    let matched = table.select_best_match("/admin", &HttpMethod::GET).unwrap();
    assert_eq!(matched.values.get("action"), Some("Dashboard"));
    assert_eq!(matched.values.get("area"), Some("Admin"));

    let matched = table
        .select_best_match("/Products/Details/3", &HttpMethod::GET)
        .unwrap();
    assert_eq!(matched.values.get("controller"), Some("Products"));
    assert_eq!(matched.values.get("action"), Some("Details"));
    assert_eq!(matched.values.get("id"), Some("3"));
}

#[test]
fn method_mismatch_is_detectable_by_the_caller() {
    let table = RouteTableBuilder::new()
        .route(RouteDefinition::new("/orders/{id:int}").with_method(HttpMethod::GET))
        .route(RouteDefinition::new("/orders/{id:int}").with_method(HttpMethod::DELETE))
        .build()
        .unwrap();

    assert!(table.select_best_match("/orders/1", &HttpMethod::PUT).is_none());
    assert_eq!(
        table.allowed_methods("/orders/1"),
        vec![HttpMethod::GET, HttpMethod::DELETE]
    );
    assert!(table.allowed_methods("/orders/x").is_empty());
}
