//! Parameter constraints
//!
//! Constraints are a closed set of built-in kinds plus an open `Custom` kind
//! backed by [`CustomConstraint`]. Names used in templates (`{id:int}`) are
//! resolved through a [`ConstraintRegistry`] once, when the route table is
//! built. Evaluation never mutates route values.

use super::values::RouteValues;
use crate::error::{ConstraintError, RouteConfigError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Why a constraint is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDirection {
    /// Matching an incoming request path
    IncomingRequest,
    /// Validating values while generating a URL
    UrlGeneration,
}

/// Everything a custom constraint sees
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext<'a> {
    pub parameter: &'a str,
    /// `None` when an optional parameter is unbound
    pub value: Option<&'a str>,
    pub values: &'a RouteValues,
    pub direction: RouteDirection,
}

/// A user-supplied predicate. Implementations are shared across threads and
/// must not rely on mutable state.
pub trait CustomConstraint: Send + Sync {
    fn matches(&self, context: &ConstraintContext<'_>) -> Result<bool, ConstraintError>;
}

impl<F> CustomConstraint for F
where
    F: Fn(&ConstraintContext<'_>) -> Result<bool, ConstraintError> + Send + Sync,
{
    fn matches(&self, context: &ConstraintContext<'_>) -> Result<bool, ConstraintError> {
        self(context)
    }
}

/// A resolved constraint
#[derive(Clone)]
pub enum Constraint {
    Int,
    Long,
    Bool,
    Float,
    Decimal,
    Guid,
    DateTime,
    Alpha,
    Slug,
    Length { min: usize, max: usize },
    MinLength(usize),
    MaxLength(usize),
    Min(i64),
    Max(i64),
    Range { min: i64, max: i64 },
    Regex(Regex),
    Required,
    File,
    NonFile,
    Custom {
        name: String,
        predicate: Arc<dyn CustomConstraint>,
    },
}

impl Constraint {
    /// Wrap a custom predicate under a display name
    pub fn custom(name: impl Into<String>, predicate: impl CustomConstraint + 'static) -> Self {
        Constraint::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Case-insensitive, unanchored regular expression
    pub fn regex(pattern: &str) -> Result<Self, String> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Constraint::Regex)
            .map_err(|e| e.to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            Constraint::Int => "int",
            Constraint::Long => "long",
            Constraint::Bool => "bool",
            Constraint::Float => "float",
            Constraint::Decimal => "decimal",
            Constraint::Guid => "guid",
            Constraint::DateTime => "datetime",
            Constraint::Alpha => "alpha",
            Constraint::Slug => "slug",
            Constraint::Length { .. } => "length",
            Constraint::MinLength(_) => "minlength",
            Constraint::MaxLength(_) => "maxlength",
            Constraint::Min(_) => "min",
            Constraint::Max(_) => "max",
            Constraint::Range { .. } => "range",
            Constraint::Regex(_) => "regex",
            Constraint::Required => "required",
            Constraint::File => "file",
            Constraint::NonFile => "nonfile",
            Constraint::Custom { name, .. } => name,
        }
    }

    /// Evaluate against one parameter. Only custom constraints can error.
    pub fn matches(&self, context: &ConstraintContext<'_>) -> Result<bool, ConstraintError> {
        let value = match (self, context.value) {
            (Constraint::Custom { predicate, .. }, _) => return predicate.matches(context),
            (Constraint::Required, None) => return Ok(false),
            (_, None) => return Ok(true),
            (_, Some(value)) => value,
        };

        Ok(match self {
            Constraint::Int => value.parse::<i32>().is_ok(),
            Constraint::Long => value.parse::<i64>().is_ok(),
            Constraint::Bool => {
                value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
            }
            Constraint::Float => value.parse::<f64>().map_or(false, f64::is_finite),
            Constraint::Decimal => is_decimal(value),
            Constraint::Guid => uuid::Uuid::parse_str(value).is_ok(),
            Constraint::DateTime => is_datetime(value),
            Constraint::Alpha => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()),
            Constraint::Slug => value
                .split('-')
                .all(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric())),
            Constraint::Length { min, max } => (*min..=*max).contains(&value.chars().count()),
            Constraint::MinLength(min) => value.chars().count() >= *min,
            Constraint::MaxLength(max) => value.chars().count() <= *max,
            Constraint::Min(min) => value.parse::<i64>().map_or(false, |n| n >= *min),
            Constraint::Max(max) => value.parse::<i64>().map_or(false, |n| n <= *max),
            Constraint::Range { min, max } => {
                value.parse::<i64>().map_or(false, |n| (*min..=*max).contains(&n))
            }
            Constraint::Regex(regex) => regex.is_match(value),
            Constraint::Required => !value.is_empty(),
            Constraint::File => is_file_name(value),
            Constraint::NonFile => !is_file_name(value),
            Constraint::Custom { .. } => false,
        })
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Length { min, max } => write!(f, "length({}, {})", min, max),
            Constraint::MinLength(n) | Constraint::MaxLength(n) => write!(f, "{}({})", self.name(), n),
            Constraint::Min(n) | Constraint::Max(n) => write!(f, "{}({})", self.name(), n),
            Constraint::Range { min, max } => write!(f, "range({}, {})", min, max),
            Constraint::Regex(regex) => write!(f, "regex({})", regex.as_str()),
            Constraint::Custom { name, .. } => write!(f, "custom({})", name),
            other => f.write_str(other.name()),
        }
    }
}

fn is_decimal(value: &str) -> bool {
    let digits = value.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(value);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match fraction {
        Some(fraction) => {
            all_digits(whole) && all_digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && all_digits(whole),
    }
}

fn is_datetime(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// The last `/`-separated part contains a dot that is not its final character
fn is_file_name(value: &str) -> bool {
    let last = value.rsplit('/').next().unwrap_or(value);
    last.rfind('.').map_or(false, |dot| dot + 1 < last.len())
}

#[derive(Debug, Clone)]
struct ParameterConstraint {
    parameter: String,
    constraint: Constraint,
}

/// The constraints of one route in evaluation order
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    entries: Vec<ParameterConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parameter: impl Into<String>, constraint: Constraint) {
        self.entries.push(ParameterConstraint {
            parameter: parameter.into(),
            constraint,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any constraint targets `parameter`
    pub fn constrains(&self, parameter: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| super::text_eq_ignore_case(&entry.parameter, parameter))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.entries
            .iter()
            .map(|entry| (entry.parameter.as_str(), &entry.constraint))
    }

    pub fn evaluate(&self, values: &RouteValues, direction: RouteDirection, route: &str) -> bool {
        self.first_failure(values, direction, route).is_none()
    }

    /// Name of the first parameter whose constraint rejects its value.
    ///
    /// Errors and panics raised by custom constraints count as rejections and
    /// are logged.
    pub fn first_failure(
        &self,
        values: &RouteValues,
        direction: RouteDirection,
        route: &str,
    ) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| !evaluate_one(entry, values, direction, route))
            .map(|entry| entry.parameter.as_str())
    }
}

fn evaluate_one(
    entry: &ParameterConstraint,
    values: &RouteValues,
    direction: RouteDirection,
    route: &str,
) -> bool {
    let context = ConstraintContext {
        parameter: &entry.parameter,
        value: values.get(&entry.parameter),
        values,
        direction,
    };

    match catch_unwind(AssertUnwindSafe(|| entry.constraint.matches(&context))) {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(error)) => {
            warn!(
                route = %route,
                parameter = %entry.parameter,
                constraint = %entry.constraint.name(),
                error = %error,
                "Constraint evaluation failed; skipping candidate"
            );
            false
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(
                route = %route,
                parameter = %entry.parameter,
                constraint = %entry.constraint.name(),
                panic = %message,
                "Constraint panicked; skipping candidate"
            );
            false
        }
    }
}

/// Builds a constraint from its optional argument text, e.g. `"1,10"` for
/// `range(1,10)`.
pub type ConstraintFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Constraint, String> + Send + Sync>;

/// Maps constraint names to factories. Populated at startup and read-only
/// while route tables are built.
#[derive(Clone)]
pub struct ConstraintRegistry {
    factories: HashMap<String, ConstraintFactory>,
}

impl ConstraintRegistry {
    /// A registry with no constraints at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding the built-in catalogue
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Register or replace a factory. Names are case-insensitive.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Option<&str>) -> Result<Constraint, String> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
        self
    }

    /// Register an argument-less custom predicate
    pub fn register_custom<C>(&mut self, name: &str, predicate: C) -> &mut Self
    where
        C: CustomConstraint + 'static,
    {
        let constraint_name = name.to_string();
        let predicate: Arc<dyn CustomConstraint> = Arc::new(predicate);
        self.register(name, move |_| {
            Ok(Constraint::Custom {
                name: constraint_name.clone(),
                predicate: Arc::clone(&predicate),
            })
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Resolve an inline reference such as `int` or `range(1,10)`
    pub fn resolve(
        &self,
        template: &str,
        parameter: &str,
        reference: &str,
    ) -> Result<Constraint, RouteConfigError> {
        let (name, args) = split_reference(reference);
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RouteConfigError::UnknownConstraint {
                template: template.to_string(),
                parameter: parameter.to_string(),
                constraint: name.to_string(),
            })?;

        factory(args).map_err(|reason| RouteConfigError::InvalidConstraintArgument {
            constraint: reference.to_string(),
            reason,
        })
    }

    fn register_builtins(&mut self) {
        self.register("int", no_args(Constraint::Int))
            .register("long", no_args(Constraint::Long))
            .register("bool", no_args(Constraint::Bool))
            .register("float", no_args(Constraint::Float))
            .register("double", no_args(Constraint::Float))
            .register("decimal", no_args(Constraint::Decimal))
            .register("guid", no_args(Constraint::Guid))
            .register("uuid", no_args(Constraint::Guid))
            .register("datetime", no_args(Constraint::DateTime))
            .register("alpha", no_args(Constraint::Alpha))
            .register("slug", no_args(Constraint::Slug))
            .register("required", no_args(Constraint::Required))
            .register("file", no_args(Constraint::File))
            .register("nonfile", no_args(Constraint::NonFile))
            .register("length", |args| match split_args(args)?.as_slice() {
                [exact] => {
                    let n = parse_arg::<usize>(exact)?;
                    Ok(Constraint::Length { min: n, max: n })
                }
                [min, max] => {
                    let (min, max) = (parse_arg::<usize>(min)?, parse_arg::<usize>(max)?);
                    ordered(min, max)?;
                    Ok(Constraint::Length { min, max })
                }
                _ => Err("expected one or two arguments".to_string()),
            })
            .register("minlength", |args| {
                single_arg(args).map(Constraint::MinLength)
            })
            .register("maxlength", |args| {
                single_arg(args).map(Constraint::MaxLength)
            })
            .register("min", |args| single_arg(args).map(Constraint::Min))
            .register("max", |args| single_arg(args).map(Constraint::Max))
            .register("range", |args| match split_args(args)?.as_slice() {
                [min, max] => {
                    let (min, max) = (parse_arg::<i64>(min)?, parse_arg::<i64>(max)?);
                    ordered(min, max)?;
                    Ok(Constraint::Range { min, max })
                }
                _ => Err("expected two arguments".to_string()),
            })
            .register("regex", |args| match args {
                Some(pattern) if !pattern.is_empty() => Constraint::regex(pattern),
                _ => Err("expected a pattern".to_string()),
            });
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ConstraintRegistry")
            .field("constraints", &names)
            .finish()
    }
}

fn no_args(
    constraint: Constraint,
) -> impl Fn(Option<&str>) -> Result<Constraint, String> + Send + Sync + 'static {
    move |args| match args {
        None => Ok(constraint.clone()),
        Some(_) => Err(format!("'{}' takes no arguments", constraint.name())),
    }
}

/// `name(args)` into its parts; args are everything inside the outer parens
fn split_reference(reference: &str) -> (&str, Option<&str>) {
    match reference.find('(') {
        Some(open) if reference.ends_with(')') => {
            (&reference[..open], Some(&reference[open + 1..reference.len() - 1]))
        }
        _ => (reference, None),
    }
}

fn split_args(args: Option<&str>) -> Result<Vec<&str>, String> {
    match args {
        Some(args) => Ok(args.split(',').map(str::trim).collect()),
        None => Err("missing arguments".to_string()),
    }
}

fn single_arg<T: std::str::FromStr>(args: Option<&str>) -> Result<T, String> {
    match split_args(args)?.as_slice() {
        [value] => parse_arg(value),
        _ => Err("expected one argument".to_string()),
    }
}

fn parse_arg<T: std::str::FromStr>(text: &str) -> Result<T, String> {
    text.parse::<T>()
        .map_err(|_| format!("'{}' is not a valid number", text))
}

fn ordered<T: PartialOrd + fmt::Display>(min: T, max: T) -> Result<(), String> {
    if min > max {
        return Err(format!("minimum {} is greater than maximum {}", min, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn check(reference: &str, value: &str) -> bool {
        let registry = ConstraintRegistry::new();
        let constraint = registry.resolve("/t", "p", reference).unwrap();
        let values = RouteValues::from([("p", value)]);
        let mut set = ConstraintSet::new();
        set.push("p", constraint);
        set.evaluate(&values, RouteDirection::IncomingRequest, "/t")
    }

    #[test]
    fn test_numeric_constraints() {
        assert!(check("int", "42"));
        assert!(check("int", "-7"));
        assert!(!check("int", "abc"));
        assert!(!check("int", "9999999999"));
        assert!(check("long", "9999999999"));
        assert!(check("range(1,10)", "10"));
        assert!(!check("range(1,10)", "11"));
        assert!(check("min(5)", "5"));
        assert!(!check("max(5)", "6"));
        assert!(check("float", "1.5e3"));
        assert!(!check("float", "NaN"));
        assert!(check("decimal", "-12.50"));
        assert!(!check("decimal", "1e5"));
        assert!(!check("decimal", "."));
    }

    #[test]
    fn test_text_constraints() {
        assert!(check("alpha", "Hello"));
        assert!(!check("alpha", "abc1"));
        assert!(check("bool", "TRUE"));
        assert!(!check("bool", "yes"));
        assert!(check("slug", "hello-world-2"));
        assert!(!check("slug", "-hello"));
        assert!(check("length(3)", "abc"));
        assert!(check("length(2,4)", "abcd"));
        assert!(!check("length(2,4)", "a"));
        assert!(check("minlength(2)", "ab"));
        assert!(!check("maxlength(2)", "abc"));
        assert!(check("required", "x"));
    }

    #[test]
    fn test_regex_is_case_insensitive_and_unanchored() {
        assert!(check("regex(^[a-z]+$)", "ABC"));
        assert!(check("regex(\\d)", "abc1def"));
        assert!(!check("regex(^\\d{3}$)", "12"));
    }

    #[test]
    fn test_structured_constraints() {
        assert!(check("guid", "67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!check("uuid", "not-a-guid"));
        assert!(check("datetime", "2023-08-01"));
        assert!(check("datetime", "2023-08-01T10:20:30"));
        assert!(check("datetime", "2023-08-01T10:20:30Z"));
        assert!(!check("datetime", "2023-13-01"));
        assert!(check("file", "docs/readme.md"));
        assert!(!check("file", "docs.d/readme"));
        assert!(!check("file", "archive."));
        assert!(check("nonfile", "docs/readme"));
    }

    #[test]
    fn test_resolve_errors() {
        let registry = ConstraintRegistry::new();
        assert!(matches!(
            registry.resolve("/t", "p", "nope"),
            Err(RouteConfigError::UnknownConstraint { .. })
        ));
        assert!(matches!(
            registry.resolve("/t", "p", "range(5,1)"),
            Err(RouteConfigError::InvalidConstraintArgument { .. })
        ));
        assert!(matches!(
            registry.resolve("/t", "p", "int(3)"),
            Err(RouteConfigError::InvalidConstraintArgument { .. })
        ));
        assert!(matches!(
            registry.resolve("/t", "p", "regex([)"),
            Err(RouteConfigError::InvalidConstraintArgument { .. })
        ));
        assert!(registry.resolve("/t", "p", "INT").is_ok());
    }

    #[test]
    fn test_absent_values_only_fail_required() {
        let values = RouteValues::new();
        let mut set = ConstraintSet::new();
        set.push("id", Constraint::Int);
        assert!(set.evaluate(&values, RouteDirection::IncomingRequest, "/t"));

        set.push("id", Constraint::Required);
        assert_eq!(
            set.first_failure(&values, RouteDirection::IncomingRequest, "/t"),
            Some("id")
        );
    }

    #[test]
    fn test_evaluation_short_circuits_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut set = ConstraintSet::new();
        set.push("a", Constraint::Int);
        set.push(
            "b",
            Constraint::custom("counting", move |_: &ConstraintContext<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }),
        );

        let values = RouteValues::from([("a", "x"), ("b", "y")]);
        assert_eq!(
            set.first_failure(&values, RouteDirection::IncomingRequest, "/t"),
            Some("a")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_custom_constraint_receives_context() {
        let mut registry = ConstraintRegistry::new();
        registry.register_custom("even", |ctx: &ConstraintContext<'_>| {
            assert_eq!(ctx.parameter, "n");
            assert_eq!(ctx.direction, RouteDirection::UrlGeneration);
            Ok(ctx.value.and_then(|v| v.parse::<i64>().ok()).map_or(false, |n| n % 2 == 0))
        });
        let mut set = ConstraintSet::new();
        set.push("n", registry.resolve("/t", "n", "even").unwrap());
        assert!(set.evaluate(
            &RouteValues::from([("n", "4")]),
            RouteDirection::UrlGeneration,
            "/t"
        ));
        assert!(!set.evaluate(
            &RouteValues::from([("n", "3")]),
            RouteDirection::UrlGeneration,
            "/t"
        ));
    }

    #[traced_test]
    #[test]
    fn test_custom_errors_and_panics_are_rejections() {
        let mut set = ConstraintSet::new();
        set.push(
            "id",
            Constraint::custom("broken", |_: &ConstraintContext<'_>| {
                Err(ConstraintError::new("broken", "backend unavailable"))
            }),
        );
        let values = RouteValues::from([("id", "1")]);
        assert!(!set.evaluate(&values, RouteDirection::IncomingRequest, "/t"));
        assert!(logs_contain("backend unavailable"));

        let mut set = ConstraintSet::new();
        set.push(
            "id",
            Constraint::custom("panicky", |_: &ConstraintContext<'_>| -> Result<bool, ConstraintError> {
                panic!("boom")
            }),
        );
        assert!(!set.evaluate(&values, RouteDirection::IncomingRequest, "/t"));
        assert!(logs_contain("Constraint panicked"));
    }
}
