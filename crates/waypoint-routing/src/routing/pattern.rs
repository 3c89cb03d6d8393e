//! Route template parsing
//!
//! Grammar, per `/`-separated segment:
//! - literal text, with `{{` and `}}` standing for literal braces
//! - `{name}` parameter, `{name?}` optional, `{name=default}` defaulted
//! - `{*name}` / `{**name}` catch-all (`**` keeps `/` unencoded when generating URLs)
//! - inline constraints: `{id:int}`, `{id:int:min(1)}`, `{slug:regex(^[a-z-]+$)}`
//! - composite segments mixing literals and parameters: `{name}.{ext?}`, `v{version}`

use super::values::RouteValues;
use super::text_eq_ignore_case;
use crate::error::TemplateError;
use std::fmt;

const INVALID_NAME_CHARS: &[char] = &['/', '{', '}', '*'];

/// How a parameter binds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Standard,
    Optional,
    CatchAll,
}

/// A parameter inside a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPart {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<String>,
    /// Inline constraint references in declaration order, e.g. `int` or `range(1,10)`
    pub constraints: Vec<String>,
    /// Catch-alls only: percent-encode `/` inside the value when generating URLs
    pub encode_slashes: bool,
}

impl ParameterPart {
    pub fn is_optional(&self) -> bool {
        self.kind == ParameterKind::Optional
    }

    pub fn is_catch_all(&self) -> bool {
        self.kind == ParameterKind::CatchAll
    }

    /// Whether the request path may omit this parameter entirely
    pub fn can_be_absent(&self) -> bool {
        self.kind != ParameterKind::Standard || self.default.is_some()
    }
}

/// One part of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePart {
    Literal(String),
    Parameter(ParameterPart),
}

/// Shape of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Only literal text
    Literal,
    /// Exactly one parameter
    Parameter,
    /// Literal text and parameters concatenated
    Composite,
}

/// A `/`-delimited template segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    parts: Vec<RoutePart>,
}

impl PathSegment {
    fn new(parts: Vec<RoutePart>) -> Result<Self, TemplateError> {
        let segment = PathSegment { parts };
        segment.validate()?;
        Ok(segment)
    }

    pub fn parts(&self) -> &[RoutePart] {
        &self.parts
    }

    pub fn kind(&self) -> SegmentKind {
        match self.parts.as_slice() {
            [RoutePart::Parameter(_)] => SegmentKind::Parameter,
            parts if parts.iter().all(|p| matches!(p, RoutePart::Literal(_))) => {
                SegmentKind::Literal
            }
            _ => SegmentKind::Composite,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.kind() == SegmentKind::Literal
    }

    /// The single parameter of a parameter segment
    pub fn as_parameter(&self) -> Option<&ParameterPart> {
        match self.parts.as_slice() {
            [RoutePart::Parameter(p)] => Some(p),
            _ => None,
        }
    }

    pub fn catch_all(&self) -> Option<&ParameterPart> {
        self.as_parameter().filter(|p| p.is_catch_all())
    }

    /// A segment can be missing from the path only when it is a lone
    /// optional, defaulted or catch-all parameter.
    pub fn can_be_absent(&self) -> bool {
        self.as_parameter().map_or(false, ParameterPart::can_be_absent)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &ParameterPart> {
        self.parts.iter().filter_map(|part| match part {
            RoutePart::Parameter(p) => Some(p),
            RoutePart::Literal(_) => None,
        })
    }

    fn parameters_mut(&mut self) -> impl Iterator<Item = &mut ParameterPart> {
        self.parts.iter_mut().filter_map(|part| match part {
            RoutePart::Parameter(p) => Some(p),
            RoutePart::Literal(_) => None,
        })
    }

    fn validate(&self) -> Result<(), TemplateError> {
        let composite = self.parts.len() > 1;

        for pair in self.parts.windows(2) {
            if let [RoutePart::Parameter(_), RoutePart::Parameter(_)] = pair {
                return Err(TemplateError::ConsecutiveParameters(self.to_string()));
            }
        }

        if !composite {
            return Ok(());
        }

        for (index, part) in self.parts.iter().enumerate() {
            let RoutePart::Parameter(param) = part else {
                continue;
            };
            if param.is_catch_all() {
                return Err(TemplateError::CatchAllInComposite(param.name.clone()));
            }
            if param.is_optional() {
                let last = index == self.parts.len() - 1;
                let after_dot = index > 0
                    && matches!(&self.parts[index - 1], RoutePart::Literal(text) if text == ".");
                if !last || !after_dot {
                    return Err(TemplateError::OptionalInComposite(param.name.clone()));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                RoutePart::Literal(text) => {
                    f.write_str(&text.replace('{', "{{").replace('}', "}}"))?;
                }
                RoutePart::Parameter(p) => {
                    f.write_str("{")?;
                    if p.is_catch_all() {
                        f.write_str(if p.encode_slashes { "*" } else { "**" })?;
                    }
                    f.write_str(&p.name)?;
                    for constraint in &p.constraints {
                        write!(f, ":{}", constraint)?;
                    }
                    if p.is_optional() {
                        f.write_str("?")?;
                    }
                    if let Some(default) = &p.default {
                        write!(f, "={}", default)?;
                    }
                    f.write_str("}")?;
                }
            }
        }
        Ok(())
    }
}

/// A parsed, immutable route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<PathSegment>,
    min_segments: usize,
    literal_segments: usize,
    has_catch_all: bool,
}

impl RoutePattern {
    /// Parse a route template such as `/api/{controller}/{id:int?}`
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let body = template
            .strip_prefix("~/")
            .or_else(|| template.strip_prefix('/'))
            .unwrap_or(template);
        let body = body.strip_suffix('/').unwrap_or(body);

        let mut segments = Vec::new();
        if !body.is_empty() {
            let mut parser = Parser { src: body, pos: 0 };
            loop {
                let parts = parser.segment()?;
                segments.push(PathSegment::new(parts)?);
                if parser.at_end() {
                    break;
                }
                parser.pos += 1;
            }
        }

        Self::from_segments(template.to_string(), segments)
    }

    fn from_segments(raw: String, segments: Vec<PathSegment>) -> Result<Self, TemplateError> {
        let mut seen: Vec<&str> = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            for param in segment.parameters() {
                if seen.iter().any(|name| text_eq_ignore_case(name, &param.name)) {
                    return Err(TemplateError::DuplicateParameter(param.name.clone()));
                }
                seen.push(&param.name);

                if param.is_catch_all() && index != segments.len() - 1 {
                    return Err(TemplateError::CatchAllNotLast(param.name.clone()));
                }
            }
        }

        let literal_segments = segments.iter().filter(|s| s.is_literal()).count();
        let has_catch_all = segments.last().map_or(false, |s| s.catch_all().is_some());

        let mut pattern = RoutePattern {
            raw,
            segments,
            min_segments: 0,
            literal_segments,
            has_catch_all,
        };
        pattern.min_segments = pattern.compute_min_segments();
        Ok(pattern)
    }

    fn compute_min_segments(&self) -> usize {
        self.segments
            .iter()
            .rposition(|segment| !segment.can_be_absent())
            .map_or(0, |index| index + 1)
    }

    /// Merge explicit defaults into the template's parameters.
    ///
    /// Keys that are not template parameters are ignored here; the route table
    /// treats them as required values.
    pub fn with_defaults(&self, defaults: &RouteValues) -> Result<Self, TemplateError> {
        let mut pattern = self.clone();
        for segment in &mut pattern.segments {
            for param in segment.parameters_mut() {
                let Some(explicit) = defaults.get(&param.name) else {
                    continue;
                };
                if param.is_optional() {
                    return Err(TemplateError::OptionalWithDefault(param.name.clone()));
                }
                match &param.default {
                    Some(inline) if !text_eq_ignore_case(inline, explicit) => {
                        return Err(TemplateError::DefaultConflict {
                            parameter: param.name.clone(),
                            inline: inline.clone(),
                            explicit: explicit.to_string(),
                        });
                    }
                    _ => param.default = Some(explicit.to_string()),
                }
            }
        }
        pattern.min_segments = pattern.compute_min_segments();
        Ok(pattern)
    }

    /// The template text this pattern was parsed from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// All parameters in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterPart> {
        self.segments.iter().flat_map(PathSegment::parameters)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterPart> {
        self.parameters()
            .find(|param| text_eq_ignore_case(&param.name, name))
    }

    /// Fewest request path segments that can match
    pub fn min_segments(&self) -> usize {
        self.min_segments
    }

    /// Most request path segments that can match; unbounded with a catch-all
    pub fn max_segments(&self) -> Option<usize> {
        if self.has_catch_all {
            None
        } else {
            Some(self.segments.len())
        }
    }

    pub fn has_catch_all(&self) -> bool {
        self.has_catch_all
    }

    pub fn literal_segments(&self) -> usize {
        self.literal_segments
    }

    /// Literal segments minus catch-all segments. Higher wins within an order
    /// group.
    pub fn specificity(&self) -> i32 {
        self.literal_segments as i32 - i32::from(self.has_catch_all)
    }

    /// True when every segment is literal text
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(PathSegment::is_literal)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    /// Read one segment, stopping before the next top-level `/`
    fn segment(&mut self) -> Result<Vec<RoutePart>, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();

        while let Some(byte) = self.peek_at(0) {
            match byte {
                b'/' => break,
                b'{' if self.peek_at(1) == Some(b'{') => {
                    literal.push('{');
                    self.pos += 2;
                }
                b'{' => {
                    if !literal.is_empty() {
                        parts.push(RoutePart::Literal(std::mem::take(&mut literal)));
                    }
                    self.pos += 1;
                    parts.push(RoutePart::Parameter(self.parameter()?));
                }
                b'}' if self.peek_at(1) == Some(b'}') => {
                    literal.push('}');
                    self.pos += 2;
                }
                b'}' => return Err(TemplateError::UnbalancedBrace(self.pos)),
                b'?' => {
                    return Err(TemplateError::InvalidSyntax(
                        "'?' is not allowed in literal text".to_string(),
                    ))
                }
                _ => self.push_char(&mut literal),
            }
        }

        if !literal.is_empty() {
            parts.push(RoutePart::Literal(literal));
        }
        if parts.is_empty() {
            return Err(TemplateError::EmptySegment);
        }
        Ok(parts)
    }

    fn push_char(&mut self, out: &mut String) {
        let rest = &self.src[self.pos..];
        let len = rest.chars().next().map_or(1, char::len_utf8);
        out.push_str(&rest[..len]);
        self.pos += len;
    }

    /// Read a parameter body; `pos` is just past the opening `{`
    fn parameter(&mut self) -> Result<ParameterPart, TemplateError> {
        let open = self.pos - 1;
        let mut content = String::new();

        loop {
            match self.peek_at(0) {
                None => return Err(TemplateError::UnbalancedBrace(open)),
                Some(b'}') if self.peek_at(1) == Some(b'}') => {
                    content.push('}');
                    self.pos += 2;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b'{') if self.peek_at(1) == Some(b'{') => {
                    content.push('{');
                    self.pos += 2;
                }
                Some(b'{') => return Err(TemplateError::UnbalancedBrace(self.pos)),
                Some(_) => self.push_char(&mut content),
            }
        }

        parse_parameter(&content)
    }
}

fn parse_parameter(content: &str) -> Result<ParameterPart, TemplateError> {
    let (catch_all, rest) = if let Some(rest) = content.strip_prefix("**") {
        (Some(false), rest)
    } else if let Some(rest) = content.strip_prefix('*') {
        (Some(true), rest)
    } else {
        (None, content)
    };

    let name_end = rest
        .find(|c| c == ':' || c == '=' || c == '?')
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    if name.is_empty() {
        return Err(TemplateError::EmptyParameterName);
    }
    if name.contains(INVALID_NAME_CHARS) {
        return Err(TemplateError::InvalidParameterName(name.to_string()));
    }

    let mut tail = &rest[name_end..];
    let mut constraints = Vec::new();
    let mut optional = false;
    let mut default = None;

    while let Some(marker) = tail.chars().next() {
        match marker {
            ':' if !optional => {
                let (text, remaining) = split_constraint(&tail[1..])?;
                if text.is_empty() {
                    return Err(TemplateError::InvalidConstraint(format!(
                        "empty constraint on parameter '{}'",
                        name
                    )));
                }
                constraints.push(text.to_string());
                tail = remaining;
            }
            '?' if !optional => {
                optional = true;
                tail = &tail[1..];
            }
            '=' => {
                let value = &tail[1..];
                if value.is_empty() {
                    return Err(TemplateError::InvalidSyntax(format!(
                        "empty default value for parameter '{}'",
                        name
                    )));
                }
                default = Some(value.to_string());
                tail = "";
            }
            _ => {
                return Err(TemplateError::InvalidSyntax(format!(
                    "unexpected '{}' in parameter '{}'",
                    marker, name
                )))
            }
        }
    }

    if catch_all.is_some() && optional {
        return Err(TemplateError::OptionalCatchAll(name.to_string()));
    }
    if optional && default.is_some() {
        return Err(TemplateError::OptionalWithDefault(name.to_string()));
    }

    let kind = match (catch_all, optional) {
        (Some(_), _) => ParameterKind::CatchAll,
        (None, true) => ParameterKind::Optional,
        (None, false) => ParameterKind::Standard,
    };

    Ok(ParameterPart {
        name: name.to_string(),
        kind,
        default,
        constraints,
        encode_slashes: catch_all.unwrap_or(true),
    })
}

/// Split one constraint reference off the front of `s`. Stops at `:`, `=` or
/// `?` outside parentheses.
fn split_constraint(s: &str) -> Result<(&str, &str), TemplateError> {
    let mut depth = 0usize;
    for (index, byte) in s.bytes().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    TemplateError::InvalidConstraint(format!("unbalanced ')' in '{}'", s))
                })?;
            }
            b':' | b'=' | b'?' if depth == 0 => return Ok((&s[..index], &s[index..])),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TemplateError::InvalidConstraint(format!(
            "unbalanced '(' in '{}'",
            s
        )));
    }
    Ok((s, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(pattern: &RoutePattern, index: usize) -> &ParameterPart {
        pattern.segments()[index]
            .as_parameter()
            .expect("parameter segment")
    }

    #[test]
    fn test_parse_literal_route() {
        let pattern = RoutePattern::parse("/users").unwrap();
        assert_eq!(pattern.segments().len(), 1);
        assert_eq!(pattern.segments()[0].kind(), SegmentKind::Literal);
        assert!(pattern.is_literal());
        assert_eq!(pattern.literal_segments(), 1);
        assert_eq!(pattern.min_segments(), 1);
        assert_eq!(pattern.max_segments(), Some(1));
    }

    #[test]
    fn test_parse_root() {
        for template in ["", "/", "~/"] {
            let pattern = RoutePattern::parse(template).unwrap();
            assert!(pattern.segments().is_empty());
            assert_eq!(pattern.max_segments(), Some(0));
            assert_eq!(pattern.to_string(), "/");
        }
    }

    #[test]
    fn test_parse_parameter_route() {
        let pattern = RoutePattern::parse("/users/{id}").unwrap();
        assert_eq!(pattern.segments()[1].kind(), SegmentKind::Parameter);
        let id = param(&pattern, 1);
        assert_eq!(id.name, "id");
        assert_eq!(id.kind, ParameterKind::Standard);
        assert!(id.constraints.is_empty());
    }

    #[test]
    fn test_parse_inline_constraints_optional_and_default() {
        let pattern = RoutePattern::parse("/api/{controller=Home}/{id:int:min(1)?}").unwrap();
        let controller = param(&pattern, 1);
        assert_eq!(controller.default.as_deref(), Some("Home"));

        let id = param(&pattern, 2);
        assert_eq!(id.kind, ParameterKind::Optional);
        assert_eq!(id.constraints, vec!["int".to_string(), "min(1)".to_string()]);

        assert_eq!(pattern.min_segments(), 1);
        assert_eq!(pattern.max_segments(), Some(3));
    }

    #[test]
    fn test_parse_constraint_with_nested_parens_and_escaped_braces() {
        let pattern = RoutePattern::parse("/codes/{code:regex(^(\\d{{3}})$)}").unwrap();
        let code = param(&pattern, 1);
        assert_eq!(code.constraints, vec!["regex(^(\\d{3})$)".to_string()]);
    }

    #[test]
    fn test_parse_catch_all_routes() {
        let pattern = RoutePattern::parse("/files/{*path}").unwrap();
        let path = param(&pattern, 1);
        assert_eq!(path.kind, ParameterKind::CatchAll);
        assert!(path.encode_slashes);
        assert!(pattern.has_catch_all());
        assert_eq!(pattern.max_segments(), None);
        assert_eq!(pattern.min_segments(), 1);
        assert_eq!(pattern.specificity(), 0);

        let pattern = RoutePattern::parse("/files/{**path}").unwrap();
        assert!(!param(&pattern, 1).encode_slashes);
    }

    #[test]
    fn test_parse_composite_segments() {
        let pattern = RoutePattern::parse("/download/{name}.{ext?}").unwrap();
        let segment = &pattern.segments()[1];
        assert_eq!(segment.kind(), SegmentKind::Composite);
        assert_eq!(segment.parts().len(), 3);
        assert!(!segment.can_be_absent());

        let pattern = RoutePattern::parse("/api/v{version:int}/items").unwrap();
        assert_eq!(pattern.segments()[1].kind(), SegmentKind::Composite);
        assert_eq!(pattern.literal_segments(), 2);
    }

    #[test]
    fn test_parse_escaped_literal_braces() {
        let pattern = RoutePattern::parse("/{{literal}}/x").unwrap();
        assert!(pattern.is_literal());
        assert_eq!(
            pattern.segments()[0].parts()[0],
            RoutePart::Literal("{literal}".to_string())
        );
    }

    #[test]
    fn test_invalid_patterns() {
        let cases: &[(&str, TemplateError)] = &[
            (
                "/users/{id}/files/{*path}/more",
                TemplateError::CatchAllNotLast("path".into()),
            ),
            ("/users/{id}/{ID}", TemplateError::DuplicateParameter("ID".into())),
            ("/users/{}", TemplateError::EmptyParameterName),
            ("/files/{*}", TemplateError::EmptyParameterName),
            ("/a//b", TemplateError::EmptySegment),
            ("/files/{*path?}", TemplateError::OptionalCatchAll("path".into())),
            ("/items/{id?=5}", TemplateError::OptionalWithDefault("id".into())),
            ("/x/{a}{b}", TemplateError::ConsecutiveParameters("{a}{b}".into())),
            ("/x/pre{*rest}", TemplateError::CatchAllInComposite("rest".into())),
            ("/x/{a?}-{b}", TemplateError::OptionalInComposite("a".into())),
            ("/x/{a}-{b?}", TemplateError::OptionalInComposite("b".into())),
            ("/x/{a/b}", TemplateError::InvalidParameterName("a/b".into())),
        ];
        for (template, expected) in cases {
            assert_eq!(
                RoutePattern::parse(template).unwrap_err(),
                *expected,
                "template {}",
                template
            );
        }

        assert!(matches!(
            RoutePattern::parse("/users/{id"),
            Err(TemplateError::UnbalancedBrace(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/users/id}"),
            Err(TemplateError::UnbalancedBrace(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/users/{id:range(1,2}"),
            Err(TemplateError::InvalidConstraint(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/search?q"),
            Err(TemplateError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_segment_bounds_with_trailing_defaults() {
        let pattern = RoutePattern::parse("/{controller=Home}/{action=Index}/{id?}").unwrap();
        assert_eq!(pattern.min_segments(), 0);
        assert_eq!(pattern.max_segments(), Some(3));

        let pattern = RoutePattern::parse("/a/{x=1}/b").unwrap();
        assert_eq!(pattern.min_segments(), 3);
    }

    #[test]
    fn test_with_defaults() {
        let pattern = RoutePattern::parse("/items/{page}").unwrap();
        let with = pattern
            .with_defaults(&RouteValues::from([("page", "1"), ("controller", "Items")]))
            .unwrap();
        assert_eq!(param(&with, 1).default.as_deref(), Some("1"));
        assert_eq!(with.min_segments(), 1);

        let inline = RoutePattern::parse("/items/{page=1}").unwrap();
        assert_eq!(
            inline
                .with_defaults(&RouteValues::from([("page", "2")]))
                .unwrap_err(),
            TemplateError::DefaultConflict {
                parameter: "page".into(),
                inline: "1".into(),
                explicit: "2".into()
            }
        );

        let optional = RoutePattern::parse("/items/{page?}").unwrap();
        assert!(optional
            .with_defaults(&RouteValues::from([("page", "2")]))
            .is_err());
    }

    #[test]
    fn test_specificity() {
        let literal = RoutePattern::parse("/files/config.json").unwrap();
        let param = RoutePattern::parse("/files/{name}").unwrap();
        let catch_all = RoutePattern::parse("/files/{*path}").unwrap();
        assert_eq!(literal.specificity(), 2);
        assert_eq!(param.specificity(), 1);
        assert_eq!(catch_all.specificity(), 0);
    }

    #[test]
    fn test_display_round_trips() {
        for template in [
            "/api/{controller=Home}/{id:int?}",
            "/files/{**path}",
            "/download/{name}.{ext?}",
            "/{{x}}/{y:regex(^a$)}",
        ] {
            let pattern = RoutePattern::parse(template).unwrap();
            let reparsed = RoutePattern::parse(&pattern.to_string()).unwrap();
            assert_eq!(pattern.segments(), reparsed.segments());
        }
    }
}
