//! Template matching against request paths
//!
//! Literals compare case-insensitively with per-character Unicode lowercase
//! folding, the same rule for whole literal segments and for the literal
//! parts of composite segments. Pure ASCII input takes a byte-wise path.

use super::pattern::{ParameterPart, PathSegment, RoutePart, RoutePattern, SegmentKind};
use super::segments::RequestPath;
use super::text_eq_ignore_case;
use std::iter;
use super::values::RouteValues;

/// Match a single template against a path. Constraints are not evaluated.
pub fn match_path(pattern: &RoutePattern, path: &str) -> Option<RouteValues> {
    TemplateMatcher::new(pattern).match_request(&RequestPath::parse(path))
}

/// Matches one parsed template against tokenized request paths
#[derive(Debug, Clone, Copy)]
pub struct TemplateMatcher<'p> {
    pattern: &'p RoutePattern,
}

impl<'p> TemplateMatcher<'p> {
    pub fn new(pattern: &'p RoutePattern) -> Self {
        Self { pattern }
    }

    /// Fast reject on segment count
    pub fn accepts_length(&self, segments: usize) -> bool {
        segments >= self.pattern.min_segments()
            && self.pattern.max_segments().map_or(true, |max| segments <= max)
    }

    pub fn match_request(&self, path: &RequestPath<'_>) -> Option<RouteValues> {
        if !self.accepts_length(path.len()) {
            return None;
        }

        let mut values = RouteValues::with_capacity(self.pattern.parameters().count());

        for (index, segment) in self.pattern.segments().iter().enumerate() {
            if let Some(catch_all) = segment.catch_all() {
                bind_catch_all(catch_all, path, index, &mut values)?;
                return Some(values);
            }

            match path.get(index) {
                Some("") => return None,
                Some(text) => match_segment(segment, text, &mut values)?,
                None => {
                    let param = segment.as_parameter()?;
                    if let Some(default) = &param.default {
                        values.insert(param.name.as_str(), default.as_str());
                    }
                }
            }
        }

        Some(values)
    }
}

fn bind_catch_all(
    param: &ParameterPart,
    path: &RequestPath<'_>,
    index: usize,
    values: &mut RouteValues,
) -> Option<()> {
    if path.iter().skip(index).any(str::is_empty) {
        return None;
    }
    match path.rest_from(index) {
        "" => {
            if let Some(default) = &param.default {
                values.insert(param.name.as_str(), default.as_str());
            }
        }
        rest => {
            values.insert(param.name.as_str(), rest);
        }
    }
    Some(())
}

fn match_segment(segment: &PathSegment, text: &str, values: &mut RouteValues) -> Option<()> {
    match segment.kind() {
        SegmentKind::Literal => {
            let literal = match segment.parts() {
                [RoutePart::Literal(literal)] => literal.as_str(),
                _ => return None,
            };
            text_eq_ignore_case(literal, text).then_some(())
        }
        SegmentKind::Parameter => {
            let param = segment.as_parameter()?;
            values.insert(param.name.as_str(), text);
            Some(())
        }
        SegmentKind::Composite => match_composite(segment.parts(), text, values),
    }
}

/// Composite segments match right to left. A trailing `.{opt?}` may be
/// missing entirely, separator included.
fn match_composite(parts: &[RoutePart], text: &str, values: &mut RouteValues) -> Option<()> {
    let mut captures = Vec::with_capacity(parts.len());

    if match_parts_rtl(parts, text, &mut captures) {
        commit(captures, values);
        return Some(());
    }

    let trailing_optional = matches!(parts.last(), Some(RoutePart::Parameter(p)) if p.is_optional());
    if trailing_optional && parts.len() > 2 {
        captures.clear();
        if match_parts_rtl(&parts[..parts.len() - 2], text, &mut captures) {
            commit(captures, values);
            return Some(());
        }
    }

    None
}

fn commit(captures: Vec<(&str, &str)>, values: &mut RouteValues) {
    for (name, value) in captures.into_iter().rev() {
        values.insert(name, value);
    }
}

/// Captures are pushed right to left
fn match_parts_rtl<'a>(
    parts: &'a [RoutePart],
    text: &'a str,
    captures: &mut Vec<(&'a str, &'a str)>,
) -> bool {
    let mut end = text.len();
    let mut pending: Option<&ParameterPart> = None;

    for (index, part) in parts.iter().enumerate().rev() {
        match part {
            RoutePart::Parameter(param) => pending = Some(param),
            RoutePart::Literal(literal) => {
                let region = &text[..end];
                let found = if index == 0 {
                    prefix_len_ignore_case(region, literal).map(|len| (0, len))
                } else if pending.is_some() {
                    // leave at least one character for the parameter on the right
                    let limit = region.char_indices().next_back().map_or(0, |(at, _)| at);
                    rfind_ignore_case(region, literal, limit)
                } else {
                    suffix_start_ignore_case(region, literal).map(|start| (start, end))
                };
                let Some((start, literal_end)) = found else {
                    return false;
                };

                if let Some(param) = pending.take() {
                    let value = &text[literal_end..end];
                    if value.is_empty() {
                        return false;
                    }
                    captures.push((param.name.as_str(), value));
                } else if literal_end != end {
                    return false;
                }
                end = start;
            }
        }
    }

    match pending {
        Some(param) if end > 0 => {
            captures.push((param.name.as_str(), &text[..end]));
            true
        }
        Some(_) => false,
        None => end == 0,
    }
}

fn char_boundaries(text: &str) -> impl DoubleEndedIterator<Item = usize> + '_ {
    text.char_indices().map(|(at, _)| at).chain(iter::once(text.len()))
}

/// Length in `haystack` of a prefix equal to `needle`
fn prefix_len_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if haystack.is_ascii() && needle.is_ascii() {
        let matches = haystack.len() >= needle.len()
            && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes());
        return matches.then_some(needle.len());
    }
    char_boundaries(haystack).find(|&len| text_eq_ignore_case(&haystack[..len], needle))
}

/// Start in `haystack` of a suffix equal to `needle`
fn suffix_start_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if haystack.is_ascii() && needle.is_ascii() {
        let start = haystack.len().checked_sub(needle.len())?;
        return haystack.as_bytes()[start..]
            .eq_ignore_ascii_case(needle.as_bytes())
            .then_some(start);
    }
    char_boundaries(haystack)
        .rev()
        .find(|&start| text_eq_ignore_case(&haystack[start..], needle))
}

/// Rightmost occurrence of `needle` that ends at or before `limit`, as a
/// byte range of `haystack`
fn rfind_ignore_case(haystack: &str, needle: &str, limit: usize) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let region = haystack.get(..limit)?;
    if region.is_ascii() && needle.is_ascii() {
        let bytes = region.as_bytes();
        let needle = needle.as_bytes();
        let last = bytes.len().checked_sub(needle.len())?;
        return (0..=last)
            .rev()
            .find(|&start| bytes[start..start + needle.len()].eq_ignore_ascii_case(needle))
            .map(|start| (start, start + needle.len()));
    }
    char_boundaries(region).rev().find_map(|start| {
        char_boundaries(&region[start..])
            .skip(1)
            .map(|len| start + len)
            .find(|&end| text_eq_ignore_case(&region[start..end], needle))
            .map(|end| (start, end))
    })
}
