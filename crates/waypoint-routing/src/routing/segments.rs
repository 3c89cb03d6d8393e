//! Request path tokenizing
//!
//! Paths are split on `/` into byte ranges over the original string, so no
//! per-segment substrings are allocated. A leading `/` and a single trailing
//! `/` are ignored; interior empty segments (`a//b`) are kept as empty
//! segments and never match.

use std::ops::Range;

/// A request path split into segments
#[derive(Debug, Clone)]
pub struct RequestPath<'a> {
    trimmed: &'a str,
    bounds: Vec<Range<usize>>,
}

impl<'a> RequestPath<'a> {
    pub fn parse(path: &'a str) -> Self {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut bounds = Vec::new();
        if !trimmed.is_empty() {
            let mut start = 0;
            for (index, byte) in trimmed.bytes().enumerate() {
                if byte == b'/' {
                    bounds.push(start..index);
                    start = index + 1;
                }
            }
            bounds.push(start..trimmed.len());
        }

        Self { trimmed, bounds }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Segment text at `index`
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.bounds.get(index).map(|range| &self.trimmed[range.clone()])
    }

    /// Everything from the start of segment `index` to the end of the path,
    /// separators included. Empty when `index` is past the last segment.
    pub fn rest_from(&self, index: usize) -> &'a str {
        match self.bounds.get(index) {
            Some(range) => &self.trimmed[range.start..],
            None => "",
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.bounds.iter().map(move |range| &self.trimmed[range.clone()])
    }
}
