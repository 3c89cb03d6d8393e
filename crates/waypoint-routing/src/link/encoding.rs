//! Percent-encoding for generated URLs

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a path segment value; `/` included
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Same as [`SEGMENT`] but keeps `/`, for `**` catch-alls
const PATH: &AsciiSet = &SEGMENT.remove(b'/');

const QUERY_COMPONENT: &AsciiSet = &SEGMENT.add(b'&').add(b'=').add(b'+').add(b';');

pub fn push_segment(out: &mut String, value: &str) {
    out.extend(utf8_percent_encode(value, SEGMENT));
}

pub fn push_path(out: &mut String, value: &str) {
    out.extend(utf8_percent_encode(value, PATH));
}

pub fn push_query_component(out: &mut String, value: &str) {
    out.extend(utf8_percent_encode(value, QUERY_COMPONENT));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(f: fn(&mut String, &str), value: &str) -> String {
        let mut out = String::new();
        f(&mut out, value);
        out
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(encoded(push_segment, "hello world"), "hello%20world");
        assert_eq!(encoded(push_segment, "a/b"), "a%2Fb");
        assert_eq!(encoded(push_segment, "100%"), "100%25");
        assert_eq!(encoded(push_segment, "café"), "caf%C3%A9");
        assert_eq!(encoded(push_segment, "report-2023.pdf"), "report-2023.pdf");
    }

    #[test]
    fn test_path_keeps_slashes() {
        assert_eq!(encoded(push_path, "docs/a b/c"), "docs/a%20b/c");
    }

    #[test]
    fn test_query_component_encoding() {
        assert_eq!(encoded(push_query_component, "a&b=c+d"), "a%26b%3Dc%2Bd");
    }
}
