//! Graphite-style pattern primitives.
//!
//! Patterns are dotted paths where each segment may use `*`, `?` and
//! character classes, and the whole pattern may use `{a,b,...}` brace
//! alternatives. Braces are expanded into the cross product of their
//! options before anything is compiled, and may span segment boundaries.

use crate::Result;
use regex::Regex;

/// Does this pattern need matching machinery at all, or is it a plain
/// path?
pub fn is_plain(pattern: &str) -> bool {
    !pattern.contains(['*', '{', '}', '[', ']', '?'])
}

/// Expand every `{a,b,...}` group into separate patterns, repeatedly,
/// until none remain. `a.{b,c}.d` becomes `a.b.d` and `a.c.d`; nested or
/// multiple groups multiply out.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let mut queries = vec![pattern.to_string()];

    let mut keep_looking = true;
    while keep_looking {
        keep_looking = false;
        let mut expanded = Vec::with_capacity(queries.len());
        for query in &queries {
            let lbrace = query.find('{');
            let rbrace = lbrace.and_then(|l| query[l..].find('}').map(|r| l + r));
            match (lbrace, rbrace) {
                (Some(l), Some(r)) => {
                    keep_looking = true;
                    for option in query[l + 1..r].split(',') {
                        expanded.push(format!("{}{}{}", &query[..l], option, &query[r + 1..]));
                    }
                }
                _ => expanded.push(query.clone()),
            }
        }
        queries = expanded;
    }
    queries
}

#[derive(Debug)]
enum SegmentPattern {
    Literal(String),
    Wild(Regex),
}

/// Matcher for one brace-free pattern segment against node child names.
#[derive(Debug)]
pub struct SegmentMatcher {
    pattern: SegmentPattern,
}

impl SegmentMatcher {
    /// Compile one segment. `*` matches any sequence within the segment,
    /// `?` one optional character, `[...]` classes pass through; a
    /// segment without metacharacters matches by equality.
    pub fn compile(segment: &str) -> Result<SegmentMatcher> {
        let pattern = if segment.contains(['*', '[', ']', '?']) {
            let expr = format!(
                "^{}$",
                segment.replace('*', ".*").replace('?', ".?")
            );
            SegmentPattern::Wild(Regex::new(&expr)?)
        } else {
            SegmentPattern::Literal(segment.to_string())
        };
        Ok(SegmentMatcher { pattern })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match &self.pattern {
            SegmentPattern::Literal(lit) => candidate == lit,
            SegmentPattern::Wild(re) => re.is_match(candidate),
        }
    }

    /// Filter `candidates` down to the matching ones, preserving order.
    pub fn matches<'a>(&self, candidates: &'a [String]) -> Vec<&'a str> {
        candidates
            .iter()
            .filter(|c| self.is_match(c))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_patterns() {
        assert!(is_plain("a.b.c"));
        assert!(!is_plain("a.*.c"));
        assert!(!is_plain("a.{b,c}"));
        assert!(!is_plain("a.b?"));
        assert!(!is_plain("a.b[0-9]"));
    }

    #[test]
    fn expand_single_group() {
        let mut got = expand_braces("a.{b,c}.d");
        got.sort();
        assert_eq!(got, vec!["a.b.d", "a.c.d"]);
    }

    #[test]
    fn expand_is_cross_product() {
        let mut got = expand_braces("{a,b}.{c,d}");
        got.sort();
        assert_eq!(got, vec!["a.c", "a.d", "b.c", "b.d"]);
    }

    #[test]
    fn expand_spans_segments() {
        let mut got = expand_braces("root.{one.two,three}.leaf");
        got.sort();
        assert_eq!(got, vec!["root.one.two.leaf", "root.three.leaf"]);
    }

    #[test]
    fn expand_without_braces_is_identity() {
        assert_eq!(expand_braces("a.b.c"), vec!["a.b.c"]);
    }

    #[test]
    fn star_matches_within_segment() {
        let m = SegmentMatcher::compile("host*").unwrap();
        assert!(m.is_match("host1"));
        assert!(m.is_match("host"));
        assert!(!m.is_match("ghost1"));
    }

    #[test]
    fn question_mark_matches_one_optional_char() {
        let m = SegmentMatcher::compile("cpu?").unwrap();
        assert!(m.is_match("cpu"));
        assert!(m.is_match("cpu1"));
        assert!(!m.is_match("cpu12"));
    }

    #[test]
    fn character_class_passes_through() {
        let m = SegmentMatcher::compile("host1[0-5]").unwrap();
        for i in 10..=15 {
            assert!(m.is_match(&format!("host{i}")));
        }
        assert!(!m.is_match("host16"));
        assert!(!m.is_match("host1"));
    }

    #[test]
    fn literal_segments_match_by_equality() {
        let m = SegmentMatcher::compile("exact").unwrap();
        assert!(m.is_match("exact"));
        assert!(!m.is_match("exactly"));
    }

    #[test]
    fn anchored_matching() {
        let m = SegmentMatcher::compile("*cpu").unwrap();
        assert!(m.is_match("totalcpu"));
        assert!(!m.is_match("totalcpus"));
    }

    #[test]
    fn bad_class_is_an_error() {
        assert!(SegmentMatcher::compile("a[b").is_err());
    }
}
