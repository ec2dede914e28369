//! Regular-expression topic patterns.

use crate::debug::bus_debug;
use regex::Regex;
use std::fmt;

/// Pattern matching every topic.
pub const ANY_TOPIC: &str = ".*";

/// A subscriber's topic pattern.
///
/// The pattern is a regular expression that must match the whole topic.
/// A pattern that fails to compile is kept, but never matches anything.
#[derive(Clone)]
pub struct TopicPattern {
    source: String,
    regex: Option<Regex>,
}

impl TopicPattern {
    /// Compile `pattern`, anchored at both ends.
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        // Validate the bare pattern first: an unbalanced group could close
        // the anchoring wrapper and compile to something else entirely.
        let regex = Regex::new(&source)
            .and_then(|_| Regex::new(&format!("^(?:{})$", source)));
        let regex = match regex {
            Ok(regex) => Some(regex),
            Err(e) => {
                bus_debug!("invalid topic pattern '{}', it will never match: {}", source, e);
                None
            }
        };
        Self { source, regex }
    }

    /// Pattern matching every topic.
    pub fn any() -> Self {
        Self::new(ANY_TOPIC)
    }

    /// Whether `topic` fully matches; always false for a malformed pattern
    pub fn matches(&self, topic: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(topic))
    }

    /// Whether the pattern compiled.
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// The pattern as given
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicPattern({:?})", self.source)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for TopicPattern {
    fn from(pattern: &str) -> Self {
        TopicPattern::new(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = TopicPattern::new("athome");
        assert!(pattern.matches("athome"));
        assert!(!pattern.matches("athome.kitchen"));
        assert!(!pattern.matches("notathome"));
    }

    #[test]
    fn test_hierarchical_pattern() {
        let pattern = TopicPattern::new("athome.*");
        assert!(pattern.matches("athome"));
        assert!(pattern.matches("athome.kitchen"));
        assert!(pattern.matches("athome:lights:on"));
        assert!(!pattern.matches("away.kitchen"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let pattern = TopicPattern::new("foo|bar");
        assert!(pattern.matches("foo"));
        assert!(pattern.matches("bar"));
        assert!(!pattern.matches("foobar"));
        assert!(!pattern.matches("xbar"));
    }

    #[test]
    fn test_any_matches_everything() {
        let pattern = TopicPattern::any();
        assert!(pattern.matches(""));
        assert!(pattern.matches("ns:foo"));
        assert!(pattern.matches("a.b.c"));
    }

    #[test]
    fn test_malformed_pattern_never_matches() {
        let pattern = TopicPattern::new("athome.(");
        assert!(!pattern.is_valid());
        assert!(!pattern.matches("athome.("));
        assert!(!pattern.matches(""));
        assert_eq!(pattern.as_str(), "athome.(");
    }

    #[test]
    fn test_malformed_pattern_cannot_escape_anchoring() {
        for source in ["a)(?:b", "x)|(?:.*", ")|(", "a)"] {
            let pattern = TopicPattern::new(source);
            assert!(!pattern.is_valid(), "{} compiled", source);
            for topic in ["", "a", "ab", "x", "anything", source] {
                assert!(!pattern.matches(topic), "{} matched {}", source, topic);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_escaped_literal_matches_only_itself(topic in "[a-z:.]{1,12}", other in "[a-z:.]{1,12}") {
            let pattern = TopicPattern::new(regex::escape(&topic));
            prop_assert!(pattern.matches(&topic));
            prop_assert_eq!(pattern.matches(&other), topic == other);
        }

        #[test]
        fn prop_any_matches_all_topics(topic in "[ -~]{0,32}") {
            prop_assert!(TopicPattern::any().matches(&topic));
        }
    }
}
