//! The pattern matcher.
//!
//! Patterns and topics are both dotted strings. A pattern segment is either
//! a literal, `*` (match exactly one segment), or `**` (match zero or more
//! trailing segments, only valid as the last segment). Patterns are
//! compiled once at subscribe time; matching a topic against a compiled
//! pattern is then a single linear walk with no backtracking and no regex
//! engine, in the spirit of the teacher's own `is_matching` — just reshaped
//! for segment-wise rather than character-wise wildcards.

use eventbus_core::correctness::{check_chars, check_nonempty_string};
use ustr::Ustr;

use crate::error::EventBusError;

const SEGMENT_SEPARATOR: char = '.';

fn is_valid_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Literal(Ustr),
    One,
    Tail,
}

/// A compiled subscription pattern.
///
/// Cheap to clone (an interned string plus a small segment vector) and
/// immutable once built, so the same [`Pattern`] can be shared across many
/// subscriptions without recompiling.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: Ustr,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles `raw` into a [`Pattern`], validating it against the grammar.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidPattern`] if `raw` is empty, contains
    /// an empty segment, an illegal character, or uses `**` anywhere but the
    /// final segment.
    pub fn compile(raw: &str) -> Result<Self, EventBusError> {
        check_nonempty_string(raw, "pattern")
            .map_err(|_| EventBusError::InvalidPattern(raw.to_string(), "pattern must not be empty".to_string()))?;

        let parts: Vec<&str> = raw.split(SEGMENT_SEPARATOR).collect();
        let last_idx = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());

        for (idx, part) in parts.iter().enumerate() {
            check_nonempty_string(*part, "pattern segment").map_err(|_| {
                EventBusError::InvalidPattern(
                    raw.to_string(),
                    "pattern segments must not be empty".to_string(),
                )
            })?;

            let segment = if *part == "**" {
                if idx != last_idx {
                    return Err(EventBusError::InvalidPattern(
                        raw.to_string(),
                        "'**' is only valid as the final segment".to_string(),
                    ));
                }
                Segment::Tail
            } else if *part == "*" {
                Segment::One
            } else {
                check_chars(*part, "pattern segment", is_valid_segment_char).map_err(|_| {
                    EventBusError::InvalidPattern(
                        raw.to_string(),
                        format!("segment '{part}' contains characters outside [A-Za-z0-9_-]"),
                    )
                })?;
                Segment::Literal(Ustr::from(part))
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: Ustr::from(raw),
            segments,
        })
    }

    /// Returns the original, uncompiled pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Tests whether `topic` matches this pattern.
    ///
    /// `O(|topic segments| + |pattern segments|)`: a single pass, no
    /// backtracking, since at most one wildcard segment (`**`) can appear
    /// and only in tail position.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let mut topic_parts = topic.split(SEGMENT_SEPARATOR);
        let mut pattern_iter = self.segments.iter();

        loop {
            match pattern_iter.next() {
                Some(Segment::Tail) => return true,
                Some(Segment::One) => {
                    if topic_parts.next().is_none() {
                        return false;
                    }
                }
                Some(Segment::Literal(expected)) => match topic_parts.next() {
                    Some(actual) if actual == expected.as_str() => {}
                    _ => return false,
                },
                None => return topic_parts.next().is_none(),
            }
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Pattern {}

/// Validates that `topic` is non-empty and well-formed: dotted segments
/// drawn from letters, digits, `_`, and `-`.
///
/// # Errors
///
/// Returns [`EventBusError::InvalidTopic`] otherwise.
pub fn validate_topic(topic: &str) -> Result<(), EventBusError> {
    check_nonempty_string(topic, "topic").map_err(|_| EventBusError::InvalidTopic(topic.to_string()))?;
    for segment in topic.split(SEGMENT_SEPARATOR) {
        check_nonempty_string(segment, "topic segment")
            .and_then(|()| check_chars(segment, "topic segment", is_valid_segment_char))
            .map_err(|_| EventBusError::InvalidTopic(topic.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("order.placed", "order.placed", true)]
    #[case("order.placed", "order.*", true)]
    #[case("order.placed", "*.placed", true)]
    #[case("order.placed", "*", false)]
    #[case("user.created", "user.*", true)]
    #[case("user.created.extra", "user.*", false)]
    #[case("user.created.extra", "user.**", true)]
    #[case("user", "user.**", true)]
    #[case("account.user.created", "account.**", true)]
    #[case("account.other", "account.user.*", false)]
    #[case("a.b.c", "a.b.c.d", false)]
    #[case("a.b", "a.b.c", false)]
    fn test_matches(#[case] topic: &str, #[case] pattern: &str, #[case] expected: bool) {
        let compiled = Pattern::compile(pattern).unwrap();
        assert_eq!(compiled.matches(topic), expected);
    }

    #[rstest]
    #[case("")]
    #[case("a.**.b")]
    #[case("a..b")]
    #[case(".a")]
    #[case("a.")]
    #[case("a.b!")]
    fn test_compile_rejects_ill_formed(#[case] pattern: &str) {
        assert!(Pattern::compile(pattern).is_err());
    }

    #[rstest]
    #[case("a")]
    #[case("a.b")]
    #[case("a.*.b")]
    #[case("a.**")]
    #[case("a-b.c_d")]
    fn test_compile_accepts_well_formed(#[case] pattern: &str) {
        assert!(Pattern::compile(pattern).is_ok());
    }

    #[rstest]
    fn test_validate_topic() {
        assert!(validate_topic("user.created").is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("user..created").is_err());
        assert!(validate_topic("user.created!").is_err());
    }
}

#[cfg(test)]
mod grammar_properties {
    use proptest::prelude::*;

    use super::*;

    const ALPHABET: &[char] = &[
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
        '_', '-',
    ];

    /// A single well-formed segment: 1-8 characters drawn from the pattern
    /// grammar's allowed charset. Avoids proptest's `regex` strategy feature,
    /// which this crate's `proptest` dependency doesn't enable.
    fn segment_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(ALPHABET), 1..8)
            .prop_map(|chars: Vec<char>| chars.into_iter().collect::<String>())
    }

    proptest! {
        /// Any dotted string built purely from well-formed literal segments
        /// is both a valid topic and a valid pattern that matches itself
        /// exactly, with no interior wildcard ever confused for a literal.
        #[test]
        fn literal_only_pattern_matches_its_own_topic(
            segments in prop::collection::vec(segment_strategy(), 1..6)
        ) {
            let topic = segments.join(".");
            prop_assert!(validate_topic(&topic).is_ok());
            let compiled = Pattern::compile(&topic).expect("well-formed literal pattern must compile");
            prop_assert!(compiled.matches(&topic));
        }

        /// Replacing any one segment with `*` still compiles and still
        /// matches the original topic (a single wildcard only ever
        /// consumes exactly one segment).
        #[test]
        fn single_wildcard_segment_still_matches(
            segments in prop::collection::vec(segment_strategy(), 1..6),
            wildcard_idx in 0usize..6,
        ) {
            let wildcard_idx = wildcard_idx % segments.len();
            let topic = segments.join(".");
            let mut pattern_segments = segments.clone();
            pattern_segments[wildcard_idx] = "*".to_string();
            let pattern = pattern_segments.join(".");

            let compiled = Pattern::compile(&pattern).expect("pattern with one '*' must compile");
            prop_assert!(compiled.matches(&topic));
        }

        /// A tail wildcard appended after any well-formed prefix always
        /// compiles and matches any topic sharing that prefix, regardless
        /// of how many extra segments follow.
        #[test]
        fn tail_wildcard_matches_any_suffix(
            prefix in prop::collection::vec(segment_strategy(), 1..4),
            suffix in prop::collection::vec(segment_strategy(), 0..4),
        ) {
            let pattern = format!("{}.**", prefix.join("."));
            let mut topic_segments = prefix.clone();
            topic_segments.extend(suffix);
            let topic = topic_segments.join(".");

            let compiled = Pattern::compile(&pattern).expect("tail-wildcard pattern must compile");
            prop_assert!(compiled.matches(&topic));
        }

        /// `**` anywhere but the final segment is rejected, no matter what
        /// well-formed segments surround it.
        #[test]
        fn interior_tail_wildcard_is_always_rejected(
            prefix in prop::collection::vec(segment_strategy(), 1..4),
            suffix in prop::collection::vec(segment_strategy(), 1..4),
        ) {
            let mut segments = prefix;
            segments.push("**".to_string());
            segments.extend(suffix);
            let pattern = segments.join(".");

            prop_assert!(Pattern::compile(&pattern).is_err());
        }

        /// Any segment containing a character outside the grammar's
        /// charset is rejected by both the pattern compiler and the topic
        /// validator.
        #[test]
        fn segment_with_illegal_character_is_rejected(
            prefix in prop::collection::vec(segment_strategy(), 0..3),
            suffix in prop::collection::vec(segment_strategy(), 0..3),
        ) {
            let mut segments = prefix;
            segments.push("bad!segment".to_string());
            segments.extend(suffix);
            let joined = segments.join(".");

            prop_assert!(Pattern::compile(&joined).is_err());
            prop_assert!(validate_topic(&joined).is_err());
        }
    }
}
