//! Runs the pattern over the aggregated text.

use std::sync::Arc;

use crate::aggregate::{Aggregation, leaves};
use crate::error::FindError;
use crate::options::Find;
use crate::trace;

/// One match, with offsets into the whole aggregated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    index: usize,
    start: usize,
    end: usize,
    /// Group 0 is the whole match.
    groups: Vec<Option<String>>,
    input: Arc<str>,
}

impl Match {
    /// Position of this match in discovery order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the first matched character.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset just past the last matched character.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The matched text.
    pub fn as_str(&self) -> &str {
        &self.input[self.start..self.end]
    }

    /// Text of capture group `i`, `None` if it did not take part.
    pub fn group(&self, i: usize) -> Option<&str> {
        self.groups.get(i).and_then(|g| g.as_deref())
    }

    /// Number of groups, counting the whole match as group 0.
    pub fn groups_len(&self) -> usize {
        self.groups.len()
    }

    /// The whole text that was searched.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Everything before the match.
    pub fn left_context(&self) -> &str {
        &self.input[..self.start]
    }

    /// Everything after the match.
    pub fn right_context(&self) -> &str {
        &self.input[self.end..]
    }
}

/// Find every match (or the first, for non-global patterns) in order.
///
/// Offsets run across all leaves as if they were one string. A zero-length
/// match is an error: it would never advance the portion cursor.
pub(crate) fn search(find: &Find, aggregation: &[Aggregation]) -> Result<Vec<Match>, FindError> {
    let regex = find.regex()?;
    let global = find.is_global();
    let leaves = leaves(aggregation);
    let input: Arc<str> = Arc::from(leaves.concat());

    let mut matches = Vec::new();
    let mut offset = 0;

    for leaf in leaves {
        for caps in regex.captures_iter(leaf) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.is_empty() {
                return Err(FindError::ZeroLengthMatch {
                    offset: offset + whole.start(),
                });
            }

            let found = Match {
                index: matches.len(),
                start: offset + whole.start(),
                end: offset + whole.end(),
                groups: caps
                    .iter()
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect(),
                input: Arc::clone(&input),
            };
            trace!(index = found.index, start = found.start, end = found.end, "match");
            matches.push(found);

            if !global {
                return Ok(matches);
            }
        }
        offset += leaf.len();
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn leaf(s: &str) -> Aggregation {
        Aggregation::Text(s.to_string())
    }

    #[test]
    fn test_offsets_span_all_leaves() {
        let agg = vec![leaf("ab"), Aggregation::Nested(vec![leaf("cab")]), leaf("ab")];
        let matches = search(&Find::from("ab"), &agg).unwrap();

        let spans: Vec<_> = matches.iter().map(|m| (m.index(), m.start(), m.end())).collect();
        assert_eq!(spans, vec![(0, 0, 2), (1, 3, 5), (2, 5, 7)]);
        assert_eq!(matches[1].input(), "abcabab");
    }

    #[test]
    fn test_matches_do_not_cross_leaves() {
        let agg = vec![leaf("a"), Aggregation::Nested(vec![leaf("b")])];
        let matches = search(&Find::from("ab"), &agg).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_single_shot_takes_first_match_only() {
        let agg = vec![leaf("xyz"), leaf("one two"), leaf("three")];
        let find = Find::first(Regex::new(r"\w+o\b").unwrap());
        let matches = search(&find, &agg).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].as_str(), "two");
        assert_eq!(matches[0].start(), 7);
        assert_eq!(matches[0].index(), 0);
    }

    #[test]
    fn test_zero_length_match_is_rejected() {
        let agg = vec![leaf("abc")];
        let err = search(&Find::all(Regex::new("x*").unwrap()), &agg).unwrap_err();
        assert!(matches!(err, FindError::ZeroLengthMatch { offset: 0 }));
    }

    #[test]
    fn test_groups_and_context() {
        let agg = vec![leaf("say 111333 now")];
        let find = Find::all(Regex::new(r"(1+)(\s+)?(3+)").unwrap());
        let matches = search(&find, &agg).unwrap();
        let m = &matches[0];

        assert_eq!(m.as_str(), "111333");
        assert_eq!(m.group(1), Some("111"));
        assert_eq!(m.group(2), None);
        assert_eq!(m.group(3), Some("333"));
        assert_eq!(m.group(9), None);
        assert_eq!(m.groups_len(), 4);
        assert_eq!(m.left_context(), "say ");
        assert_eq!(m.right_context(), " now");
    }
}
