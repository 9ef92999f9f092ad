//! Portions: how each text node contributes to a match, and the traversal
//! that finds them while the tree is being rewritten.
//!
//! The walk keeps an explicit stack of ancestors instead of recursing, and
//! never trusts sibling links across an edit: after every rewrite it resumes
//! from the node the rewriter hands back. Nodes the rewriter created are
//! skipped by identity, so the character cursor only ever counts text that
//! existed when the matches were computed.

use indextree::NodeId;
use smallvec::SmallVec;

use crate::dom::Document;
use crate::matcher::Match;
use crate::options::ElementRules;
use crate::rewrite::{Resume, Rewriter};
use crate::{debug, trace};

/// One text node's share of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portion {
    node: NodeId,
    index: usize,
    text: String,
    index_in_match: usize,
    index_in_node: usize,
    end_index_in_node: usize,
    is_end: bool,
}

impl Portion {
    /// The text node this portion lives in (as it was before the rewrite).
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Position among this match's portions, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The part of the node's text that belongs to the match.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Where `text` starts within the matched text.
    pub fn index_in_match(&self) -> usize {
        self.index_in_match
    }

    /// Where `text` starts within the node's text.
    pub fn index_in_node(&self) -> usize {
        self.index_in_node
    }

    /// Where `text` ends within the node's text.
    pub fn end_index_in_node(&self) -> usize {
        self.end_index_in_node
    }

    /// Whether this is the last portion of the match.
    pub fn is_end(&self) -> bool {
        self.is_end
    }
}

/// Portions gathered so far for the match in flight.
#[derive(Debug, Default)]
struct PendingMatch {
    portions: SmallVec<[Portion; 4]>,
}

impl PendingMatch {
    /// Feed one text node spanning `[at, at + text.len())`. Returns true
    /// once the match's end portion has been recorded.
    fn observe(&mut self, m: &Match, node: NodeId, text: &str, at: usize) -> bool {
        let node_end = at + text.len();

        if self.portions.is_empty() {
            if node_end <= m.start() {
                return false;
            }
            let local_start = m.start().saturating_sub(at);
            let local_end = (m.end() - at).min(text.len());
            let is_end = node_end >= m.end();
            self.portions.push(Portion {
                node,
                index: 0,
                text: text[local_start..local_end].to_string(),
                index_in_match: 0,
                index_in_node: local_start,
                end_index_in_node: local_end,
                is_end,
            });
            return is_end;
        }

        let index = self.portions.len();
        let index_in_match = at - m.start();
        if node_end >= m.end() {
            let local_end = m.end() - at;
            self.portions.push(Portion {
                node,
                index,
                text: text[..local_end].to_string(),
                index_in_match,
                index_in_node: 0,
                end_index_in_node: local_end,
                is_end: true,
            });
            true
        } else {
            self.portions.push(Portion {
                node,
                index,
                text: text.to_string(),
                index_in_match,
                index_in_node: 0,
                end_index_in_node: text.len(),
                is_end: false,
            });
            false
        }
    }

    fn take(&mut self) -> SmallVec<[Portion; 4]> {
        std::mem::take(&mut self.portions)
    }
}

/// Document-order cursor over a subtree that may change under it.
struct Cursor {
    root: NodeId,
    node: NodeId,
    ancestors: Vec<NodeId>,
}

impl Cursor {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            node: root,
            ancestors: Vec::new(),
        }
    }

    fn descend(&mut self, doc: &Document) -> bool {
        match doc.first_child(self.node) {
            Some(child) => {
                self.ancestors.push(self.node);
                self.node = child;
                true
            }
            None => false,
        }
    }

    /// Move to the next sibling, climbing as needed. False once the whole
    /// subtree has been walked.
    fn advance(&mut self, doc: &Document) -> bool {
        loop {
            if self.node == self.root {
                return false;
            }
            if let Some(next) = doc.next_sibling(self.node) {
                self.node = next;
                return true;
            }
            match self.ancestors.pop() {
                Some(parent) => self.node = parent,
                None => return false,
            }
        }
    }
}

/// Walk `root` in document order, resolve each match into portions and
/// hand it to the rewriter as soon as its end portion is known.
pub(crate) fn resolve(
    doc: &mut Document,
    root: NodeId,
    matches: &[Match],
    rules: &ElementRules<'_, '_>,
    rewriter: &mut Rewriter<'_>,
) {
    let mut remaining = matches.iter();
    let Some(mut current) = remaining.next() else {
        return;
    };

    let mut cursor = Cursor::new(root);
    let mut pending = PendingMatch::default();
    // Global character cursor: offset of the current node's first character.
    let mut at = 0;

    loop {
        let node = cursor.node;
        let synthesized = rewriter.is_synthesized(node);

        let observed = match doc.text(node) {
            Some(text) if !synthesized => Some((text.len(), pending.observe(current, node, text, at))),
            _ => None,
        };

        if let Some((len, complete)) = observed {
            if complete {
                let portions = pending.take();
                trace!(index = current.index(), portions = portions.len(), "match resolved");
                let resume = rewriter.rewrite(doc, current, &portions);
                let end = current.end();

                current = match remaining.next() {
                    Some(next) => next,
                    None => break,
                };

                match resume {
                    Some(Resume::At(next)) => {
                        at = end;
                        cursor.node = next;
                        continue;
                    }
                    Some(Resume::After(last)) => {
                        at = end;
                        cursor.node = last;
                        if !cursor.advance(doc) {
                            break;
                        }
                        continue;
                    }
                    // Nothing changed: look at the same node again for the next match.
                    None => continue,
                }
            }
            at += len;
        }

        if !synthesized && rules.accepts(doc, node) && cursor.descend(doc) {
            continue;
        }
        if !cursor.advance(doc) {
            break;
        }
    }

    if !pending.portions.is_empty() {
        debug!(index = current.index(), "traversal ended with a match unresolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregation;
    use crate::matcher::search;
    use crate::options::Find;
    use regex::Regex;

    fn one_match(text: &str, pattern: &str) -> Match {
        let agg = vec![Aggregation::Text(text.to_string())];
        let find = Find::first(Regex::new(pattern).unwrap());
        search(&find, &agg).unwrap().remove(0)
    }

    fn node_ids(count: usize) -> Vec<NodeId> {
        let mut arena = indextree::Arena::new();
        (0..count).map(|i| arena.new_node(i)).collect()
    }

    #[test]
    fn test_single_node_match_is_one_end_portion() {
        let m = one_match("xxabcxx", "abc");
        let ids = node_ids(1);
        let mut pending = PendingMatch::default();

        assert!(pending.observe(&m, ids[0], "xxabcxx", 0));
        let portions = pending.take();
        assert_eq!(portions.len(), 1);
        let p = &portions[0];
        assert_eq!(p.text(), "abc");
        assert_eq!((p.index_in_node(), p.end_index_in_node()), (2, 5));
        assert!(p.is_end());
    }

    #[test]
    fn test_match_across_three_nodes() {
        let m = one_match("test ing 123", "ing.*1");
        let ids = node_ids(3);
        let mut pending = PendingMatch::default();

        // "test " | "ing" | " 123"
        assert!(!pending.observe(&m, ids[0], "test ", 0));
        assert!(!pending.observe(&m, ids[1], "ing", 5));
        assert!(pending.observe(&m, ids[2], " 123", 8));

        let portions = pending.take();
        let texts: Vec<_> = portions.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["ing", " 1"]);
        assert_eq!(texts.concat(), m.as_str());

        let indices: Vec<_> = portions.iter().map(|p| (p.index(), p.index_in_match())).collect();
        assert_eq!(indices, vec![(0, 0), (1, 3)]);
        assert!(!portions[0].is_end());
        assert!(portions[1].is_end());
        assert_eq!(portions[1].end_index_in_node(), 2);
        assert!(pending.portions.is_empty());
    }

    #[test]
    fn test_inner_portions_take_the_whole_node() {
        let m = one_match("aXYZb", "aXYZb");
        let ids = node_ids(3);
        let mut pending = PendingMatch::default();

        assert!(!pending.observe(&m, ids[0], "a", 0));
        assert!(!pending.observe(&m, ids[1], "XYZ", 1));
        assert!(pending.observe(&m, ids[2], "b", 4));

        let portions = pending.take();
        assert_eq!(portions[1].text(), "XYZ");
        assert_eq!(portions[1].index_in_node(), 0);
        assert_eq!(portions[1].end_index_in_node(), 3);
        assert_eq!(portions[1].index_in_match(), 1);
    }

    #[test]
    fn test_nodes_before_the_match_are_ignored() {
        let m = one_match("abcdef", "def");
        let ids = node_ids(2);
        let mut pending = PendingMatch::default();

        assert!(!pending.observe(&m, ids[0], "abc", 0));
        assert!(pending.portions.is_empty());
        assert!(pending.observe(&m, ids[1], "def", 3));
    }
}
