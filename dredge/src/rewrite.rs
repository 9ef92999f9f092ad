//! Turns a resolved match into tree edits.
//!
//! Every replacement node for a match is built before the tree is touched.
//! Then each portion's text node is split: the untouched text before the
//! match (first portion only) and after it (last portion only) survive as new
//! text nodes around the replacement. Every edit is logged so it can be
//! reverted later.

use std::collections::HashSet;

use indextree::NodeId;
use smallvec::SmallVec;

use crate::debug;
use crate::dom::Document;
use crate::matcher::Match;
use crate::options::{PortionMode, Replace, Wrap};
use crate::portion::Portion;
use crate::revert::{RevertLog, Splice};

/// What a replace callback hands back for one portion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Inserted as a plain text node.
    Text(String),
    /// Inserted as-is (moved if it is already in the tree).
    Node(NodeId),
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Replacement::Text(text)
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Replacement::Text(text.to_string())
    }
}

impl From<NodeId> for Replacement {
    fn from(id: NodeId) -> Self {
        Replacement::Node(id)
    }
}

/// Where the traversal picks up after a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resume {
    /// Scan this node next (the untouched tail of the match's last node).
    At(NodeId),
    /// Continue after this node (the last replacement inserted).
    After(NodeId),
}

pub(crate) struct Rewriter<'a> {
    replace: Replace<'a>,
    wrap: Option<Wrap>,
    wrap_class: Option<String>,
    portion_mode: PortionMode,
    /// Nodes we created; the traversal must not count or enter them.
    synthesized: HashSet<NodeId>,
    log: RevertLog,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(
        replace: Replace<'a>,
        wrap: Option<Wrap>,
        wrap_class: Option<String>,
        portion_mode: PortionMode,
    ) -> Self {
        Self {
            replace,
            wrap,
            wrap_class,
            portion_mode,
            synthesized: HashSet::new(),
            log: RevertLog::default(),
        }
    }

    pub(crate) fn is_synthesized(&self, id: NodeId) -> bool {
        self.synthesized.contains(&id)
    }

    pub(crate) fn into_log(self) -> RevertLog {
        self.log
    }

    /// Apply one match. `None` means the tree was left as it was: the match
    /// is skipped when a callback moved one of its endpoints, or returned a
    /// node that is, or contains, one of the matched text nodes. Nodes built
    /// for a skipped match are freed; nodes a callback returned are left
    /// wherever the callback put them.
    pub(crate) fn rewrite(
        &mut self,
        doc: &mut Document,
        m: &Match,
        portions: &[Portion],
    ) -> Option<Resume> {
        let built: SmallVec<[Built; 4]> = portions
            .iter()
            .map(|p| self.portion_node(doc, p, m))
            .collect();

        let (first, last) = (portions.first()?, portions.last()?);
        let intact = |id: NodeId| doc.is_text(id) && doc.parent(id).is_some();
        if !intact(first.node()) || !intact(last.node()) {
            debug!(index = m.index(), "match endpoints changed under us, skipping");
            discard(doc, &built);
            return None;
        }

        let encloses_match = built
            .iter()
            .any(|b| portions.iter().any(|p| doc.contains(b.id, p.node())));
        if encloses_match {
            debug!(index = m.index(), "replacement contains a matched node, skipping");
            discard(doc, &built);
            return None;
        }

        let nodes: SmallVec<[NodeId; 4]> = built.iter().map(|b| b.id).collect();

        if let [only] = portions {
            return Some(self.rewrite_single(doc, only, nodes[0]));
        }

        let (start, end) = (first.node(), last.node());
        let (head, tail) = (nodes[0], nodes[nodes.len() - 1]);

        let preceding = leftover(doc, start, 0, first.index_in_node());
        let following = leftover(doc, end, last.end_index_in_node(), text_len(doc, end));

        if let Some(preceding) = preceding {
            doc.insert_before(start, preceding);
        }
        doc.insert_before(start, head);
        doc.detach(start);
        self.log.record(Splice::new(start, head, &[preceding]));

        let inner = &portions[1..portions.len() - 1];
        for (portion, &replacement) in inner.iter().zip(&nodes[1..nodes.len() - 1]) {
            doc.replace(portion.node(), replacement);
            self.log.record(Splice::new(portion.node(), replacement, &[]));
        }

        doc.insert_before(end, tail);
        if let Some(following) = following {
            doc.insert_before(end, following);
        }
        doc.detach(end);
        self.log.record(Splice::new(end, tail, &[following]));

        self.synthesized.extend(nodes.iter().copied());
        self.synthesized.extend(preceding);

        Some(following.map_or(Resume::After(tail), Resume::At))
    }

    fn rewrite_single(&mut self, doc: &mut Document, portion: &Portion, replacement: NodeId) -> Resume {
        let node = portion.node();
        let preceding = leftover(doc, node, 0, portion.index_in_node());
        let following = leftover(doc, node, portion.end_index_in_node(), text_len(doc, node));

        for new in preceding.into_iter().chain([replacement]).chain(following) {
            doc.insert_before(node, new);
        }
        doc.detach(node);
        self.log.record(Splice::new(node, replacement, &[preceding, following]));

        self.synthesized.insert(replacement);
        self.synthesized.extend(preceding);

        following.map_or(Resume::After(replacement), Resume::At)
    }

    /// Build the node that takes `portion`'s place. Never inserted here.
    fn portion_node(&mut self, doc: &mut Document, portion: &Portion, m: &Match) -> Built {
        let text = match &mut self.replace {
            Replace::With(f) => {
                return match f(portion, m, &mut *doc) {
                    Replacement::Node(id) => Built { id, owned: false },
                    Replacement::Text(text) => Built::new(doc.create_text(text)),
                };
            }
            Replace::Template(template) => portion_text(template, portion, m, self.portion_mode),
        };

        // No point wrapping nothing.
        if text.is_empty() {
            return Built::new(doc.create_text(text));
        }

        let text_node = doc.create_text(text);
        let Some(wrap) = &self.wrap else {
            return Built::new(text_node);
        };
        let wrapper = match wrap {
            Wrap::Tag(tag) => doc.create_element(tag),
            Wrap::Template(template) => doc.deep_clone(*template),
        };
        if !doc.is_element(wrapper) {
            debug!("wrap template is not an element, inserting bare text");
            doc.remove(wrapper);
            return Built::new(text_node);
        }
        if let Some(class) = &self.wrap_class {
            doc.set_class(wrapper, class);
        }
        doc.append(wrapper, text_node);
        Built::new(wrapper)
    }
}

/// A portion's replacement node, and whether we created it.
struct Built {
    id: NodeId,
    owned: bool,
}

impl Built {
    fn new(id: NodeId) -> Self {
        Self { id, owned: true }
    }
}

/// Free the nodes built for a match that is being skipped.
fn discard(doc: &mut Document, built: &[Built]) {
    for b in built.iter().filter(|b| b.owned) {
        doc.remove(b.id);
    }
}

fn text_len(doc: &Document, id: NodeId) -> usize {
    doc.text(id).map_or(0, str::len)
}

/// A new text node holding `text[from..to]` of `id`, sharing its buffer.
fn leftover(doc: &mut Document, id: NodeId, from: usize, to: usize) -> Option<NodeId> {
    if from >= to {
        return None;
    }
    let text = doc.text_tendril(id)?.subtendril(from as u32, (to - from) as u32);
    Some(doc.create_text(text))
}

/// The share of the interpolated replacement that belongs to `portion`.
fn portion_text(template: &str, portion: &Portion, m: &Match, mode: PortionMode) -> String {
    match mode {
        PortionMode::First if portion.index() > 0 => String::new(),
        PortionMode::First => interpolate(template, m),
        PortionMode::Retain => {
            let full = interpolate(template, m);
            let start = portion.index_in_match();
            let end = (!portion.is_end()).then(|| start + portion.text().len());
            slice(&full, start, end).to_string()
        }
    }
}

/// `s[start..end]` (or `s[start..]`), clamped to the string and pulled back
/// to char boundaries.
fn slice(s: &str, start: usize, end: Option<usize>) -> &str {
    let start = char_floor(s, start);
    let end = end.map_or(s.len(), |end| char_floor(s, end)).max(start);
    &s[start..end]
}

fn char_floor(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Expand `$n`, `$&`, `` $` ``, `$'` and `$$` in `template`.
///
/// Digits after `$` are read greedily. Groups that don't exist or didn't
/// take part expand to nothing. Any other `$` is kept as-is.
pub fn interpolate(template: &str, m: &Match) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            if let Ok(group) = after[..digits].parse::<usize>() {
                out.push_str(m.group(group).unwrap_or_default());
            }
            rest = &after[digits..];
            continue;
        }

        let expansion = match after.as_bytes().first() {
            Some(b'&') => m.as_str(),
            Some(b'`') => m.left_context(),
            Some(b'\'') => m.right_context(),
            Some(b'$') => "$",
            _ => {
                out.push('$');
                rest = after;
                continue;
            }
        };
        out.push_str(expansion);
        rest = &after[1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregation;
    use crate::matcher::search;
    use crate::options::Find;
    use regex::Regex;

    fn first_match(text: &str, pattern: &str) -> Match {
        let agg = vec![Aggregation::Text(text.to_string())];
        search(&Find::first(Regex::new(pattern).unwrap()), &agg)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_group_references() {
        let m = first_match("111333", "(1+)(3+)");
        assert_eq!(interpolate("$2$1", &m), "333111");
        assert_eq!(interpolate("[$0|$&]", &m), "[111333|111333]");
    }

    #[test]
    fn test_missing_groups_expand_to_nothing() {
        let m = first_match("ab", "(a)(x)?b");
        assert_eq!(interpolate("<$2|$9|$12>", &m), "<||>");
    }

    #[test]
    fn test_context_tokens() {
        let m = first_match("left MID right", "MID");
        assert_eq!(interpolate("$`|$'", &m), "left | right");
    }

    #[test]
    fn test_literal_dollars() {
        let m = first_match("x", "x");
        assert_eq!(interpolate("$$1", &m), "$1");
        assert_eq!(interpolate("cost: $", &m), "cost: $");
        assert_eq!(interpolate("$x$", &m), "$x$");
        assert_eq!(interpolate("no tokens", &m), "no tokens");
    }

    #[test]
    fn test_slice_clamps_to_char_boundaries() {
        assert_eq!(slice("héllo", 0, Some(2)), "h");
        assert_eq!(slice("héllo", 2, None), "éllo");
        assert_eq!(slice("abc", 5, Some(9)), "");
        assert_eq!(slice("abcdef", 2, Some(4)), "cd");
    }
}
