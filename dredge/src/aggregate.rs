//! Text aggregation: the tree's text as the matcher sees it.
//!
//! Adjacent text is fused into one string, even across inline elements like
//! `<em>`, so a pattern can match straight through them. Elements that force
//! their own context get a nested branch instead, and no match can cross
//! the branch boundary.

use indextree::NodeId;

use crate::dom::Document;
use crate::options::ElementRules;

/// One level of aggregated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// A run of contiguous text.
    Text(String),
    /// Text that stands on its own (a forced context or a nested run).
    Nested(Vec<Aggregation>),
}

/// Aggregate the text under `root`.
pub(crate) fn aggregate(doc: &Document, root: NodeId, rules: &ElementRules<'_, '_>) -> Vec<Aggregation> {
    collect(doc, root, rules)
}

fn collect(doc: &Document, node: NodeId, rules: &ElementRules<'_, '_>) -> Vec<Aggregation> {
    if let Some(text) = doc.text(node) {
        return vec![Aggregation::Text(text.to_string())];
    }
    if !rules.accepts(doc, node) {
        return Vec::new();
    }

    // Invariant: the last entry is always the open `Text` run.
    let mut out = vec![Aggregation::Text(String::new())];

    for child in doc.children(node) {
        if let Some(text) = doc.text(child) {
            current(&mut out).push_str(text);
            continue;
        }

        let mut inner = collect(doc, child, rules);
        if rules.forces_context(doc, child) {
            out.push(Aggregation::Nested(inner));
            out.push(Aggregation::Text(String::new()));
            continue;
        }

        // Bridge the child's leading text into ours: ["Some", ["thing"]] -> ["Something"]
        if matches!(inner.first(), Some(Aggregation::Text(_)))
            && let Aggregation::Text(leading) = inner.remove(0)
        {
            current(&mut out).push_str(&leading);
        }
        if !inner.is_empty() {
            out.push(Aggregation::Nested(inner));
            out.push(Aggregation::Text(String::new()));
        }
    }

    out
}

fn current(out: &mut [Aggregation]) -> &mut String {
    match out.last_mut() {
        Some(Aggregation::Text(text)) => text,
        _ => unreachable!("aggregation always ends with an open text run"),
    }
}

/// Leaf strings in document order. Concatenated, they form the address
/// space every match offset refers to.
pub fn leaves(aggregation: &[Aggregation]) -> Vec<&str> {
    fn walk<'a>(aggregation: &'a [Aggregation], out: &mut Vec<&'a str>) {
        for entry in aggregation {
            match entry {
                Aggregation::Text(text) => out.push(text),
                Aggregation::Nested(inner) => walk(inner, out),
            }
        }
    }

    let mut out = Vec::new();
    walk(aggregation, &mut out);
    out
}
