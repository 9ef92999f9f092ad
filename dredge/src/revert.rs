//! Undo log for the edits a find made.

use indextree::NodeId;
use smallvec::SmallVec;

use crate::debug;
use crate::dom::Document;

/// One original node swapped out for one replacement node, plus the text
/// nodes split off around it.
#[derive(Debug, Clone)]
pub(crate) struct Splice {
    original: NodeId,
    replacement: NodeId,
    leftovers: SmallVec<[NodeId; 2]>,
}

impl Splice {
    pub(crate) fn new(original: NodeId, replacement: NodeId, leftovers: &[Option<NodeId>]) -> Self {
        Self {
            original,
            replacement,
            leftovers: leftovers.iter().flatten().copied().collect(),
        }
    }

    fn undo(&self, doc: &mut Document) {
        if doc.parent(self.replacement).is_none() {
            debug!(replacement = ?self.replacement, "replacement no longer in the tree, leaving it");
            return;
        }

        for &leftover in &self.leftovers {
            let adjacent = doc.next_sibling(leftover) == Some(self.replacement)
                || doc.previous_sibling(leftover) == Some(self.replacement);
            if adjacent {
                doc.detach(leftover);
            }
        }
        doc.replace(self.replacement, self.original);
    }
}

/// Every edit made by one find, in the order it was made.
#[derive(Debug, Clone, Default)]
pub(crate) struct RevertLog {
    splices: Vec<Splice>,
}

impl RevertLog {
    pub(crate) fn record(&mut self, splice: Splice) {
        self.splices.push(splice);
    }

    pub(crate) fn len(&self) -> usize {
        self.splices.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    /// Undo everything, newest edit first, and forget it.
    pub(crate) fn replay(&mut self, doc: &mut Document) {
        for splice in self.splices.drain(..).rev() {
            splice.undo(doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    #[test]
    fn test_undo_restores_split_text() {
        let mut doc = parse("<p>abc</p>");
        let body = doc.body().unwrap();
        let p = doc.first_child(body).unwrap();
        let text = doc.first_child(p).unwrap();

        // a[B]c, by hand
        let before = doc.create_text("a");
        let mark = doc.create_element("mark");
        let inner = doc.create_text("B");
        doc.append(mark, inner);
        let after = doc.create_text("c");
        for node in [before, mark, after] {
            doc.insert_before(text, node);
        }
        doc.detach(text);
        assert_eq!(doc.to_html(), "<p>a<mark>B</mark>c</p>");

        let mut log = RevertLog::default();
        log.record(Splice::new(text, mark, &[Some(before), Some(after)]));
        log.replay(&mut doc);

        assert_eq!(doc.to_html(), "<p>abc</p>");
        assert_eq!(doc.first_child(p), Some(text));
        assert!(log.is_empty());
    }

    #[test]
    fn test_undo_skips_detached_replacement() {
        let mut doc = parse("<p>abc</p>");
        let body = doc.body().unwrap();
        let p = doc.first_child(body).unwrap();
        let text = doc.first_child(p).unwrap();

        let replacement = doc.create_text("xyz");
        doc.replace(text, replacement);
        doc.detach(replacement);

        let mut log = RevertLog::default();
        log.record(Splice::new(text, replacement, &[]));
        log.replay(&mut doc);

        assert_eq!(doc.to_html(), "<p></p>");
        assert!(doc.parent(text).is_none());
    }
}
