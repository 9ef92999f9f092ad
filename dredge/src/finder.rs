use indextree::NodeId;

use crate::aggregate::aggregate;
use crate::debug;
use crate::dom::Document;
use crate::error::FindError;
use crate::matcher::{Match, search};
use crate::options::{ElementRules, Options};
use crate::portion::resolve;
use crate::revert::RevertLog;
use crate::rewrite::Rewriter;

/// Find every match under `root` and rewrite the tree in place.
///
/// The pattern runs before anything is touched, so an error leaves the tree
/// exactly as it was.
pub fn find(doc: &mut Document, root: NodeId, options: Options<'_>) -> Result<Finder, FindError> {
    Finder::new(doc, root, options)
}

/// Result of one [`find`]: the matches it made, and a way to take them back.
#[derive(Debug)]
pub struct Finder {
    matches: Vec<Match>,
    log: RevertLog,
    edits: usize,
    reverted: bool,
}

impl Finder {
    pub fn new(doc: &mut Document, root: NodeId, mut options: Options<'_>) -> Result<Self, FindError> {
        options.apply_preset();
        let Options {
            find,
            replace,
            wrap,
            wrap_class,
            portion_mode,
            filter_elements,
            force_context,
            ..
        } = options;

        let rules = ElementRules::new(filter_elements.as_ref(), force_context.as_ref());
        let aggregation = aggregate(doc, root, &rules);
        let matches = search(&find, &aggregation)?;
        debug!(count = matches.len(), global = find.is_global(), "matches found");

        let mut rewriter = Rewriter::new(replace, wrap, wrap_class, portion_mode);
        resolve(doc, root, &matches, &rules, &mut rewriter);
        let log = rewriter.into_log();
        debug!(edits = log.len(), "rewrite done");

        Ok(Self {
            matches,
            edits: log.len(),
            log,
            reverted: false,
        })
    }

    /// Every match found, in document order. Still available after revert.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Number of node replacements the find made.
    pub fn edit_count(&self) -> usize {
        self.edits
    }

    pub fn is_reverted(&self) -> bool {
        self.reverted
    }

    /// Undo every edit, newest first. Calling it again does nothing.
    pub fn revert(&mut self, doc: &mut Document) -> &mut Self {
        if !self.log.is_empty() {
            debug!(edits = self.log.len(), "reverting");
            self.log.replay(doc);
        }
        self.reverted = true;
        self
    }
}
