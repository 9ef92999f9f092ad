//! What to find, what to put in its place, and which elements to look at.

use indextree::NodeId;
use regex::Regex;
use std::borrow::Cow;

use crate::dom::{Document, ElementRef};
use crate::error::FindError;
use crate::matcher::Match;
use crate::portion::Portion;
use crate::rewrite::Replacement;

/// Predicate over elements (`filterElements`, `forceContext`).
pub type ElementPredicate<'a> = Box<dyn Fn(ElementRef<'_>) -> bool + 'a>;

/// Replacement callback: called once per portion, in document order.
pub type ReplaceFn<'a> = Box<dyn FnMut(&Portion, &Match, &mut Document) -> Replacement + 'a>;

/// What to search for.
#[derive(Debug, Clone)]
pub enum Find {
    /// Exact substring, escaped before compiling. Always global.
    Literal(String),
    /// A compiled pattern with an explicit global flag.
    Pattern { regex: Regex, global: bool },
}

impl Find {
    /// Every match of `regex`.
    pub fn all(regex: Regex) -> Self {
        Find::Pattern {
            regex,
            global: true,
        }
    }

    /// Only the first match of `regex`.
    pub fn first(regex: Regex) -> Self {
        Find::Pattern {
            regex,
            global: false,
        }
    }

    pub fn is_global(&self) -> bool {
        match self {
            Find::Literal(_) => true,
            Find::Pattern { global, .. } => *global,
        }
    }

    pub(crate) fn regex(&self) -> Result<Cow<'_, Regex>, FindError> {
        match self {
            Find::Literal(text) => Ok(Cow::Owned(Regex::new(&regex::escape(text))?)),
            Find::Pattern { regex, .. } => Ok(Cow::Borrowed(regex)),
        }
    }
}

impl From<&str> for Find {
    fn from(text: &str) -> Self {
        Find::Literal(text.to_string())
    }
}

impl From<String> for Find {
    fn from(text: String) -> Self {
        Find::Literal(text)
    }
}

/// How replacement content is produced.
pub enum Replace<'a> {
    /// Template with `$1`, `$&`, `` $` ``, `$'` tokens.
    Template(String),
    /// Callback returning text or a ready-made node.
    With(ReplaceFn<'a>),
}

impl std::fmt::Debug for Replace<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replace::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Replace::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Element to put each replaced portion in.
#[derive(Debug, Clone)]
pub enum Wrap {
    /// Create a fresh element with this tag.
    Tag(String),
    /// Deep-clone this node for every portion.
    Template(NodeId),
}

/// How a multi-node match's replacement is spread across its portions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortionMode {
    /// Every portion gets its own slice of the replacement.
    #[default]
    Retain,
    /// The first portion gets everything, the others nothing.
    First,
}

impl std::str::FromStr for PortionMode {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retain" => Ok(PortionMode::Retain),
            "first" => Ok(PortionMode::First),
            other => Err(FindError::Config {
                message: format!("unknown portion mode {other:?}"),
            }),
        }
    }
}

/// Whether an element's text is kept apart from its siblings' text.
pub enum ForceContext<'a> {
    Never,
    Always,
    When(ElementPredicate<'a>),
}

impl ForceContext<'_> {
    fn forces(&self, element: ElementRef<'_>) -> bool {
        match self {
            ForceContext::Never => false,
            ForceContext::Always => true,
            ForceContext::When(predicate) => predicate(element),
        }
    }
}

/// Named bundles of `filter_elements` / `force_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Skip non-content elements and keep block-level elements apart.
    Prose,
}

impl std::str::FromStr for Preset {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prose" => Ok(Preset::Prose),
            other => Err(FindError::Config {
                message: format!("unknown preset {other:?}"),
            }),
        }
    }
}

/// Elements that never hold prose.
pub const NON_PROSE_ELEMENTS: &[&str] = &[
    "br", "hr", "script", "style", "img", "video", "audio", "canvas", "svg", "map", "object",
    "input", "textarea", "select", "option", "optgroup", "button",
];

/// Elements whose text must not be fused with the text around them.
pub const NON_CONTIGUOUS_PROSE_ELEMENTS: &[&str] = &[
    // Block elements
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr",
    "main", "nav", "noscript", "ol", "output", "p", "pre", "section", "ul",
    // Not part of continuous inline prose
    "br", "li", "summary", "dt", "details", "rp", "rt", "rtc",
    // Media / source
    "script", "style", "img", "video", "audio", "canvas", "svg", "map", "object",
    // Form controls
    "input", "textarea", "select", "option", "optgroup", "button",
    // Tables
    "table", "tbody", "thead", "th", "tr", "td", "caption", "col", "tfoot", "colgroup",
];

fn tag_in(table: &[&str], tag: &str) -> bool {
    table.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// True for elements that break inline prose (blocks, media, controls, tables).
pub fn is_non_inline_prose(element: ElementRef<'_>) -> bool {
    tag_in(NON_CONTIGUOUS_PROSE_ELEMENTS, element.tag())
}

/// True for elements that can hold prose.
pub fn is_prose(element: ElementRef<'_>) -> bool {
    !tag_in(NON_PROSE_ELEMENTS, element.tag())
}

/// Everything `find` needs to know.
///
/// ```
/// use dredge::{Find, Options, PortionMode};
///
/// let options = Options::new(Find::all(regex::Regex::new(r"\d+").unwrap()))
///     .wrap("mark")
///     .wrap_class("hit")
///     .portion_mode(PortionMode::First);
/// ```
pub struct Options<'a> {
    pub(crate) find: Find,
    pub(crate) replace: Replace<'a>,
    pub(crate) wrap: Option<Wrap>,
    pub(crate) wrap_class: Option<String>,
    pub(crate) portion_mode: PortionMode,
    pub(crate) filter_elements: Option<ElementPredicate<'a>>,
    pub(crate) force_context: Option<ForceContext<'a>>,
    pub(crate) preset: Option<Preset>,
}

impl<'a> Options<'a> {
    pub fn new(find: impl Into<Find>) -> Self {
        Self {
            find: find.into(),
            replace: Replace::Template("$&".to_string()),
            wrap: None,
            wrap_class: None,
            portion_mode: PortionMode::Retain,
            filter_elements: None,
            force_context: None,
            preset: None,
        }
    }

    /// Replace each match with an interpolated template.
    pub fn replace(mut self, template: impl Into<String>) -> Self {
        self.replace = Replace::Template(template.into());
        self
    }

    /// Compute each portion's replacement with a callback. Wrapping does
    /// not apply to callback output.
    pub fn replace_with<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Portion, &Match, &mut Document) -> Replacement + 'a,
    {
        self.replace = Replace::With(Box::new(f));
        self
    }

    /// Wrap each portion in a new element with this tag.
    pub fn wrap(mut self, tag: impl Into<String>) -> Self {
        self.wrap = Some(Wrap::Tag(tag.into()));
        self
    }

    /// Wrap each portion in a deep clone of `template`.
    pub fn wrap_with(mut self, template: NodeId) -> Self {
        self.wrap = Some(Wrap::Template(template));
        self
    }

    /// Class set on every wrapper element.
    pub fn wrap_class(mut self, class: impl Into<String>) -> Self {
        self.wrap_class = Some(class.into());
        self
    }

    pub fn portion_mode(mut self, mode: PortionMode) -> Self {
        self.portion_mode = mode;
        self
    }

    /// Elements for which `f` returns false are skipped along with their
    /// whole subtree.
    pub fn filter_elements<F>(mut self, f: F) -> Self
    where
        F: Fn(ElementRef<'_>) -> bool + 'a,
    {
        self.filter_elements = Some(Box::new(f));
        self
    }

    /// `true` keeps every element's text apart from its siblings; `false`
    /// lets text flow across all elements (overriding any preset).
    pub fn force_context(mut self, force: bool) -> Self {
        self.force_context = Some(if force {
            ForceContext::Always
        } else {
            ForceContext::Never
        });
        self
    }

    /// Keep the text of elements matching `f` apart from their siblings.
    pub fn force_context_with<F>(mut self, f: F) -> Self
    where
        F: Fn(ElementRef<'_>) -> bool + 'a,
    {
        self.force_context = Some(ForceContext::When(Box::new(f)));
        self
    }

    /// Fill in unset `filter_elements` / `force_context` from a preset.
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Resolve the preset into concrete predicates. Explicit settings win.
    pub(crate) fn apply_preset(&mut self) {
        let Some(preset) = self.preset.take() else {
            return;
        };
        match preset {
            Preset::Prose => {
                if self.filter_elements.is_none() {
                    self.filter_elements = Some(Box::new(is_prose));
                }
                if self.force_context.is_none() {
                    self.force_context = Some(ForceContext::When(Box::new(is_non_inline_prose)));
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn rules(&self) -> ElementRules<'_, 'a> {
        ElementRules::new(self.filter_elements.as_ref(), self.force_context.as_ref())
    }
}

impl std::fmt::Debug for Options<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("find", &self.find)
            .field("replace", &self.replace)
            .field("wrap", &self.wrap)
            .field("wrap_class", &self.wrap_class)
            .field("portion_mode", &self.portion_mode)
            .field("filter_elements", &self.filter_elements.is_some())
            .field("force_context", &self.force_context.is_some())
            .field("preset", &self.preset)
            .finish()
    }
}

/// The element predicates shared by the aggregator and the traversal.
pub(crate) struct ElementRules<'r, 'a> {
    filter: Option<&'r ElementPredicate<'a>>,
    force: Option<&'r ForceContext<'a>>,
}

impl<'r, 'a> ElementRules<'r, 'a> {
    pub(crate) fn new(
        filter: Option<&'r ElementPredicate<'a>>,
        force: Option<&'r ForceContext<'a>>,
    ) -> Self {
        Self { filter, force }
    }

    /// False when `id` is an element the caller filtered out.
    pub(crate) fn accepts(&self, doc: &Document, id: NodeId) -> bool {
        match (self.filter, doc.element(id)) {
            (Some(filter), Some(element)) => filter(element),
            _ => true,
        }
    }

    /// True when `id` is an element whose text stands on its own.
    pub(crate) fn forces_context(&self, doc: &Document, id: NodeId) -> bool {
        match (self.force, doc.element(id)) {
            (Some(force), Some(element)) => force.forces(element),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    fn first_element(doc: &Document) -> NodeId {
        let body = doc.body().unwrap();
        doc.first_child(body).unwrap()
    }

    #[test]
    fn test_prose_preset_fills_unset_rules() {
        let doc = parse("<p>text</p>");
        let p = first_element(&doc);

        let mut options = Options::new("x").preset(Preset::Prose);
        options.apply_preset();
        let rules = options.rules();
        assert!(rules.accepts(&doc, p));
        assert!(rules.forces_context(&doc, p));
    }

    #[test]
    fn test_explicit_force_context_beats_preset() {
        let doc = parse("<p>text</p>");
        let p = first_element(&doc);

        let mut options = Options::new("x").preset(Preset::Prose).force_context(false);
        options.apply_preset();
        assert!(!options.rules().forces_context(&doc, p));
    }

    #[test]
    fn test_prose_filter_rejects_media_and_controls() {
        let doc = parse("<button>push</button>");
        let button = first_element(&doc);

        let mut options = Options::new("x").preset(Preset::Prose);
        options.apply_preset();
        assert!(!options.rules().accepts(&doc, button));
    }

    #[test]
    fn test_rules_ignore_text_nodes() {
        let doc = parse("plain");
        let text = first_element(&doc);

        let options = Options::new("x")
            .filter_elements(|_| false)
            .force_context(true);
        let rules = options.rules();
        assert!(rules.accepts(&doc, text));
        assert!(!rules.forces_context(&doc, text));
    }

    #[test]
    fn test_literal_find_is_escaped() {
        let find = Find::from("a.c");
        let regex = find.regex().unwrap();
        assert!(regex.is_match("a.c"));
        assert!(!regex.is_match("abc"));
        assert!(find.is_global());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("first".parse::<PortionMode>().unwrap(), PortionMode::First);
        assert_eq!("prose".parse::<Preset>().unwrap(), Preset::Prose);
        assert!("sometimes".parse::<PortionMode>().is_err());
    }
}
