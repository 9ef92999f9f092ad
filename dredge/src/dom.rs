//! Arena-based DOM that the finder scans and rewrites.
//!
//! All nodes live in one `indextree` arena and are addressed by [`NodeId`].
//! Detaching a node never frees it: the node keeps its identity and its
//! subtree, so it can be put back later. The finder relies on this to revert
//! its edits.

use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, QualName, parse_document};
use indexmap::IndexMap;
use indextree::{Arena, NodeId};
use std::borrow::Cow;
use std::cell::RefCell;
use tendril::{StrTendril, TendrilSink};

use crate::serialize::{SerializeOptions, Serializer};

/// Document = arena + the handful of well-known nodes in it.
#[derive(Debug, Clone)]
pub struct Document {
    /// THE tree - all nodes live here
    pub arena: Arena<NodeData>,

    /// Invisible document node, parent of `root`
    pub document: NodeId,

    /// Root node (usually `<html>` element)
    pub root: NodeId,

    /// DOCTYPE if present (usually "html")
    pub doctype: Option<StrTendril>,
}

impl Document {
    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].first_child()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].next_sibling()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].previous_sibling()
    }

    /// Get the `<body>` element if present
    pub fn body(&self) -> Option<NodeId> {
        self.find_root_child("body")
    }

    /// Get the `<head>` element if present
    pub fn head(&self) -> Option<NodeId> {
        self.find_root_child("head")
    }

    fn find_root_child(&self, tag: &str) -> Option<NodeId> {
        self.root
            .children(&self.arena)
            .find(|&id| self.tag(id) == Some(tag))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, NodeKind::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, NodeKind::Element(_))
    }

    /// Text payload of a text node, `None` for every other kind.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Shared handle on a text node's buffer (cheap to slice with `subtendril`).
    pub(crate) fn text_tendril(&self, id: NodeId) -> Option<&StrTendril> {
        match &self.get(id).kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the payload of a text node. Returns false for non-text nodes.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        match &mut self.get_mut(id).kind {
            NodeKind::Text(existing) => {
                *existing = StrTendril::from(text);
                true
            }
            _ => false,
        }
    }

    /// Tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Element(elem) => Some(elem.tag.as_ref()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Element(elem) => elem.attrs.get(name).map(|v| v.as_ref()),
            _ => None,
        }
    }

    /// Set an attribute on an element. Returns false for non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match &mut self.get_mut(id).kind {
            NodeKind::Element(elem) => {
                elem.attrs
                    .insert(name.to_string(), StrTendril::from(value));
                true
            }
            _ => false,
        }
    }

    /// Overwrite the `class` attribute of an element.
    pub fn set_class(&mut self, id: NodeId, class: &str) -> bool {
        self.set_attr(id, "class", class)
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<StrTendril>) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Text(text.into()),
            ns: Namespace::Html,
        })
    }

    /// Create a detached, empty HTML element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Element(ElementData {
                tag: StrTendril::from(tag),
                attrs: IndexMap::new(),
            }),
            ns: Namespace::Html,
        })
    }

    /// Copy `id` and all of its descendants into fresh, detached nodes.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let data = self.get(id).clone();
        let copy = self.arena.new_node(data);
        let children: Vec<NodeId> = id.children(&self.arena).collect();
        for child in children {
            let child_copy = self.deep_clone(child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    /// Insert `new` as the previous sibling of `reference`, detaching it
    /// from wherever it was first.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        new.detach(&mut self.arena);
        reference.insert_before(new, &mut self.arena);
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    /// Take a node (and its subtree) out of the tree. The node stays in the
    /// arena and can be inserted again.
    pub fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Free a node and its whole subtree. `id` must not be used afterwards.
    pub fn remove(&mut self, id: NodeId) {
        id.remove_subtree(&mut self.arena);
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || id.ancestors(&self.arena).any(|node| node == ancestor)
    }

    /// Put `new` where `old` is, detaching `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        self.insert_before(old, new);
        old.detach(&mut self.arena);
    }

    /// Concatenated text of every text node under `id` (inclusive).
    pub fn text_content(&self, id: NodeId) -> String {
        id.descendants(&self.arena)
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Serialize to HTML string (body content only, no doctype)
    pub fn to_html(&self) -> String {
        match self.body() {
            Some(body) => self.inner_html(body),
            None => String::new(),
        }
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, id: NodeId) -> String {
        self.inner_html_with(id, &SerializeOptions::default())
    }

    pub fn inner_html_with(&self, id: NodeId, options: &SerializeOptions) -> String {
        let mut out = String::new();
        let mut ser = Serializer::new(self, &mut out, options);
        for child in id.children(&self.arena) {
            ser.write_node(child);
        }
        out
    }

    /// Serialize a node together with its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let options = SerializeOptions::default();
        Serializer::new(self, &mut out, &options).write_node(id);
        out
    }

    /// Borrow an element as a predicate-friendly view.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        match &self.get(id).kind {
            NodeKind::Element(data) => Some(ElementRef { id, data }),
            _ => None,
        }
    }
}

/// Read-only view of one element, handed to element predicates.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tag(&self) -> &'a str {
        self.data.tag.as_ref()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.data.attrs.get(name).map(|v| v.as_ref())
    }

    /// Whether the whitespace-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub ns: Namespace,
}

/// Node types
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content (StrTendril is refcounted - cheap to clone)
    Text(StrTendril),
    /// HTML comment
    Comment(StrTendril),
}

/// Element data (tag + attributes)
#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: StrTendril,

    /// Keys are String, values are StrTendril.
    /// IndexMap preserves insertion order for consistent serialization
    pub attrs: IndexMap<String, StrTendril>,
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    pub fn from_url(url: &str) -> Self {
        match url {
            "http://www.w3.org/2000/svg" => Namespace::Svg,
            "http://www.w3.org/1998/Math/MathML" => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// Parse HTML into an arena-based Document.
///
/// Fragments are fine: html5ever wraps them in `<html><body>` the way a
/// browser would, so `parse("a<b>c</b>")` has `a<b>c</b>` as body content.
pub fn parse(html: &str) -> Document {
    let sink = ArenaSink::new();
    parse_document(sink, Default::default()).one(StrTendril::from(html))
}

/// Owned element name handed back to html5ever
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &html5ever::Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink implementation for building the arena
struct ArenaSink {
    arena: RefCell<Arena<NodeData>>,
    document: NodeId,
    doctype: RefCell<Option<StrTendril>>,
}

impl ArenaSink {
    fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData {
            kind: NodeKind::Document,
            ns: Namespace::Html,
        });

        ArenaSink {
            arena: RefCell::new(arena),
            document,
            doctype: RefCell::new(None),
        }
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let arena = self.arena.into_inner();

        let root = self
            .document
            .children(&arena)
            .find(|&id| matches!(arena[id].get().kind, NodeKind::Element(_)))
            .unwrap_or(self.document);

        Document {
            arena,
            document: self.document,
            root,
            doctype: self.doctype.into_inner(),
        }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // html5ever recovers on its own
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        let node = arena[*target].get();

        let (ns, local) = match &node.kind {
            NodeKind::Element(elem) => (node.ns, LocalName::from(elem.tag.as_ref())),
            _ => (Namespace::Html, LocalName::from("")),
        };

        OwnedElemName(QualName {
            prefix: None,
            ns: html5ever::Namespace::from(ns.url()),
            local,
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs: IndexMap<_, _> = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value))
            .collect();

        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Element(ElementData {
                tag: StrTendril::from(name.local.as_ref()),
                attrs,
            }),
            ns: Namespace::from_url(name.ns.as_ref()),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(text),
            ns: Namespace::Html,
        })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        // Processing instructions - create empty comment
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(StrTendril::new()),
            ns: Namespace::Html,
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                parent.append(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                // Merge with a trailing text node, like a browser
                if let Some(last_child) = arena[*parent].last_child()
                    && let NodeKind::Text(existing) = &mut arena[last_child].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = arena.new_node(NodeData {
                    kind: NodeKind::Text(text),
                    ns: Namespace::Html,
                });
                parent.append(text_node, &mut arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                sibling.insert_before(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                if let Some(prev) = arena[*sibling].previous_sibling()
                    && let NodeKind::Text(existing) = &mut arena[prev].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = arena.new_node(NodeData {
                    kind: NodeKind::Text(text),
                    ns: Namespace::Html,
                });
                sibling.insert_before(text_node, &mut arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        *self.doctype.borrow_mut() = Some(name);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents live directly under the <template> element
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = &mut arena[*target].get_mut().kind {
            for attr in attrs {
                elem.attrs
                    .entry(attr.name.local.to_string())
                    .or_insert(attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&arena).collect();
        for child in children {
            child.detach(&mut arena);
            new_parent.append(child, &mut arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_lands_in_body() {
        let doc = parse("test<b>ing</b>123");
        let body = doc.body().expect("should have body");
        let kids: Vec<_> = doc.children(body).collect();
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.text(kids[0]), Some("test"));
        assert_eq!(doc.tag(kids[1]), Some("b"));
        assert_eq!(doc.text(kids[2]), Some("123"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let doc = parse(r#"<div class="container note" id="main">Content</div>"#);
        let body = doc.body().expect("should have body");
        let div = doc.first_child(body).expect("body should have div");
        let el = doc.element(div).expect("div is an element");

        assert_eq!(el.tag(), "div");
        assert_eq!(el.attr("id"), Some("main"));
        assert!(el.has_class("note"));
        assert!(!el.has_class("contain"));
    }

    #[test]
    fn test_detached_node_keeps_identity() {
        let mut doc = parse("<p>one</p><p>two</p>");
        let body = doc.body().unwrap();
        let first = doc.first_child(body).unwrap();
        let second = doc.next_sibling(first).unwrap();

        doc.detach(first);
        assert_eq!(doc.to_html(), "<p>two</p>");
        assert_eq!(doc.text_content(first), "one");

        doc.insert_before(second, first);
        assert_eq!(doc.to_html(), "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_replace_and_deep_clone() {
        let mut doc = parse(r#"<span class="x"><i>a</i></span>b"#);
        let body = doc.body().unwrap();
        let span = doc.first_child(body).unwrap();
        let text = doc.next_sibling(span).unwrap();

        let copy = doc.deep_clone(span);
        assert!(doc.parent(copy).is_none());
        doc.replace(text, copy);

        assert_eq!(
            doc.to_html(),
            r#"<span class="x"><i>a</i></span><span class="x"><i>a</i></span>"#
        );
        assert!(doc.parent(text).is_none());
    }

    #[test]
    fn test_set_text_only_touches_text_nodes() {
        let mut doc = parse("<em>x</em>");
        let body = doc.body().unwrap();
        let em = doc.first_child(body).unwrap();
        let x = doc.first_child(em).unwrap();

        assert!(!doc.set_text(em, "nope"));
        assert!(doc.set_text(x, "y"));
        assert_eq!(doc.to_html(), "<em>y</em>");
    }

    #[test]
    fn test_contains_is_inclusive() {
        let mut doc = parse("<p><em>x</em></p>y");
        let body = doc.body().unwrap();
        let p = doc.first_child(body).unwrap();
        let em = doc.first_child(p).unwrap();
        let x = doc.first_child(em).unwrap();
        let y = doc.next_sibling(p).unwrap();

        assert!(doc.contains(x, x));
        assert!(doc.contains(p, x));
        assert!(doc.contains(body, x));
        assert!(!doc.contains(x, p));
        assert!(!doc.contains(p, y));
    }

    #[test]
    fn test_remove_frees_subtree() {
        let mut doc = parse("");
        let span = doc.create_element("span");
        let text = doc.create_text("z");
        doc.append(span, text);

        doc.remove(span);
        assert!(span.is_removed(&doc.arena));
        assert!(text.is_removed(&doc.arena));
    }

    #[test]
    fn test_parse_doctype() {
        let doc = parse("<!DOCTYPE html><html><body></body></html>");
        assert_eq!(doc.doctype.as_ref().map(|d| d.as_ref()), Some("html"));
        assert_eq!(doc.tag(doc.root), Some("html"));
        assert!(doc.head().is_some());
    }
}
