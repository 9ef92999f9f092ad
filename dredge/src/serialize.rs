//! HTML5 serialization of the arena document.
//!
//! - Void elements never get end tags
//! - Text content is escaped
//! - Attribute values are escaped and double-quoted
//! - Raw text elements (script, style) are not escaped
//! - RCDATA elements (title, textarea) escape only `&` and `<`
//! - Childless foreign elements (SVG/MathML) use self-closing syntax

use crate::dom::{Document, ElementData, Namespace, NodeKind};
use indextree::NodeId;
use std::fmt::Write;

/// Options for HTML serialization.
#[derive(Clone, Debug)]
pub struct SerializeOptions {
    /// Whether to sort attributes alphabetically (default: false, which
    /// keeps source order). Sorted output is what equivalence checks use.
    pub sort_attributes: bool,
    /// Whether to escape `</script` sequences in script content (default: true)
    pub escape_script_end_tags: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            sort_attributes: false,
            escape_script_end_tags: true,
        }
    }
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable sorting attributes alphabetically for deterministic output.
    pub fn sort_attributes(mut self) -> Self {
        self.sort_attributes = true;
        self
    }

    /// Disable escaping `</script` in script content (not recommended).
    pub fn no_escape_script_end_tags(mut self) -> Self {
        self.escape_script_end_tags = false;
        self
    }
}

/// HTML5 void elements - these never have end tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements - content is not escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// RCDATA elements - only `&` and `<` are escaped.
const RCDATA_ELEMENTS: &[&str] = &["title", "textarea"];

fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_rcdata_element(tag: &str) -> bool {
    RCDATA_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

pub(crate) struct Serializer<'a> {
    doc: &'a Document,
    out: &'a mut String,
    options: &'a SerializeOptions,
}

impl<'a> Serializer<'a> {
    pub(crate) fn new(doc: &'a Document, out: &'a mut String, options: &'a SerializeOptions) -> Self {
        Self { doc, out, options }
    }

    fn write_text_escaped(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '\u{a0}' => self.out.push_str("&nbsp;"),
                _ => self.out.push(c),
            }
        }
    }

    fn write_rcdata_escaped(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                _ => self.out.push(c),
            }
        }
    }

    /// Write raw text content, optionally escaping script end tags.
    fn write_raw_text(&mut self, text: &str, tag: &str) {
        if self.options.escape_script_end_tags && tag.eq_ignore_ascii_case("script") {
            // ASCII case-insensitive match on bytes keeps indices aligned
            const PATTERN: &[u8] = b"</script";
            let bytes = text.as_bytes();
            let mut last_end = 0;
            let mut i = 0;

            while i + PATTERN.len() <= bytes.len() {
                if bytes[i..i + PATTERN.len()].eq_ignore_ascii_case(PATTERN) {
                    self.out.push_str(&text[last_end..i]);
                    self.out.push_str("<\\/script");
                    last_end = i + PATTERN.len();
                    i = last_end;
                } else {
                    i += 1;
                }
            }
            self.out.push_str(&text[last_end..]);
        } else {
            self.out.push_str(text);
        }
    }

    fn write_attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.out, " {}=\"", name);
        for c in value.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '"' => self.out.push_str("&quot;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                _ => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    pub(crate) fn write_node(&mut self, id: NodeId) {
        let doc = self.doc;
        let node = doc.get(id);
        match &node.kind {
            NodeKind::Document => {
                for child in doc.children(id) {
                    self.write_node(child);
                }
            }
            NodeKind::Element(elem) => self.write_element(id, elem, node.ns),
            NodeKind::Text(text) => self.write_text_escaped(text),
            NodeKind::Comment(text) => {
                // Escape -- to prevent early closing
                let _ = write!(self.out, "<!--{}-->", text.replace("--", "- -"));
            }
        }
    }

    fn write_element(&mut self, id: NodeId, elem: &ElementData, ns: Namespace) {
        let doc = self.doc;
        let tag = elem.tag.as_ref();
        let _ = write!(self.out, "<{}", tag);

        if self.options.sort_attributes {
            let mut attrs: Vec<_> = elem.attrs.iter().collect();
            attrs.sort_by_key(|(k, _)| *k);
            for (name, value) in attrs {
                self.write_attr(name, value);
            }
        } else {
            for (name, value) in &elem.attrs {
                self.write_attr(name, value);
            }
        }

        if ns == Namespace::Html && is_void_element(tag) {
            self.out.push('>');
            return;
        }

        let has_children = doc.first_child(id).is_some();
        if ns != Namespace::Html && !has_children {
            self.out.push_str("/>");
            return;
        }

        self.out.push('>');

        if is_raw_text_element(tag) || is_rcdata_element(tag) {
            for child in doc.children(id) {
                if let Some(text) = doc.text(child) {
                    if is_rcdata_element(tag) {
                        self.write_rcdata_escaped(text);
                    } else {
                        self.write_raw_text(text, tag);
                    }
                }
            }
        } else {
            for child in doc.children(id) {
                self.write_node(child);
            }
        }

        let _ = write!(self.out, "</{}>", tag);
    }
}
