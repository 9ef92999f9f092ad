//! Find and replace text in an HTML tree, across element boundaries.
//!
//! dredge provides:
//! - **Aggregation**: the tree's text as one searchable string, with block
//!   elements (or whatever you choose) kept apart so matches can't bleed
//!   across them
//! - **Matching**: any `regex` pattern, or a plain substring
//! - **Rewriting**: each match is split across the text nodes it touches and
//!   replaced, wrapped or handed to your callback one portion at a time
//! - **Revert**: every edit is logged and can be undone in one call
//!
//! # Example
//!
//! ```rust
//! use dredge::{Find, Options, find, parse};
//! use regex::Regex;
//!
//! let mut doc = parse("<p>Hello <em>wor</em>ld!</p>");
//! let body = doc.body().unwrap();
//!
//! let options = Options::new(Find::all(Regex::new("world").unwrap())).wrap("mark");
//! let mut finder = find(&mut doc, body, options).unwrap();
//! assert_eq!(
//!     doc.to_html(),
//!     "<p>Hello <em><mark>wor</mark></em><mark>ld</mark>!</p>"
//! );
//!
//! finder.revert(&mut doc);
//! assert_eq!(doc.to_html(), "<p>Hello <em>wor</em>ld!</p>");
//! ```

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod aggregate;
mod config;
pub mod dom;
mod error;
mod finder;
mod matcher;
mod options;
mod portion;
mod revert;
mod rewrite;
pub mod serialize;

pub use aggregate::{Aggregation, leaves};
pub use config::FindConfig;
pub use dom::{Document, ElementRef, parse};
pub use error::FindError;
pub use finder::{Finder, find};
pub use matcher::Match;
pub use options::{
    ElementPredicate, Find, ForceContext, NON_CONTIGUOUS_PROSE_ELEMENTS, NON_PROSE_ELEMENTS,
    Options, PortionMode, Preset, Replace, ReplaceFn, Wrap, is_non_inline_prose, is_prose,
};
pub use portion::Portion;
pub use rewrite::{Replacement, interpolate};
pub use serialize::SerializeOptions;

pub use indextree::NodeId;
