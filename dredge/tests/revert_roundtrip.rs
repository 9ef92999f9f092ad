//! Revert roundtrip tests using datatest-stable.
//!
//! Each test case is a file in `tests/revert-cases/` with format:
//! ```
//! <pattern>
//! ===
//! <HTML>
//! ```
//!
//! The test wraps every match, checks the text didn't change, reverts, and
//! checks the tree serializes exactly like the original.

use dredge::{Find, Options, SerializeOptions, find, parse};
use regex::Regex;
use std::path::Path;

fn run_revert_test(path: &Path) -> datatest_stable::Result<()> {
    facet_testhelpers::setup();

    let content = std::fs::read_to_string(path)?;
    let parts: Vec<&str> = content.split("\n===\n").collect();

    if parts.len() != 2 {
        return Err(format!(
            "Test file must have exactly one '===' separator, found {} parts",
            parts.len()
        )
        .into());
    }

    let pattern = parts[0].trim();
    let html = parts[1].trim();
    let regex = Regex::new(pattern).map_err(|e| format!("bad pattern {pattern:?}: {e}"))?;

    let mut doc = parse(html);
    let body = doc.body().ok_or("document has no body")?;
    let serialize = SerializeOptions::new().sort_attributes();
    let original = doc.inner_html_with(body, &serialize);
    let original_text = doc.text_content(body);

    let options = Options::new(Find::all(regex)).wrap("mark").wrap_class("hit");
    let mut finder = find(&mut doc, body, options).map_err(|e| format!("find failed: {e:?}"))?;

    if finder.matches().is_empty() {
        return Err(format!("Pattern {pattern:?} found nothing in {html}").into());
    }

    let wrapped = doc.inner_html_with(body, &serialize);
    let wrapped_text = doc.text_content(body);
    if wrapped_text != original_text {
        return Err(format!(
            "Wrapping changed the text!\nBefore: {original_text:?}\nAfter: {wrapped_text:?}\nHTML: {wrapped}"
        )
        .into());
    }

    finder.revert(&mut doc);
    let result = doc.inner_html_with(body, &serialize);

    if result != original {
        return Err(format!(
            "Revert failed!\nPattern: {pattern}\nOriginal: {original}\nWrapped: {wrapped}\nResult: {result}"
        )
        .into());
    }

    Ok(())
}

datatest_stable::harness! {
    { test = run_revert_test, root = "tests/revert-cases", pattern = r".*\.html$" },
}
