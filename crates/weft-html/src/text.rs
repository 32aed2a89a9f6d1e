use weft_core::{Component, InstanceNode};

use crate::element::{ELEMENT, TEXT};

const BLOCK_TAGS: &[&str] = &["div", "p", "li", "pre", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Serializes the children of `root` as terminal text.
///
/// Text nodes contribute their value unescaped. Block tags finish their line,
/// `br` always starts a new one, and everything else is transparent.
pub fn render_to_text(root: &InstanceNode) -> String {
    let mut out = String::new();
    for child in root.children() {
        write_node(&child, &mut out);
    }
    out
}

fn write_node(node: &InstanceNode, out: &mut String) {
    let component = node.component();
    if Component::same(component, &TEXT) {
        if let Some(value) = node.props().get("value") {
            out.push_str(&value.to_string());
        }
        return;
    }
    for child in node.children() {
        write_node(&child, out);
    }
    if !Component::same(component, &ELEMENT) {
        return;
    }
    match node.props().get_str("tag") {
        Some("br") => out.push('\n'),
        Some(tag) if BLOCK_TAGS.contains(&tag) && !out.is_empty() && !out.ends_with('\n') => {
            out.push('\n')
        }
        _ => {}
    }
}
