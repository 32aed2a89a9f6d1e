use std::fmt::Write as _;

use weft_core::{Component, InstanceNode, PropValue, Props};

use crate::element::{ELEMENT, TEXT};

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

/// Serializes the children of `root` to HTML.
///
/// `root` is the application component and is not emitted itself.
pub fn render_to_html(root: &InstanceNode) -> String {
    let mut out = String::new();
    for child in root.children() {
        write_node(&child, &mut out);
    }
    out
}

/// Whether `name` is safe to emit as a tag or attribute name.
fn is_markup_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

fn write_node(node: &InstanceNode, out: &mut String) {
    let component = node.component();
    let props = node.props();
    if Component::same(component, &TEXT) {
        if let Some(value) = props.get("value") {
            out.push_str(&html_escape::encode_text(&value.to_string()));
        }
        return;
    }
    if Component::same(component, &ELEMENT) {
        let tag = match props.get_str("tag").unwrap_or("div") {
            tag if is_markup_name(tag) => tag,
            tag => {
                log::warn!("invalid tag name {tag:?}; emitting <div>");
                "div"
            }
        };
        let _ = write!(out, "<{tag}");
        write_attributes(&props, out);
        out.push('>');
        if VOID_TAGS.contains(&tag) {
            return;
        }
        for child in node.children() {
            write_node(&child, out);
        }
        let _ = write!(out, "</{tag}>");
        return;
    }
    for child in node.children() {
        write_node(&child, out);
    }
}

fn write_attributes(props: &Props, out: &mut String) {
    for (name, value) in props.iter() {
        if matches!(name, "tag" | "key") || name == Props::CHILDREN {
            continue;
        }
        let value = match (name, value) {
            (_, PropValue::Null | PropValue::Bool(false)) => continue,
            (_, PropValue::Callback(_) | PropValue::Shared(_) | PropValue::Children(_)) => continue,
            (_, PropValue::Bool(true)) => None,
            ("style", PropValue::Map(style)) => Some(style_to_string(style)),
            (_, other) => Some(other.to_string()),
        };
        let attribute = attribute_name(name);
        if !is_markup_name(&attribute) {
            log::warn!("skipping invalid attribute name {name:?}");
            continue;
        }
        match value {
            Some(value) => {
                let _ = write!(
                    out,
                    " {attribute}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(&value)
                );
            }
            None => {
                out.push(' ');
                out.push_str(&attribute);
            }
        }
    }
}

fn attribute_name(name: &str) -> String {
    if name == "class_" {
        return "class".to_string();
    }
    for prefix in ["data_", "aria_"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return format!("{}-{}", &prefix[..4], rest.replace('_', "-"));
        }
    }
    name.to_string()
}

fn style_to_string(style: &Props) -> String {
    let mut out = String::new();
    for (index, (name, value)) in style.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let _ = write!(out, "{}:{value}", name.replace('_', "-"));
    }
    out
}
