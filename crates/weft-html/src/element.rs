use weft_core::{Component, Descriptor, DescriptorBuilder, Output, PropValue, Props, RenderError};

/// A tag with attributes, named by its `tag` prop.
pub static ELEMENT: Component = Component::host("Element", render_element);

/// A run of text carried in its `value` prop.
pub static TEXT: Component = Component::host("Text", render_text);

fn render_element(props: &Props) -> Result<Output, RenderError> {
    if props.get_str("tag").is_none() {
        return Err(RenderError::Component {
            component: ELEMENT.name(),
            message: "missing required prop `tag`".to_string(),
        });
    }
    Ok(props.children().into())
}

fn render_text(_props: &Props) -> Result<Output, RenderError> {
    Ok(Output::empty())
}

/// Starts an element descriptor: `h("div").prop("class_", "card").child(..)`.
pub fn h(tag: &str) -> DescriptorBuilder {
    ELEMENT.el().prop("tag", tag)
}

pub fn text(value: impl Into<PropValue>) -> Descriptor {
    TEXT.el().prop("value", value).build()
}
