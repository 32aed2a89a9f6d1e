//! Host elements and serializers for weft trees.
//!
//! [`ELEMENT`] and [`TEXT`] are host components: they render nothing of their
//! own beyond their children, and the serializers here turn a committed tree
//! of them into HTML ([`render_to_html`]) or terminal text
//! ([`render_to_text`]). Any other component is transparent to both.

mod element;
mod html;
mod text;

pub use element::{h, text, ELEMENT, TEXT};
pub use html::render_to_html;
pub use text::render_to_text;

/// Per-tag shorthands for [`h`].
pub mod tags {
    use weft_core::DescriptorBuilder;

    macro_rules! tags {
        ($($name:ident),* $(,)?) => {
            $(
                pub fn $name() -> DescriptorBuilder {
                    crate::h(stringify!($name))
                }
            )*
        };
    }

    tags!(
        a, article, br, button, code, div, em, footer, form, h1, h2, h3, h4, h5, h6, header,
        img, input, label, li, main, nav, ol, p, pre, section, span, strong, ul,
    );
}

#[cfg(test)]
#[path = "tests/html_tests.rs"]
mod html_tests;

#[cfg(test)]
#[path = "tests/text_tests.rs"]
mod text_tests;
