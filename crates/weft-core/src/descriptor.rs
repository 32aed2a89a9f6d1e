use std::fmt;

use crate::error::RenderError;
use crate::props::{Key, PropValue, Props};

/// Signature of a component's render function.
pub type RenderFn = fn(&Props) -> Result<Output, RenderError>;

/// A reusable render function with a stable identity.
///
/// Components live in `static` items; identity is the address of that static,
/// so two components with the same name are still distinct.
pub struct Component {
    name: &'static str,
    render: RenderFn,
    host: bool,
}

impl Component {
    pub const fn new(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            render,
            host: false,
        }
    }

    /// A stateless leaf that output serializers map to a concrete element.
    ///
    /// Unkeyed host siblings are expected, so reconciliation does not warn
    /// about them.
    pub const fn host(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            render,
            host: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_host(&self) -> bool {
        self.host
    }

    /// Identity comparison used by reconciliation.
    pub fn same(a: &Component, b: &Component) -> bool {
        std::ptr::eq(a, b)
    }

    /// Starts a descriptor for this component.
    pub fn el(&'static self) -> DescriptorBuilder {
        DescriptorBuilder::new(self)
    }

    pub fn describe(&'static self, props: Props) -> Descriptor {
        Descriptor::new(self, props)
    }

    pub(crate) fn invoke(&self, props: &Props) -> Result<Output, RenderError> {
        (self.render)(props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({} @ {:p})", self.name, self)
    }
}

/// Immutable request to render a component with given props under an optional key.
#[derive(Clone)]
pub struct Descriptor {
    component: &'static Component,
    props: Props,
    key: Option<Key>,
}

impl Descriptor {
    pub fn new(component: &'static Component, props: Props) -> Self {
        Self {
            component,
            props,
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn component(&self) -> &'static Component {
        self.component
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub(crate) fn into_parts(self) -> (&'static Component, Props, Option<Key>) {
        (self.component, self.props, self.key)
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        Component::same(self.component, other.component)
            && self.key == other.key
            && self.props == other.props
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Descriptor");
        out.field("component", &self.component.name);
        if let Some(key) = &self.key {
            out.field("key", key);
        }
        out.field("props", &self.props).finish()
    }
}

/// Fluent constructor returned by [`Component::el`].
#[must_use = "call `build` or convert into a Descriptor"]
pub struct DescriptorBuilder {
    component: &'static Component,
    props: Props,
    key: Option<Key>,
    children: Vec<Descriptor>,
}

impl DescriptorBuilder {
    fn new(component: &'static Component) -> Self {
        Self {
            component,
            props: Props::new(),
            key: None,
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name, value);
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        for (name, value) in props.iter() {
            self.props.insert(name, value.clone());
        }
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<Descriptor>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Descriptor>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Descriptor {
        let mut props = self.props;
        if !self.children.is_empty() {
            props.insert(Props::CHILDREN, self.children);
        }
        Descriptor {
            component: self.component,
            props,
            key: self.key,
        }
    }
}

impl From<DescriptorBuilder> for Descriptor {
    fn from(builder: DescriptorBuilder) -> Self {
        builder.build()
    }
}

/// Everything a render function may return: zero or more descriptors.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Output(Vec<Descriptor>);

impl Output {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Descriptor> {
        self.0
    }
}

impl From<()> for Output {
    fn from(_: ()) -> Self {
        Output::empty()
    }
}

impl From<Descriptor> for Output {
    fn from(descriptor: Descriptor) -> Self {
        Output(vec![descriptor])
    }
}

impl From<DescriptorBuilder> for Output {
    fn from(builder: DescriptorBuilder) -> Self {
        Output(vec![builder.build()])
    }
}

impl From<Option<Descriptor>> for Output {
    fn from(descriptor: Option<Descriptor>) -> Self {
        Output(descriptor.into_iter().collect())
    }
}

impl From<Vec<Descriptor>> for Output {
    fn from(descriptors: Vec<Descriptor>) -> Self {
        Output(descriptors)
    }
}

impl From<&[Descriptor]> for Output {
    fn from(descriptors: &[Descriptor]) -> Self {
        Output(descriptors.to_vec())
    }
}

impl FromIterator<Descriptor> for Output {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        Output(iter.into_iter().collect())
    }
}

impl IntoIterator for Output {
    type Item = Descriptor;
    type IntoIter = std::vec::IntoIter<Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
