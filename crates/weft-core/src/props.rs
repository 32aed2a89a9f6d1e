use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::descriptor::Descriptor;

/// Explicit sibling identity attached to a [`Descriptor`].
pub type Key = Rc<str>;

/// Shared, pointer-compared function value that can travel inside [`Props`].
pub struct Callback<A = PropValue> {
    func: Rc<dyn Fn(A)>,
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<A: 'static> Callback<A> {
    pub fn new(func: impl Fn(A) + 'static) -> Self {
        Self {
            func: Rc::new(func),
        }
    }
}

impl<A> Callback<A> {
    pub fn call(&self, arg: A) {
        (self.func)(arg)
    }

    /// Two callbacks are the same only if they share one allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl<A> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.func) as *const ())
    }
}

/// A single prop value.
///
/// Equality is structural for data variants and by identity for
/// [`PropValue::Callback`] and [`PropValue::Shared`]. `Float` follows IEEE
/// semantics, so `NaN` never equals itself.
#[derive(Clone, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Vec<PropValue>),
    Map(Props),
    Children(Vec<Descriptor>),
    Callback(Callback),
    Shared(Rc<dyn Any>),
}

impl PropValue {
    pub fn shared<T: 'static>(value: T) -> Self {
        PropValue::Shared(Rc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Props> {
        match self {
            PropValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_children(&self) -> Option<&[Descriptor]> {
        match self {
            PropValue::Children(children) => Some(children),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            PropValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    /// Downcasts a [`PropValue::Shared`] payload.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Shared(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PropValue::Null => "null",
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Float(_) => "float",
            PropValue::Str(_) => "str",
            PropValue::List(_) => "list",
            PropValue::Map(_) => "map",
            PropValue::Children(_) => "children",
            PropValue::Callback(_) => "callback",
            PropValue::Shared(_) => "shared",
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::List(a), PropValue::List(b)) => a == b,
            (PropValue::Map(a), PropValue::Map(b)) => a == b,
            (PropValue::Children(a), PropValue::Children(b)) => a == b,
            (PropValue::Callback(a), PropValue::Callback(b)) => a.ptr_eq(b),
            (PropValue::Shared(a), PropValue::Shared(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(value) => write!(f, "{value:?}"),
            PropValue::Int(value) => write!(f, "{value:?}"),
            PropValue::Float(value) => write!(f, "{value:?}"),
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::List(items) => f.debug_list().entries(items).finish(),
            PropValue::Map(map) => map.fmt(f),
            PropValue::Children(children) => f.debug_list().entries(children).finish(),
            PropValue::Callback(callback) => callback.fmt(f),
            PropValue::Shared(value) => write!(f, "Shared({:p})", Rc::as_ptr(value) as *const ()),
        }
    }
}

/// Plain-text rendering used by serializers. Lists are space separated.
impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Str(value) => f.write_str(value),
            PropValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            PropValue::Map(map) => {
                for (index, (name, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{name}:{value}")?;
                }
                Ok(())
            }
            PropValue::Children(children) => write!(f, "[{} children]", children.len()),
            PropValue::Callback(_) => f.write_str("<callback>"),
            PropValue::Shared(_) => f.write_str("<shared>"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

macro_rules! int_prop {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Int(value as i64)
                }
            }
        )*
    };
}

int_prop!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        PropValue::Float(value as f64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        PropValue::List(value)
    }
}

impl From<Props> for PropValue {
    fn from(value: Props) -> Self {
        PropValue::Map(value)
    }
}

impl From<Vec<Descriptor>> for PropValue {
    fn from(value: Vec<Descriptor>) -> Self {
        PropValue::Children(value)
    }
}

impl From<Descriptor> for PropValue {
    fn from(value: Descriptor) -> Self {
        PropValue::Children(vec![value])
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        PropValue::Callback(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

/// Ordered prop bag handed to a component's render function.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub const CHILDREN: &'static str = "children";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropValue>,
    ) -> Option<PropValue> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.entries.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn get_callback(&self, name: &str) -> Option<&Callback> {
        self.get(name).and_then(PropValue::as_callback)
    }

    pub fn get_shared<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(PropValue::downcast::<T>)
    }

    /// Children passed under the reserved `children` prop.
    pub fn children(&self) -> &[Descriptor] {
        self.get(Self::CHILDREN)
            .and_then(PropValue::as_children)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Builds [`Props`] from `name => value` pairs.
#[macro_export]
macro_rules! props {
    () => { $crate::Props::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::Props::new();
        $( props.insert($name, $value); )+
        props
    }};
}
