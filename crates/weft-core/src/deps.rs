use smallvec::SmallVec;

use crate::props::PropValue;

/// Dependency list gating effects, memos, callbacks and reducer re-initialisation.
///
/// Lists are compared element-wise. A length change counts as a change, and a
/// `Null` element never compares equal, so it re-fires on every render.
#[derive(Clone, Default, Debug)]
pub struct Deps(SmallVec<[PropValue; 4]>);

impl Deps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I: IntoIterator<Item = PropValue>>(values: I) -> Self {
        Self(values.into_iter().collect())
    }

    pub fn push(mut self, value: impl Into<PropValue>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[PropValue] {
        &self.0
    }

    pub fn changed_from(&self, previous: &Deps) -> bool {
        self.0.len() != previous.0.len()
            || self
                .0
                .iter()
                .zip(previous.0.iter())
                .any(|(next, prev)| next.is_null() || prev.is_null() || next != prev)
    }
}

impl FromIterator<PropValue> for Deps {
    fn from_iter<I: IntoIterator<Item = PropValue>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

/// Whether freshly supplied deps invalidate the stored ones.
///
/// `None` means "first render only" and never invalidates.
pub(crate) fn deps_changed(next: &Option<Deps>, stored: &Option<Deps>) -> bool {
    match (next, stored) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(next), Some(stored)) => next.changed_from(stored),
    }
}

/// Builds `Some(Deps)` from values convertible into [`PropValue`].
///
/// `deps![]` is an empty list: the value is computed once and never again.
#[macro_export]
macro_rules! deps {
    () => {
        ::core::option::Option::Some($crate::Deps::new())
    };
    ($($value:expr),+ $(,)?) => {
        ::core::option::Option::Some($crate::Deps::from_values([
            $($crate::PropValue::from($value)),+
        ]))
    };
}
