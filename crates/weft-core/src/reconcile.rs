//! Matching freshly rendered descriptors against a node's previous children.
//!
//! Identity is `(key, component)`. Children without an explicit key fall back
//! to their position, computed against the old list for old children and the
//! new list for new ones. That fallback is only reliable for lists whose
//! length never changes; when an unkeyed child is reused positionally after a
//! resize the scheduler receives [`Diagnostic::PositionalReuseAfterResize`].

use crate::descriptor::{Component, Descriptor};
use crate::diagnostics::Diagnostic;
use crate::node::InstanceNode;
use crate::props::Key;

/// Sibling identity used for matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Explicit(Key),
    Positional(usize),
}

impl IdentityKey {
    pub fn new(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => IdentityKey::Explicit(key.clone()),
            None => IdentityKey::Positional(index),
        }
    }
}

pub(crate) struct Reconciled {
    pub(crate) children: Vec<InstanceNode>,
    pub(crate) orphans: Vec<InstanceNode>,
}

pub(crate) fn reconcile(
    parent: &InstanceNode,
    previous: Vec<InstanceNode>,
    descriptors: Vec<Descriptor>,
) -> Reconciled {
    let old_keys: Vec<IdentityKey> = previous
        .iter()
        .enumerate()
        .map(|(index, child)| IdentityKey::new(child.key(), index))
        .collect();
    let mut claimed = vec![false; previous.len()];
    let resized = !previous.is_empty() && previous.len() != descriptors.len();
    let scheduler = parent.scheduler();
    let warn_unkeyed = scheduler
        .upgrade()
        .map_or(true, |scheduler| scheduler.config().warn_unkeyed_siblings);
    let mut children: Vec<InstanceNode> = Vec::with_capacity(descriptors.len());
    let mut warned: Vec<&'static Component> = Vec::new();

    for (index, descriptor) in descriptors.into_iter().enumerate() {
        let component = descriptor.component();
        let key = IdentityKey::new(descriptor.key(), index);
        let warn_here = warn_unkeyed && !component.is_host();

        if warn_here
            && descriptor.key().is_none()
            && !warned.iter().any(|seen| Component::same(seen, component))
            && children.iter().any(|sibling| {
                sibling.key().is_none() && Component::same(sibling.component(), component)
            })
        {
            warned.push(component);
            scheduler.report(Diagnostic::DuplicateUnkeyedSibling {
                parent: parent.name(),
                component: component.name(),
            });
        }

        let matched = previous.iter().enumerate().position(|(old_index, child)| {
            !claimed[old_index]
                && old_keys[old_index] == key
                && Component::same(child.component(), component)
        });

        let node = match matched {
            Some(old_index) => {
                claimed[old_index] = true;
                let node = previous[old_index].clone();
                if resized && warn_here && matches!(key, IdentityKey::Positional(_)) {
                    scheduler.report(Diagnostic::PositionalReuseAfterResize {
                        parent: parent.name(),
                        component: component.name(),
                        index,
                    });
                }
                let (_, props, _) = descriptor.into_parts();
                node.replace_props(props);
                node
            }
            None => parent.create_child(descriptor),
        };
        children.push(node);
    }

    let orphans = previous
        .into_iter()
        .zip(claimed)
        .filter_map(|(child, claimed)| (!claimed).then_some(child))
        .collect();

    Reconciled { children, orphans }
}
