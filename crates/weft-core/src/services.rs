use std::any::{type_name, Any};
use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::error::ServiceError;

/// Named, lazily created singletons scoped to one [`crate::Root`].
///
/// Every node mounted under a root shares its registry, so two trees never
/// observe each other's services.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the service registered under `name`, creating it on first use.
    pub fn get_or_init<T: 'static>(
        &self,
        name: &str,
        factory: impl FnOnce() -> T,
    ) -> Result<Rc<T>, ServiceError> {
        if let Some(existing) = self.lookup::<T>(name)? {
            return Ok(existing);
        }
        // The factory may itself resolve other services.
        let created: Rc<dyn Any> = Rc::new(factory());
        let stored = Rc::clone(
            self.services
                .borrow_mut()
                .entry(name.to_string())
                .or_insert(created),
        );
        Self::downcast(name, stored)
    }

    pub fn get<T: 'static>(&self, name: &str) -> Result<Option<Rc<T>>, ServiceError> {
        self.lookup(name)
    }

    /// Registers `value` ahead of first use, replacing any existing entry.
    pub fn insert<T: 'static>(&self, name: impl Into<String>, value: T) -> Rc<T> {
        let value = Rc::new(value);
        self.services
            .borrow_mut()
            .insert(name.into(), Rc::clone(&value) as Rc<dyn Any>);
        value
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.borrow().is_empty()
    }

    pub fn clear(&self) {
        let drained: Vec<Rc<dyn Any>> = self
            .services
            .borrow_mut()
            .drain()
            .map(|(_, service)| service)
            .collect();
        log::debug!("dropping {} services", drained.len());
        drop(drained);
    }

    fn lookup<T: 'static>(&self, name: &str) -> Result<Option<Rc<T>>, ServiceError> {
        let existing = self.services.borrow().get(name).cloned();
        existing
            .map(|service| Self::downcast(name, service))
            .transpose()
    }

    fn downcast<T: 'static>(name: &str, service: Rc<dyn Any>) -> Result<Rc<T>, ServiceError> {
        service
            .downcast::<T>()
            .map_err(|_| ServiceError::TypeMismatch {
                name: name.to_string(),
                requested: type_name::<T>(),
            })
    }
}
