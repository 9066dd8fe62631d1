//! Process-wide repository resolution.
//!
//! [`EntityManager`] maps an entity type to the repository serving it.
//! A binding is either a ready instance or a deferred factory; a factory
//! runs at most once, on first resolution, and its product is cached for
//! every later call. Bindings are keyed by [`type_name`], so each entity
//! type has exactly one slot and re-registration replaces it.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::repository::Repository;

type TypeKey = &'static str;

enum Slot {
    Ready(Box<dyn Any + Send + Sync>),
    Pending(Box<dyn FnOnce() -> Box<dyn Any + Send + Sync> + Send + Sync>),
}

/// Shared registry of repositories, one per entity type.
///
/// Cloning is cheap and every clone sees the same bindings.
#[derive(Clone, Default)]
pub struct EntityManager {
    slots: Arc<RwLock<HashMap<TypeKey, Slot>>>,
}

impl EntityManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a ready repository to `T`, replacing any earlier binding.
    pub fn register<T>(&self, repository: Arc<dyn Repository<T>>)
    where
        T: Send + Sync + 'static,
    {
        let key = type_name::<T>();
        tracing::debug!(entity = key, "repository registered");
        self.slots
            .write()
            .insert(key, Slot::Ready(Box::new(repository)));
    }

    /// Binds a deferred constructor to `T`, replacing any earlier binding.
    ///
    /// The factory runs inside the registry lock on first resolution; it
    /// must not resolve repositories from the same manager.
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Arc<dyn Repository<T>> + Send + Sync + 'static,
    {
        let key = type_name::<T>();
        tracing::debug!(entity = key, "repository factory registered");
        let make: Box<dyn FnOnce() -> Box<dyn Any + Send + Sync> + Send + Sync> =
            Box::new(move || Box::new(factory()) as Box<dyn Any + Send + Sync>);
        self.slots.write().insert(key, Slot::Pending(make));
    }

    /// Resolves the repository bound to `T`.
    ///
    /// Repeated calls return the same instance.
    ///
    /// # Errors
    ///
    /// [`Error::RepositoryNotFound`] when nothing was bound to `T`, and
    /// [`Error::BindingTypeMismatch`] when the slot holds a repository of
    /// a different entity type.
    pub fn repository<T>(&self) -> Result<Arc<dyn Repository<T>>>
    where
        T: Send + Sync + 'static,
    {
        let key = type_name::<T>();
        {
            let slots = self.slots.read();
            match slots.get(key) {
                Some(Slot::Ready(boxed)) => return Self::downcast::<T>(boxed.as_ref(), key),
                Some(Slot::Pending(_)) => {}
                None => return Err(Error::RepositoryNotFound { entity: key }),
            }
        }

        // The factory may have been raced; settle it under the write lock.
        let mut slots = self.slots.write();
        match slots.remove(key) {
            Some(Slot::Ready(boxed)) => {
                let resolved = Self::downcast::<T>(boxed.as_ref(), key);
                slots.insert(key, Slot::Ready(boxed));
                resolved
            }
            Some(Slot::Pending(make)) => {
                let boxed = make();
                tracing::debug!(entity = key, "repository factory resolved");
                let resolved = Self::downcast::<T>(boxed.as_ref(), key);
                slots.insert(key, Slot::Ready(boxed));
                resolved
            }
            None => Err(Error::RepositoryNotFound { entity: key }),
        }
    }

    /// Saves `entity` through the repository bound to its type.
    ///
    /// # Errors
    ///
    /// Resolution errors as in [`repository`](Self::repository), then
    /// whatever the save itself reports.
    pub async fn persist<T>(&self, entity: &T) -> Result<bool>
    where
        T: Send + Sync + 'static,
    {
        let repository = self.repository::<T>()?;
        repository.persist(entity).await
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.slots.read().contains_key(type_name::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Drops every binding. A factory registered but never resolved is
    /// dropped unrun. Mostly useful in tests.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    fn downcast<T>(
        boxed: &(dyn Any + Send + Sync),
        key: &'static str,
    ) -> Result<Arc<dyn Repository<T>>>
    where
        T: Send + Sync + 'static,
    {
        boxed
            .downcast_ref::<Arc<dyn Repository<T>>>()
            .cloned()
            .ok_or(Error::BindingTypeMismatch { entity: key })
    }
}
