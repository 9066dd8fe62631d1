//! ORM-facing record type produced and consumed by the mapping engine.
//!
//! sea-orm models are flat structs with no notion of relation-loading
//! state, so conversions work on a [`Record`]: the model's active form
//! plus a relation bag. The bag distinguishes "never loaded" (no entry)
//! from "loaded as null" ([`RelationState::Null`]), which keeps nullable
//! relations explicit on both sides of a conversion.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Value};

use crate::error::{Error, Result};

pub(crate) type EntityOf<A> = <A as ActiveModelTrait>::Entity;
pub(crate) type ModelOf<A> = <EntityOf<A> as EntityTrait>::Model;
pub(crate) type ColumnOf<A> = <EntityOf<A> as EntityTrait>::Column;

/// Loading state of one relation on a [`Record`].
///
/// Nested payloads are type-erased `Record`s of the related pair; the
/// mapping engine downcasts them back when converting to entities.
pub enum RelationState {
    /// Loaded, and explicitly empty.
    Null,
    /// A loaded to-one relation.
    One(Box<dyn Any + Send>),
    /// A loaded to-many relation.
    Many(Vec<Box<dyn Any + Send>>),
}

impl RelationState {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Debug for RelationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::One(_) => f.write_str("One(..)"),
            Self::Many(items) => write!(f, "Many(len={})", items.len()),
        }
    }
}

/// A model's active form plus its relation-loading state.
pub struct Record<A: ActiveModelTrait> {
    active: A,
    relations: BTreeMap<&'static str, RelationState>,
}

impl<A: ActiveModelTrait> Record<A> {
    /// Fresh record: every column unset, no relations loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: A::default(),
            relations: BTreeMap::new(),
        }
    }

    /// Wraps a fetched model; columns come through as unchanged values.
    #[must_use]
    pub fn from_model(model: ModelOf<A>) -> Self
    where
        ModelOf<A>: IntoActiveModel<A>,
    {
        Self {
            active: model.into_active_model(),
            relations: BTreeMap::new(),
        }
    }

    /// Current value of a column, `None` when unset.
    #[must_use]
    pub fn get(&self, col: ColumnOf<A>) -> Option<Value> {
        self.active.get(col).into_value()
    }

    pub fn set(&mut self, col: ColumnOf<A>, value: Value) {
        self.active.set(col, value);
    }

    /// Marks a relation as loaded with the given state.
    pub fn set_relation(&mut self, name: &'static str, state: RelationState) {
        self.relations.insert(name, state);
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationState> {
        self.relations.get(name)
    }

    /// Whether the relation was loaded at all (a null load counts).
    #[must_use]
    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.relations.keys().copied()
    }

    #[must_use]
    pub fn active(&self) -> &A {
        &self.active
    }

    /// Consumes the record, yielding the active model for persistence.
    /// Relation state is bookkeeping only and is never cascaded.
    #[must_use]
    pub fn into_active(self) -> A {
        self.active
    }
}

impl<A: ActiveModelTrait> Default for Record<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ActiveModelTrait> fmt::Debug for Record<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("active", &self.active)
            .field("relations", &self.relations)
            .finish()
    }
}

/// Downcast helper used by relation installers; a payload of the wrong
/// record type is a conversion-shape error.
pub(crate) fn downcast_record<'a, A: ActiveModelTrait + 'static>(
    payload: &'a (dyn Any + Send),
    model: &'static str,
) -> Result<&'a Record<A>> {
    payload
        .downcast_ref::<Record<A>>()
        .ok_or(Error::InvalidModel { model })
}
