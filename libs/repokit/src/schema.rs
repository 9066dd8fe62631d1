//! Static schema descriptors driving entity/model conversion.
//!
//! Each entity type declares an [`EntitySchema`] (its fields and how to
//! read/write them) and each model pairs with a [`ModelSchema`] (its
//! eager-loadable relations). Descriptors are built once, typically in
//! `LazyLock` statics, and consulted by every conversion; nothing here
//! touches the database except the loader hooks a repository invokes.
//!
//! ```ignore
//! static USER_SCHEMA: LazyLock<EntitySchema<User>> = LazyLock::new(|| {
//!     EntitySchema::new("User")
//!         .attribute("id", |u| u.id.into(), |u, v| Ok(u.id = take("id", v)?))
//!         .nullable_attribute("email", |u| u.email.clone().into(), |u, v| {
//!             u.email = take_opt("email", v)?;
//!             Ok(())
//!         })
//!         .relation_many(
//!             "posts",
//!             false,
//!             |u| Some(u.posts.as_slice()),
//!             |u, v| u.posts = v.unwrap_or_default(),
//!             || &POST_MAPPER,
//!         )
//! });
//! ```

use std::any::type_name;

use futures::future::BoxFuture;
use heck::ToSnakeCase;
use sea_orm::sea_query::ValueType;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, LoaderTrait, Value,
};

use crate::error::{Error, Result};
use crate::mapper::Mapper;
use crate::record::{EntityOf, ModelOf, Record, RelationState, downcast_record};

/// Housekeeping names the engine refuses to treat as relations. A field
/// carrying one of these names is skipped during conversion unless it
/// resolves to a real model column first.
pub const RESERVED_MODEL_METHODS: &[&str] = &[
    "connection",
    "delete",
    "find",
    "fresh",
    "insert",
    "primary_key",
    "query",
    "relations",
    "save",
    "table",
    "update",
];

/* ---------- value coercion ---------- */

/// Payload-null check [`Value`] itself does not expose: true when the
/// value is the null variant of its type (`Value::Int(None)` and
/// friends). Not to be confused with `ExprTrait::is_null`, which builds
/// a SQL `IS NULL` expression.
pub(crate) trait ValueExt {
    fn is_null(&self) -> bool;
}

impl ValueExt for Value {
    fn is_null(&self) -> bool {
        *self == self.as_null()
    }
}

/// Coerces a required column value into the declared field type.
///
/// # Errors
/// [`Error::TypeMismatch`] when the value is absent, null, or of an
/// incompatible type.
pub fn take<V: ValueType>(field: &str, value: Option<Value>) -> Result<V> {
    let Some(value) = value else {
        return Err(Error::TypeMismatch {
            field: field.to_owned(),
            expected: V::type_name(),
        });
    };
    <V as ValueType>::try_from(value).map_err(|_| Error::TypeMismatch {
        field: field.to_owned(),
        expected: V::type_name(),
    })
}

/// Coerces an optional column value; absent and null both become `None`.
///
/// # Errors
/// [`Error::TypeMismatch`] when a present, non-null value has an
/// incompatible type.
pub fn take_opt<V: ValueType>(field: &str, value: Option<Value>) -> Result<Option<V>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    <V as ValueType>::try_from(value)
        .map(Some)
        .map_err(|_| Error::TypeMismatch {
            field: field.to_owned(),
            expected: V::type_name(),
        })
}

/* ---------- entity-side descriptors ---------- */

/// Cardinality of a declared relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

type GetFn<T> = fn(&T) -> Value;
type SetFn<T> = fn(&mut T, Option<Value>) -> Result<()>;
type CollectFn<T> = Box<dyn Fn(&T) -> Result<Option<RelationState>> + Send + Sync>;
type InstallFn<T> = Box<dyn Fn(&mut T, &RelationState) -> Result<()> + Send + Sync>;

pub(crate) struct AttributeDef<T> {
    pub(crate) storage_key: String,
    pub(crate) nullable: bool,
    pub(crate) get: GetFn<T>,
    pub(crate) set: SetFn<T>,
}

pub(crate) struct RelationDef<T> {
    pub(crate) kind: RelationKind,
    pub(crate) nullable: bool,
    pub(crate) target: &'static str,
    pub(crate) collect: CollectFn<T>,
    pub(crate) install: InstallFn<T>,
}

pub(crate) enum FieldKind<T> {
    Attribute(AttributeDef<T>),
    Relation(RelationDef<T>),
}

/// One declared entity field: its name plus what the engine knows about
/// reading and writing it.
pub struct FieldDef<T> {
    pub(crate) name: &'static str,
    pub(crate) kind: FieldKind<T>,
}

impl<T> FieldDef<T> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `Some` when the field was declared as a relation.
    #[must_use]
    pub fn relation_kind(&self) -> Option<RelationKind> {
        match &self.kind {
            FieldKind::Relation(rel) => Some(rel.kind),
            FieldKind::Attribute(_) => None,
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match &self.kind {
            FieldKind::Attribute(attr) => attr.nullable,
            FieldKind::Relation(rel) => rel.nullable,
        }
    }
}

/// Domain-side descriptor: the declared fields of one entity type, in
/// declaration order.
pub struct EntitySchema<T> {
    name: &'static str,
    make: fn() -> T,
    fields: Vec<FieldDef<T>>,
}

impl<T: 'static> EntitySchema<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self
    where
        T: Default,
    {
        Self {
            name,
            make: T::default,
            fields: Vec::new(),
        }
    }

    /// Declares a required attribute; the storage key defaults to the
    /// `snake_case` form of `name`.
    ///
    /// # Panics
    /// On a duplicate field name.
    #[must_use]
    pub fn attribute(self, name: &'static str, get: GetFn<T>, set: SetFn<T>) -> Self {
        let key = name.to_snake_case();
        self.attribute_with_key(name, key, false, get, set)
    }

    /// Declares a nullable attribute; absent and null column values read
    /// back as `None`.
    ///
    /// # Panics
    /// On a duplicate field name.
    #[must_use]
    pub fn nullable_attribute(self, name: &'static str, get: GetFn<T>, set: SetFn<T>) -> Self {
        let key = name.to_snake_case();
        self.attribute_with_key(name, key, true, get, set)
    }

    /// Declares an attribute with an explicit storage key, for the cases
    /// where the entity and storage naming conventions differ.
    ///
    /// # Panics
    /// On a duplicate field name.
    #[must_use]
    pub fn attribute_with_key(
        mut self,
        name: &'static str,
        storage_key: impl Into<String>,
        nullable: bool,
        get: GetFn<T>,
        set: SetFn<T>,
    ) -> Self {
        self.push_field(
            name,
            FieldKind::Attribute(AttributeDef {
                storage_key: storage_key.into(),
                nullable,
                get,
                set,
            }),
        );
        self
    }

    /// Declares a to-one relation. `related` is a deferred lookup of the
    /// related pair's mapper, so mutually-referential schemas can be
    /// declared without initialization cycles.
    ///
    /// # Panics
    /// On a duplicate field name.
    #[must_use]
    pub fn relation_one<U, FA>(
        mut self,
        name: &'static str,
        nullable: bool,
        get: fn(&T) -> Option<&U>,
        set: fn(&mut T, Option<U>),
        related: fn() -> &'static Mapper<U, FA>,
    ) -> Self
    where
        U: Send + Sync + 'static,
        FA: ActiveModelTrait + Send + 'static,
    {
        let collect: CollectFn<T> = Box::new(move |entity| match get(entity) {
            Some(value) => {
                let record = related().record_from_entity(value)?;
                Ok(Some(RelationState::One(Box::new(record))))
            }
            None if nullable => Ok(Some(RelationState::Null)),
            None => Ok(None),
        });
        let install: InstallFn<T> = Box::new(move |entity, state| match state {
            RelationState::Null => {
                if nullable {
                    set(entity, None);
                }
                Ok(())
            }
            RelationState::One(payload) => {
                let mapper = related();
                let record = downcast_record::<FA>(payload.as_ref(), mapper.model_name())?;
                set(entity, Some(mapper.entity_from_record(record)?));
                Ok(())
            }
            RelationState::Many(_) => Err(Error::InvalidModel {
                model: related().model_name(),
            }),
        });
        self.push_field(
            name,
            FieldKind::Relation(RelationDef {
                kind: RelationKind::One,
                nullable,
                target: type_name::<U>(),
                collect,
                install,
            }),
        );
        self
    }

    /// Declares a to-many relation. An empty collection counts as blank
    /// and converts to an explicit null when the field is nullable.
    ///
    /// # Panics
    /// On a duplicate field name.
    #[must_use]
    pub fn relation_many<U, FA>(
        mut self,
        name: &'static str,
        nullable: bool,
        get: fn(&T) -> Option<&[U]>,
        set: fn(&mut T, Option<Vec<U>>),
        related: fn() -> &'static Mapper<U, FA>,
    ) -> Self
    where
        U: Send + Sync + 'static,
        FA: ActiveModelTrait + Send + 'static,
    {
        let collect: CollectFn<T> = Box::new(move |entity| {
            match get(entity).filter(|items| !items.is_empty()) {
                Some(items) => {
                    let mut records: Vec<Box<dyn std::any::Any + Send>> =
                        Vec::with_capacity(items.len());
                    for item in items {
                        records.push(Box::new(related().record_from_entity(item)?));
                    }
                    Ok(Some(RelationState::Many(records)))
                }
                None if nullable => Ok(Some(RelationState::Null)),
                None => Ok(None),
            }
        });
        let install: InstallFn<T> = Box::new(move |entity, state| match state {
            RelationState::Null => {
                if nullable {
                    set(entity, None);
                }
                Ok(())
            }
            RelationState::Many(payloads) => {
                let mapper = related();
                let mut items = Vec::with_capacity(payloads.len());
                for payload in payloads {
                    let record = downcast_record::<FA>(payload.as_ref(), mapper.model_name())?;
                    items.push(mapper.entity_from_record(record)?);
                }
                set(entity, Some(items));
                Ok(())
            }
            RelationState::One(_) => Err(Error::InvalidModel {
                model: related().model_name(),
            }),
        });
        self.push_field(
            name,
            FieldKind::Relation(RelationDef {
                kind: RelationKind::Many,
                nullable,
                target: type_name::<U>(),
                collect,
                install,
            }),
        );
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef<T>] {
        &self.fields
    }

    pub(crate) fn make_entity(&self) -> T {
        (self.make)()
    }

    fn push_field(&mut self, name: &'static str, kind: FieldKind<T>) {
        assert!(
            self.fields.iter().all(|f| f.name != name),
            "duplicate field `{name}` in entity schema `{}`",
            self.name
        );
        self.fields.push(FieldDef { name, kind });
    }
}

/* ---------- model-side descriptors ---------- */

pub(crate) type LoadFn<A> = Box<
    dyn for<'a> Fn(
            &'a DatabaseConnection,
            &'a [ModelOf<A>],
        ) -> BoxFuture<'a, Result<Vec<RelationState>>>
        + Send
        + Sync,
>;

pub(crate) struct RelationLoader<A: ActiveModelTrait> {
    pub(crate) name: &'static str,
    pub(crate) kind: RelationKind,
    pub(crate) load: LoadFn<A>,
}

/// Model-side descriptor: which relations of a model can be eagerly
/// loaded, and how. Loaders batch-fetch related rows for a whole result
/// set in one query.
pub struct ModelSchema<A: ActiveModelTrait> {
    name: &'static str,
    loaders: Vec<RelationLoader<A>>,
}

impl<A: ActiveModelTrait + Send + 'static> ModelSchema<A> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            loaders: Vec::new(),
        }
    }

    /// Registers a to-one eager load under `name`. A missing related row
    /// loads as an explicit null.
    ///
    /// # Panics
    /// On a duplicate relation name.
    #[must_use]
    pub fn has_one<FA>(mut self, name: &'static str) -> Self
    where
        FA: ActiveModelTrait + Send + 'static,
        EntityOf<A>: sea_orm::Related<EntityOf<FA>>,
        ModelOf<A>: Clone + Send + Sync,
        ModelOf<FA>: IntoActiveModel<FA> + Send + Sync,
    {
        let load: LoadFn<A> = Box::new(move |conn, models| {
            Box::pin(async move {
                let parents = models.to_vec();
                let rows: Vec<Option<ModelOf<FA>>> =
                    parents.load_one(EntityOf::<FA>::find(), conn).await?;
                Ok(rows
                    .into_iter()
                    .map(|row| match row {
                        Some(model) => RelationState::One(Box::new(Record::<FA>::from_model(model))),
                        None => RelationState::Null,
                    })
                    .collect())
            })
        });
        self.push_loader(name, RelationKind::One, load);
        self
    }

    /// Registers a to-many eager load under `name`. An empty related set
    /// loads as blank (explicit null).
    ///
    /// # Panics
    /// On a duplicate relation name.
    #[must_use]
    pub fn has_many<FA>(mut self, name: &'static str) -> Self
    where
        FA: ActiveModelTrait + Send + 'static,
        EntityOf<A>: sea_orm::Related<EntityOf<FA>>,
        ModelOf<A>: Clone + Send + Sync,
        ModelOf<FA>: IntoActiveModel<FA> + Send + Sync,
    {
        let load: LoadFn<A> = Box::new(move |conn, models| {
            Box::pin(async move {
                let parents = models.to_vec();
                let rows: Vec<Vec<ModelOf<FA>>> =
                    parents.load_many(EntityOf::<FA>::find(), conn).await?;
                Ok(rows
                    .into_iter()
                    .map(|group| {
                        if group.is_empty() {
                            RelationState::Null
                        } else {
                            RelationState::Many(
                                group
                                    .into_iter()
                                    .map(|model| {
                                        Box::new(Record::<FA>::from_model(model))
                                            as Box<dyn std::any::Any + Send>
                                    })
                                    .collect(),
                            )
                        }
                    })
                    .collect())
            })
        });
        self.push_loader(name, RelationKind::Many, load);
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.loaders.iter().map(|l| l.name)
    }

    /// Cardinality of a registered relation, if any.
    #[must_use]
    pub fn relation_kind(&self, name: &str) -> Option<RelationKind> {
        self.loaders.iter().find(|l| l.name == name).map(|l| l.kind)
    }

    pub(crate) fn loader(&self, name: &str) -> Option<&RelationLoader<A>> {
        self.loaders.iter().find(|l| l.name == name)
    }

    fn push_loader(&mut self, name: &'static str, kind: RelationKind, load: LoadFn<A>) {
        assert!(
            self.loaders.iter().all(|l| l.name != name),
            "duplicate relation `{name}` in model schema `{}`",
            self.name
        );
        self.loaders.push(RelationLoader { name, kind, load });
    }
}
