//! Bidirectional entity/record conversion.
//!
//! A [`Mapper`] binds one [`EntitySchema`] to one [`ModelSchema`] and
//! compiles the field classification once: each declared field becomes a
//! plan step or is dropped. Classification order matters and follows the
//! model's point of view:
//!
//! 1. a field whose storage key resolves to a model column is a plain
//!    attribute — even when a relation of the same name was declared;
//! 2. a field whose name is reserved for ORM housekeeping
//!    ([`RESERVED_MODEL_METHODS`]) is skipped and never reaches relation
//!    handling;
//! 3. a declared relation converts through the related pair's mapper;
//! 4. anything else (an attribute naming no column) is skipped.
//!
//! Conversion itself is pure: no step performs I/O. Eager loading happens
//! in the repository before records reach [`Mapper::entity_from_record`].

use std::str::FromStr;

use heck::ToSnakeCase;
use sea_orm::{ActiveModelTrait, IdenStatic};

use crate::error::{Error, Result};
use crate::record::{ColumnOf, Record};
use crate::schema::{
    AttributeDef, EntitySchema, FieldKind, ModelSchema, RESERVED_MODEL_METHODS, RelationDef,
    ValueExt,
};

enum Planned<T: 'static, C> {
    Attribute {
        name: &'static str,
        attr: &'static AttributeDef<T>,
        col: C,
    },
    Relation {
        name: &'static str,
        rel: &'static RelationDef<T>,
    },
}

/// Compiled conversion engine for one entity/model pair.
pub struct Mapper<T: 'static, A: ActiveModelTrait + 'static> {
    entity: &'static EntitySchema<T>,
    model: &'static ModelSchema<A>,
    plan: Vec<Planned<T, ColumnOf<A>>>,
}

impl<T: 'static, A: ActiveModelTrait + Send + 'static> Mapper<T, A> {
    /// Binds the two schema halves and compiles the field plan.
    #[must_use]
    pub fn new(entity: &'static EntitySchema<T>, model: &'static ModelSchema<A>) -> Self {
        let mut plan = Vec::with_capacity(entity.fields().len());
        for field in entity.fields() {
            let name = field.name();
            match &field.kind {
                FieldKind::Attribute(attr) => {
                    if let Ok(col) = ColumnOf::<A>::from_str(&attr.storage_key) {
                        plan.push(Planned::Attribute { name, attr, col });
                    } else {
                        tracing::debug!(
                            entity = entity.name(),
                            model = model.name(),
                            field = name,
                            "attribute has no model column; skipped"
                        );
                    }
                }
                FieldKind::Relation(rel) => {
                    if ColumnOf::<A>::from_str(&name.to_snake_case()).is_ok() {
                        tracing::debug!(
                            entity = entity.name(),
                            model = model.name(),
                            field = name,
                            "relation name resolves to a model column; treated as attribute and skipped"
                        );
                    } else if RESERVED_MODEL_METHODS.contains(&name) {
                        tracing::debug!(
                            entity = entity.name(),
                            model = model.name(),
                            field = name,
                            "reserved model name; skipped"
                        );
                    } else {
                        plan.push(Planned::Relation { name, rel });
                    }
                }
            }
        }
        Self {
            entity,
            model,
            plan,
        }
    }

    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.entity.name()
    }

    #[must_use]
    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub(crate) fn model_schema(&self) -> &'static ModelSchema<A> {
        self.model
    }

    /// Whether any mapped attribute writes into the given column.
    pub(crate) fn maps_column(&self, col: ColumnOf<A>) -> bool {
        self.plan.iter().any(|step| match step {
            Planned::Attribute { col: mapped, .. } => mapped.as_str() == col.as_str(),
            Planned::Relation { .. } => false,
        })
    }

    /// Fresh entity from the schema's constructor hook.
    #[must_use]
    pub fn new_entity(&self) -> T {
        self.entity.make_entity()
    }

    /// Fresh record: all columns unset, no relations loaded.
    #[must_use]
    pub fn new_record(&self) -> Record<A> {
        Record::new()
    }

    /// Converts an entity into a record.
    ///
    /// Attribute values are written as-is (nulls included); relation
    /// fields follow the population rules: a present value converts
    /// recursively, an absent nullable one becomes an explicit null
    /// state, an absent non-nullable one is left unloaded.
    ///
    /// # Errors
    /// Propagates conversion errors from related mappers.
    pub fn record_from_entity(&self, entity: &T) -> Result<Record<A>> {
        let mut record = Record::new();
        for step in &self.plan {
            match step {
                Planned::Attribute { attr, col, .. } => {
                    record.set(*col, (attr.get)(entity));
                }
                Planned::Relation { name, rel } => {
                    if let Some(state) = (rel.collect)(entity)? {
                        record.set_relation(name, state);
                    }
                }
            }
        }
        Ok(record)
    }

    /// Converts a record into an entity.
    ///
    /// Unset columns read as null; null into a non-nullable field is
    /// [`Error::NullValue`]. Relations convert only when their state was
    /// loaded into the record; a loaded-null state writes an explicit
    /// `None` into nullable fields.
    ///
    /// # Errors
    /// [`Error::NullValue`], [`Error::TypeMismatch`],
    /// [`Error::InvalidModel`], or errors from related mappers.
    pub fn entity_from_record(&self, record: &Record<A>) -> Result<T> {
        let mut entity = self.entity.make_entity();
        for step in &self.plan {
            match step {
                Planned::Attribute { name, attr, col } => {
                    let value = record.get(*col).filter(|v| !v.is_null());
                    if value.is_none() && !attr.nullable {
                        return Err(Error::NullValue {
                            entity: self.entity.name(),
                            field: name,
                        });
                    }
                    (attr.set)(&mut entity, value)?;
                }
                Planned::Relation { name, rel } => {
                    if let Some(state) = record.relation(name) {
                        (rel.install)(&mut entity, state)?;
                    }
                }
            }
        }
        Ok(entity)
    }

    /// Relation target diagnostics: `(field name, related entity type)`
    /// for every planned relation.
    pub fn relation_targets(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.plan.iter().filter_map(|step| match step {
            Planned::Relation { name, rel } => Some((*name, rel.target)),
            Planned::Attribute { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use sea_orm::Value;

    use super::*;
    use crate::schema::{take, take_opt};

    mod widgets {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "widgets")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub label: String,
            pub note: Option<String>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Widget {
        id: i32,
        label: String,
        note: Option<String>,
        vendor: String,
    }

    static WIDGET_SCHEMA: LazyLock<EntitySchema<Widget>> = LazyLock::new(|| {
        EntitySchema::new("Widget")
            .attribute(
                "id",
                |w: &Widget| w.id.into(),
                |w, v| {
                    w.id = take("id", v)?;
                    Ok(())
                },
            )
            .attribute(
                "label",
                |w| w.label.clone().into(),
                |w, v| {
                    w.label = take("label", v)?;
                    Ok(())
                },
            )
            .nullable_attribute(
                "note",
                |w| w.note.clone().into(),
                |w, v| {
                    w.note = take_opt("note", v)?;
                    Ok(())
                },
            )
            // no such column on the model; must be skipped, not treated
            // as a relation
            .attribute(
                "vendor",
                |w| w.vendor.clone().into(),
                |w, v| {
                    w.vendor = take("vendor", v)?;
                    Ok(())
                },
            )
    });

    static WIDGET_MODEL: LazyLock<ModelSchema<widgets::ActiveModel>> =
        LazyLock::new(|| ModelSchema::new("widgets"));

    fn mapper() -> Mapper<Widget, widgets::ActiveModel> {
        Mapper::new(&WIDGET_SCHEMA, &WIDGET_MODEL)
    }

    #[test]
    fn round_trips_plain_attributes() {
        let source = Widget {
            id: 9,
            label: "anvil".to_owned(),
            note: Some("heavy".to_owned()),
            vendor: "acme".to_owned(),
        };
        let record = mapper().record_from_entity(&source).unwrap();
        let back = mapper().entity_from_record(&record).unwrap();
        assert_eq!(back.id, source.id);
        assert_eq!(back.label, source.label);
        assert_eq!(back.note, source.note);
    }

    #[test]
    fn unmapped_attribute_is_skipped_both_ways() {
        let source = Widget {
            vendor: "acme".to_owned(),
            label: "anvil".to_owned(),
            ..Widget::default()
        };
        let record = mapper().record_from_entity(&source).unwrap();
        let back = mapper().entity_from_record(&record).unwrap();
        // vendor never crossed the boundary; the fresh entity keeps its
        // default
        assert_eq!(back.vendor, String::new());
    }

    #[test]
    fn null_into_non_nullable_field_fails() {
        let record: Record<widgets::ActiveModel> = Record::new();
        let err = mapper().entity_from_record(&record).unwrap_err();
        match err {
            Error::NullValue { entity, field } => {
                assert_eq!(entity, "Widget");
                assert_eq!(field, "id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nullable_attribute_reads_absent_as_none() {
        let mut widget = Widget {
            id: 1,
            label: "anvil".to_owned(),
            note: Some("x".to_owned()),
            ..Widget::default()
        };
        widget.note = None;
        let record = mapper().record_from_entity(&widget).unwrap();
        let back = mapper().entity_from_record(&record).unwrap();
        assert_eq!(back.note, None);
    }

    #[test]
    fn new_entity_is_the_default_value() {
        assert_eq!(mapper().new_entity(), Widget::default());
    }

    #[test]
    fn new_record_has_no_loaded_relations() {
        let record = mapper().new_record();
        assert!(!record.relation_loaded("anything"));
        assert_eq!(record.get(widgets::Column::Id), None);
    }

    #[test]
    fn explicit_null_is_written_for_nullable_attributes() {
        let widget = Widget {
            id: 4,
            label: "anvil".to_owned(),
            note: None,
            ..Widget::default()
        };
        let record = mapper().record_from_entity(&widget).unwrap();
        // the column is set (to null), not left unset
        assert_eq!(record.get(widgets::Column::Note), Some(Value::String(None)));
    }
}
