//! Error taxonomy for the repository layer.
//!
//! Configuration, resolution, shape, and usage problems are all hard
//! errors; an absent row is `Ok(None)` everywhere except
//! [`update`](crate::Repository::update), which is documented to fail
//! with [`Error::ModelNotFound`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The repository builder was finished without an entity schema.
    #[error("entity schema not set for repository [{repository}]")]
    EntitySchemaNotSet { repository: &'static str },

    /// The repository builder was finished without a model schema.
    #[error("model schema not set for repository [{repository}]")]
    ModelSchemaNotSet { repository: &'static str },

    /// No repository was registered for the entity type.
    #[error("repository not found for entity [{entity}]")]
    RepositoryNotFound { entity: &'static str },

    /// A registered binding exists but is not the requested repository
    /// surface. Distinct from [`Error::RepositoryNotFound`] so a bad
    /// registration does not masquerade as a missing one.
    #[error("registered binding for entity [{entity}] has an unexpected repository type")]
    BindingTypeMismatch { entity: &'static str },

    /// A relation payload could not be read back as a record of the
    /// related pair.
    #[error("model [{model}] does not support entity conversion")]
    InvalidModel { model: &'static str },

    /// A column value refused to coerce into the declared field type.
    #[error("type mismatch for field [{field}]: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    /// Null (or an absent column) was read into a non-nullable field.
    #[error("null value for non-nullable field [{field}] on entity [{entity}]")]
    NullValue {
        entity: &'static str,
        field: &'static str,
    },

    /// The model declares no primary key, or the entity schema maps none
    /// of its attributes onto the primary-key column.
    #[error("no usable primary key for model [{model}]")]
    MissingPrimaryKey { model: &'static str },

    /// A criteria, ordering, or value field named no column of the model.
    #[error("unknown field [{field}] for model [{model}]")]
    UnknownField { field: String, model: &'static str },

    /// An eager-load was requested for a relation the model schema does
    /// not declare.
    #[error("unknown relation [{relation}] for model [{model}]")]
    UnknownRelation {
        relation: String,
        model: &'static str,
    },

    /// `update` targeted a primary key with no matching row.
    #[error("model [{model}] not found for key {key:?}")]
    ModelNotFound {
        model: &'static str,
        key: sea_orm::Value,
    },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

pub type Result<T> = core::result::Result<T, Error>;
