#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Schema-driven repository layer for `SeaORM`.
//!
//! repokit keeps domain entities free of ORM types. Each entity/model pair
//! is described by two static halves: an [`EntitySchema`] listing the
//! entity's attributes and relations, and a [`ModelSchema`] listing the
//! model relations that can be eagerly loaded. A [`Mapper`] compiles the
//! two into a field plan and converts in both directions; an
//! [`EntityRepository`] wraps a mapper and a live connection into the
//! object-safe [`Repository`] query surface; an [`EntityManager`] hands
//! out one shared repository per entity type.
//!
//! # Example
//! ```rust,ignore
//! use std::sync::{Arc, LazyLock};
//!
//! use repokit::{
//!     EntityManager, EntityRepository, EntitySchema, ModelSchema, Repository, take, take_opt,
//! };
//!
//! #[derive(Clone, Debug, Default)]
//! struct User {
//!     id: Option<i32>,
//!     name: String,
//! }
//!
//! static USER_SCHEMA: LazyLock<EntitySchema<User>> = LazyLock::new(|| {
//!     EntitySchema::new("User")
//!         .nullable_attribute(
//!             "id",
//!             |user| user.id.into(),
//!             |user, value| {
//!                 user.id = take_opt("id", value)?;
//!                 Ok(())
//!             },
//!         )
//!         .attribute(
//!             "name",
//!             |user| user.name.clone().into(),
//!             |user, value| {
//!                 user.name = take("name", value)?;
//!                 Ok(())
//!             },
//!         )
//! });
//!
//! static USER_MODEL: LazyLock<ModelSchema<users::ActiveModel>> =
//!     LazyLock::new(|| ModelSchema::new("users").has_many::<posts::ActiveModel>("posts"));
//!
//! async fn wire(conn: sea_orm::DatabaseConnection) -> repokit::Result<()> {
//!     let repository = Arc::new(
//!         EntityRepository::builder()
//!             .entity(&USER_SCHEMA)
//!             .model(&USER_MODEL)
//!             .build(conn)?,
//!     );
//!     let manager = EntityManager::new();
//!     manager.register::<User>(repository);
//!
//!     let users = manager.repository::<User>()?;
//!     let first = users.find(1.into(), &["posts"]).await?;
//!     tracing::info!(found = first.is_some(), "lookup done");
//!     Ok(())
//! }
//! ```

pub mod criteria;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod page;
pub mod record;
pub mod repository;
pub mod schema;

pub use criteria::{Criteria, OrderBy, OrderKey, SortDir, Values};
pub use error::{Error, Result};
pub use manager::EntityManager;
pub use mapper::Mapper;
pub use page::{Page, PageInfo};
pub use record::{Record, RelationState};
pub use repository::{EntityRepository, Repository, RepositoryBuilder};
pub use schema::{
    EntitySchema, FieldDef, ModelSchema, RESERVED_MODEL_METHODS, RelationKind, take, take_opt,
};
