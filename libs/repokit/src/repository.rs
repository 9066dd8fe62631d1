//! Repository facade over a mapped entity/model pair.
//!
//! [`Repository`] is the object-safe query surface: primary-key lookups,
//! equality-criteria listings, pagination and writes, all phrased in terms
//! of the domain entity. [`EntityRepository`] is the sea-orm implementation;
//! it is assembled from the two static schema halves plus a live
//! [`DatabaseConnection`] and is cheap to share behind an `Arc`.
//!
//! Reads report absence as `Ok(None)` or an empty listing. Only
//! [`Repository::update`] treats a missing row as an error, since patching
//! nothing is almost always a caller bug.

use std::any::type_name;
use std::str::FromStr;

use async_trait::async_trait;
use heck::ToSnakeCase;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Iterable, PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder,
    QuerySelect, Select, Value,
};

use crate::criteria::{Criteria, OrderBy, Values};
use crate::error::{Error, Result};
use crate::mapper::Mapper;
use crate::page::Page;
use crate::record::{ColumnOf, EntityOf, ModelOf, Record, RelationState};
use crate::schema::{EntitySchema, ModelSchema, ValueExt};

/* ---------- trait ---------- */

/// Object-safe persistence surface for one entity type.
///
/// Concrete repositories implement the required lookups; the provided
/// methods are thin compositions kept on the trait so every repository,
/// hand-written or not, exposes the same finder vocabulary.
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Fresh, unsaved entity from the schema's constructor hook.
    fn new_entity(&self) -> T;

    /// Look up one entity by primary key, eagerly loading `relations`.
    ///
    /// # Errors
    /// [`Error::UnknownRelation`], database failures, or conversion
    /// failures. A missing row is `Ok(None)`.
    async fn find(&self, id: Value, relations: &[&str]) -> Result<Option<T>>;

    /// Every row of the backing table, converted.
    ///
    /// # Errors
    /// As [`find`](Self::find).
    async fn find_all(&self, relations: &[&str]) -> Result<Vec<T>>;

    /// Equality-filtered listing with ordering and an optional window.
    ///
    /// Criteria are ANDed in insertion order, ordering keys apply in the
    /// order given, and `limit`/`offset` are applied last.
    ///
    /// # Errors
    /// [`Error::UnknownField`] for a criteria or ordering name that
    /// resolves to no column, [`Error::UnknownRelation`], database or
    /// conversion failures.
    async fn find_by(
        &self,
        criteria: &Criteria,
        relations: &[&str],
        order: &OrderBy,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<T>>;

    /// First match of [`find_by`](Self::find_by) under a limit of one.
    ///
    /// # Errors
    /// As [`find_by`](Self::find_by).
    async fn find_one_by(
        &self,
        criteria: &Criteria,
        relations: &[&str],
        order: &OrderBy,
    ) -> Result<Option<T>> {
        let found = self
            .find_by(criteria, relations, order, Some(1), None)
            .await?;
        Ok(found.into_iter().next())
    }

    /// Number of rows matching `criteria`.
    ///
    /// # Errors
    /// [`Error::UnknownField`] or database failures.
    async fn count(&self, criteria: &Criteria) -> Result<u64>;

    /// One page of the full listing. Pages are numbered from one.
    ///
    /// # Errors
    /// Database or conversion failures.
    async fn paginate(&self, per_page: u64, page: u64) -> Result<Page<T>>;

    /// Insert a new row from raw column values.
    ///
    /// # Errors
    /// [`Error::UnknownField`] for a value naming no column, database or
    /// conversion failures.
    async fn create(&self, values: &Values) -> Result<T>;

    /// Patch the row identified by `id` and return the updated entity.
    ///
    /// # Errors
    /// Unlike the read operations this fails with [`Error::ModelNotFound`]
    /// when no such row exists; otherwise as [`create`](Self::create).
    async fn update(&self, id: Value, values: &Values) -> Result<T>;

    /// Insert or update the row backing `entity`.
    ///
    /// The branch is picked by probing the mapped primary key: a non-null
    /// key matching an existing row updates it, anything else inserts.
    /// The entity itself is not refreshed; re-read it through
    /// [`find`](Self::find) to observe backend-assigned values.
    ///
    /// # Errors
    /// [`Error::MissingPrimaryKey`] when the schema maps no attribute
    /// onto the primary-key column, plus database or conversion failures.
    async fn save(&self, entity: &T) -> Result<bool>;

    /// Alias for [`save`](Self::save).
    ///
    /// # Errors
    /// As [`save`](Self::save).
    async fn persist(&self, entity: &T) -> Result<bool> {
        self.save(entity).await
    }

    /// Single-field equality shorthand for [`find_by`](Self::find_by).
    ///
    /// # Errors
    /// As [`find_by`](Self::find_by).
    async fn find_by_field(
        &self,
        field: &str,
        value: Value,
        relations: &[&str],
        order: &OrderBy,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<T>> {
        let criteria = Criteria::new().eq(field, value);
        self.find_by(&criteria, relations, order, limit, offset)
            .await
    }

    /// Single-field equality shorthand for [`find_one_by`](Self::find_one_by).
    ///
    /// # Errors
    /// As [`find_by`](Self::find_by).
    async fn find_one_by_field(
        &self,
        field: &str,
        value: Value,
        relations: &[&str],
        order: &OrderBy,
    ) -> Result<Option<T>> {
        let criteria = Criteria::new().eq(field, value);
        self.find_one_by(&criteria, relations, order).await
    }

    /// Single-field equality shorthand for [`count`](Self::count).
    ///
    /// # Errors
    /// As [`count`](Self::count).
    async fn count_by_field(&self, field: &str, value: Value) -> Result<u64> {
        let criteria = Criteria::new().eq(field, value);
        self.count(&criteria).await
    }
}

/* ---------- builder ---------- */

/// Two-stage constructor for [`EntityRepository`].
///
/// Both schema halves are mandatory; [`build`](RepositoryBuilder::build)
/// reports whichever one was never supplied.
pub struct RepositoryBuilder<T: 'static, A: ActiveModelTrait + 'static> {
    entity: Option<&'static EntitySchema<T>>,
    model: Option<&'static ModelSchema<A>>,
}

impl<T, A> RepositoryBuilder<T, A>
where
    T: Send + Sync + 'static,
    A: ActiveModelTrait + Send + 'static,
{
    /// Entity-side schema half.
    #[must_use]
    pub fn entity(mut self, schema: &'static EntitySchema<T>) -> Self {
        self.entity = Some(schema);
        self
    }

    /// Model-side schema half.
    #[must_use]
    pub fn model(mut self, schema: &'static ModelSchema<A>) -> Self {
        self.model = Some(schema);
        self
    }

    /// Compile the mapping plan and bind the repository to `conn`.
    ///
    /// # Errors
    ///
    /// [`Error::EntitySchemaNotSet`] or [`Error::ModelSchemaNotSet`] when a
    /// half is missing.
    pub fn build(self, conn: DatabaseConnection) -> Result<EntityRepository<T, A>> {
        let repository = type_name::<EntityRepository<T, A>>();
        let entity = self
            .entity
            .ok_or(Error::EntitySchemaNotSet { repository })?;
        let model = self.model.ok_or(Error::ModelSchemaNotSet { repository })?;
        Ok(EntityRepository {
            mapper: Mapper::new(entity, model),
            conn,
        })
    }
}

/* ---------- sea-orm repository ---------- */

/// sea-orm backed [`Repository`] for one entity/model pair.
pub struct EntityRepository<T: 'static, A: ActiveModelTrait + 'static> {
    mapper: Mapper<T, A>,
    conn: DatabaseConnection,
}

impl<T, A> EntityRepository<T, A>
where
    T: Send + Sync + 'static,
    A: ActiveModelTrait + Send + 'static,
{
    /// Start a builder with neither schema half set.
    #[must_use]
    pub fn builder() -> RepositoryBuilder<T, A> {
        RepositoryBuilder {
            entity: None,
            model: None,
        }
    }

    /// Compiled mapping plan shared by every operation.
    #[must_use]
    pub fn mapper(&self) -> &Mapper<T, A> {
        &self.mapper
    }

    /// Connection the repository was built over.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Bare select over the backing table, for ad-hoc queries.
    #[must_use]
    pub fn select(&self) -> Select<EntityOf<A>> {
        EntityOf::<A>::find()
    }

    /// Fresh record with every column unset and no relations loaded.
    #[must_use]
    pub fn new_record(&self) -> Record<A> {
        self.mapper.new_record()
    }

    /// Convert one entity into a detached record.
    ///
    /// # Errors
    ///
    /// Propagates accessor failures from the entity schema.
    pub fn record_from_entity(&self, entity: &T) -> Result<Record<A>> {
        self.mapper.record_from_entity(entity)
    }

    /// Convert a record, including any loaded relations, back into an entity.
    ///
    /// # Errors
    ///
    /// See [`Mapper::entity_from_record`].
    pub fn entity_from_record(&self, record: &Record<A>) -> Result<T> {
        self.mapper.entity_from_record(record)
    }

    fn primary_key_column(&self) -> Result<ColumnOf<A>> {
        <EntityOf<A> as EntityTrait>::PrimaryKey::iter()
            .next()
            .map(PrimaryKeyToColumn::into_column)
            .ok_or(Error::MissingPrimaryKey {
                model: self.mapper.model_name(),
            })
    }

    fn resolve_column(&self, field: &str) -> Result<ColumnOf<A>> {
        let key = field.to_snake_case();
        ColumnOf::<A>::from_str(&key).map_err(|_| Error::UnknownField {
            field: field.to_owned(),
            model: self.mapper.model_name(),
        })
    }

    fn apply_criteria(
        &self,
        mut query: Select<EntityOf<A>>,
        criteria: &Criteria,
    ) -> Result<Select<EntityOf<A>>> {
        for (field, value) in criteria.iter() {
            let col = self.resolve_column(field)?;
            query = query.filter(col.eq(value.clone()));
        }
        Ok(query)
    }

    fn apply_order(
        &self,
        mut query: Select<EntityOf<A>>,
        order: &OrderBy,
    ) -> Result<Select<EntityOf<A>>> {
        for key in order.iter() {
            let col = self.resolve_column(&key.field)?;
            query = query.order_by(col, key.dir.into());
        }
        Ok(query)
    }

    /// Convert a batch of models, loading every requested relation for the
    /// whole batch before any row is converted.
    async fn hydrate(&self, models: Vec<ModelOf<A>>, relations: &[&str]) -> Result<Vec<T>>
    where
        ModelOf<A>: IntoActiveModel<A>,
    {
        let schema = self.mapper.model_schema();
        let mut loaders = Vec::with_capacity(relations.len());
        for name in relations {
            let loader = schema.loader(name).ok_or_else(|| Error::UnknownRelation {
                relation: (*name).to_owned(),
                model: self.mapper.model_name(),
            })?;
            loaders.push(loader);
        }

        let mut bags: Vec<Vec<(&'static str, RelationState)>> =
            models.iter().map(|_| Vec::new()).collect();
        for loader in loaders {
            let states = (loader.load)(&self.conn, &models).await?;
            debug_assert_eq!(states.len(), models.len());
            for (bag, state) in bags.iter_mut().zip(states) {
                bag.push((loader.name, state));
            }
        }

        let mut entities = Vec::with_capacity(models.len());
        for (model, bag) in models.into_iter().zip(bags) {
            let mut record = Record::from_model(model);
            for (name, state) in bag {
                record.set_relation(name, state);
            }
            entities.push(self.mapper.entity_from_record(&record)?);
        }
        Ok(entities)
    }
}

/* ---------- trait impl ---------- */

#[async_trait]
impl<T, A> Repository<T> for EntityRepository<T, A>
where
    T: Send + Sync + 'static,
    A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
    ColumnOf<A>: Send + Sync,
    ModelOf<A>: IntoActiveModel<A> + Clone + Send + Sync,
{
    fn new_entity(&self) -> T {
        self.mapper.new_entity()
    }

    async fn find(&self, id: Value, relations: &[&str]) -> Result<Option<T>> {
        let pk = self.primary_key_column()?;
        let Some(model) = self.select().filter(pk.eq(id)).one(&self.conn).await? else {
            return Ok(None);
        };
        let mut hydrated = self.hydrate(vec![model], relations).await?;
        Ok(hydrated.pop())
    }

    async fn find_all(&self, relations: &[&str]) -> Result<Vec<T>> {
        let models = self.select().all(&self.conn).await?;
        self.hydrate(models, relations).await
    }

    async fn find_by(
        &self,
        criteria: &Criteria,
        relations: &[&str],
        order: &OrderBy,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<T>> {
        let mut query = self.apply_criteria(self.select(), criteria)?;
        query = self.apply_order(query, order)?;
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }
        let models = query.all(&self.conn).await?;
        self.hydrate(models, relations).await
    }

    async fn count(&self, criteria: &Criteria) -> Result<u64> {
        let query = self.apply_criteria(self.select(), criteria)?;
        Ok(query.count(&self.conn).await?)
    }

    async fn paginate(&self, per_page: u64, page: u64) -> Result<Page<T>> {
        let page = page.max(1);
        if per_page == 0 {
            // A zero-row page still reports the real total.
            let total = self.select().count(&self.conn).await?;
            return Ok(Page::new(Vec::new(), page, 0, total));
        }
        let paginator = self.select().paginate(&self.conn, per_page);
        let totals = paginator.num_items_and_pages().await?;
        let models = paginator.fetch_page(page - 1).await?;
        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(self.mapper.entity_from_record(&Record::from_model(model))?);
        }
        Ok(Page::new(items, page, per_page, totals.number_of_items))
    }

    async fn create(&self, values: &Values) -> Result<T> {
        let mut active = A::default();
        for (field, value) in values.iter() {
            let col = self.resolve_column(field)?;
            active.set(col, value.clone());
        }
        tracing::debug!(model = self.mapper.model_name(), "inserting row");
        let model = active.insert(&self.conn).await?;
        self.mapper.entity_from_record(&Record::from_model(model))
    }

    async fn update(&self, id: Value, values: &Values) -> Result<T> {
        let pk = self.primary_key_column()?;
        let found = self
            .select()
            .filter(pk.eq(id.clone()))
            .one(&self.conn)
            .await?;
        let Some(model) = found else {
            return Err(Error::ModelNotFound {
                model: self.mapper.model_name(),
                key: id,
            });
        };
        if values.is_empty() {
            return self.mapper.entity_from_record(&Record::from_model(model));
        }
        let mut active = model.into_active_model();
        for (field, value) in values.iter() {
            let col = self.resolve_column(field)?;
            active.set(col, value.clone());
        }
        tracing::debug!(model = self.mapper.model_name(), "updating row");
        let model = active.update(&self.conn).await?;
        self.mapper.entity_from_record(&Record::from_model(model))
    }

    async fn save(&self, entity: &T) -> Result<bool> {
        let pk = self.primary_key_column()?;
        if !self.mapper.maps_column(pk) {
            return Err(Error::MissingPrimaryKey {
                model: self.mapper.model_name(),
            });
        }
        let record = self.mapper.record_from_entity(entity)?;
        let mut active = record.into_active();
        let key = active.get(pk).into_value().filter(|value| !value.is_null());

        let existing = match key {
            Some(key) => self.select().filter(pk.eq(key)).one(&self.conn).await?,
            None => None,
        };
        tracing::debug!(
            model = self.mapper.model_name(),
            update = existing.is_some(),
            "saving entity"
        );
        if existing.is_some() {
            active.update(&self.conn).await?;
        } else {
            // A null key means the backend assigns one on insert.
            if active
                .get(pk)
                .into_value()
                .is_some_and(|value| value.is_null())
            {
                active.not_set(pk);
            }
            active.insert(&self.conn).await?;
        }
        Ok(true)
    }
}
