#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures for the integration suites: a users/posts model pair,
//! the matching domain entities and schemas, and an in-memory `SQLite`
//! database helper.

#![allow(dead_code)] // Not every suite uses every helper

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

use repokit::{EntityRepository, EntitySchema, Mapper, ModelSchema, take, take_opt};

/* ---------- sea-orm models ---------- */

pub mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub public_id: Uuid,
        pub name: String,
        pub email: Option<String>,
        pub active: bool,
        pub created_at: ChronoDateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::posts::Entity")]
        Posts,
    }

    impl Related<super::posts::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Posts.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod posts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub user_id: i32,
        pub title: String,
        pub body: Option<String>,
        pub published: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::users::Entity",
            from = "Column::UserId",
            to = "super::users::Column::Id"
        )]
        Author,
    }

    impl Related<super::users::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Author.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/* ---------- domain entities ---------- */

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id: Option<i32>,
    pub public_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub posts: Option<Vec<Post>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Post {
    pub id: Option<i32>,
    pub user_id: Option<i32>,
    pub title: String,
    pub body: Option<String>,
    pub published: bool,
    pub author: Option<User>,
}

/* ---------- schemas ---------- */

pub static USER_SCHEMA: LazyLock<EntitySchema<User>> = LazyLock::new(|| {
    EntitySchema::new("User")
        .nullable_attribute(
            "id",
            |user: &User| user.id.into(),
            |user, value| {
                user.id = take_opt("id", value)?;
                Ok(())
            },
        )
        .nullable_attribute(
            "publicId",
            |user| user.public_id.into(),
            |user, value| {
                user.public_id = take_opt("publicId", value)?;
                Ok(())
            },
        )
        .attribute(
            "name",
            |user| user.name.clone().into(),
            |user, value| {
                user.name = take("name", value)?;
                Ok(())
            },
        )
        .nullable_attribute(
            "email",
            |user| user.email.clone().into(),
            |user, value| {
                user.email = take_opt("email", value)?;
                Ok(())
            },
        )
        .attribute(
            "active",
            |user| user.active.into(),
            |user, value| {
                user.active = take("active", value)?;
                Ok(())
            },
        )
        .nullable_attribute(
            "createdAt",
            |user| user.created_at.into(),
            |user, value| {
                user.created_at = take_opt("createdAt", value)?;
                Ok(())
            },
        )
        .relation_many(
            "posts",
            true,
            |user| user.posts.as_deref(),
            |user, posts| user.posts = posts,
            post_mapper,
        )
});

pub static POST_SCHEMA: LazyLock<EntitySchema<Post>> = LazyLock::new(|| {
    EntitySchema::new("Post")
        .nullable_attribute(
            "id",
            |post: &Post| post.id.into(),
            |post, value| {
                post.id = take_opt("id", value)?;
                Ok(())
            },
        )
        .nullable_attribute(
            "userId",
            |post| post.user_id.into(),
            |post, value| {
                post.user_id = take_opt("userId", value)?;
                Ok(())
            },
        )
        .attribute(
            "title",
            |post| post.title.clone().into(),
            |post, value| {
                post.title = take("title", value)?;
                Ok(())
            },
        )
        .nullable_attribute(
            "body",
            |post| post.body.clone().into(),
            |post, value| {
                post.body = take_opt("body", value)?;
                Ok(())
            },
        )
        .attribute(
            "published",
            |post| post.published.into(),
            |post, value| {
                post.published = take("published", value)?;
                Ok(())
            },
        )
        .relation_one(
            "author",
            true,
            |post| post.author.as_ref(),
            |post, author| post.author = author,
            user_mapper,
        )
});

pub static USERS_MODEL: LazyLock<ModelSchema<users::ActiveModel>> =
    LazyLock::new(|| ModelSchema::new("users").has_many::<posts::ActiveModel>("posts"));

pub static POSTS_MODEL: LazyLock<ModelSchema<posts::ActiveModel>> =
    LazyLock::new(|| ModelSchema::new("posts").has_one::<users::ActiveModel>("author"));

static USER_MAPPER: LazyLock<Mapper<User, users::ActiveModel>> =
    LazyLock::new(|| Mapper::new(&USER_SCHEMA, &USERS_MODEL));

static POST_MAPPER: LazyLock<Mapper<Post, posts::ActiveModel>> =
    LazyLock::new(|| Mapper::new(&POST_SCHEMA, &POSTS_MODEL));

pub fn user_mapper() -> &'static Mapper<User, users::ActiveModel> {
    &USER_MAPPER
}

pub fn post_mapper() -> &'static Mapper<Post, posts::ActiveModel> {
    &POST_MAPPER
}

/* ---------- database ---------- */

/// Fresh in-memory `SQLite` database with both tables created.
pub async fn inmem_db() -> DatabaseConnection {
    let conn = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory database");
    conn.execute_unprepared(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            public_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            active INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await
    .expect("create users table");
    conn.execute_unprepared(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            body TEXT,
            published INTEGER NOT NULL
        )",
    )
    .await
    .expect("create posts table");
    conn
}

pub fn user_repository(conn: DatabaseConnection) -> EntityRepository<User, users::ActiveModel> {
    EntityRepository::builder()
        .entity(&USER_SCHEMA)
        .model(&USERS_MODEL)
        .build(conn)
        .expect("user repository")
}

pub fn post_repository(conn: DatabaseConnection) -> EntityRepository<Post, posts::ActiveModel> {
    EntityRepository::builder()
        .entity(&POST_SCHEMA)
        .model(&POSTS_MODEL)
        .build(conn)
        .expect("post repository")
}

/* ---------- seeding ---------- */

pub async fn seed_user(
    conn: &DatabaseConnection,
    name: &str,
    email: Option<&str>,
    active: bool,
) -> i32 {
    let row = users::ActiveModel {
        public_id: Set(Uuid::new_v4()),
        name: Set(name.to_owned()),
        email: Set(email.map(str::to_owned)),
        active: Set(active),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(conn).await.expect("insert user").id
}

pub async fn seed_post(
    conn: &DatabaseConnection,
    user_id: i32,
    title: &str,
    published: bool,
) -> i32 {
    let row = posts::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.to_owned()),
        body: Set(None),
        published: Set(published),
        ..Default::default()
    };
    row.insert(conn).await.expect("insert post").id
}
