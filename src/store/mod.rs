//! Persistence seam. Handlers only talk to the traits below; the Postgres
//! implementation lives in [`postgres`], a test double in `memory`.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::claims::Role;

pub mod postgres;
#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column (`email` or `name`) already holds this value.
    #[error("{0} already registered")]
    Duplicate(&'static str),
    /// The referenced owner row no longer exists.
    #[error("owner does not exist")]
    UnknownOwner,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User record. The password hash never leaves the process in a response.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub birth_date: Option<OffsetDateTime>,
    pub photo_url: String,
    pub short_term_goal: Option<String>,
    pub long_term_goal: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_active: bool,
    pub role: Role,
    pub health_data_integration_status: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub photo_url: String,
    pub short_term_goal: Option<String>,
    pub long_term_goal: Option<String>,
    pub hashed_password: String,
    pub role: Role,
}

/// Self-service profile fields; credentials are changed separately.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub photo_url: String,
    pub short_term_goal: String,
    pub long_term_goal: String,
    pub health_data_integration_status: bool,
    pub birth_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub complete: bool,
    pub category_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub notification_time: Option<OffsetDateTime>,
    pub owner_id: i64,
}

/// Client-controlled todo fields. Ownership is never part of this.
#[derive(Debug, Clone)]
pub struct TodoFields {
    pub title: String,
    pub description: String,
    pub complete: bool,
    pub category_id: String,
    pub notification_time: Option<OffsetDateTime>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_email(&self, id: i64, email: &str) -> StoreResult<bool>;
    async fn update_password_hash(&self, id: i64, hashed_password: &str) -> StoreResult<bool>;
    async fn update_profile(&self, id: i64, profile: ProfileUpdate) -> StoreResult<bool>;
    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

/// Every lookup and mutation is keyed by `(id, owner_id)`. A row owned by
/// someone else behaves exactly like a missing row.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Todo>>;
    async fn find(&self, id: i64, owner_id: i64) -> StoreResult<Option<Todo>>;
    async fn create(&self, owner_id: i64, fields: TodoFields) -> StoreResult<Todo>;
    async fn update(&self, id: i64, owner_id: i64, fields: TodoFields)
        -> StoreResult<Option<Todo>>;
    async fn set_complete(&self, id: i64, owner_id: i64, complete: bool)
        -> StoreResult<Option<Todo>>;
    async fn set_notification_time(
        &self,
        id: i64,
        owner_id: i64,
        notification_time: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Todo>>;
    async fn delete(&self, id: i64, owner_id: i64) -> StoreResult<bool>;
}
