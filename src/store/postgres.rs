use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

use super::{
    NewUser, ProfileUpdate, StoreError, StoreResult, Todo, TodoFields, TodoStore, User, UserStore,
};
use crate::config::AppConfig;

/// Postgres-backed store. Every call checks a connection out of the pool for
/// the duration of one statement; the guard returns it on drop, error or not.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    created_at: OffsetDateTime,
    birth_date: Option<OffsetDateTime>,
    photo_url: String,
    short_term_goal: Option<String>,
    long_term_goal: Option<String>,
    hashed_password: String,
    is_active: bool,
    role: String,
    health_data_integration_status: bool,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r.role.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: Box::new(e),
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            created_at: r.created_at,
            birth_date: r.birth_date,
            photo_url: r.photo_url,
            short_term_goal: r.short_term_goal,
            long_term_goal: r.long_term_goal,
            hashed_password: r.hashed_password,
            is_active: r.is_active,
            role,
            health_data_integration_status: r.health_data_integration_status,
        })
    }
}

/// Unique violations become `Duplicate` so callers can report a conflict
/// instead of a server error. Constraint names follow Postgres defaults
/// (`users_email_key`, `users_name_key`).
fn map_write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "email",
                _ => "name",
            };
            return StoreError::Duplicate(field);
        }
        if db.is_foreign_key_violation() {
            return StoreError::UnknownOwner;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, photo_url, short_term_goal, long_term_goal,
                               hashed_password, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, email, created_at, birth_date, photo_url, short_term_goal,
                      long_term_goal, hashed_password, is_active, role,
                      health_data_integration_status
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo_url)
        .bind(&user.short_term_goal)
        .bind(&user.long_term_goal)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        row.try_into()
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, created_at, birth_date, photo_url, short_term_goal,
                   long_term_goal, hashed_password, is_active, role,
                   health_data_integration_status
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, created_at, birth_date, photo_url, short_term_goal,
                   long_term_goal, hashed_password, is_active, role,
                   health_data_integration_status
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_email(&self, id: i64, email: &str) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE users SET email = $2 WHERE id = $1")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_password_hash(&self, id: i64, hashed_password: &str) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE users SET hashed_password = $2 WHERE id = $1")
            .bind(id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_profile(&self, id: i64, p: ProfileUpdate) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET name = $2,
                   photo_url = $3,
                   short_term_goal = $4,
                   long_term_goal = $5,
                   health_data_integration_status = $6,
                   birth_date = $7
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&p.name)
        .bind(&p.photo_url)
        .bind(&p.short_term_goal)
        .bind(&p.long_term_goal)
        .bind(p.health_data_integration_status)
        .bind(p.birth_date)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Todo>> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, complete, category_id, created_at,
                   notification_time, owner_id
            FROM todos
            WHERE owner_id = $1
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: i64, owner_id: i64) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, complete, category_id, created_at,
                   notification_time, owner_id
            FROM todos
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, owner_id: i64, f: TodoFields) -> StoreResult<Todo> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (title, description, complete, category_id, notification_time,
                               owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, complete, category_id, created_at,
                      notification_time, owner_id
            "#,
        )
        .bind(&f.title)
        .bind(&f.description)
        .bind(f.complete)
        .bind(&f.category_id)
        .bind(f.notification_time)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(row)
    }

    async fn update(&self, id: i64, owner_id: i64, f: TodoFields) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title = $3,
                   description = $4,
                   complete = $5,
                   category_id = $6,
                   notification_time = $7
             WHERE id = $1 AND owner_id = $2
            RETURNING id, title, description, complete, category_id, created_at,
                      notification_time, owner_id
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&f.title)
        .bind(&f.description)
        .bind(f.complete)
        .bind(&f.category_id)
        .bind(f.notification_time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_complete(
        &self,
        id: i64,
        owner_id: i64,
        complete: bool,
    ) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET complete = $3
             WHERE id = $1 AND owner_id = $2
            RETURNING id, title, description, complete, category_id, created_at,
                      notification_time, owner_id
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(complete)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_notification_time(
        &self,
        id: i64,
        owner_id: i64,
        notification_time: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET notification_time = $3
             WHERE id = $1 AND owner_id = $2
            RETURNING id, title, description, complete, category_id, created_at,
                      notification_time, owner_id
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(notification_time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64, owner_id: i64) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
