use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::users::{
    dto::{NewUser, UserChanges},
    repo_types::User,
};

const USER_COLUMNS: &str = "id, username, password_hash, email, phone_number, first_name, \
                            last_name, join_date, is_supplier, created_at";

/// A unique column already holds this value. Stores return it inside the
/// `anyhow::Error` so callers can `downcast_ref` it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DuplicateUser {
    #[error("Username already taken")]
    Username,
    #[error("Email already registered")]
    Email,
}

/// Persistence for user records. `password_hash` arguments are already hashed.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &NewUser, password_hash: &str) -> anyhow::Result<User>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// `None` when no user has this id.
    async fn update(
        &self,
        id: i64,
        changes: &UserChanges,
        password_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>>;
    /// `true` if a row was removed.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser, password_hash: &str) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, password_hash, email, phone_number,
                               first_name, last_name, join_date, is_supplier)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(password_hash)
            .bind(&user.email)
            .bind(&user.phone_number)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.join_date)
            .bind(user.is_supplier)
            .fetch_one(&self.db)
            .await
            .map_err(|e| store_error(e, "insert user"))?;
        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(row)
    }

    async fn update(
        &self,
        id: i64,
        changes: &UserChanges,
        password_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET username      = COALESCE($2, username),
                   password_hash = COALESCE($3, password_hash),
                   email         = COALESCE($4, email),
                   phone_number  = COALESCE($5, phone_number),
                   first_name    = COALESCE($6, first_name),
                   last_name     = COALESCE($7, last_name),
                   join_date     = COALESCE($8, join_date),
                   is_supplier   = COALESCE($9, is_supplier)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.username.as_deref())
            .bind(password_hash)
            .bind(changes.email.as_deref())
            .bind(changes.phone_number.as_deref())
            .bind(changes.first_name.as_deref())
            .bind(changes.last_name.as_deref())
            .bind(changes.join_date)
            .bind(changes.is_supplier)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(e, "update user"))?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(result.rows_affected() > 0)
    }
}

fn store_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some(name) if name.contains("username") => DuplicateUser::Username.into(),
                _ => DuplicateUser::Email.into(),
            };
        }
    }
    anyhow::Error::new(e).context(what)
}
