//! Postgres storage backend (sqlx).
//!
//! The pool is created lazily so the readiness gate owns connection
//! retries: the first probe, not the constructor, pays for the handshake.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};

use crate::domain::NewUser;
use crate::error::StorageError;
use crate::ports::{Storage, StorageSession};

/// Unique-violation SQLSTATE.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Column layout is owned by the surrounding CRUD application; these
/// definitions exist so a fresh database can bootstrap itself. Every
/// statement is IF NOT EXISTS, so recreating the set is a no-op.
const CREATE_SCHEMA_SQL: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        phone_number TEXT NOT NULL,
        password TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS item (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        price_cents BIGINT NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cart (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES "user"(id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cartitem (
        id BIGSERIAL PRIMARY KEY,
        cart_id BIGINT NOT NULL REFERENCES cart(id),
        item_id BIGINT NOT NULL REFERENCES item(id),
        quantity INT NOT NULL DEFAULT 1
    )"#,
];

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Build a lazy pool against the given connection string. No connection
    /// is attempted here; the readiness gate's probe does that, under its
    /// retry budget.
    pub fn connect_lazy(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| StorageError::Connectivity(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn probe(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connectivity(e.to_string()))?;
        Ok(())
    }

    async fn existing_tables(&self) -> Result<HashSet<String>, StorageError> {
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connectivity(e.to_string()))?;

        let mut tables = HashSet::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("table_name")
                .map_err(|e| StorageError::Other(e.to_string()))?;
            tables.insert(name);
        }
        Ok(tables)
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        for statement in CREATE_SCHEMA_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Other(e.to_string()))?;
        }
        tracing::info!("schema created");
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn StorageSession>, StorageError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connectivity(e.to_string()))?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

/// One transaction per task execution. Dropping the session without a
/// commit rolls the transaction back, which is the release guarantee the
/// context wrapper relies on.
struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait]
impl StorageSession for PgSession {
    async fn insert_user(&mut self, user: &NewUser) -> Result<(), StorageError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| StorageError::Other("session already committed".to_string()))?;

        let done = sqlx::query(
            r#"INSERT INTO "user" (username, phone_number, password)
               VALUES ($1, $2, $3)
               ON CONFLICT (username) DO NOTHING"#,
        )
        .bind(&user.username)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| classify(e, &user.username))?;

        if done.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                entity: "user",
                value: user.username.clone(),
            });
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        match self.tx.take() {
            Some(tx) => tx
                .commit()
                .await
                .map_err(|e| StorageError::Connectivity(e.to_string())),
            None => Err(StorageError::Other(
                "session already committed".to_string(),
            )),
        }
    }
}

fn classify(err: sqlx::Error, username: &str) -> StorageError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
            return StorageError::Conflict {
                entity: "user",
                value: username.to_string(),
            };
        }
    }
    StorageError::Other(err.to_string())
}
