//! Storage port: the durable dependency every task body and the readiness
//! gate contend for.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::NewUser;
use crate::error::StorageError;

/// Schema objects that must exist before the process accepts work. Column
/// layout is owned by the surrounding CRUD application, not by this core.
pub const REQUIRED_TABLES: [&str; 4] = ["user", "item", "cart", "cartitem"];

/// Connection factory plus schema management.
///
/// Shared process-wide; each task execution opens its own scoped session
/// instead of sharing one connection across concurrent workers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Liveness probe. `StorageError::Connectivity` means "not yet" and is
    /// the only error the readiness gate retries.
    async fn probe(&self) -> Result<(), StorageError>;

    /// Names of schema objects that currently exist.
    async fn existing_tables(&self) -> Result<HashSet<String>, StorageError>;

    /// Create the full required schema set. Must be idempotent: running it
    /// when objects already exist is a no-op, never an error.
    async fn create_schema(&self) -> Result<(), StorageError>;

    /// Open a session scoped to one task execution.
    async fn open_session(&self) -> Result<Box<dyn StorageSession>, StorageError>;
}

/// A scoped storage handle bound to one task execution.
///
/// Writes are atomic at `commit`: either every buffered write lands or none
/// does. Dropping a session without committing releases it and discards any
/// uncommitted writes, so the context wrapper never leaks a handle on the
/// failure path.
#[async_trait]
pub trait StorageSession: Send {
    async fn insert_user(&mut self, user: &NewUser) -> Result<(), StorageError>;

    /// Commit the session. Consumes it; the handle is released either way.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}
