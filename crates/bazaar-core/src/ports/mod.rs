//! Ports (interfaces) between the task core and its collaborators.
//!
//! Each port is an async trait object seam: in-memory implementations for
//! development and tests live in `impls`, the Postgres storage backend in
//! `impls::postgres`.

pub mod broker;
pub mod hasher;
pub mod result_store;
pub mod storage;

pub use broker::{Broker, Delivery};
pub use hasher::CredentialHasher;
pub use result_store::ResultStore;
pub use storage::{Storage, StorageSession, REQUIRED_TABLES};
