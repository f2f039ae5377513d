//! Port implementations: in-memory adapters for development and tests,
//! bcrypt hashing, and the Postgres storage backend.

pub mod bcrypt;
pub mod inmem_broker;
pub mod inmem_results;
pub mod inmem_storage;
pub mod postgres;

pub use bcrypt::BcryptHasher;
pub use inmem_broker::InMemoryBroker;
pub use inmem_results::InMemoryResultStore;
pub use inmem_storage::{InMemoryStorage, StoredUser};
pub use postgres::PgStorage;
