//! bazaar-core
//!
//! Asynchronous task execution core for the bazaar storefront: deferred,
//! at-least-once execution of side-effecting work off the request path.
//!
//! # Module map
//! - **domain**: identifiers, envelopes, results, user records
//! - **ports**: seams (Storage, Broker, ResultStore, CredentialHasher)
//! - **context**: shared runtime context, per-execution scope, the
//!   context-wrapping decorator every task runs inside
//! - **readiness**: startup gate that blocks until storage answers and the
//!   schema exists, with a bounded retry budget
//! - **runner**: enqueue/fetch_result plus the worker pool
//! - **typed**: typed Task/Handler API over JSON envelopes
//! - **tasks**: concrete tasks (user registration)
//! - **impls**: in-memory adapters, bcrypt hashing, Postgres backend
//! - **bootstrap**: wiring, in gate-before-workers order

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod readiness;
pub mod runner;
pub mod tasks;
pub mod typed;

pub use bootstrap::{App, AppBuilder};
pub use config::{ReadinessSettings, Settings};
pub use context::{ContextTask, RuntimeContext, TaskScope};
pub use domain::{NewUser, ResultPoll, TaskEnvelope, TaskId, TaskResult, TaskStatus, TaskType};
pub use error::{BazaarError, StorageError};
pub use readiness::{Backoff, ReadinessGate, ReadinessReport, SchemaAction};
pub use runner::{TaskRunner, WorkerGroup};
pub use tasks::{submit_registration, RegisterUser, RegisterUserHandler};
pub use typed::{DynHandler, Handler, Task, TypedHandler, TypedRegistry};
