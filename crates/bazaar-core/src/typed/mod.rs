//! Typed task API.
//!
//! Two layers: a typed surface (`Task`, `Handler<T>`) that rules out
//! task-name typos and payload mismatches at compile time, and an
//! object-safe inner layer (`DynHandler`) the registry and runner work
//! with.

pub mod handler;
pub mod registry;
pub mod task;

pub use handler::{DynHandler, Handler, TypedHandler};
pub use registry::{RegistryError, TypedRegistry};
pub use task::Task;
