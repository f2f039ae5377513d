//! Domain model: identifiers, envelopes, results, records.

pub mod envelope;
pub mod ids;
pub mod result;
pub mod user;

pub use envelope::{TaskEnvelope, TaskType};
pub use ids::TaskId;
pub use result::{ResultPoll, TaskResult, TaskStatus};
pub use user::NewUser;
