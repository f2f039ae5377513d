//! Result store port: durable location keyed by task identifier.

use async_trait::async_trait;

use crate::domain::{ResultPoll, TaskId, TaskResult};
use crate::error::BazaarError;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record a result. First write wins: a redelivered envelope that runs
    /// twice cannot overwrite the recorded outcome.
    async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), BazaarError>;

    /// Look up a result. Returns immediately with `Pending` when the task
    /// has not finished; never blocks.
    async fn get(&self, task_id: TaskId) -> Result<ResultPoll, BazaarError>;
}
