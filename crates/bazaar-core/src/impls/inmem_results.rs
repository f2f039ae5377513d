//! In-memory result store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ResultPoll, TaskId, TaskResult};
use crate::error::BazaarError;
use crate::ports::ResultStore;

#[derive(Debug, Clone)]
struct StoredResult {
    result: TaskResult,
    recorded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryResultStore {
    inner: Arc<Mutex<HashMap<TaskId, StoredResult>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_at(&self, task_id: TaskId) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .await
            .get(&task_id)
            .map(|stored| stored.recorded_at)
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), BazaarError> {
        let mut inner = self.inner.lock().await;
        match inner.entry(task_id) {
            Entry::Vacant(slot) => {
                slot.insert(StoredResult {
                    result,
                    recorded_at: Utc::now(),
                });
            }
            Entry::Occupied(_) => {
                // redelivered envelope ran again; the first result stands
                tracing::debug!(%task_id, "result already recorded, keeping first write");
            }
        }
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<ResultPoll, BazaarError> {
        let inner = self.inner.lock().await;
        Ok(match inner.get(&task_id) {
            Some(stored) => ResultPoll::Ready(stored.result.clone()),
            None => ResultPoll::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_until_put_then_ready() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();

        assert!(store.get(id).await.unwrap().is_pending());

        store.put(id, TaskResult::success("done")).await.unwrap();
        let poll = store.get(id).await.unwrap();
        assert_eq!(poll.ready().map(|r| r.message.as_str()), Some("done"));
        assert!(store.recorded_at(id).await.is_some());
    }

    #[tokio::test]
    async fn first_write_wins() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();

        store.put(id, TaskResult::success("first")).await.unwrap();
        store.put(id, TaskResult::failure("second")).await.unwrap();

        let poll = store.get(id).await.unwrap();
        assert_eq!(poll.ready().map(|r| r.message.as_str()), Some("first"));
    }
}
