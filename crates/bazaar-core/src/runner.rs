//! Background task runner: enqueue, result lookup, and the worker pool.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::context::{ContextTask, RuntimeContext};
use crate::domain::{ResultPoll, TaskEnvelope, TaskId, TaskResult, TaskType};
use crate::error::BazaarError;
use crate::ports::{Broker, ResultStore};
use crate::typed::{Task, TypedRegistry};

/// Hands envelopes to the broker and answers result lookups. Execution
/// happens on workers spawned from this runner, never inline.
pub struct TaskRunner {
    broker: Arc<dyn Broker>,
    results: Arc<dyn ResultStore>,
    registry: Arc<TypedRegistry>,
    context: Arc<RuntimeContext>,
}

impl TaskRunner {
    pub fn new(
        broker: Arc<dyn Broker>,
        results: Arc<dyn ResultStore>,
        registry: Arc<TypedRegistry>,
        context: Arc<RuntimeContext>,
    ) -> Self {
        Self {
            broker,
            results,
            registry,
            context,
        }
    }

    /// Enqueue one task. Returns the assigned identifier as soon as the
    /// broker accepts the envelope; an unreachable broker errors
    /// immediately instead of hanging or dropping the work.
    pub async fn enqueue<T: Task>(&self, task: &T) -> Result<TaskId, BazaarError> {
        let task_id = TaskId::generate();
        let payload = serde_json::to_value(task).map_err(|e| BazaarError::Codec {
            task_type: T::TYPE.to_string(),
            cause: e.to_string(),
        })?;
        let envelope = TaskEnvelope::new(task_id, TaskType::new(T::TYPE), payload);
        self.broker.enqueue(envelope).await?;
        tracing::debug!(%task_id, task_type = T::TYPE, "task enqueued");
        Ok(task_id)
    }

    /// Look up a recorded result. Immediate; `Pending` while the task has
    /// not finished.
    pub async fn fetch_result(&self, task_id: TaskId) -> Result<ResultPoll, BazaarError> {
        self.results.get(task_id).await
    }

    /// Spawn `n` workers pulling from this runner's broker.
    pub fn spawn_workers(self: &Arc<Self>, n: usize) -> WorkerGroup {
        WorkerGroup::spawn(n, Arc::clone(self))
    }

    /// Execute one envelope and produce its recorded outcome. Any error on
    /// the way (missing handler, payload decode, scope setup, task body
    /// fault) is converted into a failure result here so that no task-local
    /// error ever crosses the worker boundary as a crash.
    pub(crate) async fn execute(&self, envelope: &TaskEnvelope) -> TaskResult {
        let task_type = envelope.task_type().as_str();
        let outcome = match self.registry.get(task_type) {
            Some(handler) => {
                ContextTask::new(Arc::clone(&self.context), handler)
                    .call(envelope.payload().clone())
                    .await
            }
            None => Err(BazaarError::HandlerNotFound(task_type.to_string())),
        };
        match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(task_id = %envelope.task_id(), task_type, error = %err, "task failed");
                TaskResult::failure(err.to_string())
            }
        }
    }
}

/// Worker pool handle.
/// - `request_shutdown` stops workers from taking new deliveries; in-flight
///   executions finish.
/// - `shutdown_and_join` waits for all workers to exit.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    pub fn spawn(n: usize, runner: Arc<TaskRunner>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let runner = Arc::clone(&runner);
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, runner, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    runner: Arc<TaskRunner>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease may wait indefinitely, so race it against shutdown
        let delivery = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            delivery = runner.broker.lease() => delivery,
        };

        let Some(delivery) = delivery else {
            tokio::task::yield_now().await;
            continue;
        };

        let envelope = delivery.envelope().clone();
        let task_id = envelope.task_id();
        tracing::debug!(worker_id, %task_id, task_type = %envelope.task_type(), "delivery leased");

        let result = runner.execute(&envelope).await;

        // Record the result first, ack second: a crash in between causes a
        // redelivery that the result store's first-write-wins absorbs.
        match runner.results.put(task_id, result).await {
            Ok(()) => {
                if let Err(err) = delivery.ack().await {
                    tracing::error!(worker_id, %task_id, error = %err, "ack failed");
                }
            }
            Err(err) => {
                tracing::error!(worker_id, %task_id, error = %err, "result write failed, returning delivery");
                if let Err(err) = delivery.nack(err.to_string()).await {
                    tracing::error!(worker_id, %task_id, error = %err, "nack failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::TaskScope;
    use crate::domain::TaskStatus;
    use crate::impls::{BcryptHasher, InMemoryBroker, InMemoryResultStore, InMemoryStorage};
    use crate::typed::Handler;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Debug, Serialize, Deserialize)]
    struct Shout {
        message: String,
    }

    impl Task for Shout {
        const TYPE: &'static str = "test.shout.v1";
    }

    struct ShoutHandler;

    #[async_trait]
    impl Handler<Shout> for ShoutHandler {
        async fn handle(
            &self,
            _scope: &mut TaskScope,
            task: Shout,
        ) -> Result<TaskResult, BazaarError> {
            Ok(TaskResult::success(task.message.to_uppercase()))
        }
    }

    fn runner_with(broker: Arc<dyn Broker>, results: Arc<dyn ResultStore>) -> Arc<TaskRunner> {
        let mut registry = TypedRegistry::new();
        registry.register::<Shout, _>(ShoutHandler).unwrap();
        let context = Arc::new(RuntimeContext::new(
            Settings::local(),
            Arc::new(InMemoryStorage::with_schema()),
            Arc::new(BcryptHasher::fast()),
        ));
        Arc::new(TaskRunner::new(
            broker,
            results,
            Arc::new(registry),
            context,
        ))
    }

    async fn wait_for(runner: &TaskRunner, task_id: TaskId) -> TaskResult {
        for _ in 0..200 {
            if let ResultPoll::Ready(result) = runner.fetch_result(task_id).await.unwrap() {
                return result;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} never produced a result");
    }

    #[tokio::test]
    async fn enqueue_returns_id_and_worker_records_result() {
        let broker = Arc::new(InMemoryBroker::new());
        let results = Arc::new(InMemoryResultStore::new());
        let runner = runner_with(broker, results);

        let workers = runner.spawn_workers(2);
        let task_id = runner
            .enqueue(&Shout {
                message: "hi".to_string(),
            })
            .await
            .unwrap();

        let result = wait_for(&runner, task_id).await;
        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.message, "HI");

        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn enqueue_fails_fast_when_broker_unreachable() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.set_reachable(false);
        let results = Arc::new(InMemoryResultStore::new());
        let runner = runner_with(broker, results);

        let err = runner
            .enqueue(&Shout {
                message: "hi".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BazaarError::BrokerUnreachable(_)));
    }

    #[tokio::test]
    async fn missing_handler_is_recorded_as_failure() {
        let broker = Arc::new(InMemoryBroker::new());
        let results = Arc::new(InMemoryResultStore::new());
        let runner = runner_with(Arc::clone(&broker) as Arc<dyn Broker>, results);

        let envelope = TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new("test.unknown.v1"),
            serde_json::json!({}),
        );
        let result = runner.execute(&envelope).await;
        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.message.contains("handler not found"));
    }

    /// Result store that rejects the first `failures` writes: exercises the
    /// nack/redelivery path.
    struct FlakyResultStore {
        inner: InMemoryResultStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl ResultStore for FlakyResultStore {
        async fn put(&self, task_id: TaskId, result: TaskResult) -> Result<(), BazaarError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BazaarError::Other("result backend hiccup".to_string()));
            }
            self.inner.put(task_id, result).await
        }

        async fn get(&self, task_id: TaskId) -> Result<ResultPoll, BazaarError> {
            self.inner.get(task_id).await
        }
    }

    #[tokio::test]
    async fn redelivery_after_result_write_failure() {
        let broker = Arc::new(InMemoryBroker::new());
        let results = Arc::new(FlakyResultStore {
            inner: InMemoryResultStore::new(),
            failures: AtomicU32::new(1),
        });
        let runner = runner_with(
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&results) as Arc<dyn ResultStore>,
        );

        let workers = runner.spawn_workers(1);
        let task_id = runner
            .enqueue(&Shout {
                message: "again".to_string(),
            })
            .await
            .unwrap();

        // second delivery succeeds; at-least-once means the body ran twice
        let result = wait_for(&runner, task_id).await;
        assert_eq!(result.message, "AGAIN");
        assert!(broker.nacked().await >= 1);

        workers.shutdown_and_join().await;
    }
}
