//! Application wiring: context, readiness gate, runner, workers, in that
//! order. No task body can run before the gate passes because workers are
//! only spawned afterwards.

use std::sync::Arc;

use crate::config::Settings;
use crate::context::RuntimeContext;
use crate::error::BazaarError;
use crate::ports::{Broker, CredentialHasher, ResultStore, Storage};
use crate::readiness::{Backoff, ReadinessGate};
use crate::runner::{TaskRunner, WorkerGroup};
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

pub struct AppBuilder {
    settings: Settings,
    storage: Arc<dyn Storage>,
    broker: Arc<dyn Broker>,
    results: Arc<dyn ResultStore>,
    hasher: Arc<dyn CredentialHasher>,
    registry: TypedRegistry,
    worker_count: Option<usize>,
}

impl AppBuilder {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn Storage>,
        broker: Arc<dyn Broker>,
        results: Arc<dyn ResultStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            settings,
            storage,
            broker,
            results,
            hasher,
            registry: TypedRegistry::new(),
            worker_count: None,
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Override the settings-provided worker count.
    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = Some(n);
        self
    }

    /// Run the readiness gate (blocking, by design, for up to
    /// `max_attempts x backoff`), then bring up the runner and workers.
    /// A gate failure means the process must not accept work; the caller
    /// is expected to exit non-zero.
    pub async fn start(self) -> Result<App, BazaarError> {
        let gate = ReadinessGate::new(
            Arc::clone(&self.storage),
            self.settings.readiness.max_attempts,
            Backoff::Fixed(self.settings.readiness.backoff),
        );
        gate.wait_until_ready().await?;

        let worker_count = self.worker_count.unwrap_or(self.settings.worker_count);
        let context = Arc::new(RuntimeContext::new(
            self.settings,
            self.storage,
            self.hasher,
        ));
        let runner = Arc::new(TaskRunner::new(
            self.broker,
            self.results,
            Arc::new(self.registry),
            context,
        ));
        let workers = runner.spawn_workers(worker_count);
        tracing::info!(worker_count, "task runner started");

        Ok(App { runner, workers })
    }
}

pub struct App {
    runner: Arc<TaskRunner>,
    workers: WorkerGroup,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.runner
    }

    /// Stop taking new deliveries and wait for in-flight tasks to finish.
    pub async fn shutdown(self) {
        self.workers.shutdown_and_join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResultPoll, TaskId, TaskStatus};
    use crate::impls::{BcryptHasher, InMemoryBroker, InMemoryResultStore, InMemoryStorage};
    use crate::tasks::{submit_registration, RegisterUser, RegisterUserHandler};
    use std::time::Duration;
    use tokio::time::sleep;

    async fn start_app(storage: Arc<InMemoryStorage>) -> Result<App, BazaarError> {
        let mut settings = Settings::local();
        settings.readiness.backoff = Duration::from_millis(1);
        let builder = AppBuilder::new(
            settings,
            storage,
            Arc::new(InMemoryBroker::new()),
            Arc::new(InMemoryResultStore::new()),
            Arc::new(BcryptHasher::fast()),
        )
        .register::<RegisterUser, _>(RegisterUserHandler)
        .unwrap()
        .worker_count(2);
        builder.start().await
    }

    async fn wait_for(app: &App, task_id: TaskId) -> crate::domain::TaskResult {
        for _ in 0..500 {
            if let ResultPoll::Ready(result) = app.runner().fetch_result(task_id).await.unwrap() {
                return result;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} never produced a result");
    }

    #[tokio::test]
    async fn registration_round_trip() {
        let storage = Arc::new(InMemoryStorage::new());
        let app = start_app(Arc::clone(&storage)).await.unwrap();

        // gate bootstrapped the schema on the empty backend
        assert_eq!(storage.schema_creation_count(), 1);

        let task_id = submit_registration(app.runner(), "alice", "555-0100", "secret")
            .await
            .unwrap();
        let result = wait_for(&app, task_id).await;
        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.message, "User registered successfully");

        let stored = storage.user("alice").expect("alice persisted");
        assert_ne!(stored.password_hash, "secret");

        // same username again: recorded failure with a conflict cause
        let task_id = submit_registration(app.runner(), "alice", "555-0199", "other")
            .await
            .unwrap();
        let result = wait_for(&app, task_id).await;
        assert_eq!(result.status, TaskStatus::Failure);
        assert!(result.message.contains("duplicate"));
        assert_eq!(storage.user_count(), 1);

        app.shutdown().await;

        // every scope opened by the workers was released
        assert_eq!(storage.sessions_opened(), storage.sessions_released());
    }

    #[tokio::test]
    async fn startup_aborts_when_storage_never_ready() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.fail_probes(u32::MAX);

        let err = start_app(Arc::clone(&storage)).await.unwrap_err();
        assert!(matches!(err, BazaarError::StorageUnavailable { .. }));
        assert_eq!(storage.probe_count(), 3); // Settings::local budget
    }
}
