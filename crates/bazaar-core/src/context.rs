//! Shared runtime context and the per-execution scope.
//!
//! A worker runs detached from the request that enqueued its task: nothing
//! from the original call stack is visible to it. `RuntimeContext` is the
//! explicit bundle (configuration, storage, hasher) built once at startup
//! and handed into the execution boundary; `ContextTask` re-enters it
//! around every invocation.

use std::sync::Arc;

use crate::config::Settings;
use crate::domain::{NewUser, TaskResult};
use crate::error::{BazaarError, StorageError};
use crate::ports::{CredentialHasher, Storage, StorageSession};
use crate::typed::DynHandler;

/// Process-wide handles, created once and shared read-mostly. Outlives every
/// task; no task body may run before it exists.
pub struct RuntimeContext {
    settings: Arc<Settings>,
    storage: Arc<dyn Storage>,
    hasher: Arc<dyn CredentialHasher>,
}

impl RuntimeContext {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn Storage>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            storage,
            hasher,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Open a scope for one task execution: a fresh storage session bound
    /// to this invocation, plus shared read-only handles.
    pub async fn scope(&self) -> Result<TaskScope, BazaarError> {
        let session = self.storage.open_session().await?;
        tracing::debug!("task scope opened");
        Ok(TaskScope {
            session: Some(session),
            hasher: Arc::clone(&self.hasher),
            settings: Arc::clone(&self.settings),
        })
    }
}

/// Resource bundle whose lifetime is tied to one task execution.
///
/// The storage session is released when the scope drops, so every exit path
/// out of a task body (normal return or failure) releases it.
pub struct TaskScope {
    session: Option<Box<dyn StorageSession>>,
    hasher: Arc<dyn CredentialHasher>,
    settings: Arc<Settings>,
}

impl TaskScope {
    pub fn hasher(&self) -> &dyn CredentialHasher {
        self.hasher.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn insert_user(&mut self, user: &NewUser) -> Result<(), StorageError> {
        self.session_mut()?.insert_user(user).await
    }

    /// Commit this scope's session. A scope can be committed once; further
    /// storage calls error instead of silently reopening a handle.
    pub async fn commit(&mut self) -> Result<(), StorageError> {
        match self.session.take() {
            Some(session) => session.commit().await,
            None => Err(StorageError::Other("session already committed".to_string())),
        }
    }

    fn session_mut(&mut self) -> Result<&mut Box<dyn StorageSession>, StorageError> {
        self.session
            .as_mut()
            .ok_or_else(|| StorageError::Other("session already committed".to_string()))
    }
}

/// Decorator that re-establishes the runtime context around a task body.
///
/// The worker executing an envelope may be in a different thread or process
/// than the enqueue call, so each invocation: opens a scope, runs the inner
/// handler, and releases the scope on every exit path. The body's result or
/// failure passes through unchanged.
pub struct ContextTask {
    context: Arc<RuntimeContext>,
    inner: Arc<dyn DynHandler>,
}

impl ContextTask {
    pub fn new(context: Arc<RuntimeContext>, inner: Arc<dyn DynHandler>) -> Self {
        Self { context, inner }
    }

    pub async fn call(&self, payload: serde_json::Value) -> Result<TaskResult, BazaarError> {
        let mut scope = self.context.scope().await?;
        let outcome = self.inner.handle_dyn(&mut scope, payload).await;
        drop(scope); // released here on both paths
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{BcryptHasher, InMemoryStorage};
    use async_trait::async_trait;

    struct OkHandler;

    #[async_trait]
    impl DynHandler for OkHandler {
        async fn handle_dyn(
            &self,
            _scope: &mut TaskScope,
            _payload: serde_json::Value,
        ) -> Result<TaskResult, BazaarError> {
            Ok(TaskResult::success("ok"))
        }

        fn task_type(&self) -> &str {
            "test.ok.v1"
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl DynHandler for FailingHandler {
        async fn handle_dyn(
            &self,
            _scope: &mut TaskScope,
            _payload: serde_json::Value,
        ) -> Result<TaskResult, BazaarError> {
            Err(BazaarError::Other("boom".to_string()))
        }

        fn task_type(&self) -> &str {
            "test.fail.v1"
        }
    }

    fn context_over(storage: Arc<InMemoryStorage>) -> Arc<RuntimeContext> {
        Arc::new(RuntimeContext::new(
            Settings::local(),
            storage,
            Arc::new(BcryptHasher::fast()),
        ))
    }

    #[tokio::test]
    async fn scope_is_released_on_success_and_failure() {
        let storage = Arc::new(InMemoryStorage::with_schema());
        let ctx = context_over(Arc::clone(&storage));

        let ok = ContextTask::new(Arc::clone(&ctx), Arc::new(OkHandler));
        let failing = ContextTask::new(Arc::clone(&ctx), Arc::new(FailingHandler));

        for _ in 0..3 {
            ok.call(serde_json::json!({})).await.unwrap();
            let err = failing.call(serde_json::json!({})).await.unwrap_err();
            assert!(err.to_string().contains("boom"));
        }

        assert_eq!(storage.sessions_opened(), 6);
        assert_eq!(storage.sessions_released(), 6);
    }

    #[tokio::test]
    async fn failure_passes_through_unchanged() {
        let storage = Arc::new(InMemoryStorage::with_schema());
        let ctx = context_over(storage);
        let wrapped = ContextTask::new(ctx, Arc::new(FailingHandler));

        let err = wrapped.call(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, BazaarError::Other(_)));
    }

    #[tokio::test]
    async fn commit_twice_errors() {
        let storage = Arc::new(InMemoryStorage::with_schema());
        let ctx = context_over(storage);

        let mut scope = ctx.scope().await.unwrap();
        scope.commit().await.unwrap();
        let err = scope.commit().await.unwrap_err();
        assert!(err.to_string().contains("already committed"));
    }
}
