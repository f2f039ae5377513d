//! Handler traits: typed surface plus object-safe erasure.

use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::Task;
use crate::context::TaskScope;
use crate::domain::TaskResult;
use crate::error::BazaarError;

/// Executes one task of type `T` against a per-execution scope.
///
/// A returned `TaskResult` (success or failure) is the task's recorded
/// outcome. A returned `Err` is an infrastructure fault; the runner converts
/// it into a failure result at the worker boundary, never a crash.
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, scope: &mut TaskScope, task: T) -> Result<TaskResult, BazaarError>;
}

/// Object-safe handler: what the registry stores and the runner invokes.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        scope: &mut TaskScope,
        payload: serde_json::Value,
    ) -> Result<TaskResult, BazaarError>;

    fn task_type(&self) -> &str;
}

/// Adapter from `Handler<T>` to `DynHandler`: decodes the JSON payload into
/// `T`, then delegates.
pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        scope: &mut TaskScope,
        payload: serde_json::Value,
    ) -> Result<TaskResult, BazaarError> {
        let task: T = serde_json::from_value(payload).map_err(|e| BazaarError::Codec {
            task_type: T::TYPE.to_string(),
            cause: e.to_string(),
        })?;
        self.handler.handle(scope, task).await
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}
