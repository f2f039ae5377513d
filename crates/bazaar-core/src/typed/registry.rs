//! TypedRegistry: task_type -> handler.
//!
//! Built mutable during initialization, used immutable (behind an `Arc`) at
//! runtime. No locks needed.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for task_type '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `T`. Duplicate registration is a wiring bug,
    /// so it errors rather than overwriting.
    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let task_type = T::TYPE.to_string();
        if self.handlers.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.handlers
            .insert(task_type, Arc::new(TypedHandler::new(handler)));
        Ok(())
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TaskScope;
    use crate::domain::TaskResult;
    use crate::error::BazaarError;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Ping;

    impl Task for Ping {
        const TYPE: &'static str = "test.ping.v1";
    }

    struct PingHandler;

    #[async_trait]
    impl Handler<Ping> for PingHandler {
        async fn handle(
            &self,
            _scope: &mut TaskScope,
            _task: Ping,
        ) -> Result<TaskResult, BazaarError> {
            Ok(TaskResult::success("pong"))
        }
    }

    #[test]
    fn register_then_get() {
        let mut registry = TypedRegistry::new();
        registry.register::<Ping, _>(PingHandler).unwrap();

        assert!(registry.get(Ping::TYPE).is_some());
        assert!(registry.get("test.unknown.v1").is_none());
        assert_eq!(registry.registered_types(), vec![Ping::TYPE.to_string()]);
    }

    #[test]
    fn duplicate_registration_errors() {
        let mut registry = TypedRegistry::new();
        registry.register::<Ping, _>(PingHandler).unwrap();
        let err = registry.register::<Ping, _>(PingHandler).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }
}
