//! User registration task.
//!
//! Hash a credential, persist a new user record, report a structured
//! result. Runs off the request path; the enqueuing caller only keeps the
//! task id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::TaskScope;
use crate::domain::{NewUser, TaskId, TaskResult};
use crate::error::BazaarError;
use crate::runner::TaskRunner;
use crate::typed::{Handler, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub phone_number: String,
    pub password: String,
}

impl Task for RegisterUser {
    const TYPE: &'static str = "users.register.v1";
}

/// Registration is deliberately total: every failure (empty input, hashing
/// fault, duplicate username, storage error) becomes a failure result, so
/// nothing escapes to the runner as an error.
pub struct RegisterUserHandler;

#[async_trait]
impl Handler<RegisterUser> for RegisterUserHandler {
    async fn handle(
        &self,
        scope: &mut TaskScope,
        task: RegisterUser,
    ) -> Result<TaskResult, BazaarError> {
        if task.username.is_empty() || task.phone_number.is_empty() || task.password.is_empty() {
            return Ok(TaskResult::failure(
                "username, phone number and password must be non-empty",
            ));
        }

        let password_hash = match scope.hasher().hash(&task.password) {
            Ok(hash) => hash,
            Err(err) => return Ok(TaskResult::failure(err.to_string())),
        };

        let user = NewUser::new(&task.username, &task.phone_number, password_hash);

        // insert + commit is one atomic step: on any failure zero rows land
        if let Err(err) = scope.insert_user(&user).await {
            return Ok(TaskResult::failure(err.to_string()));
        }
        if let Err(err) = scope.commit().await {
            return Ok(TaskResult::failure(err.to_string()));
        }

        tracing::info!(username = %task.username, "user registered");
        Ok(TaskResult::success("User registered successfully"))
    }
}

/// Enqueue entrypoint for the web layer: submit a registration and get the
/// task id back without waiting for execution.
pub async fn submit_registration(
    runner: &TaskRunner,
    username: &str,
    phone_number: &str,
    password: &str,
) -> Result<TaskId, BazaarError> {
    runner
        .enqueue(&RegisterUser {
            username: username.to_string(),
            phone_number: phone_number.to_string(),
            password: password.to_string(),
        })
        .await
}
