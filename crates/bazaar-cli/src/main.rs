use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use bazaar_core::impls::{BcryptHasher, InMemoryBroker, InMemoryResultStore, InMemoryStorage, PgStorage};
use bazaar_core::ports::Storage;
use bazaar_core::{
    submit_registration, AppBuilder, RegisterUser, RegisterUserHandler, ResultPoll, Settings,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) Settings: from the environment when complete, local defaults
    // otherwise (so the demo runs without any setup).
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "incomplete environment, using local defaults");
            Settings::local()
        }
    };

    // (B) Storage: Postgres when DATABASE_URI is set, in-memory otherwise.
    // The pool is lazy either way; the readiness gate pays for the first
    // connection under its retry budget.
    let storage: Arc<dyn Storage> = if std::env::var("DATABASE_URI").is_ok() {
        match PgStorage::connect_lazy(&settings.database_url) {
            Ok(pg) => Arc::new(pg),
            Err(err) => {
                tracing::error!(error = %err, "invalid DATABASE_URI");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(InMemoryStorage::new())
    };

    // (C) Wire everything; startup blocks in the readiness gate.
    let builder = AppBuilder::new(
        settings,
        storage,
        Arc::new(InMemoryBroker::new()),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(BcryptHasher::default()),
    )
    .register::<RegisterUser, _>(RegisterUserHandler)
    .expect("registration handler wired once");

    let app = match builder.start().await {
        Ok(app) => app,
        Err(err) => {
            // storage never became ready: do not accept work
            tracing::error!(error = %err, "startup aborted");
            std::process::exit(1);
        }
    };

    // (D) Enqueue a registration and poll for its result.
    let task_id = match submit_registration(app.runner(), "alice", "555-0100", "secret").await {
        Ok(task_id) => task_id,
        Err(err) => {
            tracing::error!(error = %err, "enqueue failed");
            std::process::exit(1);
        }
    };
    tracing::info!(%task_id, "registration enqueued");

    loop {
        match app.runner().fetch_result(task_id).await {
            Ok(ResultPoll::Ready(result)) => {
                tracing::info!(status = ?result.status, message = %result.message, "task finished");
                break;
            }
            Ok(ResultPoll::Pending) => sleep(Duration::from_millis(50)).await,
            Err(err) => {
                tracing::error!(error = %err, "result lookup failed");
                std::process::exit(1);
            }
        }
    }

    app.shutdown().await;
}
