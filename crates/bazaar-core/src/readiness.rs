//! Startup readiness gate.
//!
//! Blocks the main startup thread (the only operation allowed to) until the
//! storage dependency answers a probe and the required schema exists, with a
//! bounded retry budget. Exhausting the budget is fatal: the process must
//! not accept work without its durable dependency.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{BazaarError, StorageError};
use crate::ports::{Storage, REQUIRED_TABLES};

/// Injectable sleep policy between attempts.
#[derive(Debug, Clone)]
pub enum Backoff {
    /// Same delay every attempt (the deployment default).
    Fixed(Duration),

    /// `base * multiplier^(attempt-1)`.
    Exponential { base: Duration, multiplier: f64 },

    /// Fixed base plus up to `spread` of uniform jitter.
    Jittered { base: Duration, spread: Duration },
}

impl Backoff {
    /// Delay to sleep after the given attempt (1-indexed) failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base, multiplier } => {
                let exponent = attempt.saturating_sub(1) as i32;
                Duration::from_secs_f64(base.as_secs_f64() * multiplier.powi(exponent))
            }
            Backoff::Jittered { base, spread } => *base + spread.mul_f64(rand::random::<f64>()),
        }
    }
}

/// What the gate did about the schema on the attempt that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    /// All required objects already existed; creation was skipped entirely.
    AlreadyPresent,

    /// At least one object was missing; the full required set was created.
    Created,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessReport {
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    pub schema: SchemaAction,
}

pub struct ReadinessGate {
    storage: Arc<dyn Storage>,
    max_attempts: u32,
    backoff: Backoff,
}

impl ReadinessGate {
    pub fn new(storage: Arc<dyn Storage>, max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            storage,
            max_attempts,
            backoff,
        }
    }

    /// Block until storage is ready, retrying connectivity failures up to
    /// the budget. A `max_attempts` of zero still probes once.
    ///
    /// Non-connectivity storage errors (a failed schema inspection or
    /// creation on a live connection) are not retried: recurrence of a
    /// schema problem after the dependency answers is a different, fatal
    /// condition.
    pub async fn wait_until_ready(&self) -> Result<ReadinessReport, BazaarError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt().await {
                Ok(schema) => {
                    tracing::info!(attempt, ?schema, "storage ready");
                    return Ok(ReadinessReport {
                        attempts: attempt,
                        schema,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "storage not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    return Err(BazaarError::StorageUnavailable {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => return Err(BazaarError::Storage(err)),
            }
        }
    }

    /// One readiness attempt: probe, inspect, create if anything is
    /// missing. When every required object exists the creation step is
    /// skipped entirely, so a restart against a ready database performs no
    /// schema side effects.
    async fn attempt(&self) -> Result<SchemaAction, StorageError> {
        self.storage.probe().await?;
        let existing = self.storage.existing_tables().await?;
        if REQUIRED_TABLES.iter().all(|table| existing.contains(*table)) {
            return Ok(SchemaAction::AlreadyPresent);
        }
        self.storage.create_schema().await?;
        Ok(SchemaAction::Created)
    }
}
