//! In-memory broker implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::TaskEnvelope;
use crate::error::BazaarError;
use crate::ports::{Broker, Delivery};

#[derive(Default)]
struct BrokerState {
    ready: VecDeque<TaskEnvelope>,
    delivered: u64,
    acked: u64,
    nacked: u64,
}

/// Queue + notify pair; a delivered envelope is returned to the queue on
/// nack, which is what makes this transport at-least-once.
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    reachable: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            notify: Arc::new(Notify::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Simulate broker connectivity. While unreachable, `enqueue` fails
    /// fast instead of buffering.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub async fn delivered(&self) -> u64 {
        self.state.lock().await.delivered
    }

    pub async fn acked(&self) -> u64 {
        self.state.lock().await.acked
    }

    pub async fn nacked(&self) -> u64 {
        self.state.lock().await.nacked
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), BazaarError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(BazaarError::BrokerUnreachable(
                "connection refused".to_string(),
            ));
        }
        {
            let mut state = self.state.lock().await;
            state.ready.push_back(envelope);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn lease(&self) -> Option<Box<dyn Delivery>> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(envelope) = state.ready.pop_front() {
                    state.delivered += 1;
                    return Some(Box::new(InMemoryDelivery {
                        envelope,
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                    }));
                }
            }
            self.notify.notified().await;
        }
    }
}

struct InMemoryDelivery {
    envelope: TaskEnvelope,
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    async fn ack(self: Box<Self>) -> Result<(), BazaarError> {
        self.state.lock().await.acked += 1;
        Ok(())
    }

    async fn nack(self: Box<Self>, error: String) -> Result<(), BazaarError> {
        tracing::debug!(task_id = %self.envelope.task_id(), error = %error, "envelope returned for redelivery");
        {
            let mut state = self.state.lock().await;
            state.nacked += 1;
            state.ready.push_back(self.envelope.clone());
        }
        // notify outside the lock
        self.notify.notify_one();
        Ok(())
    }
}
