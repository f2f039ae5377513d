//! Broker port: the transport carrying task envelopes to workers.

use async_trait::async_trait;

use crate::domain::TaskEnvelope;
use crate::error::BazaarError;

/// A delivered envelope leased to one worker. The worker owns the delivery
/// and must either `ack` or `nack`; a nacked (or never-acked) envelope is
/// redelivered, which is what makes execution at-least-once.
#[async_trait]
pub trait Delivery: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// The envelope was fully processed and its result recorded.
    async fn ack(self: Box<Self>) -> Result<(), BazaarError>;

    /// Processing did not complete; return the envelope for redelivery.
    async fn nack(self: Box<Self>, error: String) -> Result<(), BazaarError>;
}

/// Broker port. Protocol details are an external collaborator's concern;
/// the runner treats the transport as opaque.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Hand an envelope to the broker. Never runs the task inline and never
    /// silently drops work: an unreachable broker fails fast with
    /// `BazaarError::BrokerUnreachable`.
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), BazaarError>;

    /// Lease one envelope (waits until available).
    async fn lease(&self) -> Option<Box<dyn Delivery>>;
}
