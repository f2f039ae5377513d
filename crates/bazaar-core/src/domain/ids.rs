//! Task identifiers.
//!
//! ULID-backed: sortable by creation time and safe to mint on any node
//! without coordination, which matters because enqueue happens in the
//! request process while execution happens on a worker.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier assigned to a `TaskEnvelope` at enqueue time.
///
/// This is the only artifact the enqueuing caller retains; results are
/// looked up by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
