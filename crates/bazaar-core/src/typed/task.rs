//! Task trait: binds a payload type to its task name.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A unit of deferred work with a stable wire name.
///
/// Naming convention: `{namespace}.{action}.v{major}`, e.g.
/// `users.register.v1`. Bump the major on breaking payload changes.
///
/// Bounds: `Serialize`/`DeserializeOwned` for the envelope payload,
/// `Send + Sync + 'static` so handlers can be shared across workers.
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}
