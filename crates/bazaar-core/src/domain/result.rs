//! TaskResult: the tagged outcome a task body reports.
//!
//! A result is written to the result store at most once per envelope and is
//! never mutated after the write.

use serde::{Deserialize, Serialize};

/// Serialized lowercase so a stored result reads `{"status":"success",...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Success,
            message: message.into(),
            payload: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failure,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// What `fetch_result` returns: the recorded result, or a pending marker.
/// Never blocks waiting for the task to finish.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPoll {
    Ready(TaskResult),
    Pending,
}

impl ResultPoll {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResultPoll::Pending)
    }

    pub fn ready(&self) -> Option<&TaskResult> {
        match self {
            ResultPoll::Ready(result) => Some(result),
            ResultPoll::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let s = serde_json::to_string(&TaskStatus::Success).unwrap();
        assert_eq!(s, "\"success\"");
        let s = serde_json::to_string(&TaskStatus::Failure).unwrap();
        assert_eq!(s, "\"failure\"");
    }

    #[test]
    fn result_roundtrip_json() {
        let r = TaskResult::success("User registered successfully")
            .with_payload(serde_json::json!({"username": "alice"}));
        let s = serde_json::to_string(&r).unwrap();
        let back: TaskResult = serde_json::from_str(&s).unwrap();
        assert_eq!(back, r);
        assert!(back.is_success());
    }

    #[test]
    fn payload_is_omitted_when_absent() {
        let s = serde_json::to_string(&TaskResult::failure("oops")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["status"], "failure");
        assert!(v.get("payload").is_none());
    }
}
