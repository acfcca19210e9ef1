//! Normalized outcome of running a job handler.

use serde::{Deserialize, Serialize};

/// No handler is registered for the job's type.
pub const UNKNOWN_JOB_TYPE: &str = "UNKNOWN_JOB_TYPE";
/// The handler returned an error without its own code.
pub const HANDLER_ERROR: &str = "HANDLER_ERROR";
/// The handler panicked.
pub const HANDLER_PANIC: &str = "HANDLER_PANIC";
/// A secondary call-out made by the handler failed.
pub const CALL_OUT_FAILED: &str = "CALL_OUT_FAILED";

/// Structured failure carried by a `job.failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// What the executor hands back to the worker loop. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: None,
            error: Some(ExecutionError::new(code, message)),
        }
    }

    pub fn unknown_type(job_type: &str) -> Self {
        Self::failure(UNKNOWN_JOB_TYPE, format!("No handler registered for job type '{job_type}'"))
    }

    /// Error code of a failed result.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_result_carries_code() {
        let result = ExecutionResult::unknown_type("bogus");
        assert!(!result.ok);
        assert_eq!(result.error_code(), Some(UNKNOWN_JOB_TYPE));
        assert!(result.error.unwrap().message.contains("bogus"));
    }

    #[test]
    fn success_omits_error_when_serialized() {
        let result = ExecutionResult::success(serde_json::json!({"n": 1}));
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["output"]["n"], 1);
        assert!(json.get("error").is_none());
    }
}
