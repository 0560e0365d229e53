use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::names::{FAILED, FAILURE_DESCRIPTION, OUTCOME, RESULT};
use crate::operation::{Composite, Operation};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation {operation} failed: {description}")]
    Failed { operation: String, description: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Sends management operations to a server.
///
/// Timeouts and retries belong to the implementation.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Execute one operation and return its `result` node.
    async fn execute(&self, operation: &Operation) -> Result<Value, DispatchError>;

    /// Execute a composite and return one response node per step, in step order.
    ///
    /// Step nodes carry their own `outcome`; a failed step is returned, not raised,
    /// so callers can tell which step failed.
    async fn execute_composite(&self, composite: &Composite) -> Result<Vec<Value>, DispatchError>;
}

pub fn is_failure(node: &Value) -> bool {
    node.get(OUTCOME).and_then(Value::as_str) == Some(FAILED)
}

pub fn failure_description(node: &Value) -> String {
    match node.get(FAILURE_DESCRIPTION) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "No failure description".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Step nodes `step-1`..`step-N` of a composite `result`, in order.
pub fn composite_steps(result: &Value, steps: usize) -> Result<Vec<Value>, DispatchError> {
    (1..=steps)
        .map(|i| {
            let name = format!("step-{i}");
            result
                .get(&name)
                .cloned()
                .ok_or_else(|| DispatchError::MalformedResponse(format!("missing {name} in composite {RESULT}")))
        })
        .collect()
}
