use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error};

use crate::dispatch::{composite_steps, failure_description, is_failure, DispatchError, Dispatcher};
use crate::names::RESULT;
use crate::operation::{Composite, Operation};

const CLIENT_NAME_HEADER: &str = "X-Management-Client-Name";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts JSON requests to a management HTTP endpoint, e.g. `http://localhost:9990/management`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    endpoint: String,
}

impl HttpDispatcher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DispatchError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    async fn post(&self, body: Value, label: &str) -> Result<Value, DispatchError> {
        let started = Instant::now();
        counter!("dispatch_requests_total", 1u64);
        let response = self
            .client
            .post(&self.endpoint)
            .header(CLIENT_NAME_HEADER, "arbor")
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        // failed operations come back as 500 with a regular failure payload
        let status = response.status();
        if !status.is_success() && status != StatusCode::INTERNAL_SERVER_ERROR {
            error!(endpoint = %self.endpoint, %status, operation = label, "management request rejected");
            return Err(DispatchError::Transport(format!("{}: {status}", self.endpoint)));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| DispatchError::MalformedResponse(e.to_string()))?;
        histogram!("dispatch_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(operation = label, took_ms = started.elapsed().as_millis() as u64, "management response");
        Ok(payload)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn execute(&self, operation: &Operation) -> Result<Value, DispatchError> {
        let label = operation.as_cli();
        let payload = self.post(operation.to_node(), &label).await?;
        if is_failure(&payload) {
            return Err(DispatchError::Failed { operation: label, description: failure_description(&payload) });
        }
        Ok(payload.get(RESULT).cloned().unwrap_or(Value::Null))
    }

    async fn execute_composite(&self, composite: &Composite) -> Result<Vec<Value>, DispatchError> {
        let label = composite.as_cli();
        let payload = self.post(composite.to_node(), &label).await?;
        match payload.get(RESULT) {
            Some(result) if result.is_object() => composite_steps(result, composite.len()),
            _ if is_failure(&payload) => {
                Err(DispatchError::Failed { operation: label, description: failure_description(&payload) })
            }
            _ => Err(DispatchError::MalformedResponse(format!("composite response without {RESULT}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client() {
        let dispatcher = HttpDispatcher::new("http://localhost:9990/management").unwrap();
        assert_eq!(dispatcher.endpoint(), "http://localhost:9990/management");
    }
}
