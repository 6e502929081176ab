//! Mock adapter for testing
//!
//! Returns configurable responses without touching real services.
//! Essential for unit tests and CI pipelines.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ToolAdapter, ToolRequest, ToolResponse};

/// Mock adapter with per-action scripted responses and failures
pub struct MockAdapter {
    /// Scripted responses keyed by action
    responses: Mutex<HashMap<String, String>>,
    /// Scripted failures keyed by action (wins over responses)
    failures: Mutex<HashMap<String, String>>,
    /// Default response when nothing is scripted
    default_response: String,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<ToolRequest>>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            default_response: "mock output".to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the default response when no script matches
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Script a response for a specific action
    pub fn respond_to(self, action: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.lock().insert(action.into(), response.into());
        self
    }

    /// Script a failure for a specific action
    pub fn fail_on(self, action: impl Into<String>, error: impl Into<String>) -> Self {
        self.failures.lock().insert(action.into(), error.into());
        self
    }

    /// Get all requests made to this adapter
    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<ToolRequest> {
        self.requests.lock().last().cloned()
    }

    /// Count requests for one action
    pub fn calls_for(&self, action: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.action == action)
            .count()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, request: ToolRequest) -> ToolResponse {
        self.requests.lock().push(request.clone());

        if let Some(error) = self.failures.lock().get(&request.action) {
            return ToolResponse::failure(error.clone());
        }

        let response = self
            .responses
            .lock()
            .get(&request.action)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());

        ToolResponse::success(response)
    }
}
