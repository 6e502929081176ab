//! Tool adapter abstraction
//!
//! The engine never talks to external services directly. Every node
//! type maps to a capability backed by an adapter implementing the one
//! uniform contract below; adapter internals (auth, retries, rate
//! limits) live outside the core.

pub mod mock;

pub use mock::MockAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::workflow::NodeType;

/// Request handed to an adapter
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Operation name (the node's action)
    pub action: String,
    /// Resolved parameters (config beats node params)
    pub params: HashMap<String, String>,
    /// Main content payload, when the operation carries one
    pub payload: Option<String>,
}

impl ToolRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: HashMap::new(),
            payload: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Uniform adapter result: success with data, or failure with a
/// human-readable message. Adapters do not raise.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub success: bool,
    pub data: Option<String>,
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Contract every external integration implements
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Adapter name for logs and diagnostics
    fn name(&self) -> &str;

    /// Perform the side-effecting call
    async fn call(&self, request: ToolRequest) -> ToolResponse;
}

/// Adapters wired per capability.
///
/// Document read/create/append share one document-store adapter; the
/// dispatcher picks the slot with an exhaustive match, so a new node
/// type without a slot is a build error.
#[derive(Clone)]
pub struct AdapterSet {
    pub doc_store: Arc<dyn ToolAdapter>,
    pub web_search: Arc<dyn ToolAdapter>,
    pub repo: Arc<dyn ToolAdapter>,
    pub file: Arc<dyn ToolAdapter>,
    pub llm: Arc<dyn ToolAdapter>,
    pub email: Arc<dyn ToolAdapter>,
}

impl AdapterSet {
    /// Back every capability with the same adapter (tests, CLI dry runs)
    pub fn uniform(adapter: Arc<dyn ToolAdapter>) -> Self {
        Self {
            doc_store: Arc::clone(&adapter),
            web_search: Arc::clone(&adapter),
            repo: Arc::clone(&adapter),
            file: Arc::clone(&adapter),
            llm: Arc::clone(&adapter),
            email: adapter,
        }
    }

    pub fn adapter_for(&self, node_type: NodeType) -> &Arc<dyn ToolAdapter> {
        match node_type {
            NodeType::DocRead | NodeType::DocCreate | NodeType::DocAppend => &self.doc_store,
            NodeType::WebSearch => &self.web_search,
            NodeType::RepoRead => &self.repo,
            NodeType::FileIngest => &self.file,
            NodeType::Transform => &self.llm,
            NodeType::EmailSend => &self.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = ToolRequest::new("search")
            .with_param("query", "rust workflows")
            .with_payload("context");

        assert_eq!(req.action, "search");
        assert_eq!(req.params["query"], "rust workflows");
        assert_eq!(req.payload.as_deref(), Some("context"));
    }

    #[test]
    fn response_constructors() {
        let ok = ToolResponse::success("data");
        assert!(ok.success);
        assert_eq!(ok.data.as_deref(), Some("data"));
        assert!(ok.error.is_none());

        let err = ToolResponse::failure("rate limited");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("rate limited"));
        assert!(err.data.is_none());
    }

    #[test]
    fn uniform_set_routes_every_type() {
        let set = AdapterSet::uniform(Arc::new(MockAdapter::new()));
        for node_type in [
            NodeType::DocRead,
            NodeType::WebSearch,
            NodeType::RepoRead,
            NodeType::FileIngest,
            NodeType::Transform,
            NodeType::EmailSend,
            NodeType::DocCreate,
            NodeType::DocAppend,
        ] {
            assert_eq!(set.adapter_for(node_type).name(), "mock");
        }
    }
}
