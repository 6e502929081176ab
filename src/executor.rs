//! Node executor dispatcher
//!
//! Maps a node to its external tool call. The contract is total: any
//! adapter-level or content-level failure is normalized into a failed
//! `NodeResult` carrying a human-readable message, never an `Err` or a
//! panic. Dispatch is an exhaustive match on `NodeType`, so a new node
//! type without a handler is a build error.

use tracing::{debug, instrument};

use crate::adapter::{AdapterSet, ToolRequest, ToolResponse};
use crate::context::ExecutionContext;
use crate::workflow::{Node, NodeType};

/// Action-name keywords that classify a transform as extraction or
/// analysis, which reads raw source content instead of the latest
/// merged output.
const ANALYSIS_KEYWORDS: &[&str] = &["extract", "find", "get", "analyze", "insights"];

/// Outcome of one node execution
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node_id: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl NodeResult {
    pub fn success(node_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Dispatcher over the closed node-type set
#[derive(Clone)]
pub struct NodeExecutor {
    adapters: AdapterSet,
}

impl NodeExecutor {
    pub fn new(adapters: AdapterSet) -> Self {
        Self { adapters }
    }

    /// Execute a node against the current context.
    ///
    /// Reads the context only; intra-layer writes are not visible until
    /// the coordinator merges at the layer barrier.
    #[instrument(skip(self, ctx), fields(node_id = %node.id, node_type = %node.node_type))]
    pub async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> NodeResult {
        debug!(action = %node.action, "dispatching node");

        let request = match self.build_request(node, ctx) {
            Ok(request) => request,
            Err(message) => return NodeResult::failure(&node.id, message),
        };

        let response = self.adapters.adapter_for(node.node_type).call(request).await;
        Self::into_result(&node.id, response)
    }

    /// Resolve parameters and build the adapter request.
    ///
    /// Precedence: externally supplied run configuration, then
    /// node-embedded params, then a raw fallback. A missing required
    /// value is a content failure, returned as the error message.
    fn build_request(&self, node: &Node, ctx: &ExecutionContext) -> Result<ToolRequest, String> {
        let mut request = ToolRequest::new(&node.action);
        for (key, value) in &node.params {
            request = request.with_param(key, value);
        }

        match node.node_type {
            NodeType::DocRead => Ok(request),

            NodeType::WebSearch => {
                if !node.params.contains_key("query") {
                    return Err(format!("Node '{}': no search query provided", node.id));
                }
                Ok(request)
            }

            NodeType::RepoRead => {
                let repo = ctx
                    .config
                    .repo
                    .clone()
                    .or_else(|| node.params.get("repo").cloned())
                    .ok_or_else(|| format!("Node '{}': no repository configured", node.id))?;
                Ok(request.with_param("repo", repo))
            }

            NodeType::FileIngest => {
                let payload = ctx.config.files.get(&node.id).ok_or_else(|| {
                    format!("Node '{}': no uploaded file payload for this node", node.id)
                })?;
                Ok(request.with_payload(payload.clone()))
            }

            NodeType::Transform => {
                let input = if is_analysis_action(&node.action) {
                    ctx.analysis_input()
                } else {
                    ctx.last_output.as_str()
                };
                if input.is_empty() {
                    return Err(format!(
                        "Node '{}': no input content available for transform",
                        node.id
                    ));
                }
                let instruction = node
                    .params
                    .get("prompt")
                    .or_else(|| node.params.get("instruction"))
                    .cloned()
                    .unwrap_or_else(|| humanize_action(&node.action));
                Ok(request
                    .with_param("instruction", instruction)
                    .with_payload(input.to_string()))
            }

            NodeType::EmailSend => {
                let to = ctx
                    .config
                    .recipient
                    .clone()
                    .or_else(|| node.params.get("to").cloned())
                    .ok_or_else(|| {
                        format!("Node '{}': no destination mailbox configured", node.id)
                    })?;
                let subject = node
                    .params
                    .get("subject")
                    .cloned()
                    .unwrap_or_else(|| "Workflow Result".to_string());
                Ok(request
                    .with_param("to", to)
                    .with_param("subject", subject)
                    .with_payload(ctx.last_output.clone()))
            }

            NodeType::DocCreate => {
                let parent = ctx
                    .config
                    .parent_doc
                    .clone()
                    .or_else(|| node.params.get("parent").cloned())
                    .ok_or_else(|| {
                        format!("Node '{}': no parent document configured", node.id)
                    })?;
                let title = node
                    .params
                    .get("title")
                    .cloned()
                    .unwrap_or_else(|| node.label.clone());
                Ok(request
                    .with_param("parent", parent)
                    .with_param("title", title)
                    .with_payload(ctx.last_output.clone()))
            }

            NodeType::DocAppend => {
                let target = ctx
                    .config
                    .target_doc
                    .clone()
                    .or_else(|| node.params.get("target").cloned())
                    .ok_or_else(|| {
                        format!("Node '{}': no target document configured", node.id)
                    })?;
                Ok(request
                    .with_param("target", target)
                    .with_payload(ctx.last_output.clone()))
            }
        }
    }

    fn into_result(node_id: &str, response: ToolResponse) -> NodeResult {
        if response.success {
            NodeResult::success(node_id, response.data.unwrap_or_default())
        } else {
            NodeResult::failure(
                node_id,
                response
                    .error
                    .unwrap_or_else(|| "adapter call failed".to_string()),
            )
        }
    }
}

/// True when the action name reads like extraction or analysis
fn is_analysis_action(action: &str) -> bool {
    let lower = action.to_lowercase();
    ANALYSIS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Humanize a snake_case action name into a natural-language
/// instruction: "extract_key_points" becomes "Extract Key Points".
fn humanize_action(action: &str) -> String {
    action
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
