//! Workflow graph structures and validation
//!
//! The graph arrives as JSON from an upstream producer (editor or
//! generator) and is treated as an immutable snapshot once a run starts.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Pattern for node and edge ids (no whitespace, no separators that
/// would collide with template references downstream)
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// Closed set of node capabilities.
///
/// Adding a variant without a dispatcher arm is a compile error — the
/// executor matches exhaustively on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Read a page or query a database in the document store
    DocRead,
    /// Web search query
    WebSearch,
    /// Repository read (file contents, issue listing)
    RepoRead,
    /// Ingest an uploaded file payload (format-specific text extraction)
    FileIngest,
    /// Language-model transform with a generic or custom action name
    Transform,
    /// Deliver by email; requires a destination mailbox
    EmailSend,
    /// Create a document; requires a parent container
    DocCreate,
    /// Append to an existing document; requires a target document
    DocAppend,
}

impl NodeType {
    /// Source variants produce freshly retrieved external data and feed
    /// the context's `source_content` channel.
    pub fn is_source(self) -> bool {
        matches!(
            self,
            NodeType::DocRead | NodeType::WebSearch | NodeType::RepoRead | NodeType::FileIngest
        )
    }

    /// Capability table: which actions a type accepts.
    ///
    /// `Transform` accepts any non-empty action name (generic or custom);
    /// every other type has a fixed read/write verb set.
    pub fn allows_action(self, action: &str) -> bool {
        match self {
            NodeType::DocRead => matches!(action, "read_page" | "query_database"),
            NodeType::WebSearch => action == "search",
            NodeType::RepoRead => matches!(action, "read_file" | "list_issues"),
            NodeType::FileIngest => action == "extract_text",
            NodeType::Transform => !action.is_empty(),
            NodeType::EmailSend => action == "send",
            NodeType::DocCreate => action == "create",
            NodeType::DocAppend => action == "append",
        }
    }

    /// Wire name as it appears in graph JSON
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::DocRead => "doc_read",
            NodeType::WebSearch => "web_search",
            NodeType::RepoRead => "repo_read",
            NodeType::FileIngest => "file_ingest",
            NodeType::Transform => "transform",
            NodeType::EmailSend => "email_send",
            NodeType::DocCreate => "doc_create",
            NodeType::DocAppend => "doc_append",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed step in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub action: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub label: String,
}

/// Directed dependency between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Immutable workflow snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Parse a workflow from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate node shapes, the capability table, and edge endpoints.
    ///
    /// Cycle detection is the analyzer's job; this pass catches
    /// everything that can be rejected before layering.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if !ID_PATTERN.is_match(&node.id) {
                return Err(EngineError::Validation(format!(
                    "Invalid node id '{}'",
                    node.id
                )));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(EngineError::Validation(format!(
                    "Duplicate node id '{}'",
                    node.id
                )));
            }
            if node.label.trim().is_empty() {
                return Err(EngineError::Validation(format!(
                    "Node '{}' is missing a label",
                    node.id
                )));
            }
            if !node.node_type.allows_action(&node.action) {
                return Err(EngineError::Validation(format!(
                    "Node '{}': action '{}' is not allowed for type '{}'",
                    node.id, node.action, node.node_type
                )));
            }
        }

        for edge in &self.edges {
            if !seen.contains(edge.source.as_str()) {
                return Err(EngineError::Validation(format!(
                    "Edge '{}' references unknown source node '{}'",
                    edge.id, edge.source
                )));
            }
            if !seen.contains(edge.target.as_str()) {
                return Err(EngineError::Validation(format!(
                    "Edge '{}' references unknown target node '{}'",
                    edge.id, edge.target
                )));
            }
        }

        Ok(())
    }
}

/// Externally supplied run configuration.
///
/// A typed record instead of an open string map: config values beat
/// node-embedded params during parameter resolution, and uploaded file
/// payloads ride along keyed by the ingesting node's id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Destination mailbox for `email_send` nodes
    pub recipient: Option<String>,
    /// Parent container for `doc_create` nodes
    pub parent_doc: Option<String>,
    /// Target document for `doc_append` nodes
    pub target_doc: Option<String>,
    /// Repository identifier for `repo_read` nodes
    pub repo: Option<String>,
    /// Upstream transcription output; seeds the context's initial input
    pub transcribed_text: Option<String>,
    /// Uploaded file payloads keyed by node id (`file_ingest` input)
    pub files: HashMap<String, String>,
}
