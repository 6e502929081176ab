//! Run-scoped execution context
//!
//! Owned exclusively by the coordinator. Node executions get `&self`
//! while a layer is in flight; all writes happen at the layer barrier.

use std::collections::HashMap;

use crate::workflow::{NodeType, RunConfig};

/// Separator between accumulated results
const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// One node's contribution to a finished layer, in original node order
#[derive(Debug, Clone)]
pub struct LayerOutput {
    pub node_id: String,
    pub node_type: NodeType,
    pub output: String,
}

/// Mutable run-scoped state threaded through the layers.
///
/// Two content channels feed downstream transforms:
/// - `last_output`: the most recently merged result, default input for
///   generic transform and delivery actions.
/// - `source_content`: the running concatenation of source-node output,
///   preferred by extraction/analysis actions so multi-step transform
///   chains keep access to the raw input.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub last_output: String,
    pub source_content: String,
    pub outputs_by_node: HashMap<String, String>,
    pub config: RunConfig,
    /// Derived text registered by file-ingest nodes, keyed by node id
    pub uploads: HashMap<String, String>,
}

impl ExecutionContext {
    /// Create a context seeded from run configuration.
    ///
    /// Upstream transcription, when supplied, becomes the initial
    /// `last_output` so a transform-first workflow has input to work on.
    pub fn new(config: RunConfig) -> Self {
        let last_output = config.transcribed_text.clone().unwrap_or_default();
        Self {
            last_output,
            config,
            ..Default::default()
        }
    }

    /// Input for an extraction/analysis action: raw source content when
    /// any has accumulated, otherwise the latest merged output.
    pub fn analysis_input(&self) -> &str {
        if self.source_content.is_empty() {
            &self.last_output
        } else {
            &self.source_content
        }
    }

    /// Apply a finished layer's outputs, in original node order.
    ///
    /// A single output becomes `last_output` verbatim; a fan-out layer
    /// is joined with numbered `## Result <i>` headings. Source-node
    /// output additionally accumulates into `source_content`.
    pub fn merge_layer(&mut self, outputs: &[LayerOutput]) {
        match outputs {
            [] => {}
            [single] => self.last_output = single.output.clone(),
            many => {
                self.last_output = many
                    .iter()
                    .enumerate()
                    .map(|(i, o)| format!("## Result {}\n\n{}", i + 1, o.output))
                    .collect::<Vec<_>>()
                    .join(RESULT_SEPARATOR);
            }
        }

        for out in outputs {
            if out.node_type.is_source() {
                if self.source_content.is_empty() {
                    self.source_content = out.output.clone();
                } else {
                    self.source_content.push_str(RESULT_SEPARATOR);
                    self.source_content.push_str(&out.output);
                }
            }
            if out.node_type == NodeType::FileIngest {
                self.uploads.insert(out.node_id.clone(), out.output.clone());
            }
            self.outputs_by_node
                .insert(out.node_id.clone(), out.output.clone());
        }
    }
}
