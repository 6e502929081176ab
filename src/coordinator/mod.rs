//! Execution coordinator
//!
//! One shared async core drives layers to completion; the two delivery
//! strategies (live streaming, durable background) are thin adapters
//! implementing [`EventSink`] around it, so the surfaces stay
//! consistent by construction.

pub mod background;
pub mod stream;

pub use background::{BackgroundCoordinator, ExecutePayload, ExecuteRequested, WorkflowEventBus};
pub use stream::{StreamCoordinator, StreamEvent};

use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::analyzer::{compute_layers, ExecutionLayer};
use crate::context::{ExecutionContext, LayerOutput};
use crate::error::EngineError;
use crate::executor::NodeExecutor;
use crate::workflow::{Node, Workflow};

/// Terminal failure of a run: the first failing node and its message
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub node_id: String,
    pub message: String,
}

/// Strategy seam: how run progress leaves the core.
///
/// Node-level callbacks fire from concurrent per-node futures, so
/// implementations must tolerate interleaving across nodes; per-node
/// ordering (start before success/error) is guaranteed.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_run_start(&self, workflow: &Workflow, layer_count: usize);
    async fn on_node_start(&self, node: &Node);
    async fn on_node_success(&self, node: &Node, output: &str, duration_ms: u64);
    async fn on_node_error(&self, node: &Node, error: &str);
    async fn on_run_complete(&self, final_output: &str);
}

/// Validate the workflow and partition it into layers
pub fn plan(workflow: &Workflow) -> Result<Vec<ExecutionLayer>, EngineError> {
    workflow.validate()?;
    compute_layers(&workflow.nodes, &workflow.edges)
}

/// Drive layers in ascending order to completion.
///
/// Every node in a layer is dispatched concurrently; the core suspends
/// at the layer barrier, merges outputs in original node order, and
/// advances. Any single node failure aborts the run with no
/// partial-layer continuation and no retry.
#[instrument(skip_all, fields(layers = layers.len()))]
pub async fn drive_layers(
    executor: &NodeExecutor,
    layers: &[ExecutionLayer],
    ctx: &mut ExecutionContext,
    sink: &dyn EventSink,
) -> Result<String, RunFailure> {
    for layer in layers {
        debug!(layer = layer.index, width = layer.nodes.len(), "entering layer");

        // Shared read-only view for the in-flight layer; the only
        // writer is the merge below, after the barrier.
        let snapshot: &ExecutionContext = &*ctx;
        let futures = layer.nodes.iter().map(|node| async move {
            sink.on_node_start(node).await;
            let started = Instant::now();
            let result = executor.execute(node, snapshot).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            if result.success {
                sink.on_node_success(node, &result.output, duration_ms).await;
            } else {
                sink.on_node_error(node, result.error.as_deref().unwrap_or("node failed"))
                    .await;
            }
            result
        });

        // Layer barrier: wait for every node to settle
        let results = join_all(futures).await;

        if let Some(failed) = results.iter().find(|r| !r.success) {
            return Err(RunFailure {
                node_id: failed.node_id.clone(),
                message: failed
                    .error
                    .clone()
                    .unwrap_or_else(|| "node failed".to_string()),
            });
        }

        let outputs: Vec<LayerOutput> = layer
            .nodes
            .iter()
            .zip(results.iter())
            .map(|(node, result)| LayerOutput {
                node_id: node.id.clone(),
                node_type: node.node_type,
                output: result.output.clone(),
            })
            .collect();
        ctx.merge_layer(&outputs);
    }

    Ok(ctx.last_output.clone())
}
