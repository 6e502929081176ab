//! Strategy A: live streaming delivery
//!
//! Emits one JSON event per node transition over a unidirectional push
//! channel. The stream terminates on the first error or on `complete`;
//! events already emitted stay visible to the caller even when the run
//! fails partway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{drive_layers, plan, EventSink};
use crate::context::ExecutionContext;
use crate::executor::NodeExecutor;
use crate::workflow::{Node, RunConfig, Workflow};

/// One line-delimited event on the live stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Start {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        node_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Success {
        node_id: String,
        message: String,
        output: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
        message: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Complete {
        message: String,
        output: String,
        timestamp: DateTime<Utc>,
    },
}

/// Sink that pushes events into the caller's channel
struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelSink {
    fn send(&self, event: StreamEvent) {
        // A dropped receiver just means the caller went away
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn on_run_start(&self, workflow: &Workflow, layer_count: usize) {
        self.send(StreamEvent::Start {
            message: format!(
                "Executing workflow '{}' ({} layers)",
                workflow.workflow_id, layer_count
            ),
            timestamp: Utc::now(),
        });
    }

    async fn on_node_start(&self, node: &Node) {
        self.send(StreamEvent::Progress {
            node_id: node.id.clone(),
            message: format!("Executing {}", node.label),
            timestamp: Utc::now(),
        });
    }

    async fn on_node_success(&self, node: &Node, output: &str, _duration_ms: u64) {
        self.send(StreamEvent::Success {
            node_id: node.id.clone(),
            message: format!("{} completed", node.label),
            output: output.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn on_node_error(&self, node: &Node, error: &str) {
        self.send(StreamEvent::Error {
            node_id: Some(node.id.clone()),
            message: format!("{} failed", node.label),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn on_run_complete(&self, final_output: &str) {
        self.send(StreamEvent::Complete {
            message: "Workflow completed".to_string(),
            output: final_output.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Live streaming coordinator
#[derive(Clone)]
pub struct StreamCoordinator {
    executor: NodeExecutor,
}

impl StreamCoordinator {
    pub fn new(executor: NodeExecutor) -> Self {
        Self { executor }
    }

    /// Execute a workflow, returning the live event stream.
    ///
    /// Planning failures (validation, structure) surface as a single
    /// `error` event before the stream closes.
    pub fn execute(
        &self,
        workflow: Workflow,
        config: RunConfig,
    ) -> UnboundedReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let sink = ChannelSink { tx };

            let layers = match plan(&workflow) {
                Ok(layers) => layers,
                Err(err) => {
                    sink.send(StreamEvent::Error {
                        node_id: None,
                        message: "Workflow rejected".to_string(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    return;
                }
            };

            sink.on_run_start(&workflow, layers.len()).await;

            let mut ctx = ExecutionContext::new(config);
            // On failure the node's error event is already on the
            // stream; dropping the sender terminates it.
            if let Ok(final_output) = drive_layers(&executor, &layers, &mut ctx, &sink).await {
                sink.on_run_complete(&final_output).await;
            }
        });

        UnboundedReceiverStream::new(rx)
    }
}
