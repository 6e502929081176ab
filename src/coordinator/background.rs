//! Strategy B: durable background delivery
//!
//! A run record is created and persisted before execution starts, so
//! status is pollable independent of the triggering process. Progress
//! lands as log entries in the store instead of a live push; a node
//! failure fails the whole run, and run-level retries are structurally
//! absent because many node actions are side-effecting and
//! non-idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{drive_layers, plan, EventSink};
use crate::context::ExecutionContext;
use crate::executor::NodeExecutor;
use crate::store::{LogEntry, LogKind, Run, RunStatus, RunStore};
use crate::workflow::{Node, RunConfig, Workflow};

/// Event name accepted by the bus
pub const EXECUTE_REQUESTED: &str = "workflow/execute.requested";

/// Envelope submitted to the durable event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequested {
    pub name: String,
    pub data: ExecutePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePayload {
    pub workflow_id: String,
    pub workflow: Workflow,
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcribed_text: Option<String>,
}

impl ExecuteRequested {
    pub fn new(workflow: Workflow, config: RunConfig) -> Self {
        Self {
            name: EXECUTE_REQUESTED.to_string(),
            data: ExecutePayload {
                workflow_id: workflow.workflow_id.clone(),
                workflow,
                config,
                transcribed_text: None,
            },
        }
    }
}

/// Sink that records progress as persisted log entries
struct StoreSink {
    store: Arc<dyn RunStore>,
    run_id: String,
}

#[async_trait]
impl EventSink for StoreSink {
    async fn on_run_start(&self, workflow: &Workflow, layer_count: usize) {
        self.store.append_log(
            &self.run_id,
            LogEntry::new(
                LogKind::Info,
                format!(
                    "Workflow '{}' started: {} layers",
                    workflow.workflow_id, layer_count
                ),
            ),
        );
    }

    async fn on_node_start(&self, node: &Node) {
        self.store.append_log(
            &self.run_id,
            LogEntry::new(LogKind::Progress, format!("Executing {}", node.label))
                .for_node(node.id.as_str()),
        );
    }

    async fn on_node_success(&self, node: &Node, output: &str, duration_ms: u64) {
        self.store.append_log(
            &self.run_id,
            LogEntry::new(LogKind::Success, format!("{} completed", node.label))
                .for_node(node.id.as_str())
                .with_metrics(json!({
                    "durationMs": duration_ms,
                    "outputChars": output.len(),
                })),
        );
    }

    async fn on_node_error(&self, node: &Node, error: &str) {
        self.store.append_log(
            &self.run_id,
            LogEntry::new(LogKind::Error, error.to_string()).for_node(node.id.as_str()),
        );
    }

    async fn on_run_complete(&self, _final_output: &str) {
        self.store.append_log(
            &self.run_id,
            LogEntry::new(LogKind::Info, "Workflow completed"),
        );
    }
}

/// Durable background coordinator
#[derive(Clone)]
pub struct BackgroundCoordinator {
    executor: NodeExecutor,
    store: Arc<dyn RunStore>,
}

impl BackgroundCoordinator {
    pub fn new(executor: NodeExecutor, store: Arc<dyn RunStore>) -> Self {
        Self { executor, store }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Execute a workflow as a durable run; returns the run id.
    ///
    /// The run record is persisted `PENDING` before any planning or
    /// node work, so a poller can observe it at every stage.
    pub async fn execute(&self, workflow: Workflow, config: RunConfig) -> String {
        let run = Run::new(workflow.clone(), config.clone());
        let run_id = run.id.clone();
        self.store.create(run);
        self.store
            .append_log(&run_id, LogEntry::new(LogKind::Info, "Run created"));

        let layers = match plan(&workflow) {
            Ok(layers) => layers,
            Err(err) => {
                let message = err.to_string();
                self.store.append_log(
                    &run_id,
                    LogEntry::new(LogKind::Error, message.clone()),
                );
                self.store
                    .finish(&run_id, RunStatus::Failed, Some(message));
                return run_id;
            }
        };

        self.store.update_status(&run_id, RunStatus::Running);

        let sink = StoreSink {
            store: Arc::clone(&self.store),
            run_id: run_id.clone(),
        };
        sink.on_run_start(&workflow, layers.len()).await;

        let mut ctx = ExecutionContext::new(config);
        match drive_layers(&self.executor, &layers, &mut ctx, &sink).await {
            Ok(final_output) => {
                sink.on_run_complete(&final_output).await;
                self.store.finish(&run_id, RunStatus::Completed, None);
                info!(run_id = %run_id, "background run completed");
            }
            Err(failure) => {
                self.store
                    .finish(&run_id, RunStatus::Failed, Some(failure.message.clone()));
                info!(run_id = %run_id, node_id = %failure.node_id, "background run failed");
            }
        }

        run_id
    }

    /// Execute from a bus envelope. Payload-level transcription takes
    /// precedence over the config field.
    pub async fn execute_envelope(&self, envelope: ExecuteRequested) -> String {
        let ExecutePayload {
            workflow,
            mut config,
            transcribed_text,
            ..
        } = envelope.data;
        if transcribed_text.is_some() {
            config.transcribed_text = transcribed_text;
        }
        self.execute(workflow, config).await
    }
}

/// In-process durable event bus.
///
/// A worker task consumes envelopes and spawns one background run per
/// envelope; callers discover results by polling the run store.
pub struct WorkflowEventBus {
    tx: mpsc::UnboundedSender<ExecuteRequested>,
}

impl WorkflowEventBus {
    pub fn start(coordinator: BackgroundCoordinator) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ExecuteRequested>();

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if envelope.name != EXECUTE_REQUESTED {
                    warn!(name = %envelope.name, "ignoring unknown event");
                    continue;
                }
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator.execute_envelope(envelope).await;
                });
            }
        });

        Self { tx }
    }

    /// Submit an envelope; false when the worker has shut down
    pub fn submit(&self, envelope: ExecuteRequested) -> bool {
        self.tx.send(envelope).is_ok()
    }
}
