//! Weft - layered workflow execution engine
//!
//! Turns a declarative graph of typed steps into a completed run:
//! the analyzer partitions the graph into parallel-safe layers, the
//! dispatcher maps each node to an external tool call, and the
//! coordinator drives layers to completion under two delivery
//! strategies (live stream or durable background run).

pub mod adapter;
pub mod analyzer;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod store;
pub mod workflow;

pub use adapter::{AdapterSet, MockAdapter, ToolAdapter, ToolRequest, ToolResponse};
pub use analyzer::{compute_layers, ExecutionLayer};
pub use context::{ExecutionContext, LayerOutput};
pub use coordinator::{
    BackgroundCoordinator, ExecuteRequested, StreamCoordinator, StreamEvent, WorkflowEventBus,
};
pub use error::{EngineError, FixSuggestion};
pub use executor::{NodeExecutor, NodeResult};
pub use store::{LogEntry, LogKind, MemoryRunStore, Run, RunStatus, RunStore};
pub use workflow::{Edge, Node, NodeType, RunConfig, Workflow};
