//! End-to-end engine scenarios
//!
//! Exercises the full pipeline: graph in, layers, concurrent dispatch
//! against the mock adapter, context merging, and both delivery
//! strategies with their run records and event streams.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_stream::StreamExt;

use weft::adapter::{AdapterSet, MockAdapter, ToolAdapter};
use weft::coordinator::{BackgroundCoordinator, StreamCoordinator, StreamEvent};
use weft::executor::NodeExecutor;
use weft::store::{LogKind, MemoryRunStore, RunStatus, RunStore};
use weft::workflow::{Edge, Node, NodeType, RunConfig, Workflow};
use weft::{compute_layers, ExecutionContext, LayerOutput};

fn node(id: &str, node_type: NodeType, action: &str) -> Node {
    Node {
        id: id.to_string(),
        node_type,
        action: action.to_string(),
        params: HashMap::new(),
        label: format!("{} step", id),
    }
}

fn edge(source: &str, target: &str) -> Edge {
    Edge {
        id: format!("{}-{}", source, target),
        source: source.to_string(),
        target: target.to_string(),
    }
}

fn search_node(id: &str) -> Node {
    let mut n = node(id, NodeType::WebSearch, "search");
    n.params.insert("query".to_string(), "rust".to_string());
    n
}

fn workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
    Workflow {
        workflow_id: "wf-test".to_string(),
        nodes,
        edges,
    }
}

// ============================================================================
// Analyzer properties
// ============================================================================

#[test]
fn layers_partition_the_node_set() {
    let nodes = vec![
        search_node("a"),
        node("b", NodeType::Transform, "summarize"),
        node("c", NodeType::Transform, "translate"),
        node("d", NodeType::EmailSend, "send"),
    ];
    let edges = vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")];

    let layers = compute_layers(&nodes, &edges).unwrap();

    let mut seen: Vec<&str> = layers
        .iter()
        .flat_map(|l| l.nodes.iter().map(|n| n.id.as_str()))
        .collect();
    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), total, "no node may appear twice");
    assert_eq!(seen, vec!["a", "b", "c", "d"], "no node may be dropped");

    for e in &edges {
        let layer_of = |id: &str| {
            layers
                .iter()
                .position(|l| l.nodes.iter().any(|n| n.id == id))
                .unwrap()
        };
        assert!(layer_of(&e.source) < layer_of(&e.target));
    }
}

#[test]
fn diamond_layers_exactly() {
    let nodes = vec![
        search_node("0"),
        node("1", NodeType::Transform, "summarize"),
        node("2", NodeType::Transform, "translate"),
        node("3", NodeType::EmailSend, "send"),
    ];
    let edges = vec![edge("0", "1"), edge("0", "2"), edge("1", "3"), edge("2", "3")];

    let layers = compute_layers(&nodes, &edges).unwrap();
    let ids: Vec<Vec<&str>> = layers
        .iter()
        .map(|l| l.nodes.iter().map(|n| n.id.as_str()).collect())
        .collect();
    assert_eq!(ids, vec![vec!["0"], vec!["1", "2"], vec!["3"]]);
}

#[test]
fn analyzer_is_deterministic() {
    let nodes = vec![
        search_node("a"),
        search_node("b"),
        node("c", NodeType::Transform, "summarize"),
    ];
    let edges = vec![edge("a", "c"), edge("b", "c")];

    let render = |layers: &[weft::ExecutionLayer]| -> String {
        layers
            .iter()
            .map(|l| {
                l.nodes
                    .iter()
                    .map(|n| n.id.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join("|")
    };

    let first = render(&compute_layers(&nodes, &edges).unwrap());
    for _ in 0..20 {
        assert_eq!(first, render(&compute_layers(&nodes, &edges).unwrap()));
    }
}

// ============================================================================
// Merge rule
// ============================================================================

#[test]
fn fan_out_merge_exact_string() {
    let mut ctx = ExecutionContext::default();
    ctx.merge_layer(&[
        LayerOutput {
            node_id: "X".to_string(),
            node_type: NodeType::Transform,
            output: "A".to_string(),
        },
        LayerOutput {
            node_id: "Y".to_string(),
            node_type: NodeType::Transform,
            output: "B".to_string(),
        },
    ]);
    assert_eq!(ctx.last_output, "## Result 1\n\nA\n\n---\n\n## Result 2\n\nB");
}

// ============================================================================
// Failure propagation (durable strategy)
// ============================================================================

#[tokio::test]
async fn parallel_failure_keeps_sibling_success_log() {
    let mock = Arc::new(
        MockAdapter::new()
            .respond_to("search", "found")
            .fail_on("read_page", "page not shared with integration"),
    );
    let store = Arc::new(MemoryRunStore::new());
    let coordinator = BackgroundCoordinator::new(
        NodeExecutor::new(AdapterSet::uniform(mock)),
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    let wf = workflow(
        vec![search_node("x"), node("y", NodeType::DocRead, "read_page")],
        vec![],
    );
    let run_id = coordinator.execute(wf, RunConfig::default()).await;

    let run = store.get(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("page not shared with integration"));
    assert!(
        run.logs
            .iter()
            .any(|l| l.kind == LogKind::Success && l.node_id.as_deref() == Some("x")),
        "node x's success entry must survive the failed run"
    );
}

#[tokio::test]
async fn source_transform_deliver_failure_sequence() {
    // A succeeds but yields empty output, so the transform B has no
    // input content and fails; the delivery C must never run.
    let store = Arc::new(MemoryRunStore::new());
    let mock = Arc::new(MockAdapter::new().respond_to("search", ""));
    let coordinator = BackgroundCoordinator::new(
        NodeExecutor::new(AdapterSet::uniform(mock)),
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    let wf = workflow(
        vec![
            search_node("A"),
            node("B", NodeType::Transform, "summarize"),
            node("C", NodeType::EmailSend, "send"),
        ],
        vec![edge("A", "B"), edge("B", "C")],
    );
    let run_id = coordinator.execute(wf, RunConfig::default()).await;

    let run = store.get(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);

    // progress(A), success(A), progress(B), error(B); C never dispatched
    let node_logs: Vec<(Option<&str>, LogKind)> = run
        .logs
        .iter()
        .filter(|l| l.node_id.is_some())
        .map(|l| (l.node_id.as_deref(), l.kind))
        .collect();
    assert_eq!(
        node_logs,
        vec![
            (Some("A"), LogKind::Progress),
            (Some("A"), LogKind::Success),
            (Some("B"), LogKind::Progress),
            (Some("B"), LogKind::Error),
        ]
    );
    assert!(!run.logs.iter().any(|l| l.node_id.as_deref() == Some("C")));
}

// ============================================================================
// Status monotonicity
// ============================================================================

#[tokio::test]
async fn completed_run_ignores_pending_update() {
    let mock = Arc::new(MockAdapter::new().respond_to("search", "hits"));
    let store = Arc::new(MemoryRunStore::new());
    let coordinator = BackgroundCoordinator::new(
        NodeExecutor::new(AdapterSet::uniform(mock)),
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    let run_id = coordinator
        .execute(workflow(vec![search_node("a")], vec![]), RunConfig::default())
        .await;
    assert_eq!(store.get(&run_id).unwrap().status, RunStatus::Completed);

    // Late or duplicate delivery notification
    store.update_status(&run_id, RunStatus::Pending);
    assert_eq!(store.get(&run_id).unwrap().status, RunStatus::Completed);
}

// ============================================================================
// Streaming strategy end-to-end
// ============================================================================

#[tokio::test]
async fn stream_carries_full_happy_path() {
    let mock = Arc::new(
        MockAdapter::new()
            .respond_to("search", "search hits")
            .respond_to("summarize", "digest"),
    );
    let coordinator = StreamCoordinator::new(NodeExecutor::new(AdapterSet::uniform(mock)));

    let wf = workflow(
        vec![search_node("a"), node("b", NodeType::Transform, "summarize")],
        vec![edge("a", "b")],
    );
    let events: Vec<StreamEvent> = coordinator.execute(wf, RunConfig::default()).collect().await;

    assert!(matches!(events.first(), Some(StreamEvent::Start { .. })));
    let progress_ids: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Progress { node_id, .. } => Some(node_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(progress_ids, vec!["a", "b"]);
    match events.last() {
        Some(StreamEvent::Complete { output, .. }) => assert_eq!(output, "digest"),
        other => panic!("expected complete, got {:?}", other),
    }
}

#[tokio::test]
async fn stream_preserves_events_before_failure() {
    let mock = Arc::new(
        MockAdapter::new()
            .respond_to("search", "hits")
            .fail_on("summarize", "model offline"),
    );
    let coordinator = StreamCoordinator::new(NodeExecutor::new(AdapterSet::uniform(mock)));

    let wf = workflow(
        vec![search_node("a"), node("b", NodeType::Transform, "summarize")],
        vec![edge("a", "b")],
    );
    let events: Vec<StreamEvent> = coordinator.execute(wf, RunConfig::default()).collect().await;

    // The earlier success is still on the stream
    assert!(events.iter().any(
        |e| matches!(e, StreamEvent::Success { node_id, .. } if node_id == "a")
    ));
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
}

// ============================================================================
// Config flow
// ============================================================================

#[tokio::test]
async fn config_recipient_reaches_email_adapter() {
    let mock = Arc::new(
        MockAdapter::new()
            .respond_to("search", "report body")
            .respond_to("send", "queued"),
    );
    let store = Arc::new(MemoryRunStore::new());
    let coordinator = BackgroundCoordinator::new(
        NodeExecutor::new(AdapterSet::uniform(Arc::clone(&mock) as Arc<dyn ToolAdapter>)),
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    let wf = workflow(
        vec![search_node("a"), node("mail", NodeType::EmailSend, "send")],
        vec![edge("a", "mail")],
    );
    let config = RunConfig {
        recipient: Some("ops@example.com".to_string()),
        ..Default::default()
    };
    let run_id = coordinator.execute(wf, config).await;

    assert_eq!(store.get(&run_id).unwrap().status, RunStatus::Completed);
    let send = mock
        .requests()
        .into_iter()
        .find(|r| r.action == "send")
        .unwrap();
    assert_eq!(send.params["to"], "ops@example.com");
    assert_eq!(send.payload.as_deref(), Some("report body"));
}

#[tokio::test]
async fn runs_listing_is_newest_first() {
    let mock = Arc::new(MockAdapter::new().respond_to("search", "hits"));
    let store = Arc::new(MemoryRunStore::new());
    let coordinator = BackgroundCoordinator::new(
        NodeExecutor::new(AdapterSet::uniform(mock)),
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    for i in 0..3 {
        let mut wf = workflow(vec![search_node("a")], vec![]);
        wf.workflow_id = format!("wf-{}", i);
        coordinator.execute(wf, RunConfig::default()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let all = store.get_all();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].workflow.workflow_id, "wf-2");
    assert_eq!(all[2].workflow.workflow_id, "wf-0");
}
