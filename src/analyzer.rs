//! Graph analyzer: greedy topological layering
//!
//! Partitions a node/edge graph into ordered execution layers. All
//! nodes whose dependencies are already satisfied join the same layer,
//! maximizing parallel width. Intra-layer order is the original node
//! array order, so identical input always yields identical output.

use std::collections::HashSet;

use tracing::warn;

use crate::error::EngineError;
use crate::workflow::{Edge, Node};

/// One parallel-safe slice of the graph
#[derive(Debug, Clone)]
pub struct ExecutionLayer {
    pub index: usize,
    pub nodes: Vec<Node>,
    /// Ids of nodes in earlier layers that feed this layer
    pub upstream_ids: Vec<String>,
}

/// Partition the graph into execution layers.
///
/// Repeated scans admit every node whose incoming edges all originate
/// from already-processed nodes; O(V·E) overall, fine for graphs in the
/// tens to low hundreds of nodes.
///
/// A scan that admits nothing while nodes remain means the graph has a
/// cycle or an edge referencing a missing node. That is a hard
/// structural error here — the stuck nodes are named and nothing is
/// scheduled.
pub fn compute_layers(nodes: &[Node], edges: &[Edge]) -> Result<Vec<ExecutionLayer>, EngineError> {
    let mut layers: Vec<ExecutionLayer> = Vec::new();
    let mut processed: HashSet<&str> = HashSet::with_capacity(nodes.len());

    while processed.len() < nodes.len() {
        let mut ready: Vec<usize> = Vec::new();
        let mut upstream: HashSet<&str> = HashSet::new();

        // Original array order keeps layering deterministic
        for (idx, node) in nodes.iter().enumerate() {
            if processed.contains(node.id.as_str()) {
                continue;
            }
            let satisfied = edges
                .iter()
                .filter(|e| e.target == node.id)
                .all(|e| processed.contains(e.source.as_str()));
            if satisfied {
                ready.push(idx);
            }
        }

        for &idx in &ready {
            for e in edges.iter().filter(|e| e.target == nodes[idx].id) {
                upstream.insert(e.source.as_str());
            }
        }

        if ready.is_empty() {
            let stuck: Vec<&str> = nodes
                .iter()
                .filter(|n| !processed.contains(n.id.as_str()))
                .map(|n| n.id.as_str())
                .collect();
            warn!(nodes = ?stuck, "layering stuck: cycle or dangling edge reference");
            return Err(EngineError::Structural(format!(
                "Cannot schedule nodes [{}]: cycle or edge referencing a missing node",
                stuck.join(", ")
            )));
        }

        for &idx in &ready {
            processed.insert(nodes[idx].id.as_str());
        }

        let mut upstream_ids: Vec<String> = upstream.into_iter().map(String::from).collect();
        upstream_ids.sort();

        layers.push(ExecutionLayer {
            index: layers.len(),
            nodes: ready.iter().map(|&idx| nodes[idx].clone()).collect(),
            upstream_ids,
        });
    }

    Ok(layers)
}
