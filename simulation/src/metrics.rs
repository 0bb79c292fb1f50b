//! Run metrics: traffic counters plus reachability and latency matrices

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use twin_core::{LinkState, NodeId, TopologyGraph};

/// Source node -> target node -> value
pub type NodeMatrix<T> = BTreeMap<NodeId, BTreeMap<NodeId, T>>;

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub packets_processed: u64,
    pub packets_dropped: u64,
    pub policies_evaluated: u64,
    pub policies_blocked: u64,
    pub flows_delivered: u64,
    pub flows_blocked: u64,
    pub flows_dropped: u64,
    pub flows_unreachable: u64,
    pub steps_executed: u64,
    #[serde(default)]
    pub reachability_matrix: NodeMatrix<bool>,
    /// Latency of the shortest path in milliseconds; `null` when unreachable
    #[serde(default)]
    pub latency_matrix: NodeMatrix<Option<f64>>,
}

impl Metrics {
    /// Share of accounted packets that were delivered
    pub fn delivery_rate(&self) -> f64 {
        let total = self.packets_processed.saturating_add(self.packets_dropped);
        if total == 0 {
            0.0
        } else {
            self.packets_processed as f64 / total as f64
        }
    }

    /// Fill both matrices from the network state at the end of a run
    pub fn record_matrices<S: LinkState + ?Sized>(&mut self, graph: &TopologyGraph<'_>, state: &S) {
        self.reachability_matrix = reachability_matrix(graph, state);
        self.latency_matrix = latency_matrix(graph, state);
    }
}

/// Which nodes can reach which over usable links
///
/// A node always reaches itself.
pub fn reachability_matrix<S: LinkState + ?Sized>(graph: &TopologyGraph<'_>, state: &S) -> NodeMatrix<bool> {
    let mut matrix = NodeMatrix::new();
    for source in graph.nodes() {
        let component = graph.component(&source.id, state);
        let row = graph
            .nodes()
            .map(|target| {
                let reachable = target.id == source.id || component.contains(&target.id);
                (target.id.clone(), reachable)
            })
            .collect();
        matrix.insert(source.id.clone(), row);
    }
    matrix
}

/// Latency of the hop-shortest path between every pair of nodes
pub fn latency_matrix<S: LinkState + ?Sized>(graph: &TopologyGraph<'_>, state: &S) -> NodeMatrix<Option<f64>> {
    let mut matrix = NodeMatrix::new();
    for source in graph.nodes() {
        let paths = graph.shortest_paths_from(&source.id, state);
        let row = graph
            .nodes()
            .map(|target| {
                let latency = if target.id == source.id {
                    Some(0.0)
                } else {
                    paths.get(&target.id).map(|path| graph.path_latency(path, state))
                };
                (target.id.clone(), latency)
            })
            .collect();
        matrix.insert(source.id.clone(), row);
    }
    matrix
}
