//! Blast-radius analysis
//!
//! Estimates the damage of losing (or losing control of) one node. The
//! analysis is structural: every modeled link counts, whether or not it is
//! currently failed, and the run's faults are ignored.
//!
//! Score:
//! - 10 per affected node (the target and its direct neighbors)
//! - criticality weight per affected node
//! - 20 per neighbor whose only links lead to the target
//!
//! The last term is an approximation. A neighbor that keeps any other link
//! is treated as still connected, even if that link leads nowhere useful.

use serde::{Deserialize, Serialize};
use twin_core::{Criticality, LinkId, NodeId, Topology, TopologyError, TopologyGraph};

/// Score added per affected node
pub const AFFECTED_NODE_SCORE: u32 = 10;

/// Score added per neighbor left without links
pub const ISOLATION_PENALTY: u32 = 20;

/// Extra weight of an affected node by criticality
pub fn criticality_weight(criticality: Criticality) -> u32 {
    match criticality {
        Criticality::Critical => 50,
        Criticality::High => 30,
        Criticality::Medium => 10,
        Criticality::Low => 0,
    }
}

/// Impact of compromising one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadiusResult {
    pub compromised_node_id: NodeId,
    /// The compromised node first, then neighbors in link order
    pub affected_node_ids: Vec<NodeId>,
    pub affected_link_ids: Vec<LinkId>,
    pub impact_score: u32,
    /// Reserved for attack-path enumeration; always empty
    pub critical_paths: Vec<Vec<NodeId>>,
    /// Neighbors that keep no link once the compromised node's links go
    pub isolated_node_ids: Vec<NodeId>,
}

/// Compute the blast radius of a node in a topology
pub fn compute_blast_radius(topology: &Topology, node: &NodeId) -> Result<BlastRadiusResult, TopologyError> {
    let graph = TopologyGraph::build(topology)?;
    blast_radius(&graph, node)
}

/// Compute the blast radius over an already built graph
pub fn blast_radius(graph: &TopologyGraph<'_>, target: &NodeId) -> Result<BlastRadiusResult, TopologyError> {
    if !graph.contains(target) {
        return Err(TopologyError::UnknownNode(target.clone()));
    }

    let mut affected_node_ids = vec![target.clone()];
    let mut affected_link_ids = Vec::new();
    for link in graph.incident_links(target) {
        affected_link_ids.push(link.id.clone());
        if let Some(other) = link.other_end(target)
            && !affected_node_ids.contains(other)
        {
            affected_node_ids.push(other.clone());
        }
    }

    let mut impact_score = AFFECTED_NODE_SCORE * affected_node_ids.len() as u32;
    for id in &affected_node_ids {
        if let Some(node) = graph.node(id) {
            impact_score += criticality_weight(node.risk_criticality);
        }
    }

    // Neighbors whose every link touches the target are stranded once it goes
    let isolated_node_ids: Vec<NodeId> = affected_node_ids
        .iter()
        .skip(1)
        .filter(|neighbor| graph.incident_links(neighbor).all(|link| link.touches(target)))
        .cloned()
        .collect();
    impact_score += ISOLATION_PENALTY * isolated_node_ids.len() as u32;

    Ok(BlastRadiusResult {
        compromised_node_id: target.clone(),
        affected_node_ids,
        affected_link_ids,
        impact_score,
        critical_paths: Vec::new(),
        isolated_node_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::{Link, Node, NodeKind};

    #[test]
    fn test_isolated_low_criticality_node() {
        let topology = Topology::new()
            .with_node(Node::new("lonely", NodeKind::Iot).with_criticality(Criticality::Low))
            .with_node(Node::new("other", NodeKind::Server));

        let result = compute_blast_radius(&topology, &NodeId::new("lonely")).unwrap();
        assert_eq!(result.affected_node_ids, vec![NodeId::new("lonely")]);
        assert!(result.affected_link_ids.is_empty());
        assert!(result.isolated_node_ids.is_empty());
        assert!(result.critical_paths.is_empty());
        assert_eq!(result.impact_score, 10);
    }

    #[test]
    fn test_star_hub() {
        // hub (critical) with leaves a, b (medium) and c (low); c also links to a
        let topology = Topology::new()
            .with_node(Node::new("hub", NodeKind::Switch).with_criticality(Criticality::Critical))
            .with_node(Node::new("a", NodeKind::Server))
            .with_node(Node::new("b", NodeKind::Server))
            .with_node(Node::new("c", NodeKind::Iot).with_criticality(Criticality::Low))
            .with_link(Link::new("l1", "hub", "a"))
            .with_link(Link::new("l2", "b", "hub"))
            .with_link(Link::new("l3", "hub", "c"))
            .with_link(Link::new("l4", "c", "a"));

        let result = compute_blast_radius(&topology, &NodeId::new("hub")).unwrap();
        let ids = |v: &[NodeId]| v.iter().map(|n| n.as_str().to_string()).collect::<Vec<_>>();

        assert_eq!(ids(&result.affected_node_ids), vec!["hub", "a", "b", "c"]);
        assert_eq!(
            result.affected_link_ids,
            vec![LinkId::new("l1"), LinkId::new("l2"), LinkId::new("l3")]
        );
        // Only b is stranded: a and c keep l4
        assert_eq!(ids(&result.isolated_node_ids), vec!["b"]);
        // 4 * 10 + (50 + 10 + 10 + 0) + 20
        assert_eq!(result.impact_score, 130);
    }

    #[test]
    fn test_failed_links_still_count() {
        let topology = Topology::new()
            .with_node(Node::new("a", NodeKind::Router).with_criticality(Criticality::Low))
            .with_node(Node::new("b", NodeKind::Router).with_criticality(Criticality::Low))
            .with_link(Link::new("l1", "a", "b").failed());

        let result = compute_blast_radius(&topology, &NodeId::new("a")).unwrap();
        assert_eq!(result.affected_node_ids.len(), 2);
        assert_eq!(result.impact_score, 20 + 20);
    }

    #[test]
    fn test_parallel_links_list_neighbor_once() {
        let topology = Topology::new()
            .with_node(Node::new("a", NodeKind::Router).with_criticality(Criticality::Low))
            .with_node(Node::new("b", NodeKind::Router).with_criticality(Criticality::Low))
            .with_link(Link::new("l1", "a", "b"))
            .with_link(Link::new("l2", "b", "a"));

        let result = compute_blast_radius(&topology, &NodeId::new("a")).unwrap();
        assert_eq!(result.affected_node_ids.len(), 2);
        assert_eq!(result.affected_link_ids.len(), 2);
        assert_eq!(result.impact_score, 20 + 20);
    }

    #[test]
    fn test_unknown_node() {
        let topology = Topology::new().with_node(Node::new("a", NodeKind::Router));
        assert!(matches!(
            compute_blast_radius(&topology, &NodeId::new("ghost")),
            Err(TopologyError::UnknownNode(_))
        ));
    }
}
