//! Topology validation
//!
//! Errors make a topology unusable for simulation (dangling references,
//! ambiguous ids or addresses). Warnings are advisory and surface as findings
//! when topology linting is requested.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::identity::{LinkId, NodeId};
use crate::topology::Topology;

/// Links per node at which a node is flagged as a potential bottleneck
pub const HIGH_DEGREE_THRESHOLD: usize = 3;

/// What a validation issue is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    DuplicateNode,
    DuplicateLink,
    DanglingLink,
    SelfLoop,
    DuplicateAddress,
    IsolatedNode,
    HighDegree,
    MalformedRoute,
    UnknownGateway,
}

/// A single validation error or warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<LinkId>,
}

impl ValidationIssue {
    fn node(kind: IssueKind, node: &NodeId, message: String) -> Self {
        Self {
            kind,
            message,
            node_id: Some(node.clone()),
            link_id: None,
        }
    }

    fn link(kind: IssueKind, link: &LinkId, message: String) -> Self {
        Self {
            kind,
            message,
            node_id: None,
            link_id: Some(link.clone()),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating a topology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a topology
pub fn validate(topology: &Topology) -> ValidationReport {
    let mut report = ValidationReport::default();

    // Node uniqueness
    let mut node_ids: BTreeSet<&NodeId> = BTreeSet::new();
    for node in &topology.nodes {
        if !node_ids.insert(&node.id) {
            report.errors.push(ValidationIssue::node(
                IssueKind::DuplicateNode,
                &node.id,
                format!("Duplicate node ID: {}", node.id),
            ));
        }
    }

    // Link uniqueness and endpoint references
    let mut link_ids: BTreeSet<&LinkId> = BTreeSet::new();
    for link in &topology.links {
        if !link_ids.insert(&link.id) {
            report.errors.push(ValidationIssue::link(
                IssueKind::DuplicateLink,
                &link.id,
                format!("Duplicate link ID: {}", link.id),
            ));
        }
        for (end, node) in [("source", &link.source), ("target", &link.target)] {
            if !node_ids.contains(node) {
                report.errors.push(ValidationIssue::link(
                    IssueKind::DanglingLink,
                    &link.id,
                    format!("Link {} references non-existent {end} node: {node}", link.id),
                ));
            }
        }
        if link.source == link.target {
            report.errors.push(ValidationIssue::link(
                IssueKind::SelfLoop,
                &link.id,
                format!("Link {} connects node {} to itself", link.id, link.source),
            ));
        }
    }

    // Address uniqueness, needed for unambiguous lookups
    let mut owners: HashMap<IpAddr, &NodeId> = HashMap::new();
    for node in &topology.nodes {
        for ip in node.ip_addresses() {
            match owners.get(&ip) {
                Some(owner) if *owner != &node.id => {
                    report.errors.push(ValidationIssue::node(
                        IssueKind::DuplicateAddress,
                        &node.id,
                        format!("Address {ip} is assigned to both {owner} and {}", node.id),
                    ));
                }
                Some(_) => {}
                None => {
                    owners.insert(ip, &node.id);
                }
            }
        }
    }

    // Isolated and high-degree nodes
    let mut degree: BTreeMap<&NodeId, usize> = BTreeMap::new();
    for link in &topology.links {
        *degree.entry(&link.source).or_default() += 1;
        *degree.entry(&link.target).or_default() += 1;
    }
    for node in &topology.nodes {
        let count = degree.get(&node.id).copied().unwrap_or(0);
        if count == 0 && topology.nodes.len() > 1 {
            report.warnings.push(ValidationIssue::node(
                IssueKind::IsolatedNode,
                &node.id,
                format!("Node {} ({}) is isolated (no connections)", node.label, node.id),
            ));
        }
        if count >= HIGH_DEGREE_THRESHOLD {
            report.warnings.push(ValidationIssue::node(
                IssueKind::HighDegree,
                &node.id,
                format!(
                    "Node {} ({}) carries {count} links and may be a single point of failure",
                    node.label, node.id
                ),
            ));
        }
    }

    // Static routes
    for node in &topology.nodes {
        for route in &node.routes {
            if route.network().is_none() {
                report.warnings.push(ValidationIssue::node(
                    IssueKind::MalformedRoute,
                    &node.id,
                    format!(
                        "Route on {} has unparsable destination `{}`",
                        node.id, route.destination
                    ),
                ));
            }
            if !node_ids.contains(&route.via) {
                report.warnings.push(ValidationIssue::node(
                    IssueKind::UnknownGateway,
                    &node.id,
                    format!("Route on {} points at unknown node {}", node.id, route.via),
                ));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Link, Node, NodeKind};

    fn two_nodes() -> Topology {
        Topology::new()
            .with_node(Node::new("n1", NodeKind::Router))
            .with_node(Node::new("n2", NodeKind::Server))
    }

    #[test]
    fn test_valid_topology() {
        let topology = two_nodes().with_link(Link::new("l1", "n1", "n2"));
        let report = validate(&topology);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_node_ids() {
        let topology = two_nodes().with_node(Node::new("n1", NodeKind::Server));
        let report = validate(&topology);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].kind, IssueKind::DuplicateNode);
    }

    #[test]
    fn test_dangling_link() {
        let topology = two_nodes().with_link(Link::new("l1", "n1", "ghost"));
        let report = validate(&topology);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::DanglingLink);
        assert_eq!(report.errors[0].link_id, Some(LinkId::new("l1")));
    }

    #[test]
    fn test_duplicate_addresses() {
        let ip = "10.0.0.1".parse().unwrap();
        let topology = Topology::new()
            .with_node(Node::new("a", NodeKind::Server).with_ip(ip))
            .with_node(Node::new("b", NodeKind::Server).with_ip(ip))
            .with_link(Link::new("l1", "a", "b"));
        let report = validate(&topology);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::DuplicateAddress);
    }

    #[test]
    fn test_warnings() {
        let topology = Topology::new()
            .with_node(Node::new("hub", NodeKind::Switch))
            .with_node(Node::new("a", NodeKind::Workstation).with_route("bogus", "nowhere"))
            .with_node(Node::new("b", NodeKind::Workstation))
            .with_node(Node::new("c", NodeKind::Workstation))
            .with_node(Node::new("lonely", NodeKind::Iot))
            .with_link(Link::new("l1", "hub", "a"))
            .with_link(Link::new("l2", "hub", "b"))
            .with_link(Link::new("l3", "hub", "c"));

        let report = validate(&topology);
        assert!(report.is_valid());

        let kinds: Vec<IssueKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&IssueKind::HighDegree));
        assert!(kinds.contains(&IssueKind::IsolatedNode));
        assert!(kinds.contains(&IssueKind::MalformedRoute));
        assert!(kinds.contains(&IssueKind::UnknownGateway));
    }

    #[test]
    fn test_single_node_is_not_isolated() {
        let topology = Topology::new().with_node(Node::new("solo", NodeKind::Server));
        assert!(validate(&topology).warnings.is_empty());
    }
}
