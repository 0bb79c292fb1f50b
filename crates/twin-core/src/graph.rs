//! Read-only graph index over a topology
//!
//! [`TopologyGraph`] borrows a validated [`Topology`] and precomputes:
//! - Adjacency lists ordered by neighbor id (deterministic traversal)
//! - Interface address to owning node lookup
//!
//! Connectivity is undirected. Every query takes a [`LinkState`] so the same
//! graph serves the canonical topology and a simulation run's fault overlay.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;
use crate::identity::{LinkId, NodeId};
use crate::topology::{Link, Node, Topology};
use crate::traits::LinkState;
use crate::validation::validate;

/// A neighbor reached through a specific link
#[derive(Debug, Clone, Copy)]
pub struct Adjacent<'a> {
    pub node: &'a NodeId,
    pub link: &'a Link,
}

/// A hop-by-hop path through the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Nodes visited, source first
    pub nodes: Vec<NodeId>,
    /// Links crossed, in order; a static-route jump between unlinked nodes crosses none
    pub links: Vec<LinkId>,
}

/// Index over a topology, built once per run
#[derive(Debug)]
pub struct TopologyGraph<'a> {
    topology: &'a Topology,
    nodes: BTreeMap<&'a NodeId, &'a Node>,
    links: BTreeMap<&'a LinkId, &'a Link>,
    adjacency: BTreeMap<&'a NodeId, Vec<Adjacent<'a>>>,
    by_ip: HashMap<IpAddr, &'a NodeId>,
}

impl<'a> TopologyGraph<'a> {
    /// Validate and index a topology
    ///
    /// Fails with [`TopologyError::Invalid`] when the topology has
    /// configuration errors; warnings do not prevent construction.
    pub fn build(topology: &'a Topology) -> Result<Self, TopologyError> {
        let report = validate(topology);
        if !report.is_valid() {
            return Err(TopologyError::Invalid(report.errors));
        }

        let nodes: BTreeMap<&NodeId, &Node> =
            topology.nodes.iter().map(|node| (&node.id, node)).collect();
        let links: BTreeMap<&LinkId, &Link> =
            topology.links.iter().map(|link| (&link.id, link)).collect();

        let mut adjacency: BTreeMap<&NodeId, Vec<Adjacent<'a>>> =
            nodes.keys().map(|id| (*id, Vec::new())).collect();
        for link in &topology.links {
            if let Some(list) = adjacency.get_mut(&link.source) {
                list.push(Adjacent { node: &link.target, link });
            }
            if let Some(list) = adjacency.get_mut(&link.target) {
                list.push(Adjacent { node: &link.source, link });
            }
        }
        for list in adjacency.values_mut() {
            list.sort_by(|a, b| a.node.cmp(b.node).then_with(|| a.link.id.cmp(&b.link.id)));
        }

        let by_ip = topology
            .nodes
            .iter()
            .flat_map(|node| node.ip_addresses().map(move |ip| (ip, &node.id)))
            .collect();

        Ok(Self {
            topology,
            nodes,
            links,
            adjacency,
            by_ip,
        })
    }

    /// The underlying topology
    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    pub fn node(&self, id: &NodeId) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    pub fn link(&self, id: &LinkId) -> Option<&'a Link> {
        self.links.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in authored order
    pub fn nodes(&self) -> impl Iterator<Item = &'a Node> + 'a {
        self.topology.nodes.iter()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All neighbors of a node, regardless of link state
    pub fn neighbors(&self, id: &NodeId) -> &[Adjacent<'a>] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbors reachable right now under the given link state
    pub fn usable_neighbors<'s, S: LinkState + ?Sized>(
        &'s self,
        id: &NodeId,
        state: &'s S,
    ) -> impl Iterator<Item = &'s Adjacent<'a>> + 's {
        self.neighbors(id)
            .iter()
            .filter(move |adj| state.link_usable(adj.link) && state.node_usable(adj.node))
    }

    /// Links with the node as an endpoint, in authored order
    pub fn incident_links(&self, id: &NodeId) -> impl Iterator<Item = &'a Link> + '_ {
        let id = id.clone();
        self.topology.links.iter().filter(move |link| link.touches(&id))
    }

    /// Owner of an interface address
    pub fn node_by_ip(&self, ip: IpAddr) -> Option<&'a NodeId> {
        self.by_ip.get(&ip).copied()
    }

    /// Shortest path by hop count between two nodes
    ///
    /// Breadth-first over usable links; ties resolve toward the lowest
    /// neighbor id so repeated queries return the same path.
    pub fn shortest_path<S: LinkState + ?Sized>(
        &self,
        from: &NodeId,
        to: &NodeId,
        state: &S,
    ) -> Option<Path> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if !state.node_usable(from) || !state.node_usable(to) {
            return None;
        }
        if from == to {
            return Some(Path {
                nodes: vec![from.clone()],
                links: Vec::new(),
            });
        }

        let previous = self.search(from, Some(to), state);
        previous.contains_key(to).then(|| self.unwind(&previous, to))
    }

    /// Shortest paths from one node to every node it can reach
    ///
    /// One breadth-first pass; each path matches what [`Self::shortest_path`]
    /// returns for the same pair.
    pub fn shortest_paths_from<S: LinkState + ?Sized>(&self, from: &NodeId, state: &S) -> BTreeMap<NodeId, Path> {
        if !self.contains(from) || !state.node_usable(from) {
            return BTreeMap::new();
        }
        let previous = self.search(from, None, state);
        previous
            .keys()
            .map(|node| ((*node).clone(), self.unwind(&previous, node)))
            .collect()
    }

    /// Breadth-first predecessor tree rooted at `from`, optionally stopping at `stop`
    fn search<S: LinkState + ?Sized>(
        &self,
        from: &NodeId,
        stop: Option<&NodeId>,
        state: &S,
    ) -> BTreeMap<&'a NodeId, Option<Adjacent<'a>>> {
        // Predecessor map doubles as the visited set
        let mut previous: BTreeMap<&'a NodeId, Option<Adjacent<'a>>> = BTreeMap::new();
        let mut queue: VecDeque<&'a NodeId> = VecDeque::new();
        let Some((start, _)) = self.nodes.get_key_value(from) else {
            return previous;
        };
        previous.insert(start, None);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if stop == Some(current) {
                break;
            }
            for adj in self.usable_neighbors(current, state) {
                if previous.contains_key(adj.node) {
                    continue;
                }
                previous.insert(
                    adj.node,
                    Some(Adjacent {
                        node: current,
                        link: adj.link,
                    }),
                );
                queue.push_back(adj.node);
            }
        }

        previous
    }

    fn unwind(&self, previous: &BTreeMap<&NodeId, Option<Adjacent<'a>>>, end: &NodeId) -> Path {
        let mut nodes = vec![end.clone()];
        let mut links = Vec::new();
        let mut cursor = end;
        while let Some(Some(step)) = previous.get(cursor) {
            links.push(step.link.id.clone());
            nodes.push(step.node.clone());
            cursor = step.node;
        }
        nodes.reverse();
        links.reverse();
        Path { nodes, links }
    }

    /// Check if any usable path joins two nodes
    pub fn is_reachable<S: LinkState + ?Sized>(&self, from: &NodeId, to: &NodeId, state: &S) -> bool {
        if from == to {
            return self.contains(from) && state.node_usable(from);
        }
        self.component(from, state).contains(to)
    }

    /// All nodes reachable from `start`, including itself
    pub fn component<S: LinkState + ?Sized>(&self, start: &NodeId, state: &S) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        if !self.contains(start) || !state.node_usable(start) {
            return seen;
        }

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for adj in self.usable_neighbors(current, state) {
                if !seen.contains(adj.node) {
                    stack.push(adj.node);
                }
            }
        }
        seen
    }

    /// Total latency of a path in milliseconds
    pub fn path_latency<S: LinkState + ?Sized>(&self, path: &Path, state: &S) -> f64 {
        path.links
            .iter()
            .filter_map(|id| self.link(id))
            .map(|link| state.link_latency(link))
            .sum()
    }

    /// Combined loss percentage of a path
    pub fn path_loss<S: LinkState + ?Sized>(&self, path: &Path, state: &S) -> f64 {
        let delivered = path
            .links
            .iter()
            .filter_map(|id| self.link(id))
            .map(|link| 1.0 - (state.link_loss(link) / 100.0).clamp(0.0, 1.0))
            .product::<f64>();
        (1.0 - delivered) * 100.0
    }

    /// Render a simple ASCII view of the graph
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Links: {}\n\n", self.link_count()));

        for (node_id, neighbors) in &self.adjacency {
            let kind = self.node(node_id).map(|n| n.kind.as_str()).unwrap_or("?");
            let neighbor_str: Vec<String> = neighbors
                .iter()
                .map(|adj| {
                    if adj.link.failed {
                        format!("{} (down)", adj.node)
                    } else {
                        adj.node.to_string()
                    }
                })
                .collect();
            output.push_str(&format!(
                "  {} [{}] -> [{}]\n",
                node_id,
                kind,
                neighbor_str.join(", ")
            ));
        }
        output
    }
}
