//! Flow routing: link-level paths, static routes, and firewall checks
//!
//! A probe is routed in two phases. First a node path is found: a shortest
//! usable path from the current node when one exists, otherwise a static
//! route on the current node whose destination covers an address of the
//! target hands the probe to the route's `via` node. Each hand-off spends one
//! unit of the hop budget, and revisiting a node is a routing loop.
//!
//! A hand-off travels the shortest usable path to the gateway, so the links
//! and firewalls on the way count like any others. When the modeled graph
//! has no path at all between the two, the gateway is treated as reachable
//! over an unmodeled uplink and the probe jumps straight to it. A path that
//! exists but is cut by failures makes the gateway unreachable.
//!
//! Second, every firewall on the node path (endpoints included) evaluates
//! the probe once, in path order. The first deny blocks it.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use thiserror::Error;
use tracing::{debug, trace};
use twin_core::{LinkId, LinkState, NodeId, Path, Structural, TopologyGraph};
use twin_policy::{Decision, FlowContext, Policy, PolicyParseError, Protocol};

/// Traffic to route
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub from: &'a NodeId,
    pub to: &'a NodeId,
    pub protocol: Protocol,
    pub port: Option<u16>,
}

/// Why no route exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unreachable {
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} is down")]
    NodeDown(NodeId),

    #[error("No path from {at} to {to}")]
    NoPath { at: NodeId, to: NodeId },

    #[error("Static route on {at} points at unknown node {via}")]
    UnknownGateway { at: NodeId, via: NodeId },

    #[error("Gateway {via} is not reachable from {at}")]
    GatewayUnreachable { at: NodeId, via: NodeId },

    #[error("Routing loop through {0}")]
    RoutingLoop(NodeId),

    #[error("Hop budget exhausted at {0}")]
    HopBudgetExhausted(NodeId),
}

/// Result of routing one probe
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Delivered {
        path: Path,
        latency_ms: f64,
        loss_percent: f64,
    },
    Blocked {
        /// Nodes up to and including the blocking firewall
        path: Path,
        firewall: NodeId,
        decision: Decision,
    },
    Unreachable(Unreachable),
}

impl RouteOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RouteOutcome::Delivered { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, RouteOutcome::Blocked { .. })
    }
}

/// Routing outcome plus the policy work it took
#[derive(Debug, Clone, PartialEq)]
pub struct RouteReport {
    pub outcome: RouteOutcome,
    pub policies_evaluated: u64,
}

impl RouteReport {
    fn unreachable(reason: Unreachable) -> Self {
        Self {
            outcome: RouteOutcome::Unreachable(reason),
            policies_evaluated: 0,
        }
    }
}

/// Routes probes across one topology for the duration of a run
///
/// Firewall policies are parsed once, when the router is built.
#[derive(Debug)]
pub struct Router<'g> {
    graph: &'g TopologyGraph<'g>,
    hop_budget: u32,
    policies: BTreeMap<NodeId, Policy>,
    parse_errors: Vec<(NodeId, PolicyParseError)>,
}

impl<'g> Router<'g> {
    pub fn new(graph: &'g TopologyGraph<'g>, hop_budget: u32) -> Self {
        let mut policies = BTreeMap::new();
        let mut parse_errors = Vec::new();

        for node in graph.nodes().filter(|node| node.is_firewall()) {
            let policy = match node.policy_text() {
                Some(text) => {
                    let parsed = Policy::parse(text);
                    parse_errors.extend(parsed.errors.into_iter().map(|err| (node.id.clone(), err)));
                    parsed.policy
                }
                None => {
                    debug!(firewall = %node.id, "No policy configured, denying all traffic");
                    Policy::fail_closed()
                }
            };
            policies.insert(node.id.clone(), policy);
        }

        Self {
            graph,
            hop_budget,
            policies,
            parse_errors,
        }
    }

    pub fn graph(&self) -> &'g TopologyGraph<'g> {
        self.graph
    }

    /// Policy lines skipped while parsing, in node order
    pub fn parse_errors(&self) -> &[(NodeId, PolicyParseError)] {
        &self.parse_errors
    }

    /// Parsed policy of a firewall node
    pub fn policy(&self, firewall: &NodeId) -> Option<&Policy> {
        self.policies.get(firewall)
    }

    /// Route a probe under the given link state
    pub fn route<S: LinkState + ?Sized>(&self, probe: &Probe<'_>, state: &S) -> RouteReport {
        for end in [probe.from, probe.to] {
            if !self.graph.contains(end) {
                return RouteReport::unreachable(Unreachable::UnknownNode(end.clone()));
            }
            if !state.node_usable(end) {
                return RouteReport::unreachable(Unreachable::NodeDown(end.clone()));
            }
        }

        let path = match self.find_path(probe, state) {
            Ok(path) => path,
            Err(reason) => {
                trace!(from = %probe.from, to = %probe.to, %reason, "Probe unreachable");
                return RouteReport::unreachable(reason);
            }
        };

        self.check_firewalls(probe, path, state)
    }

    fn find_path<S: LinkState + ?Sized>(&self, probe: &Probe<'_>, state: &S) -> Result<Path, Unreachable> {
        let targets: Vec<IpAddr> = self
            .graph
            .node(probe.to)
            .map(|node| node.ip_addresses().collect())
            .unwrap_or_default();

        let mut current = probe.from.clone();
        let mut budget = self.hop_budget;
        let mut visited = BTreeSet::from([current.clone()]);
        let mut nodes: Vec<NodeId> = Vec::new();
        let mut links: Vec<LinkId> = Vec::new();

        loop {
            if let Some(segment) = self.graph.shortest_path(&current, probe.to, state) {
                nodes.extend(segment.nodes);
                links.extend(segment.links);
                return Ok(Path { nodes, links });
            }

            if budget == 0 {
                return Err(Unreachable::HopBudgetExhausted(current));
            }

            let route = self.graph.node(&current).and_then(|node| {
                node.routes
                    .iter()
                    .find(|route| targets.iter().any(|ip| route.matches(*ip)))
            });
            let Some(route) = route else {
                return Err(Unreachable::NoPath {
                    at: current,
                    to: probe.to.clone(),
                });
            };

            let via = route.via.clone();
            if !self.graph.contains(&via) {
                return Err(Unreachable::UnknownGateway { at: current, via });
            }
            if !state.node_usable(&via) {
                return Err(Unreachable::NodeDown(via));
            }
            if !visited.insert(via.clone()) {
                return Err(Unreachable::RoutingLoop(via));
            }

            match self.graph.shortest_path(&current, &via, state) {
                Some(mut segment) => {
                    // The gateway opens the next segment
                    segment.nodes.pop();
                    nodes.extend(segment.nodes);
                    links.extend(segment.links);
                }
                None if self.graph.is_reachable(&current, &via, &Structural) => {
                    return Err(Unreachable::GatewayUnreachable { at: current, via });
                }
                None => nodes.push(current.clone()),
            }

            trace!(at = %current, via = %via, destination = %route.destination, "Forwarding via static route");
            budget -= 1;
            current = via;
        }
    }

    fn check_firewalls<S: LinkState + ?Sized>(&self, probe: &Probe<'_>, path: Path, state: &S) -> RouteReport {
        let context = FlowContext {
            source: probe.from,
            destination: probe.to,
            protocol: probe.protocol,
            port: probe.port,
        };

        let mut evaluated = 0;
        let mut checked: BTreeSet<&NodeId> = BTreeSet::new();

        for (position, node) in path.nodes.iter().enumerate() {
            let Some(policy) = self.policies.get(node) else {
                continue;
            };
            if !checked.insert(node) {
                continue;
            }

            evaluated += 1;
            let decision = policy.evaluate(&context, self.graph);
            trace!(firewall = %node, allowed = decision.is_allowed(), reason = %decision.reason, "Policy evaluated");

            if !decision.is_allowed() {
                let nodes = path.nodes[..=position].to_vec();
                let links = self.links_crossed(&path, position);
                return RouteReport {
                    outcome: RouteOutcome::Blocked {
                        path: Path { nodes, links },
                        firewall: node.clone(),
                        decision,
                    },
                    policies_evaluated: evaluated,
                };
            }
        }

        let latency_ms = self.graph.path_latency(&path, state);
        let loss_percent = self.graph.path_loss(&path, state);
        RouteReport {
            outcome: RouteOutcome::Delivered {
                path,
                latency_ms,
                loss_percent,
            },
            policies_evaluated: evaluated,
        }
    }

    /// Links crossed before reaching `path.nodes[end]`
    ///
    /// Walks node pairs so that gateway jumps, which cross no link, keep
    /// the prefix aligned.
    fn links_crossed(&self, path: &Path, end: usize) -> Vec<LinkId> {
        let mut remaining = path.links.iter().peekable();
        let mut crossed = Vec::new();
        for pair in path.nodes[..=end].windows(2) {
            if let Some(id) = remaining.peek()
                && let Some(link) = self.graph.link(id)
                && link.touches(&pair[0])
                && link.touches(&pair[1])
            {
                crossed.push((*id).clone());
                remaining.next();
            }
        }
        crossed
    }
}
