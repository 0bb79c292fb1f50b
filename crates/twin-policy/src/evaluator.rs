//! First-match policy evaluation

use serde::Serialize;
use twin_core::{NodeId, Topology, TopologyGraph};

use crate::parser::Policy;
use crate::rule::{Action, Endpoint, Protocol, Rule};

/// Node facts rules can match on
pub trait TagLookup {
    /// Check if a node exists
    fn contains_node(&self, node: &str) -> bool;

    /// Check if a node carries a tag
    fn node_has_tag(&self, node: &NodeId, tag: &str) -> bool;

    /// Check if any node carries a tag
    fn tag_in_use(&self, tag: &str) -> bool;
}

impl TagLookup for Topology {
    fn contains_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n.id.as_str() == node)
    }

    fn node_has_tag(&self, node: &NodeId, tag: &str) -> bool {
        self.node(node).is_some_and(|n| n.has_tag(tag))
    }

    fn tag_in_use(&self, tag: &str) -> bool {
        self.nodes.iter().any(|n| n.has_tag(tag))
    }
}

impl TagLookup for TopologyGraph<'_> {
    fn contains_node(&self, node: &str) -> bool {
        self.contains(&NodeId::from(node))
    }

    fn node_has_tag(&self, node: &NodeId, tag: &str) -> bool {
        self.node(node).is_some_and(|n| n.has_tag(tag))
    }

    fn tag_in_use(&self, tag: &str) -> bool {
        self.nodes().any(|n| n.has_tag(tag))
    }
}

/// The traffic a policy is asked about
#[derive(Debug, Clone, Copy)]
pub struct FlowContext<'a> {
    pub source: &'a NodeId,
    pub destination: &'a NodeId,
    pub protocol: Protocol,
    pub port: Option<u16>,
}

/// Verdict of evaluating a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: Action,
    /// Text of the rule that decided, absent for the implicit default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    pub reason: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.action == Action::Allow
    }

    fn default_deny() -> Self {
        Self {
            action: Action::Deny,
            matched_rule: None,
            reason: "No matching policy rule (default deny)".to_string(),
        }
    }

    fn matched(rule: &Rule) -> Self {
        let reason = if rule.line > 0 {
            format!("Matched rule on line {}: {rule}", rule.line)
        } else {
            format!("Matched rule: {rule}")
        };
        Self {
            action: rule.action,
            matched_rule: Some(rule.to_string()),
            reason,
        }
    }
}

impl Policy {
    /// Evaluate a flow; the first matching rule decides, otherwise deny
    pub fn evaluate<T: TagLookup + ?Sized>(&self, flow: &FlowContext<'_>, nodes: &T) -> Decision {
        self.rules
            .iter()
            .find(|rule| rule.matches(flow, nodes))
            .map(Decision::matched)
            .unwrap_or_else(Decision::default_deny)
    }
}

impl Rule {
    /// Check if every part of the rule matches the flow
    pub fn matches<T: TagLookup + ?Sized>(&self, flow: &FlowContext<'_>, nodes: &T) -> bool {
        endpoint_matches(&self.source, flow.source, nodes)
            && endpoint_matches(&self.destination, flow.destination, nodes)
            && self.protocol_matches(flow.protocol)
            && self.port_matches(flow.port)
    }

    fn protocol_matches(&self, protocol: Protocol) -> bool {
        match self.protocol {
            None | Some(Protocol::Any) => true,
            Some(required) => required == protocol,
        }
    }

    fn port_matches(&self, port: Option<u16>) -> bool {
        match (self.port, port) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(matcher), Some(port)) => matcher.matches(port),
        }
    }
}

fn endpoint_matches<T: TagLookup + ?Sized>(endpoint: &Endpoint, node: &NodeId, nodes: &T) -> bool {
    match endpoint {
        Endpoint::Any => true,
        Endpoint::Named(name) => node.as_str() == name || nodes.node_has_tag(node, name),
    }
}
