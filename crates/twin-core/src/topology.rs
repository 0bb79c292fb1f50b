//! Declarative topology model
//!
//! These types mirror the JSON documents produced by the topology editor
//! (camelCase field names, kebab-case enum values). Fields every component
//! depends on are typed; everything else rides along in a free-form
//! [`Properties`] map so documents written by newer editors still load.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::TopologyError;
use crate::identity::{LinkId, NodeId};

/// Free-form extension properties attached to nodes and links
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Property key holding a firewall node's policy text
pub const POLICY_PROPERTY: &str = "policy";

/// Kind of device a node models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Router,
    Switch,
    Firewall,
    Modem,
    Server,
    Workstation,
    Mobile,
    Iot,
    Tdl,
    HackingDevice,
    CloudService,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Router => "router",
            NodeKind::Switch => "switch",
            NodeKind::Firewall => "firewall",
            NodeKind::Modem => "modem",
            NodeKind::Server => "server",
            NodeKind::Workstation => "workstation",
            NodeKind::Mobile => "mobile",
            NodeKind::Iot => "iot",
            NodeKind::Tdl => "tdl",
            NodeKind::HackingDevice => "hacking-device",
            NodeKind::CloudService => "cloud-service",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much damage losing a node would cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    #[serde(alias = "info")]
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Physical or logical medium of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    #[default]
    Ethernet,
    Wifi,
    Wan,
    Vpn,
    Serial,
    Tdl,
}

/// A network interface on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Interface {
    /// Create an enabled interface with the given address
    pub fn with_ip(name: impl Into<String>, ip: IpAddr) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            ip_address: Some(ip),
            subnet: None,
            mac_address: None,
            enabled: true,
        }
    }
}

/// A static route declared on a node
///
/// Traffic for any address inside `destination` is handed to the `via` node.
/// The destination is kept as authored text; a malformed destination simply
/// never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    #[serde(alias = "dest")]
    pub destination: String,
    pub via: NodeId,
}

impl StaticRoute {
    pub fn new(destination: impl Into<String>, via: impl Into<NodeId>) -> Self {
        Self {
            destination: destination.into(),
            via: via.into(),
        }
    }

    /// Parse the destination as a CIDR block; a bare address is a /32 (or /128)
    pub fn network(&self) -> Option<IpNetwork> {
        let dest = self.destination.trim();
        if dest.contains('/') {
            IpNetwork::from_str(dest).ok()
        } else {
            IpAddr::from_str(dest).ok().map(IpNetwork::from)
        }
    }

    /// Check if the route covers an address
    pub fn matches(&self, ip: IpAddr) -> bool {
        self.network().is_some_and(|net| net.contains(ip))
    }
}

/// A device in the modeled network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub risk_criticality: Criticality,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub routes: Vec<StaticRoute>,
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// Create a node with no tags, interfaces, or routes
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            kind,
            role: None,
            os: None,
            version: None,
            tags: BTreeSet::new(),
            risk_criticality: Criticality::default(),
            interfaces: Vec::new(),
            routes: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.risk_criticality = criticality;
        self
    }

    /// Add an interface carrying the given address
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        let name = format!("eth{}", self.interfaces.len());
        self.interfaces.push(Interface::with_ip(name, ip));
        self
    }

    pub fn with_route(mut self, destination: impl Into<String>, via: impl Into<NodeId>) -> Self {
        self.routes.push(StaticRoute::new(destination, via));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Attach firewall policy text
    pub fn with_policy(self, policy: impl Into<String>) -> Self {
        self.with_property(POLICY_PROPERTY, serde_json::Value::String(policy.into()))
    }

    pub fn is_firewall(&self) -> bool {
        self.kind == NodeKind::Firewall
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Policy text of a firewall node, if any was authored
    pub fn policy_text(&self) -> Option<&str> {
        self.properties
            .get(POLICY_PROPERTY)
            .and_then(|value| value.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    /// Read a boolean property, treating anything else as false
    pub fn property_flag(&self, key: &str) -> bool {
        self.properties
            .get(key)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Addresses of all enabled interfaces
    pub fn ip_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.interfaces
            .iter()
            .filter(|iface| iface.enabled)
            .filter_map(|iface| iface.ip_address)
    }
}

/// A connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
    /// Capacity in Mbps
    #[serde(default = "default_bandwidth")]
    pub bandwidth: f64,
    /// One-way latency in milliseconds
    #[serde(default)]
    pub latency: f64,
    /// Packet loss percentage (0-100)
    #[serde(default)]
    pub loss: f64,
    /// Jitter in milliseconds
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub can_fail: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Link {
    /// Create a healthy ethernet link with default characteristics
    pub fn new(id: impl Into<LinkId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: LinkKind::default(),
            bandwidth: default_bandwidth(),
            latency: 0.0,
            loss: 0.0,
            jitter: 0.0,
            can_fail: false,
            failed: false,
            label: None,
            properties: Properties::new(),
        }
    }

    pub fn with_kind(mut self, kind: LinkKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency = latency_ms;
        self
    }

    /// Mark the link as down in the canonical topology
    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    /// Check if the link has `node` as one of its endpoints
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint
    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.source == node {
            Some(&self.target)
        } else if &self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Descriptive metadata carried with a topology document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A modeled network: nodes, links, and their attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TopologyMetadata>,
}

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a topology document
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Add a default link between two nodes, naming it after its endpoints
    pub fn connect(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) -> LinkId {
        let (a, b) = (a.into(), b.into());
        let id = LinkId::new(format!("{a}--{b}"));
        self.links.push(Link::new(id.clone(), a, b));
        id
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.iter().find(|link| &link.id == id)
    }
}

fn default_true() -> bool {
    true
}

fn default_bandwidth() -> f64 {
    1000.0
}
