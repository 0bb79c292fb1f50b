//! Scenario and result types for the simulator
//!
//! Scenarios describe what happens to a topology over logical time: traffic
//! flows, injected faults, and attacker actions. Results carry per-flow
//! outcomes, metrics, the event log, findings, and blast-radius analyses.
//! JSON field names are camelCase to match the host application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use twin_core::{FlowId, LinkId, NodeId, Properties};
use twin_policy::Protocol;

use crate::blast::BlastRadiusResult;
use crate::findings::Finding;
use crate::metrics::Metrics;

/// Default scenario length in milliseconds
pub const DEFAULT_DURATION_MS: u64 = 60_000;

/// What the scenario author expects a flow to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Delivered,
    Blocked,
}

/// Traffic between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: FlowId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Packets per simulation step
    #[serde(default = "default_rate")]
    pub rate: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectation>,
}

impl Flow {
    /// A TCP flow of one packet per step
    pub fn new(id: impl Into<FlowId>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            protocol: Protocol::default(),
            port: None,
            rate: default_rate(),
            label: None,
            expect: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn expecting(mut self, expect: Expectation) -> Self {
        self.expect = Some(expect);
        self
    }
}

/// Kind of injected fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    LinkDown,
    LinkDegraded,
    NodeDown,
    PolicyBlock,
    DnsFailure,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::LinkDown => "link-down",
            FaultKind::LinkDegraded => "link-degraded",
            FaultKind::NodeDown => "node-down",
            FaultKind::PolicyBlock => "policy-block",
            FaultKind::DnsFailure => "dns-failure",
        }
    }

    /// Check if the fault changes what traffic can cross the network
    pub fn affects_routing(&self) -> bool {
        matches!(
            self,
            FaultKind::LinkDown | FaultKind::LinkDegraded | FaultKind::NodeDown
        )
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault injected at a point in scenario time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fault {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FaultKind,
    pub target_id: String,
    /// Offset from scenario start in milliseconds
    #[serde(default)]
    pub start_time: u64,
    /// How long the fault lasts; absent means until the end of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub params: Properties,
}

impl Fault {
    pub fn new(id: impl Into<String>, kind: FaultKind, target: impl Into<String>, start_time: u64) -> Self {
        Self {
            id: id.into(),
            kind,
            target_id: target.into(),
            start_time,
            duration: None,
            params: Properties::new(),
        }
    }

    pub fn link_down(id: impl Into<String>, link: impl Into<String>, start_time: u64) -> Self {
        Self::new(id, FaultKind::LinkDown, link, start_time)
    }

    pub fn node_down(id: impl Into<String>, node: impl Into<String>, start_time: u64) -> Self {
        Self::new(id, FaultKind::NodeDown, node, start_time)
    }

    /// Override a link's latency (ms) and loss (percent)
    pub fn link_degraded(
        id: impl Into<String>,
        link: impl Into<String>,
        start_time: u64,
        latency: f64,
        loss: f64,
    ) -> Self {
        let mut fault = Self::new(id, FaultKind::LinkDegraded, link, start_time);
        fault.params.insert("latency".into(), serde_json::json!(latency));
        fault.params.insert("loss".into(), serde_json::json!(loss));
        fault
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// When the fault is lifted, if it ever is
    pub fn end_time(&self) -> Option<u64> {
        self.duration.map(|d| self.start_time.saturating_add(d))
    }

    /// Numeric parameter, if present
    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|value| value.as_f64())
    }
}

/// Kind of simulated attacker action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackKind {
    CredentialReuse,
    PhishingCompromise,
    LateralMovement,
    DataExfilAttempt,
    PrivilegeEscalation,
    ReconScan,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::CredentialReuse => "credential-reuse",
            AttackKind::PhishingCompromise => "phishing-compromise",
            AttackKind::LateralMovement => "lateral-movement",
            AttackKind::DataExfilAttempt => "data-exfil-attempt",
            AttackKind::PrivilegeEscalation => "privilege-escalation",
            AttackKind::ReconScan => "recon-scan",
        }
    }
}

impl std::fmt::Display for AttackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attacker action; the source node is compromised from `timestamp` on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttackKind,
    pub source_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<NodeId>,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub metadata: Properties,
}

impl AttackEvent {
    pub fn new(id: impl Into<String>, kind: AttackKind, source: impl Into<NodeId>, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            kind,
            source_node_id: source.into(),
            target_node_id: None,
            timestamp,
            metadata: Properties::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<NodeId>) -> Self {
        self.target_node_id = Some(target.into());
        self
    }
}

/// Flows, faults, and attacks played against one topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_id: Option<String>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub faults: Vec<Fault>,
    #[serde(default)]
    pub attack_events: Vec<AttackEvent>,
    /// Total scenario length in milliseconds
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default)]
    pub options: Properties,
}

impl Scenario {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            topology_id: None,
            flows: Vec::new(),
            faults: Vec::new(),
            attack_events: Vec::new(),
            duration: DEFAULT_DURATION_MS,
            options: Properties::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flows.push(flow);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn with_attack(mut self, attack: AttackEvent) -> Self {
        self.attack_events.push(attack);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = duration_ms;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Parse a scenario document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Lifecycle of a flow within a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    #[default]
    Pending,
    Routing,
    Delivered,
    Blocked,
    Dropped,
    Unreachable,
}

impl FlowState {
    /// Blocked, dropped, and unreachable flows stop being accounted
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            FlowState::Blocked | FlowState::Dropped | FlowState::Unreachable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Pending => "pending",
            FlowState::Routing => "routing",
            FlowState::Delivered => "delivered",
            FlowState::Blocked => "blocked",
            FlowState::Dropped => "dropped",
            FlowState::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one flow after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOutcome {
    pub flow_id: FlowId,
    pub from: NodeId,
    pub to: NodeId,
    pub state: FlowState,
    /// Nodes of the last computed route
    #[serde(default)]
    pub path: Vec<NodeId>,
    #[serde(default)]
    pub links: Vec<LinkId>,
    /// Logical latency of the last delivered route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Combined loss percentage of the last delivered route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Scenario time at which the flow was blocked, dropped, or found unreachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<u64>,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
}

impl FlowOutcome {
    pub fn pending(flow: &Flow) -> Self {
        Self {
            flow_id: flow.id.clone(),
            from: flow.from.clone(),
            to: flow.to.clone(),
            state: FlowState::Pending,
            path: Vec::new(),
            links: Vec::new(),
            latency_ms: None,
            loss_percent: None,
            blocked_by: None,
            matched_rule: None,
            reason: None,
            settled_at: None,
            packets_delivered: 0,
            packets_dropped: 0,
        }
    }
}

/// Kind of entry in the run's event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimEventKind {
    FlowStart,
    FlowEnd,
    PacketSent,
    PacketDropped,
    FaultInjected,
    FaultResolved,
    PolicyBlock,
    AttackEvent,
}

/// Entry in the run's event log, stamped with logical time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimEvent {
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: SimEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<FlowId>,
    pub message: String,
}

impl SimEvent {
    pub fn new(timestamp: u64, kind: SimEventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            node_id: None,
            link_id: None,
            flow_id: None,
            message: message.into(),
        }
    }

    pub fn with_node(mut self, node: impl Into<NodeId>) -> Self {
        self.node_id = Some(node.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<LinkId>) -> Self {
        self.link_id = Some(link.into());
        self
    }

    pub fn with_flow(mut self, flow: impl Into<FlowId>) -> Self {
        self.flow_id = Some(flow.into());
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Everything a run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub scenario_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: Metrics,
    pub flows: Vec<FlowOutcome>,
    pub events: Vec<SimEvent>,
    pub findings: Vec<Finding>,
    pub blast_radius: BTreeMap<NodeId, BlastRadiusResult>,
}

impl SimulationResult {
    /// A run rejected before any simulation happened
    pub fn failed(scenario_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            status: RunStatus::Failed,
            error: Some(error.into()),
            metrics: Metrics::default(),
            flows: Vec::new(),
            events: Vec::new(),
            findings: Vec::new(),
            blast_radius: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn flow(&self, id: &str) -> Option<&FlowOutcome> {
        self.flows.iter().find(|outcome| outcome.flow_id.as_str() == id)
    }
}

fn default_rate() -> u64 {
    1
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_MS
}
