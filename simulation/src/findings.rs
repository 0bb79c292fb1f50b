//! Findings: structured observations derived from a run
//!
//! Every mapping here is a pure function of its inputs. Ids are assigned by
//! [`FindingsLog`] in generation order (`F-0001`, `F-0002`, ...) so two runs
//! over the same inputs produce identical findings.

use serde::{Deserialize, Serialize};
use twin_core::{LinkId, Node, NodeId, Topology, ValidationIssue, ValidationReport};
use twin_policy::{PolicyIssue, PolicyParseError};

use crate::blast::BlastRadiusResult;
use crate::routing::Unreachable;
use crate::types::{AttackEvent, Expectation, Flow, FlowOutcome, FlowState};

/// How urgent a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    BlockedFlow,
    SuccessfulUnintendedFlow,
    UnreachableFlow,
    DroppedFlow,
    SinglePointOfFailure,
    BlastRadiusCritical,
    AttackPathOpen,
    AttackContained,
    TopologyWarning,
    PublicServiceWithoutTls,
    AdminExposedToGuest,
    PolicyParseError,
    Diagnostic,
}

/// A structured observation about the modeled network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub affected_node_ids: Vec<NodeId>,
    pub affected_link_ids: Vec<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Finding {
    /// Create a finding; the id is assigned when it is logged
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            kind,
            severity,
            title: title.into(),
            description: description.into(),
            affected_node_ids: Vec::new(),
            affected_link_ids: Vec::new(),
            remediation: None,
            category: None,
        }
    }

    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.affected_node_ids.extend(nodes);
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = LinkId>) -> Self {
        self.affected_link_ids.extend(links);
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Internal observation about the run itself
    pub fn diagnostic(description: impl Into<String>) -> Self {
        Self::new(FindingKind::Diagnostic, Severity::Info, "Simulation Diagnostic", description)
    }
}

/// Assigns deterministic ids as findings are produced
#[derive(Debug, Default)]
pub struct FindingsLog {
    findings: Vec<Finding>,
}

impl FindingsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut finding: Finding) {
        finding.id = format!("F-{:04}", self.findings.len() + 1);
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.findings
    }
}

/// Topology lint: validation warnings plus exposure checks
pub fn lint_findings(topology: &Topology, report: &ValidationReport) -> Vec<Finding> {
    let mut findings: Vec<Finding> = report.warnings.iter().map(topology_warning).collect();

    for node in &topology.nodes {
        if let Some(finding) = public_service_without_tls(node) {
            findings.push(finding);
        }
        if let Some(finding) = admin_exposed_to_guest(topology, node) {
            findings.push(finding);
        }
    }

    findings
}

fn topology_warning(issue: &ValidationIssue) -> Finding {
    Finding::new(
        FindingKind::TopologyWarning,
        Severity::Medium,
        "Topology Warning",
        issue.message.clone(),
    )
    .with_nodes(issue.node_id.clone())
    .with_links(issue.link_id.clone())
    .with_category("topology")
}

fn public_service_without_tls(node: &Node) -> Option<Finding> {
    let public_server = node.kind == twin_core::NodeKind::Server && node.has_tag("public");
    if !public_server || node.property_flag("tls") || node.property_flag("https") {
        return None;
    }
    Some(
        Finding::new(
            FindingKind::PublicServiceWithoutTls,
            Severity::Medium,
            "Public Service Without TLS",
            format!(
                "Server {} is publicly accessible but does not have TLS enabled",
                display_name(node)
            ),
        )
        .with_nodes([node.id.clone()])
        .with_category("misconfiguration")
        .with_remediation("Enable TLS/HTTPS for public-facing services"),
    )
}

fn admin_exposed_to_guest(topology: &Topology, node: &Node) -> Option<Finding> {
    let is_admin = node.role.as_deref() == Some("admin") || node.has_tag("admin");
    if !is_admin {
        return None;
    }

    let is_guest = |id: &NodeId| topology.node(id).is_some_and(|n| n.has_tag("guest"));
    let guest_links: Vec<LinkId> = topology
        .links
        .iter()
        .filter(|link| link.touches(&node.id))
        .filter(|link| is_guest(&link.source) || is_guest(&link.target))
        .map(|link| link.id.clone())
        .collect();
    if guest_links.is_empty() {
        return None;
    }

    Some(
        Finding::new(
            FindingKind::AdminExposedToGuest,
            Severity::Critical,
            "Admin Interface Accessible from Guest Network",
            format!("Admin node {} is accessible from guest network", display_name(node)),
        )
        .with_nodes([node.id.clone()])
        .with_links(guest_links)
        .with_category("access-control")
        .with_remediation(
            "Implement network segmentation to isolate admin interfaces from guest networks",
        ),
    )
}

/// A policy line that was skipped
pub fn policy_parse_finding(firewall: &NodeId, error: &PolicyParseError) -> Finding {
    Finding::new(
        FindingKind::PolicyParseError,
        Severity::Medium,
        "Firewall Policy Line Ignored",
        format!("Firewall {firewall}: {error}"),
    )
    .with_nodes([firewall.clone()])
    .with_category("policy")
    .with_remediation("Fix the rule syntax: <allow|deny> [protocol] from <source> to <destination> [port <n>]")
}

/// A parsed rule that refers to nothing or cannot match as written
pub fn policy_issue_finding(firewall: &NodeId, issue: &PolicyIssue) -> Finding {
    Finding::diagnostic(format!("Firewall {firewall}: {issue}")).with_nodes([firewall.clone()])
}

/// Map a flow's final state (and its author's expectation) to a finding
pub fn flow_finding(flow: &Flow, outcome: &FlowOutcome) -> Option<Finding> {
    let endpoints = [flow.from.clone(), flow.to.clone()];
    let route = format!("{} to {}", flow.from, flow.to);

    let finding = match (flow.expect, outcome.state) {
        (_, FlowState::Pending | FlowState::Routing) => return None,
        (Some(Expectation::Blocked), FlowState::Delivered) => Finding::new(
            FindingKind::SuccessfulUnintendedFlow,
            Severity::High,
            "Unintended Flow Succeeded",
            format!("Flow {} from {route} was expected to be blocked but was delivered", flow.id),
        )
        .with_nodes(endpoints)
        .with_links(outcome.links.iter().cloned())
        .with_category("policy-enforcement")
        .with_remediation("Tighten firewall policy on the path"),
        (_, FlowState::Delivered) => return None,
        (Some(Expectation::Delivered), state) => Finding::new(
            FindingKind::BlockedFlow,
            Severity::Medium,
            "Expected Flow Not Delivered",
            format!("Flow {} from {route} was expected to be delivered but was {state}", flow.id),
        )
        .with_nodes(endpoints)
        .with_nodes(outcome.blocked_by.clone())
        .with_category("policy-enforcement")
        .with_remediation("Allow the flow in firewall policy or restore connectivity"),
        (Some(Expectation::Blocked), FlowState::Blocked) => return None,
        (None, FlowState::Blocked) => Finding::new(
            FindingKind::BlockedFlow,
            Severity::Info,
            "Traffic Blocked by Policy",
            format!("Flow {} from {route} was blocked by firewall policy", flow.id),
        )
        .with_nodes(outcome.blocked_by.clone())
        .with_category("policy-enforcement"),
        (_, FlowState::Unreachable) => Finding::new(
            FindingKind::UnreachableFlow,
            Severity::High,
            "Unreachable Destination",
            format!("Node {} cannot reach {}", flow.from, flow.to),
        )
        .with_nodes(endpoints)
        .with_remediation("Add network connectivity or check for failed links"),
        (_, FlowState::Dropped) => Finding::new(
            FindingKind::DroppedFlow,
            Severity::Medium,
            "Flow Dropped by Fault",
            format!(
                "Flow {} from {route} was delivered until a fault removed its route",
                flow.id
            ),
        )
        .with_nodes(endpoints)
        .with_links(outcome.links.iter().cloned())
        .with_remediation("Add redundant paths for critical flows"),
    };

    Some(finding)
}

/// How an attacker's probe toward its target fared
#[derive(Debug, Clone, PartialEq)]
pub enum AttackVerdict {
    /// Every firewall on a live path let the traffic through
    Open { path: Vec<NodeId> },
    /// A firewall on the path denied the traffic
    Blocked { firewall: NodeId },
    /// No usable path exists
    Isolated(Unreachable),
}

/// Finding for an attack event with a target
pub fn attack_finding(attack: &AttackEvent, target: &NodeId, verdict: &AttackVerdict) -> Finding {
    let nodes = [attack.source_node_id.clone(), target.clone()];
    match verdict {
        AttackVerdict::Open { path } => Finding::new(
            FindingKind::AttackPathOpen,
            Severity::High,
            format!("Attack Event: {}", attack.kind),
            format!(
                "Attack event {} from {} reaches {} via {}",
                attack.kind,
                attack.source_node_id,
                target,
                join(path, " -> ")
            ),
        )
        .with_nodes(nodes)
        .with_category("security")
        .with_remediation("Implement network segmentation and monitoring"),
        AttackVerdict::Blocked { firewall } => contained(attack, nodes, format!("firewall {firewall}")),
        AttackVerdict::Isolated(reason) => contained(attack, nodes, format!("network isolation ({reason})")),
    }
}

fn contained(attack: &AttackEvent, nodes: [NodeId; 2], by: String) -> Finding {
    Finding::new(
        FindingKind::AttackContained,
        Severity::Low,
        format!("Attack Event: {}", attack.kind),
        format!(
            "Attack attempt from {} was blocked by {by}",
            attack.source_node_id
        ),
    )
    .with_nodes(nodes)
    .with_category("security")
    .with_remediation("No action needed - attack was blocked")
}

/// Findings for one blast-radius analysis
pub fn blast_findings(result: &BlastRadiusResult, threshold: u32) -> Vec<Finding> {
    let mut findings = Vec::new();
    let target = &result.compromised_node_id;

    if result.impact_score > threshold {
        findings.push(
            Finding::new(
                FindingKind::BlastRadiusCritical,
                Severity::Critical,
                "High Blast Radius",
                format!(
                    "Compromise of {target} affects {} nodes (impact score {}, threshold {threshold})",
                    result.affected_node_ids.len(),
                    result.impact_score
                ),
            )
            .with_nodes(result.affected_node_ids.iter().cloned())
            .with_links(result.affected_link_ids.iter().cloned())
            .with_category("security")
            .with_remediation("Segment the network around this node and reduce its trust relationships"),
        );
    }

    if !result.isolated_node_ids.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::SinglePointOfFailure,
                Severity::High,
                "Single Point of Failure",
                format!(
                    "Losing {target} disconnects {}",
                    join(&result.isolated_node_ids, ", ")
                ),
            )
            .with_nodes(std::iter::once(target.clone()).chain(result.isolated_node_ids.iter().cloned()))
            .with_category("resilience")
            .with_remediation("Add redundant links for the isolated nodes"),
        );
    }

    findings
}

fn display_name(node: &Node) -> &str {
    if node.label.is_empty() { node.id.as_str() } else { &node.label }
}

fn join(ids: &[NodeId], separator: &str) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(separator)
}
