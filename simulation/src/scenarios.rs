//! Pre-defined demo scenarios
//!
//! Each demo builds a small topology and scenario that exercises one part of
//! the engine, runs it, and returns the result.

use std::net::{IpAddr, Ipv4Addr};

use clap::ValueEnum;
use tracing::info;
use twin_core::{Criticality, Link, Node, NodeKind, Topology, TopologyGraph};
use twin_policy::Protocol;

use crate::simulation::{SimConfig, SimOptions, SimulationEngine};
use crate::types::*;

/// Available demos
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// Perimeter firewall with an allow-list policy
    Firewall,
    /// Redundant core losing links and nodes over time
    Failover,
    /// Islands joined only by static routes, plus a routing loop
    Routed,
    /// Phishing foothold followed by lateral movement
    Breach,
}

impl Demo {
    /// Topology and scenario for this demo
    pub fn build(&self) -> (Topology, Scenario) {
        match self {
            Demo::Firewall => firewall_demo(),
            Demo::Failover => failover_demo(),
            Demo::Routed => routed_demo(),
            Demo::Breach => breach_demo(),
        }
    }
}

/// Run a demo with default engine settings
pub fn run_demo(demo: Demo) -> (Topology, SimulationResult) {
    info!("=== Running {:?} demo ===", demo);
    let (topology, scenario) = demo.build();
    let engine = SimulationEngine::new(SimConfig {
        trace_routing: true,
        ..Default::default()
    });
    let result = engine.run(&topology, &scenario, &SimOptions::new());
    (topology, result)
}

/// Human-readable summary of a run
pub fn summary(topology: &Topology, result: &SimulationResult) -> String {
    let mut out = String::new();

    if let Ok(graph) = TopologyGraph::build(topology) {
        out.push_str(&graph.visualize());
        out.push('\n');
    }

    out.push_str(&format!("\n=== {} ({:?}) ===\n", result.scenario_id, result.status));
    if let Some(error) = &result.error {
        out.push_str(&format!("  Error: {error}\n"));
    }

    let m = &result.metrics;
    out.push_str(&format!("  Steps executed: {}\n", m.steps_executed));
    out.push_str(&format!("  Packets processed: {}\n", m.packets_processed));
    out.push_str(&format!("  Packets dropped: {}\n", m.packets_dropped));
    out.push_str(&format!(
        "  Policies evaluated/blocked: {}/{}\n",
        m.policies_evaluated, m.policies_blocked
    ));

    out.push_str("\n=== Flows ===\n");
    for flow in &result.flows {
        let path: Vec<&str> = flow.path.iter().map(|n| n.as_str()).collect();
        out.push_str(&format!(
            "  {:<12} {:<12} {}\n",
            flow.flow_id.as_str(),
            flow.state.as_str(),
            path.join(" -> ")
        ));
    }

    out.push_str("\n=== Findings ===\n");
    for finding in &result.findings {
        out.push_str(&format!("  {} [{:?}] {}\n", finding.id, finding.severity, finding.description));
    }

    for (node, blast) in &result.blast_radius {
        out.push_str(&format!(
            "\n  Blast radius of {node}: {} nodes, score {}\n",
            blast.affected_node_ids.len(),
            blast.impact_score
        ));
    }

    out
}

fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

/// ```text
/// laptop - edge-fw - web (public, no TLS)
///              |
///            guest-ap - admin-console
/// ```
fn firewall_demo() -> (Topology, Scenario) {
    let policy = "\
# Perimeter allow-list
allow tcp from laptop to web port 443
allow udp from laptop to web port 53
deny any from guest to Any
deny any from Any to Any
";
    let topology = Topology::new()
        .with_node(Node::new("laptop", NodeKind::Workstation).with_tag("staff"))
        .with_node(Node::new("edge-fw", NodeKind::Firewall).with_policy(policy))
        .with_node(
            Node::new("web", NodeKind::Server)
                .with_tag("public")
                .with_criticality(Criticality::High),
        )
        .with_node(Node::new("guest-ap", NodeKind::Router).with_tag("guest"))
        .with_node(Node::new("admin-console", NodeKind::Server).with_role("admin"))
        .with_link(Link::new("l-laptop", "laptop", "edge-fw").with_latency(1.0))
        .with_link(Link::new("l-web", "edge-fw", "web").with_latency(2.0))
        .with_link(Link::new("l-guest", "edge-fw", "guest-ap").with_latency(1.0))
        .with_link(Link::new("l-admin", "guest-ap", "admin-console").with_latency(1.0));

    let scenario = Scenario::new("firewall-demo")
        .with_name("Perimeter firewall")
        .with_duration(5_000)
        .with_flow(
            Flow::new("https", "laptop", "web")
                .with_port(443)
                .with_rate(10)
                .expecting(Expectation::Delivered),
        )
        .with_flow(
            Flow::new("ssh", "laptop", "web")
                .with_port(22)
                .expecting(Expectation::Blocked),
        )
        .with_flow(
            Flow::new("dns", "laptop", "web")
                .with_protocol(Protocol::Udp)
                .with_port(53),
        )
        .with_flow(Flow::new("guest-scan", "guest-ap", "web").with_port(80))
        .with_option("lintTopology", serde_json::json!(true));

    (topology, scenario)
}

/// ```text
///          core-a
///         /      \
/// client          server
///         \      /
///          core-b
/// ```
fn failover_demo() -> (Topology, Scenario) {
    let topology = Topology::new()
        .with_node(Node::new("client", NodeKind::Workstation))
        .with_node(Node::new("core-a", NodeKind::Switch).with_criticality(Criticality::High))
        .with_node(Node::new("core-b", NodeKind::Switch).with_criticality(Criticality::High))
        .with_node(Node::new("server", NodeKind::Server).with_criticality(Criticality::Critical))
        .with_link(Link::new("a-client", "client", "core-a").with_latency(1.0))
        .with_link(Link::new("a-server", "core-a", "server").with_latency(1.0))
        .with_link(Link::new("b-client", "client", "core-b").with_latency(5.0))
        .with_link(Link::new("b-server", "core-b", "server").with_latency(5.0));

    let scenario = Scenario::new("failover-demo")
        .with_name("Core failover")
        .with_duration(30_000)
        .with_flow(Flow::new("app", "client", "server").with_port(8080).with_rate(5))
        .with_fault(Fault::link_down("primary-cut", "a-server", 5_000).with_duration(10_000))
        .with_fault(Fault::link_degraded("backup-congestion", "b-client", 7_500, 40.0, 2.0).with_duration(2_000))
        .with_fault(Fault::node_down("backup-reboot", "core-b", 12_000).with_duration(1_000))
        .with_option("blastRadius", serde_json::json!(["core-a"]));

    (topology, scenario)
}

/// ```text
/// lan-host - gw-a        gw-b - dc-host (10.2.0.5)
///
/// lab-host (10.3.0.7) reachable only through a route loop
/// ```
fn routed_demo() -> (Topology, Scenario) {
    let lan_host = Node::new("lan-host", NodeKind::Workstation)
        .with_ip(ip(10, 1, 0, 10))
        .with_route("10.0.0.0/8", "gw-a");
    let gw_a = Node::new("gw-a", NodeKind::Router)
        .with_ip(ip(10, 1, 0, 1))
        .with_route("10.2.0.0/16", "gw-b")
        .with_route("10.3.0.0/16", "lan-host");

    let topology = Topology::new()
        .with_node(lan_host)
        .with_node(gw_a)
        .with_node(Node::new("gw-b", NodeKind::Router).with_ip(ip(10, 2, 0, 1)))
        .with_node(Node::new("dc-host", NodeKind::Server).with_ip(ip(10, 2, 0, 5)))
        .with_node(Node::new("lab-host", NodeKind::Server).with_ip(ip(10, 3, 0, 7)))
        .with_link(Link::new("lan", "lan-host", "gw-a").with_latency(1.0))
        .with_link(Link::new("dc", "gw-b", "dc-host").with_latency(1.0));

    let scenario = Scenario::new("routed-demo")
        .with_name("Static routing")
        .with_duration(2_000)
        .with_flow(Flow::new("to-dc", "lan-host", "dc-host").expecting(Expectation::Delivered))
        .with_flow(Flow::new("to-lab", "lan-host", "lab-host"));

    (topology, scenario)
}

/// ```text
/// reception - office-sw - core-fw - db (critical)
///                 |
///            file-server
/// ```
fn breach_demo() -> (Topology, Scenario) {
    let policy = "\
allow tcp from app to db port 5432
deny any from Any to Any
";
    let topology = Topology::new()
        .with_node(Node::new("reception", NodeKind::Workstation).with_criticality(Criticality::Low))
        .with_node(Node::new("office-sw", NodeKind::Switch))
        .with_node(Node::new("file-server", NodeKind::Server).with_criticality(Criticality::High))
        .with_node(Node::new("core-fw", NodeKind::Firewall).with_policy(policy))
        .with_node(Node::new("db", NodeKind::Server).with_criticality(Criticality::Critical))
        .with_link(Link::new("l1", "reception", "office-sw"))
        .with_link(Link::new("l2", "office-sw", "file-server"))
        .with_link(Link::new("l3", "office-sw", "core-fw"))
        .with_link(Link::new("l4", "core-fw", "db"));

    let scenario = Scenario::new("breach-demo")
        .with_name("Phishing to lateral movement")
        .with_duration(10_000)
        .with_flow(
            Flow::new("reception-db", "reception", "db")
                .with_port(5432)
                .expecting(Expectation::Blocked),
        )
        .with_attack(AttackEvent::new("phish", AttackKind::PhishingCompromise, "reception", 2_000))
        .with_attack(
            AttackEvent::new("pivot", AttackKind::LateralMovement, "reception", 4_000).with_target("file-server"),
        )
        .with_attack(
            AttackEvent::new("exfil", AttackKind::DataExfilAttempt, "reception", 6_000).with_target("db"),
        );

    (topology, scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::FindingKind;
    use twin_core::NodeId;

    fn kinds(result: &SimulationResult) -> Vec<FindingKind> {
        result.findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_firewall_demo() {
        let (_, result) = run_demo(Demo::Firewall);
        assert!(result.is_completed());

        assert_eq!(result.flow("https").unwrap().state, FlowState::Delivered);
        assert_eq!(result.flow("ssh").unwrap().state, FlowState::Blocked);
        assert_eq!(result.flow("dns").unwrap().state, FlowState::Delivered);
        assert_eq!(result.flow("guest-scan").unwrap().state, FlowState::Blocked);

        let found = kinds(&result);
        assert!(found.contains(&FindingKind::PublicServiceWithoutTls));
        assert!(found.contains(&FindingKind::AdminExposedToGuest));
        assert!(!found.contains(&FindingKind::SuccessfulUnintendedFlow));
    }

    #[test]
    fn test_failover_demo() {
        let (_, result) = run_demo(Demo::Failover);
        let app = result.flow("app").unwrap();

        // core-b reboots while the primary is still cut
        assert_eq!(app.state, FlowState::Dropped);
        assert_eq!(app.settled_at, Some(12_000));
        assert!(result.blast_radius.contains_key(&NodeId::new("core-a")));
        assert!(kinds(&result).contains(&FindingKind::DroppedFlow));
    }

    #[test]
    fn test_routed_demo() {
        let (_, result) = run_demo(Demo::Routed);

        let to_dc = result.flow("to-dc").unwrap();
        assert_eq!(to_dc.state, FlowState::Delivered);
        let hops: Vec<&str> = to_dc.path.iter().map(|n| n.as_str()).collect();
        assert_eq!(hops, vec!["lan-host", "gw-a", "gw-b", "dc-host"]);
        assert_eq!(to_dc.latency_ms, Some(2.0));

        let to_lab = result.flow("to-lab").unwrap();
        assert_eq!(to_lab.state, FlowState::Unreachable);
        assert!(to_lab.reason.as_deref().unwrap_or_default().contains("loop"));
    }

    #[test]
    fn test_breach_demo() {
        let (_, result) = run_demo(Demo::Breach);

        assert_eq!(result.flow("reception-db").unwrap().state, FlowState::Blocked);
        let found = kinds(&result);
        assert!(found.contains(&FindingKind::AttackPathOpen));
        assert!(found.contains(&FindingKind::AttackContained));
        assert!(result.blast_radius.contains_key(&NodeId::new("reception")));
    }

    #[test]
    fn test_summary_mentions_flows() {
        let (topology, result) = run_demo(Demo::Routed);
        let text = summary(&topology, &result);
        assert!(text.contains("to-dc"));
        assert!(text.contains("lan-host -> gw-a -> gw-b -> dc-host"));
    }
}
