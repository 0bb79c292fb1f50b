//! End-to-end behavior of the simulator on small topologies

use twin_core::{Criticality, Link, Node, NodeId, NodeKind, Topology};
use twin_policy::Protocol;
use twin_simulation::*;

fn run(topology: &Topology, scenario: &Scenario) -> SimulationResult {
    twin_logging::init_testing();
    SimulationEngine::default().run(topology, scenario, &SimOptions::new())
}

/// a - fw - b, with the firewall carrying the given policy
fn guarded(policy: &str) -> Topology {
    Topology::new()
        .with_node(Node::new("a", NodeKind::Workstation))
        .with_node(Node::new("fw", NodeKind::Firewall).with_policy(policy))
        .with_node(Node::new("b", NodeKind::Server))
        .with_link(Link::new("l1", "a", "fw"))
        .with_link(Link::new("l2", "fw", "b"))
}

#[test]
fn test_direct_link_delivers() {
    let topology = Topology::new()
        .with_node(Node::new("a", NodeKind::Workstation))
        .with_node(Node::new("b", NodeKind::Server))
        .with_link(Link::new("l1", "a", "b"));
    let scenario = Scenario::new("s").with_flow(Flow::new("f1", "a", "b"));

    let result = run(&topology, &scenario);
    assert!(result.is_completed());
    assert_eq!(result.flow("f1").unwrap().state, FlowState::Delivered);
    assert_eq!(result.metrics.packets_dropped, 0);
    assert_eq!(result.metrics.flows_delivered, 1);
}

#[test]
fn test_deny_all_blocks_every_crossing_flow() {
    let topology = guarded("deny any from Any to Any");
    let scenario = Scenario::new("s")
        .with_flow(Flow::new("tcp", "a", "b").with_port(443))
        .with_flow(Flow::new("udp", "b", "a").with_protocol(Protocol::Udp).with_port(53))
        .with_flow(Flow::new("icmp", "a", "b").with_protocol(Protocol::Icmp));

    let result = run(&topology, &scenario);
    for flow in &result.flows {
        assert_eq!(flow.state, FlowState::Blocked, "flow {}", flow.flow_id);
        assert_eq!(flow.blocked_by, Some(NodeId::new("fw")));
    }
    assert_eq!(result.metrics.flows_blocked, 3);
    assert_eq!(result.metrics.policies_blocked, 3);
}

#[test]
fn test_allow_list_admits_exactly_one_flow() {
    let topology = guarded("allow tcp from a to b port 443\ndeny any from Any to Any");
    let scenario = Scenario::new("s")
        .with_flow(Flow::new("https", "a", "b").with_port(443))
        .with_flow(Flow::new("http", "a", "b").with_port(80))
        .with_flow(Flow::new("udp", "a", "b").with_protocol(Protocol::Udp).with_port(443))
        .with_flow(Flow::new("reverse", "b", "a").with_port(443))
        .with_flow(Flow::new("portless", "a", "b"));

    let result = run(&topology, &scenario);
    let delivered: Vec<&str> = result
        .flows
        .iter()
        .filter(|flow| flow.state == FlowState::Delivered)
        .map(|flow| flow.flow_id.as_str())
        .collect();
    assert_eq!(delivered, vec!["https"]);

    let https = result.flow("https").unwrap();
    assert_eq!(https.path, vec![NodeId::new("a"), NodeId::new("fw"), NodeId::new("b")]);
}

#[test]
fn test_failed_link_only_affects_dependent_flows() {
    let topology = Topology::new()
        .with_node(Node::new("a", NodeKind::Workstation))
        .with_node(Node::new("b", NodeKind::Server))
        .with_node(Node::new("c", NodeKind::Server))
        .with_link(Link::new("l1", "a", "b"))
        .with_link(Link::new("l2", "a", "c").failed());
    let healthy = Scenario::new("s")
        .with_duration(2_000)
        .with_flow(Flow::new("ok", "a", "b").with_rate(3));
    let broken = healthy.clone().with_flow(Flow::new("cut", "a", "c").with_rate(7));

    let baseline = run(&topology, &healthy);
    let result = run(&topology, &broken);

    assert_eq!(result.flow("cut").unwrap().state, FlowState::Unreachable);
    assert_eq!(result.metrics.packets_dropped, 7);
    assert_eq!(result.metrics.packets_processed, baseline.metrics.packets_processed);
    assert_eq!(result.flow("ok").unwrap().packets_delivered, 9);
    assert!(!result.metrics.reachability_matrix[&NodeId::new("a")][&NodeId::new("c")]);
}

#[test]
fn test_zero_flows() {
    let topology = guarded("deny any from Any to Any");
    let result = run(&topology, &Scenario::new("empty"));

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.metrics.packets_processed, 0);
    assert_eq!(result.metrics.packets_dropped, 0);
    assert!(result.findings.is_empty());
    assert!(result.flows.is_empty());
}

#[test]
fn test_blast_radius_of_isolated_node() {
    let topology = Topology::new()
        .with_node(Node::new("sensor", NodeKind::Iot).with_criticality(Criticality::Low))
        .with_node(Node::new("hub", NodeKind::Switch));

    let result = compute_blast_radius(&topology, &NodeId::new("sensor")).unwrap();
    assert_eq!(result.affected_node_ids, vec![NodeId::new("sensor")]);
    assert!(result.affected_link_ids.is_empty());
    assert_eq!(result.impact_score, 10);
}

#[test]
fn test_blast_radius_penalizes_disconnected_neighbors() {
    // leaf-1 and leaf-2 hang off the hub alone; peer keeps a second link
    let topology = Topology::new()
        .with_node(Node::new("hub", NodeKind::Switch).with_criticality(Criticality::Low))
        .with_node(Node::new("leaf-1", NodeKind::Iot).with_criticality(Criticality::Low))
        .with_node(Node::new("leaf-2", NodeKind::Iot).with_criticality(Criticality::Low))
        .with_node(Node::new("peer", NodeKind::Router).with_criticality(Criticality::Low))
        .with_node(Node::new("upstream", NodeKind::Router).with_criticality(Criticality::Low))
        .with_link(Link::new("l1", "hub", "leaf-1"))
        .with_link(Link::new("l2", "hub", "leaf-2"))
        .with_link(Link::new("l3", "hub", "peer"))
        .with_link(Link::new("l4", "peer", "upstream"));

    let result = compute_blast_radius(&topology, &NodeId::new("hub")).unwrap();
    assert_eq!(result.isolated_node_ids, vec![NodeId::new("leaf-1"), NodeId::new("leaf-2")]);
    assert_eq!(result.impact_score, 4 * 10 + 2 * 20);
}

#[test]
fn test_expectations_drive_findings() {
    let topology = guarded("allow any from a to b\ndeny any from Any to Any");
    let scenario = Scenario::new("s")
        .with_flow(Flow::new("leak", "a", "b").expecting(Expectation::Blocked))
        .with_flow(Flow::new("needed", "b", "a").expecting(Expectation::Delivered));

    let result = run(&topology, &scenario);
    let kinds: Vec<FindingKind> = result.findings.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![FindingKind::SuccessfulUnintendedFlow, FindingKind::BlockedFlow]
    );
    let ids: Vec<&str> = result.findings.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["F-0001", "F-0002"]);
}

#[test]
fn test_policy_parse_errors_become_findings() {
    let topology = guarded("allow tcp from a to b port 443\nallow tcp from a\ndeny any from Any to Any");
    let result = run(&topology, &Scenario::new("s"));

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.kind, FindingKind::PolicyParseError);
    assert!(finding.description.contains("Line 2"));
    assert_eq!(finding.affected_node_ids, vec![NodeId::new("fw")]);
}

#[test]
fn test_canonical_topology_is_untouched() {
    let topology = guarded("allow any from Any to Any");
    let before = topology.clone();
    let scenario = Scenario::new("s")
        .with_flow(Flow::new("f1", "a", "b"))
        .with_fault(Fault::link_down("x", "l2", 0))
        .with_fault(Fault::node_down("y", "fw", 500));

    let result = run(&topology, &scenario);
    assert_eq!(result.flow("f1").unwrap().state, FlowState::Unreachable);
    assert_eq!(topology, before);
}

#[test]
fn test_result_json_shape() {
    let topology = guarded("deny any from Any to Any");
    let scenario = Scenario::new("s").with_flow(Flow::new("f1", "a", "b"));
    let json = serde_json::to_value(run(&topology, &scenario)).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["metrics"]["flowsBlocked"], 1);
    assert_eq!(json["flows"][0]["state"], "blocked");
    assert_eq!(json["flows"][0]["blockedBy"], "fw");
    assert_eq!(json["findings"][0]["kind"], "blocked-flow");
    assert_eq!(json["findings"][0]["severity"], "info");
    assert!(json["events"].as_array().unwrap().iter().any(|e| e["type"] == "policy-block"));
}

#[test]
fn test_extreme_rates_saturate_counters() {
    let topology = Topology::new()
        .with_node(Node::new("a", NodeKind::Workstation))
        .with_node(Node::new("b", NodeKind::Server))
        .with_node(Node::new("c", NodeKind::Server))
        .with_link(Link::new("l1", "a", "b"))
        .with_link(Link::new("l2", "a", "c").failed());
    let scenario = Scenario::from_json(
        r#"{
            "id": "flood",
            "duration": 1000,
            "flows": [
                {"id": "up", "from": "a", "to": "b", "rate": 18446744073709551615},
                {"id": "cut", "from": "a", "to": "c", "rate": 18446744073709551615},
                {"id": "more", "from": "b", "to": "a", "rate": 7}
            ]
        }"#,
    )
    .unwrap();

    let result = run(&topology, &scenario);
    assert!(result.is_completed());
    assert_eq!(result.flow("up").unwrap().packets_delivered, u64::MAX);
    assert_eq!(result.flow("cut").unwrap().packets_dropped, u64::MAX);
    assert_eq!(result.metrics.packets_processed, u64::MAX);
    assert_eq!(result.metrics.packets_dropped, u64::MAX);
}

#[test]
fn test_static_route_hand_off_obeys_firewalls_and_failures() {
    // a forwards to gw through a deny-all firewall; gw forwards to the detached r2
    let build = |l1_failed: bool| {
        let mut first = Link::new("l1", "a", "fw");
        first.failed = l1_failed;
        Topology::new()
            .with_node(Node::new("a", NodeKind::Workstation).with_route("10.2.0.0/16", "gw"))
            .with_node(Node::new("fw", NodeKind::Firewall).with_policy("deny any from Any to Any"))
            .with_node(Node::new("gw", NodeKind::Router).with_route("10.2.0.0/16", "r2"))
            .with_node(Node::new("r2", NodeKind::Router))
            .with_node(Node::new("b", NodeKind::Server).with_ip("10.2.0.5".parse().unwrap()))
            .with_link(first)
            .with_link(Link::new("l2", "fw", "gw"))
            .with_link(Link::new("l3", "r2", "b"))
    };
    let scenario = Scenario::new("s").with_flow(Flow::new("f1", "a", "b"));

    let result = run(&build(false), &scenario);
    let flow = result.flow("f1").unwrap();
    assert_eq!(flow.state, FlowState::Blocked);
    assert_eq!(flow.blocked_by, Some(NodeId::new("fw")));
    assert_eq!(result.metrics.policies_evaluated, 1);

    let result = run(&build(true), &scenario);
    let flow = result.flow("f1").unwrap();
    assert_eq!(flow.state, FlowState::Unreachable);
    assert_eq!(result.metrics.policies_evaluated, 0);
}
