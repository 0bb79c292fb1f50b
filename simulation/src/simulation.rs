//! Simulation engine for the network digital twin
//!
//! Implements discrete logical-time simulation with:
//! - A timeline of regular steps plus every fault and attack timestamp
//! - Faults applied to a run-local overlay, never to the topology
//! - Per-flow routing through links, static routes, and firewall policies
//! - Findings and blast-radius analysis once the timeline is exhausted
//!
//! Identical inputs always produce identical results. There is no wall
//! clock and no randomness.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use twin_core::{LinkId, NodeId, Properties, Topology, TopologyGraph, validate};
use twin_policy::{PolicyValidator, Protocol};

use crate::blast::{BlastRadiusResult, blast_radius};
use crate::findings::{
    AttackVerdict, Finding, FindingsLog, attack_finding, blast_findings, flow_finding, lint_findings,
    policy_issue_finding, policy_parse_finding,
};
use crate::metrics::Metrics;
use crate::overlay::{Degradation, RunOverlay};
use crate::routing::{Probe, RouteOutcome, Router};
use crate::types::*;

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Static-route hand-offs allowed per flow
    pub hop_budget: u32,
    /// Logical time between regular steps in milliseconds
    pub time_step_ms: u64,
    /// Blast-radius impact score above which a node is flagged critical
    pub blast_radius_threshold: u32,
    /// Enable detailed tracing of routing and events
    pub trace_routing: bool,
    /// Upper bound on timeline points; later points are dropped
    pub max_steps: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hop_budget: 64,
            time_step_ms: 1000,
            blast_radius_threshold: 100,
            trace_routing: true,
            max_steps: 100_000,
        }
    }
}

/// Per-call switches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimOptions {
    /// Emit diagnostic findings about skipped or inert inputs
    pub verbose: bool,
    /// Turn topology warnings and exposure checks into findings
    pub lint_topology: bool,
    /// Nodes to analyze in addition to any compromised during the run
    pub blast_radius_targets: Vec<NodeId>,
}

impl SimOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_lint(mut self, lint: bool) -> Self {
        self.lint_topology = lint;
        self
    }

    pub fn with_blast_target(mut self, node: impl Into<NodeId>) -> Self {
        self.blast_radius_targets.push(node.into());
        self
    }

    /// Combine with a scenario's `options` map
    ///
    /// Flags are on when either side sets them; blast targets are appended.
    /// `blastRadius` may be a single node id or an array of them.
    pub fn merged_with(&self, options: &Properties) -> Self {
        let flag = |key: &str| options.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

        let mut merged = self.clone();
        merged.verbose |= flag("verbose");
        merged.lint_topology |= flag("lintTopology");

        match options.get("blastRadius") {
            Some(serde_json::Value::String(id)) => merged.blast_radius_targets.push(NodeId::new(id.as_str())),
            Some(serde_json::Value::Array(ids)) => merged
                .blast_radius_targets
                .extend(ids.iter().filter_map(|v| v.as_str()).map(NodeId::new)),
            _ => {}
        }
        merged
    }
}

/// Runs scenarios against topologies
#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    config: SimConfig,
}

impl SimulationEngine {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run a scenario to completion
    pub fn run(&self, topology: &Topology, scenario: &Scenario, options: &SimOptions) -> SimulationResult {
        self.run_with_cancel(topology, scenario, options, &CancellationToken::new())
    }

    /// Run a scenario, stopping early once `cancel` fires
    ///
    /// The token is checked before each time step and before each flow is
    /// evaluated. A cancelled run keeps its partial metrics and outcomes but
    /// produces no findings.
    pub fn run_with_cancel(
        &self,
        topology: &Topology,
        scenario: &Scenario,
        options: &SimOptions,
        cancel: &CancellationToken,
    ) -> SimulationResult {
        let graph = match TopologyGraph::build(topology) {
            Ok(graph) => graph,
            Err(err) => {
                warn!(scenario = %scenario.id, error = %err, "Rejecting scenario");
                return SimulationResult::failed(&scenario.id, err.to_string());
            }
        };
        if let Err(reason) = check_flows(&graph, scenario) {
            warn!(scenario = %scenario.id, %reason, "Rejecting scenario");
            return SimulationResult::failed(&scenario.id, reason);
        }

        let options = options.merged_with(&scenario.options);
        let router = Router::new(&graph, self.config.hop_budget);
        info!(
            scenario = %scenario.id,
            nodes = graph.node_count(),
            links = graph.link_count(),
            flows = scenario.flows.len(),
            "Starting simulation"
        );

        Run::new(&self.config, router, scenario, options).execute(cancel)
    }

    /// Run a scenario on the blocking thread pool
    pub async fn simulate(&self, topology: Arc<Topology>, scenario: Scenario, options: SimOptions) -> SimulationResult {
        let engine = self.clone();
        let scenario_id = scenario.id.clone();
        let task = tokio::task::spawn_blocking(move || engine.run(&topology, &scenario, &options));
        match task.await {
            Ok(result) => result,
            Err(err) => {
                warn!(scenario = %scenario_id, error = %err, "Simulation task failed");
                SimulationResult::failed(scenario_id, format!("Simulation task failed: {err}"))
            }
        }
    }
}

/// Run a scenario with the default engine configuration
pub async fn simulate(topology: Arc<Topology>, scenario: Scenario, options: SimOptions) -> SimulationResult {
    SimulationEngine::default().simulate(topology, scenario, options).await
}

/// Flow endpoints must exist and flow ids must be unique
fn check_flows(graph: &TopologyGraph<'_>, scenario: &Scenario) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for flow in &scenario.flows {
        if !seen.insert(&flow.id) {
            return Err(format!("Duplicate flow id {}", flow.id));
        }
        for end in [&flow.from, &flow.to] {
            if !graph.contains(end) {
                return Err(format!("Flow {} references unknown node {end}", flow.id));
            }
        }
    }
    Ok(())
}

/// Order of actions sharing a timestamp: resolutions, then injections, then attacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    FaultEnd,
    FaultStart,
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Action {
    time: u64,
    phase: Phase,
    index: usize,
}

/// Timeline points and the actions scheduled on them
#[derive(Debug, Default)]
struct Timeline {
    points: Vec<u64>,
    actions: Vec<Action>,
}

#[derive(Debug)]
struct FlowTrack {
    outcome: FlowOutcome,
    /// Overlay generation of the last routing decision
    routed_at: Option<u64>,
}

/// State of one run
struct Run<'a> {
    config: &'a SimConfig,
    router: Router<'a>,
    scenario: &'a Scenario,
    options: SimOptions,
    overlay: RunOverlay,
    flows: Vec<FlowTrack>,
    metrics: Metrics,
    events: Vec<SimEvent>,
    diagnostics: Vec<Finding>,
    attack_findings: Vec<Finding>,
    time: u64,
}

impl<'a> Run<'a> {
    fn new(config: &'a SimConfig, router: Router<'a>, scenario: &'a Scenario, options: SimOptions) -> Self {
        let flows = scenario
            .flows
            .iter()
            .map(|flow| FlowTrack {
                outcome: FlowOutcome::pending(flow),
                routed_at: None,
            })
            .collect();

        Self {
            config,
            router,
            scenario,
            options,
            overlay: RunOverlay::new(),
            flows,
            metrics: Metrics::default(),
            events: Vec::new(),
            diagnostics: Vec::new(),
            attack_findings: Vec::new(),
            time: 0,
        }
    }

    fn execute(mut self, cancel: &CancellationToken) -> SimulationResult {
        let timeline = self.build_timeline();
        let mut actions = timeline.actions.iter().peekable();

        for &time in &timeline.points {
            if cancel.is_cancelled() {
                return self.cancelled();
            }
            self.time = time;
            trace!("=== t={}ms ===", time);

            while let Some(action) = actions.next_if(|action| action.time <= time) {
                self.apply(*action);
            }

            for index in 0..self.flows.len() {
                if cancel.is_cancelled() {
                    return self.cancelled();
                }
                self.advance_flow(index);
            }
            self.metrics.steps_executed += 1;
        }

        self.finish()
    }

    fn build_timeline(&mut self) -> Timeline {
        let scenario = self.scenario;
        let duration = scenario.duration;
        let step = self.config.time_step_ms.max(1);
        let limit = usize::try_from(self.config.max_steps.max(1)).unwrap_or(usize::MAX);

        let mut points = BTreeSet::new();
        let mut t = 0u64;
        while t <= duration && points.len() <= limit {
            points.insert(t);
            match t.checked_add(step) {
                Some(next) => t = next,
                None => break,
            }
        }

        let mut actions = Vec::new();
        for (index, fault) in scenario.faults.iter().enumerate() {
            if !self.fault_target_known(fault) {
                self.diagnostics.push(Finding::diagnostic(format!(
                    "Fault {} targets unknown {} {}",
                    fault.id,
                    if fault.kind == FaultKind::NodeDown { "node" } else { "link" },
                    fault.target_id
                )));
                continue;
            }
            if fault.duration == Some(0) {
                self.verbose_diagnostic(format!("Fault {} has zero duration and was skipped", fault.id));
                continue;
            }
            if fault.start_time > duration {
                self.verbose_diagnostic(format!(
                    "Fault {} starts at {}ms, after the scenario ends at {duration}ms",
                    fault.id, fault.start_time
                ));
                continue;
            }
            actions.push(Action {
                time: fault.start_time,
                phase: Phase::FaultStart,
                index,
            });
            points.insert(fault.start_time);
            if let Some(end) = fault.end_time().filter(|end| *end <= duration) {
                actions.push(Action {
                    time: end,
                    phase: Phase::FaultEnd,
                    index,
                });
                points.insert(end);
            }
        }

        for (index, attack) in scenario.attack_events.iter().enumerate() {
            if !self.router.graph().contains(&attack.source_node_id) {
                self.diagnostics.push(Finding::diagnostic(format!(
                    "Attack event {} starts from unknown node {}",
                    attack.id, attack.source_node_id
                )));
                continue;
            }
            if attack.timestamp > duration {
                self.verbose_diagnostic(format!(
                    "Attack event {} at {}ms is after the scenario ends at {duration}ms",
                    attack.id, attack.timestamp
                ));
                continue;
            }
            actions.push(Action {
                time: attack.timestamp,
                phase: Phase::Attack,
                index,
            });
            points.insert(attack.timestamp);
        }

        let mut points: Vec<u64> = points.into_iter().collect();
        if points.len() > limit {
            points.truncate(limit);
            let horizon = points.last().copied().unwrap_or(0);
            warn!(max_steps = limit, horizon, "Timeline truncated");
            self.diagnostics.push(Finding::diagnostic(format!(
                "Timeline truncated to {limit} steps; events after {horizon}ms were not simulated"
            )));
        }

        actions.sort();
        debug!(points = points.len(), actions = actions.len(), "Timeline built");
        Timeline { points, actions }
    }

    fn fault_target_known(&self, fault: &Fault) -> bool {
        let graph = self.router.graph();
        match fault.kind {
            FaultKind::LinkDown | FaultKind::LinkDegraded => {
                graph.link(&LinkId::new(fault.target_id.as_str())).is_some()
            }
            FaultKind::NodeDown => graph.contains(&NodeId::new(fault.target_id.as_str())),
            FaultKind::PolicyBlock | FaultKind::DnsFailure => true,
        }
    }

    fn apply(&mut self, action: Action) {
        match action.phase {
            Phase::FaultStart => self.inject_fault(action.index),
            Phase::FaultEnd => self.resolve_fault(action.index),
            Phase::Attack => self.launch_attack(action.index),
        }
    }

    fn inject_fault(&mut self, index: usize) {
        let scenario = self.scenario;
        let fault = &scenario.faults[index];
        let mut event = SimEvent::new(
            self.time,
            SimEventKind::FaultInjected,
            format!("Fault {} ({}) injected on {}", fault.id, fault.kind, fault.target_id),
        );

        match fault.kind {
            FaultKind::LinkDown => {
                let link = LinkId::new(fault.target_id.as_str());
                self.overlay.fail_link(&link);
                event = event.with_link(link);
            }
            FaultKind::LinkDegraded => {
                let link = LinkId::new(fault.target_id.as_str());
                let degradation = Degradation {
                    latency: fault.param("latency"),
                    loss: fault.param("loss"),
                };
                self.overlay.degrade_link(&link, index, degradation);
                event = event.with_link(link);
            }
            FaultKind::NodeDown => {
                let node = NodeId::new(fault.target_id.as_str());
                self.overlay.fail_node(&node);
                event = event.with_node(node);
            }
            FaultKind::PolicyBlock | FaultKind::DnsFailure => {}
        }
        if !fault.kind.affects_routing() {
            self.verbose_diagnostic(format!("Fault {} ({}) has no routing effect", fault.id, fault.kind));
        }

        info!(fault = %fault.id, kind = %fault.kind, target = %fault.target_id, t = self.time, "Fault injected");
        self.emit(event);
    }

    fn resolve_fault(&mut self, index: usize) {
        let scenario = self.scenario;
        let fault = &scenario.faults[index];
        let mut event = SimEvent::new(
            self.time,
            SimEventKind::FaultResolved,
            format!("Fault {} ({}) resolved on {}", fault.id, fault.kind, fault.target_id),
        );

        match fault.kind {
            FaultKind::LinkDown => {
                let link = LinkId::new(fault.target_id.as_str());
                self.overlay.restore_link(&link);
                event = event.with_link(link);
            }
            FaultKind::LinkDegraded => {
                let link = LinkId::new(fault.target_id.as_str());
                self.overlay.clear_degradation(&link, index);
                event = event.with_link(link);
            }
            FaultKind::NodeDown => {
                let node = NodeId::new(fault.target_id.as_str());
                self.overlay.restore_node(&node);
                event = event.with_node(node);
            }
            FaultKind::PolicyBlock | FaultKind::DnsFailure => {}
        }

        info!(fault = %fault.id, t = self.time, "Fault resolved");
        self.emit(event);
    }

    fn launch_attack(&mut self, index: usize) {
        let scenario = self.scenario;
        let attack = &scenario.attack_events[index];
        let source = &attack.source_node_id;

        if self.overlay.compromise(source) {
            debug!(node = %source, "Node compromised");
        }
        let mut event = SimEvent::new(
            self.time,
            SimEventKind::AttackEvent,
            format!("Attack event {} ({}) from {}", attack.id, attack.kind, source),
        )
        .with_node(source.clone());

        match &attack.target_node_id {
            Some(target) if self.router.graph().contains(target) => {
                let probe = Probe {
                    from: source,
                    to: target,
                    protocol: Protocol::Any,
                    port: None,
                };
                let verdict = match self.router.route(&probe, &self.overlay).outcome {
                    RouteOutcome::Delivered { path, .. } => AttackVerdict::Open { path: path.nodes },
                    RouteOutcome::Blocked { firewall, .. } => AttackVerdict::Blocked { firewall },
                    RouteOutcome::Unreachable(reason) => AttackVerdict::Isolated(reason),
                };
                info!(attack = %attack.id, from = %source, to = %target, ?verdict, "Attack evaluated");
                event.message = format!("{} toward {target}", event.message);
                self.attack_findings.push(attack_finding(attack, target, &verdict));
            }
            Some(target) => {
                self.diagnostics.push(Finding::diagnostic(format!(
                    "Attack event {} targets unknown node {target}",
                    attack.id
                )));
            }
            None => {}
        }

        self.emit(event);
    }

    /// Route one flow at the current time and account for it
    fn advance_flow(&mut self, index: usize) {
        let scenario = self.scenario;
        let flow = &scenario.flows[index];
        let generation = self.overlay.generation();
        let track = &mut self.flows[index];

        if track.outcome.state.is_settled() {
            return;
        }
        if track.routed_at == Some(generation) {
            if track.outcome.state == FlowState::Delivered {
                track.outcome.packets_delivered = track.outcome.packets_delivered.saturating_add(flow.rate);
                self.metrics.packets_processed = self.metrics.packets_processed.saturating_add(flow.rate);
            }
            return;
        }

        let time = self.time;
        let mut events = Vec::new();
        let was_delivered = track.outcome.state == FlowState::Delivered;
        if track.outcome.state == FlowState::Pending {
            track.outcome.state = FlowState::Routing;
            events.push(
                SimEvent::new(
                    time,
                    SimEventKind::FlowStart,
                    format!("Flow {} started: {} -> {}", flow.id, flow.from, flow.to),
                )
                .with_flow(flow.id.clone()),
            );
        }
        track.routed_at = Some(generation);

        let probe = Probe {
            from: &flow.from,
            to: &flow.to,
            protocol: flow.protocol,
            port: flow.port,
        };
        let report = self.router.route(&probe, &self.overlay);
        self.metrics.policies_evaluated = self.metrics.policies_evaluated.saturating_add(report.policies_evaluated);

        let outcome = &mut self.flows[index].outcome;
        let settled = match report.outcome {
            RouteOutcome::Delivered {
                path,
                latency_ms,
                loss_percent,
            } => {
                if !was_delivered || outcome.path != path.nodes {
                    for node in &path.nodes {
                        events.push(
                            SimEvent::new(time, SimEventKind::PacketSent, format!("Flow {} at {node}", flow.id))
                                .with_node(node.clone())
                                .with_flow(flow.id.clone()),
                        );
                    }
                }
                outcome.state = FlowState::Delivered;
                outcome.path = path.nodes;
                outcome.links = path.links;
                outcome.latency_ms = Some(latency_ms);
                outcome.loss_percent = Some(loss_percent);
                outcome.packets_delivered = outcome.packets_delivered.saturating_add(flow.rate);
                self.metrics.packets_processed = self.metrics.packets_processed.saturating_add(flow.rate);
                None
            }
            RouteOutcome::Blocked {
                path,
                firewall,
                decision,
            } => {
                self.metrics.policies_blocked += 1;
                events.push(
                    SimEvent::new(
                        time,
                        SimEventKind::PolicyBlock,
                        format!("Flow {} blocked by {firewall}: {}", flow.id, decision.reason),
                    )
                    .with_node(firewall.clone())
                    .with_flow(flow.id.clone()),
                );
                outcome.path = path.nodes;
                outcome.links = path.links;
                outcome.latency_ms = None;
                outcome.loss_percent = None;
                outcome.blocked_by = Some(firewall);
                outcome.matched_rule = decision.matched_rule;
                outcome.reason = Some(decision.reason);
                Some(FlowState::Blocked)
            }
            RouteOutcome::Unreachable(reason) => {
                events.push(
                    SimEvent::new(time, SimEventKind::PacketDropped, format!("Flow {} dropped: {reason}", flow.id))
                        .with_flow(flow.id.clone()),
                );
                outcome.latency_ms = None;
                outcome.loss_percent = None;
                outcome.reason = Some(reason.to_string());
                // Losing a working route is a drop; never having one is unreachable
                Some(if was_delivered {
                    FlowState::Dropped
                } else {
                    FlowState::Unreachable
                })
            }
        };

        if let Some(state) = settled {
            self.settle(index, state, &mut events);
        }
        for event in events {
            self.emit(event);
        }
    }

    fn settle(&mut self, index: usize, state: FlowState, events: &mut Vec<SimEvent>) {
        let scenario = self.scenario;
        let flow = &scenario.flows[index];
        let time = self.time;
        let outcome = &mut self.flows[index].outcome;
        outcome.state = state;
        outcome.settled_at = Some(time);
        outcome.packets_dropped = outcome.packets_dropped.saturating_add(flow.rate);
        self.metrics.packets_dropped = self.metrics.packets_dropped.saturating_add(flow.rate);

        debug!(flow = %flow.id, state = %state, t = time, "Flow settled");
        events.push(
            SimEvent::new(time, SimEventKind::FlowEnd, format!("Flow {} ended: {state}", flow.id))
                .with_flow(flow.id.clone()),
        );
    }

    fn count_flows(&mut self) {
        for track in &self.flows {
            match track.outcome.state {
                FlowState::Delivered => self.metrics.flows_delivered += 1,
                FlowState::Blocked => self.metrics.flows_blocked += 1,
                FlowState::Dropped => self.metrics.flows_dropped += 1,
                FlowState::Unreachable => self.metrics.flows_unreachable += 1,
                FlowState::Pending | FlowState::Routing => {}
            }
        }
    }

    fn cancelled(mut self) -> SimulationResult {
        warn!(scenario = %self.scenario.id, t = self.time, "Simulation cancelled");
        self.count_flows();
        SimulationResult {
            scenario_id: self.scenario.id.clone(),
            status: RunStatus::Cancelled,
            error: None,
            metrics: self.metrics,
            flows: self.flows.into_iter().map(|track| track.outcome).collect(),
            events: self.events,
            findings: Vec::new(),
            blast_radius: BTreeMap::new(),
        }
    }

    fn finish(mut self) -> SimulationResult {
        let end = self.time;
        let scenario = self.scenario;
        for (flow, track) in scenario.flows.iter().zip(&self.flows) {
            if track.outcome.state == FlowState::Delivered {
                self.events.push(
                    SimEvent::new(
                        end,
                        SimEventKind::FlowEnd,
                        format!(
                            "Flow {} ended: delivered {} packets",
                            flow.id, track.outcome.packets_delivered
                        ),
                    )
                    .with_flow(flow.id.clone()),
                );
            }
        }

        self.count_flows();
        self.metrics.record_matrices(self.router.graph(), &self.overlay);

        let blast_targets = self.blast_targets();
        let mut blast = BTreeMap::new();
        for target in blast_targets {
            match blast_radius(self.router.graph(), &target) {
                Ok(result) => {
                    debug!(node = %target, score = result.impact_score, "Blast radius computed");
                    blast.insert(target, result);
                }
                Err(err) => self.diagnostics.push(Finding::diagnostic(err.to_string())),
            }
        }

        let findings = self.collect_findings(&blast);

        info!(
            scenario = %scenario.id,
            steps = self.metrics.steps_executed,
            processed = self.metrics.packets_processed,
            dropped = self.metrics.packets_dropped,
            findings = findings.len(),
            "Simulation complete"
        );

        SimulationResult {
            scenario_id: scenario.id.clone(),
            status: RunStatus::Completed,
            error: None,
            metrics: self.metrics,
            flows: self.flows.into_iter().map(|track| track.outcome).collect(),
            events: self.events,
            findings,
            blast_radius: blast,
        }
    }

    /// Requested targets plus every compromised node, in id order
    fn blast_targets(&mut self) -> BTreeSet<NodeId> {
        let mut targets = BTreeSet::new();
        let requested = std::mem::take(&mut self.options.blast_radius_targets);
        for target in requested {
            if self.router.graph().contains(&target) {
                targets.insert(target);
            } else {
                self.diagnostics.push(Finding::diagnostic(format!(
                    "Blast radius requested for unknown node {target}"
                )));
            }
        }
        targets.extend(self.overlay.compromised().cloned());
        targets
    }

    fn collect_findings(&mut self, blast: &BTreeMap<NodeId, BlastRadiusResult>) -> Vec<Finding> {
        let graph = self.router.graph();
        let mut log = FindingsLog::new();

        if self.options.lint_topology {
            let topology = graph.topology();
            log.extend(lint_findings(topology, &validate(topology)));
        }

        for (firewall, error) in self.router.parse_errors() {
            log.push(policy_parse_finding(firewall, error));
        }
        if self.options.verbose {
            for node in graph.nodes().filter(|node| node.is_firewall()) {
                if let Some(policy) = self.router.policy(&node.id) {
                    for issue in PolicyValidator.validate(policy, graph) {
                        log.push(policy_issue_finding(&node.id, &issue));
                    }
                }
            }
        }

        log.extend(std::mem::take(&mut self.diagnostics));

        for (flow, track) in self.scenario.flows.iter().zip(&self.flows) {
            if let Some(finding) = flow_finding(flow, &track.outcome) {
                log.push(finding);
            }
        }

        log.extend(std::mem::take(&mut self.attack_findings));

        for result in blast.values() {
            log.extend(blast_findings(result, self.config.blast_radius_threshold));
        }

        log.into_vec()
    }

    fn verbose_diagnostic(&mut self, message: String) {
        if self.options.verbose {
            self.diagnostics.push(Finding::diagnostic(message));
        } else {
            debug!("{}", message);
        }
    }

    fn emit(&mut self, event: SimEvent) {
        if self.config.trace_routing {
            trace!("Event: {:?}", event);
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::{Link, Node, NodeKind};

    use crate::findings::FindingKind;

    /// user - fw - web, with a spare path user - sw - web
    fn office(policy: &str) -> Topology {
        Topology::new()
            .with_node(Node::new("user", NodeKind::Workstation))
            .with_node(Node::new("fw", NodeKind::Firewall).with_policy(policy))
            .with_node(Node::new("web", NodeKind::Server))
            .with_link(Link::new("l1", "user", "fw").with_latency(1.0))
            .with_link(Link::new("l2", "fw", "web").with_latency(1.0))
    }

    fn line() -> Topology {
        Topology::new()
            .with_node(Node::new("a", NodeKind::Workstation))
            .with_node(Node::new("b", NodeKind::Switch))
            .with_node(Node::new("c", NodeKind::Server))
            .with_link(Link::new("l1", "a", "b").with_latency(2.0))
            .with_link(Link::new("l2", "b", "c").with_latency(3.0))
    }

    fn kinds(result: &SimulationResult) -> Vec<FindingKind> {
        result.findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_direct_delivery() {
        let scenario = Scenario::new("s")
            .with_duration(2000)
            .with_flow(Flow::new("f1", "a", "c").with_rate(2));
        let result = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());

        assert!(result.is_completed());
        let flow = result.flow("f1").unwrap();
        assert_eq!(flow.state, FlowState::Delivered);
        assert_eq!(flow.latency_ms, Some(5.0));
        // Steps at 0, 1000, 2000
        assert_eq!(result.metrics.steps_executed, 3);
        assert_eq!(result.metrics.packets_processed, 6);
        assert_eq!(result.metrics.flows_delivered, 1);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_blocked_flow_counts_once() {
        let scenario = Scenario::new("s")
            .with_duration(3000)
            .with_flow(Flow::new("f1", "user", "web").with_port(22).with_rate(4));
        let topology = office("allow tcp from user to web port 443\ndeny any from Any to Any");
        let result = SimulationEngine::default().run(&topology, &scenario, &SimOptions::new());

        let flow = result.flow("f1").unwrap();
        assert_eq!(flow.state, FlowState::Blocked);
        assert_eq!(flow.blocked_by, Some(NodeId::new("fw")));
        assert_eq!(flow.settled_at, Some(0));
        assert_eq!(result.metrics.packets_dropped, 4);
        assert_eq!(result.metrics.packets_processed, 0);
        assert_eq!(result.metrics.policies_evaluated, 1);
        assert_eq!(result.metrics.policies_blocked, 1);
        assert_eq!(kinds(&result), vec![FindingKind::BlockedFlow]);
    }

    #[test]
    fn test_link_fault_drops_and_recovers_nothing() {
        // The flow is delivered at 0 and 1000, then loses l2 at 1500
        let scenario = Scenario::new("s")
            .with_duration(3000)
            .with_flow(Flow::new("f1", "a", "c"))
            .with_fault(Fault::link_down("x1", "l2", 1500).with_duration(1000));
        let result = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());

        let flow = result.flow("f1").unwrap();
        assert_eq!(flow.state, FlowState::Dropped);
        assert_eq!(flow.settled_at, Some(1500));
        assert_eq!(result.metrics.packets_processed, 2);
        assert_eq!(result.metrics.packets_dropped, 1);
        // 0, 1000, 1500, 2000, 2500, 3000
        assert_eq!(result.metrics.steps_executed, 6);
        assert_eq!(kinds(&result), vec![FindingKind::DroppedFlow]);

        let fault_events: Vec<(u64, SimEventKind)> = result
            .events
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::FaultInjected | SimEventKind::FaultResolved))
            .map(|e| (e.timestamp, e.kind))
            .collect();
        assert_eq!(
            fault_events,
            vec![(1500, SimEventKind::FaultInjected), (2500, SimEventKind::FaultResolved)]
        );
        // The fault is resolved by the end, so the final matrices see l2 again
        assert!(result.metrics.reachability_matrix[&NodeId::new("a")][&NodeId::new("c")]);
    }

    #[test]
    fn test_degradation_updates_latency() {
        let scenario = Scenario::new("s")
            .with_duration(1000)
            .with_flow(Flow::new("f1", "a", "c"))
            .with_fault(Fault::link_degraded("x1", "l1", 500, 150.0, 5.0));
        let result = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());

        let flow = result.flow("f1").unwrap();
        assert_eq!(flow.state, FlowState::Delivered);
        assert_eq!(flow.latency_ms, Some(153.0));
        assert!((flow.loss_percent.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(
            result.metrics.latency_matrix[&NodeId::new("a")][&NodeId::new("c")],
            Some(153.0)
        );
        // Same path, so packet-sent events are only emitted once
        let sent = result.events.iter().filter(|e| e.kind == SimEventKind::PacketSent).count();
        assert_eq!(sent, 3);
    }

    #[test]
    fn test_unknown_flow_endpoint_fails_run() {
        let scenario = Scenario::new("s").with_flow(Flow::new("f1", "a", "ghost"));
        let result = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("ghost"));
        assert!(result.flows.is_empty());
    }

    #[test]
    fn test_invalid_topology_fails_run() {
        let topology = line().with_link(Link::new("l9", "a", "nowhere"));
        let result = SimulationEngine::default().run(&topology, &Scenario::new("s"), &SimOptions::new());
        assert_eq!(result.status, RunStatus::Failed);
    }

    #[test]
    fn test_attack_findings_and_blast() {
        let scenario = Scenario::new("s")
            .with_duration(1000)
            .with_attack(AttackEvent::new("a1", AttackKind::LateralMovement, "user", 500).with_target("web"))
            .with_attack(AttackEvent::new("a2", AttackKind::ReconScan, "web", 600).with_target("user"));
        let topology = office("allow any from user to web\ndeny any from Any to Any");
        let result = SimulationEngine::default().run(&topology, &scenario, &SimOptions::new());

        assert_eq!(
            kinds(&result),
            vec![FindingKind::AttackPathOpen, FindingKind::AttackContained]
        );
        let blast: Vec<&str> = result.blast_radius.keys().map(NodeId::as_str).collect();
        assert_eq!(blast, vec!["user", "web"]);
        let attacks = result.events.iter().filter(|e| e.kind == SimEventKind::AttackEvent).count();
        assert_eq!(attacks, 2);
    }

    #[test]
    fn test_options_merge_from_scenario() {
        let scenario = Scenario::new("s")
            .with_option("lintTopology", serde_json::json!(true))
            .with_option("blastRadius", serde_json::json!(["b", "ghost"]));
        let options = SimOptions::new().with_blast_target("a").merged_with(&scenario.options);
        assert!(options.lint_topology);
        assert!(!options.verbose);
        assert_eq!(
            options.blast_radius_targets,
            vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("ghost")]
        );

        let result = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());
        assert!(result.blast_radius.contains_key(&NodeId::new("b")));
        assert!(
            result
                .findings
                .iter()
                .any(|f| f.kind == FindingKind::Diagnostic && f.description.contains("ghost"))
        );
    }

    #[test]
    fn test_verbose_diagnostics() {
        let scenario = Scenario::new("s")
            .with_duration(1000)
            .with_fault(Fault::link_down("zero", "l1", 0).with_duration(0))
            .with_fault(Fault::link_down("late", "l1", 5000))
            .with_fault(Fault::new("dns", FaultKind::DnsFailure, "b", 0))
            .with_fault(Fault::link_down("ghost", "l9", 0));

        let quiet = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new());
        assert_eq!(kinds(&quiet), vec![FindingKind::Diagnostic]);

        let verbose = SimulationEngine::default().run(&line(), &scenario, &SimOptions::new().with_verbose(true));
        assert_eq!(verbose.findings.len(), 4);
        assert!(verbose.findings.iter().all(|f| f.kind == FindingKind::Diagnostic));
    }

    #[test]
    fn test_timeline_truncation() {
        let config = SimConfig {
            max_steps: 2,
            ..Default::default()
        };
        let scenario = Scenario::new("s").with_duration(10_000).with_flow(Flow::new("f1", "a", "c"));
        let result = SimulationEngine::new(config).run(&line(), &scenario, &SimOptions::new());

        assert_eq!(result.metrics.steps_executed, 2);
        assert_eq!(kinds(&result), vec![FindingKind::Diagnostic]);
    }

    #[test]
    fn test_pre_cancelled_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scenario = Scenario::new("s").with_flow(Flow::new("f1", "a", "c"));
        let result = SimulationEngine::default().run_with_cancel(&line(), &scenario, &SimOptions::new(), &cancel);

        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.metrics.steps_executed, 0);
        assert_eq!(result.flow("f1").unwrap().state, FlowState::Pending);
        assert!(result.findings.is_empty());
    }
}
