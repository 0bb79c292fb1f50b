//! # Twin Simulation
//!
//! Flow, fault, and attack simulation over a modeled network topology.
//!
//! ## Overview
//!
//! A run plays a [`Scenario`] against a [`Topology`](twin_core::Topology) in
//! logical time and reports whether each flow was delivered, blocked,
//! dropped, or unreachable. Key features:
//!
//! - **Link-level routing**: shortest usable paths, with static routes as a fallback
//! - **Firewall policies**: every firewall on a path evaluates the flow; default deny
//! - **Faults**: link/node outages and link degradation applied to a run-local overlay
//! - **Attacks**: attacker footholds probe their targets through the same routing
//! - **Blast radius**: structural impact of losing a node
//! - **Findings**: deterministic, id-stamped observations derived from all of the above
//!
//! ## Architecture
//!
//! - **Types** (`types.rs`): Scenario documents and results
//! - **Overlay** (`overlay.rs`): Run-local fault state answering link queries
//! - **Routing** (`routing.rs`): Path finding, static routes, firewall checks
//! - **Simulation** (`simulation.rs`): The logical-time engine
//! - **Blast** (`blast.rs`): Blast-radius analysis
//! - **Findings** (`findings.rs`): Outcome-to-finding mapping
//! - **Metrics** (`metrics.rs`): Counters and reachability/latency matrices
//! - **Config** (`config.rs`): Loading documents and engine settings
//! - **Scenarios** (`scenarios.rs`): Built-in demos
//!
//! ## Example
//!
//! ```rust
//! use twin_core::{Link, Node, NodeKind, Topology};
//! use twin_simulation::*;
//!
//! let topology = Topology::new()
//!     .with_node(Node::new("laptop", NodeKind::Workstation))
//!     .with_node(Node::new("fw", NodeKind::Firewall)
//!         .with_policy("allow tcp from laptop to web port 443\ndeny any from Any to Any"))
//!     .with_node(Node::new("web", NodeKind::Server))
//!     .with_link(Link::new("l1", "laptop", "fw"))
//!     .with_link(Link::new("l2", "fw", "web"));
//!
//! let scenario = Scenario::new("office")
//!     .with_flow(Flow::new("https", "laptop", "web").with_port(443))
//!     .with_flow(Flow::new("ssh", "laptop", "web").with_port(22));
//!
//! let result = SimulationEngine::default().run(&topology, &scenario, &SimOptions::new());
//! assert_eq!(result.flow("https").unwrap().state, FlowState::Delivered);
//! assert_eq!(result.flow("ssh").unwrap().state, FlowState::Blocked);
//! ```

pub mod blast;
pub mod config;
pub mod findings;
pub mod metrics;
pub mod overlay;
pub mod routing;
pub mod scenarios;
pub mod simulation;
pub mod types;

// Re-export main types
pub use types::{
    AttackEvent,
    AttackKind,
    Expectation,
    Fault,
    FaultKind,
    Flow,
    FlowOutcome,
    FlowState,
    RunStatus,
    Scenario,
    SimEvent,
    SimEventKind,
    SimulationResult,
};

pub use simulation::{SimConfig, SimOptions, SimulationEngine, simulate};

pub use blast::{BlastRadiusResult, compute_blast_radius};
pub use config::{ConfigError, load_config, load_scenario, load_topology};
pub use findings::{Finding, FindingKind, Severity};
pub use metrics::Metrics;
pub use routing::{RouteOutcome, Router, Unreachable};
