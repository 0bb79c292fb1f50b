//! twin-sim - network digital-twin simulator
//!
//! Runs scenarios against modeled topologies and prints the result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use twin_core::{NodeId, TopologyGraph, validate};
use twin_logging::{LogConfig, TwinSubscriberBuilder};

use twin_simulation::blast::compute_blast_radius;
use twin_simulation::config::{load_config, load_scenario, load_topology};
use twin_simulation::scenarios::{self, Demo};
use twin_simulation::simulation::{SimConfig, SimOptions, SimulationEngine};

#[derive(Parser)]
#[command(
    name = "twin-sim",
    about = "Network digital-twin simulation: flows, faults, attacks, and blast radius",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write JSONL logs to this directory instead of the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario against a topology
    Run {
        /// Topology JSON document
        #[arg(short, long)]
        topology: PathBuf,

        /// Scenario JSON document
        #[arg(short, long)]
        scenario: PathBuf,

        /// Engine configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Lint the topology for warnings and exposures
        #[arg(long)]
        lint: bool,

        /// Analyze the blast radius of a node (repeatable)
        #[arg(long = "blast", value_name = "NODE")]
        blast: Vec<String>,
    },

    /// Compute the blast radius of one node
    Blast {
        /// Topology JSON document
        #[arg(short, long)]
        topology: PathBuf,

        /// Node to analyze
        #[arg(short, long)]
        node: String,
    },

    /// Run a built-in demo scenario
    Demo {
        #[arg(value_enum)]
        name: Demo,
    },

    /// Validate a topology and draw it
    Validate {
        /// Topology JSON document
        #[arg(short, long)]
        topology: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = match (&cli.log_dir, cli.verbose) {
        (Some(dir), _) => TwinSubscriberBuilder::new()
            .with_config(LogConfig::production(dir.clone()))
            .init(),
        (None, true) => twin_logging::init_development(),
        (None, false) => TwinSubscriberBuilder::new().with_config(LogConfig::testing()).init(),
    }
    .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            topology,
            scenario,
            config,
            lint,
            blast,
        } => {
            let topology = load_topology(&topology)?;
            let scenario = load_scenario(&scenario)?;
            let config = match config {
                Some(path) => load_config(&path)?,
                None => SimConfig::default(),
            };

            let mut options = SimOptions::new().with_verbose(cli.verbose).with_lint(lint);
            for node in blast {
                options = options.with_blast_target(node);
            }

            let result = SimulationEngine::new(config)
                .simulate(Arc::new(topology), scenario, options)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Blast { topology, node } => {
            let topology = load_topology(&topology)?;
            let result = compute_blast_radius(&topology, &NodeId::new(node))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Demo { name } => {
            let (topology, result) = scenarios::run_demo(name);
            eprintln!("{}", scenarios::summary(&topology, &result));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Validate { topology } => {
            let topology = load_topology(&topology)?;
            let report = validate(&topology);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_valid() {
                let graph = TopologyGraph::build(&topology)?;
                eprintln!("{}", graph.visualize());
            } else {
                anyhow::bail!("Topology has {} configuration error(s)", report.errors.len());
            }
        }
    }

    Ok(())
}
