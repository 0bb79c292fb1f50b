//! # Twin Core
//!
//! Topology model, graph queries, and errors shared by every component of the
//! network digital twin.
//!
//! ## Key Types
//!
//! - [`Topology`]: The declarative network model (nodes, links, routes)
//! - [`TopologyGraph`]: Read-only index over a topology, built once per run
//! - [`LinkState`]: Seam between graph queries and run-local fault state
//! - [`ValidationReport`]: Configuration errors and warnings for a topology
//!
//! The topology passed in by the caller is never mutated. Anything that changes
//! during a simulation run lives behind a [`LinkState`] implementation owned by
//! that run.

pub mod error;
pub mod graph;
pub mod identity;
pub mod topology;
pub mod traits;
pub mod validation;

// Re-export main types
pub use error::*;
pub use graph::*;
pub use identity::*;
pub use topology::*;
pub use traits::*;
pub use validation::*;
