//! Core traits for graph queries
//!
//! [`LinkState`] lets the same traversal code run against the canonical
//! topology and against a simulation run's fault overlay.

use crate::identity::NodeId;
use crate::topology::Link;

/// Which links and nodes are currently usable
///
/// Implementations answer for one point in (simulated) time. Graph queries
/// only traverse a link when the link is usable and both endpoints are.
pub trait LinkState {
    /// Check if traffic may cross a link
    fn link_usable(&self, link: &Link) -> bool;

    /// Check if a node can send, receive, or forward traffic
    fn node_usable(&self, _node: &NodeId) -> bool {
        true
    }

    /// Effective latency of a link in milliseconds
    fn link_latency(&self, link: &Link) -> f64 {
        link.latency
    }

    /// Effective loss percentage of a link
    fn link_loss(&self, link: &Link) -> f64 {
        link.loss
    }
}

/// The canonical topology as authored: only the `failed` flag is honored
#[derive(Debug, Clone, Copy, Default)]
pub struct Pristine;

impl LinkState for Pristine {
    fn link_usable(&self, link: &Link) -> bool {
        !link.failed
    }
}

/// Every modeled link counts, failed or not
#[derive(Debug, Clone, Copy, Default)]
pub struct Structural;

impl LinkState for Structural {
    fn link_usable(&self, _link: &Link) -> bool {
        true
    }
}
