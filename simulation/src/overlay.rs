//! Run-local fault overlay
//!
//! The canonical topology is never touched during a run. Faults and
//! compromises land here instead, and the overlay answers [`LinkState`]
//! queries for routing. Failures are reference counted so overlapping
//! faults on the same element resolve independently.

use std::collections::{BTreeMap, BTreeSet};

use twin_core::{Link, LinkId, LinkState, NodeId};

/// Latency/loss override applied by a degradation fault
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Degradation {
    pub latency: Option<f64>,
    pub loss: Option<f64>,
}

/// Mutable per-run view of the network
#[derive(Debug, Default)]
pub struct RunOverlay {
    failed_links: BTreeMap<LinkId, u32>,
    failed_nodes: BTreeMap<NodeId, u32>,
    /// Active degradations per link, keyed by fault index; the latest applied wins
    degraded: BTreeMap<LinkId, Vec<(usize, Degradation)>>,
    compromised: BTreeSet<NodeId>,
    generation: u64,
}

impl RunOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every change that can alter routing
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fail_link(&mut self, link: &LinkId) {
        *self.failed_links.entry(link.clone()).or_default() += 1;
        self.generation += 1;
    }

    pub fn restore_link(&mut self, link: &LinkId) {
        if release(&mut self.failed_links, link) {
            self.generation += 1;
        }
    }

    pub fn fail_node(&mut self, node: &NodeId) {
        *self.failed_nodes.entry(node.clone()).or_default() += 1;
        self.generation += 1;
    }

    pub fn restore_node(&mut self, node: &NodeId) {
        if release(&mut self.failed_nodes, node) {
            self.generation += 1;
        }
    }

    pub fn degrade_link(&mut self, link: &LinkId, fault: usize, degradation: Degradation) {
        self.degraded
            .entry(link.clone())
            .or_default()
            .push((fault, degradation));
        self.generation += 1;
    }

    pub fn clear_degradation(&mut self, link: &LinkId, fault: usize) {
        let Some(active) = self.degraded.get_mut(link) else {
            return;
        };
        let before = active.len();
        active.retain(|(index, _)| *index != fault);
        let changed = active.len() != before;
        if active.is_empty() {
            self.degraded.remove(link);
        }
        if changed {
            self.generation += 1;
        }
    }

    /// Mark a node compromised; returns false if it already was
    pub fn compromise(&mut self, node: &NodeId) -> bool {
        self.compromised.insert(node.clone())
    }

    pub fn is_compromised(&self, node: &NodeId) -> bool {
        self.compromised.contains(node)
    }

    /// Compromised nodes in id order
    pub fn compromised(&self) -> impl Iterator<Item = &NodeId> {
        self.compromised.iter()
    }

    pub fn is_link_failed(&self, link: &LinkId) -> bool {
        self.failed_links.contains_key(link)
    }

    pub fn is_node_down(&self, node: &NodeId) -> bool {
        self.failed_nodes.contains_key(node)
    }

    fn degradation(&self, link: &LinkId) -> Option<&Degradation> {
        self.degraded
            .get(link)
            .and_then(|active| active.last())
            .map(|(_, degradation)| degradation)
    }
}

impl LinkState for RunOverlay {
    fn link_usable(&self, link: &Link) -> bool {
        !link.failed && !self.is_link_failed(&link.id) && self.link_loss(link) < 100.0
    }

    fn node_usable(&self, node: &NodeId) -> bool {
        !self.is_node_down(node)
    }

    fn link_latency(&self, link: &Link) -> f64 {
        self.degradation(&link.id)
            .and_then(|d| d.latency)
            .unwrap_or(link.latency)
    }

    fn link_loss(&self, link: &Link) -> f64 {
        self.degradation(&link.id)
            .and_then(|d| d.loss)
            .unwrap_or(link.loss)
    }
}

/// Decrement a reference count, returning true when it reaches zero
fn release<K: Ord>(counts: &mut BTreeMap<K, u32>, key: &K) -> bool {
    match counts.get_mut(key) {
        Some(count) if *count > 1 => {
            *count -= 1;
            false
        }
        Some(_) => {
            counts.remove(key);
            true
        }
        None => false,
    }
}
