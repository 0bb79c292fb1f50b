//! Error types for the topology model

use thiserror::Error;

use crate::identity::NodeId;
use crate::validation::ValidationIssue;

/// Errors raised while loading or querying a topology
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Invalid topology: {}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Malformed topology document: {0}")]
    Parse(#[from] serde_json::Error),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
