//! Policy reference checks
//!
//! Parsing only checks syntax. The validator flags rules that can never do
//! what their author meant: names that match no node id or tag, and ICMP
//! rules with a port.

use thiserror::Error;

use crate::evaluator::TagLookup;
use crate::parser::Policy;
use crate::rule::{Endpoint, Protocol, Rule};

/// A semantic problem with a parsed rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyIssue {
    #[error("Line {line}: invalid source reference: {name}")]
    UnknownSource { line: usize, name: String },

    #[error("Line {line}: invalid destination reference: {name}")]
    UnknownDestination { line: usize, name: String },

    #[error("Line {line}: ICMP protocol does not support port specification")]
    IcmpWithPort { line: usize },
}

/// Checks parsed policies against the nodes of a topology
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyValidator;

impl PolicyValidator {
    pub fn validate<T: TagLookup + ?Sized>(&self, policy: &Policy, nodes: &T) -> Vec<PolicyIssue> {
        let mut issues = Vec::new();
        for rule in &policy.rules {
            if let Some(name) = unknown_reference(&rule.source, nodes) {
                issues.push(PolicyIssue::UnknownSource {
                    line: rule.line,
                    name: name.to_string(),
                });
            }
            if let Some(name) = unknown_reference(&rule.destination, nodes) {
                issues.push(PolicyIssue::UnknownDestination {
                    line: rule.line,
                    name: name.to_string(),
                });
            }
            if icmp_with_port(rule) {
                issues.push(PolicyIssue::IcmpWithPort { line: rule.line });
            }
        }
        issues
    }
}

fn unknown_reference<'r, T: TagLookup + ?Sized>(endpoint: &'r Endpoint, nodes: &T) -> Option<&'r str> {
    match endpoint {
        Endpoint::Any => None,
        Endpoint::Named(name) if nodes.contains_node(name) || nodes.tag_in_use(name) => None,
        Endpoint::Named(name) => Some(name),
    }
}

fn icmp_with_port(rule: &Rule) -> bool {
    rule.protocol == Some(Protocol::Icmp) && rule.port.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::{Node, NodeKind, Topology};

    #[test]
    fn test_valid_references() {
        let topology = Topology::new()
            .with_node(Node::new("web", NodeKind::Server))
            .with_node(Node::new("laptop", NodeKind::Workstation).with_tag("Users"));
        let policy = Policy::parse("allow tcp from Users to web port 443\ndeny any from Any to Any").policy;
        assert!(PolicyValidator.validate(&policy, &topology).is_empty());
    }

    #[test]
    fn test_reports_unknown_names_and_icmp_ports() {
        let topology = Topology::new().with_node(Node::new("web", NodeKind::Server));
        let policy = Policy::parse("allow tcp from Contractors to web\n\nallow icmp from web to Vault port 7").policy;

        let issues = PolicyValidator.validate(&policy, &topology);
        assert_eq!(
            issues,
            vec![
                PolicyIssue::UnknownSource {
                    line: 1,
                    name: "Contractors".into()
                },
                PolicyIssue::UnknownDestination {
                    line: 3,
                    name: "Vault".into()
                },
                PolicyIssue::IcmpWithPort { line: 3 },
            ]
        );
        assert_eq!(
            issues[2].to_string(),
            "Line 3: ICMP protocol does not support port specification"
        );
    }
}
