//! Policy rule types

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a matching rule does with the traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }

    /// Parse an action keyword, ignoring case
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("allow") {
            Some(Action::Allow)
        } else if word.eq_ignore_ascii_case("deny") {
            Some(Action::Deny)
        } else {
            None
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic protocol, for both rules and flows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
    Dns,
    Any,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Dns => "dns",
            Protocol::Any => "any",
        }
    }

    /// Parse a protocol keyword, ignoring case
    pub fn from_keyword(word: &str) -> Option<Self> {
        [
            Protocol::Tcp,
            Protocol::Udp,
            Protocol::Icmp,
            Protocol::Dns,
            Protocol::Any,
        ]
        .into_iter()
        .find(|protocol| word.eq_ignore_ascii_case(protocol.as_str()))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source or destination selector of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Matches every node
    Any,
    /// Matches a node with this id or carrying this tag
    Named(String),
}

impl Endpoint {
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("any") {
            Endpoint::Any
        } else {
            Endpoint::Named(token.to_string())
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Any => f.write_str("Any"),
            Endpoint::Named(name) => f.write_str(name),
        }
    }
}

/// A single port or an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortMatcher {
    Single(u16),
    Range(u16, u16),
}

impl PortMatcher {
    pub fn matches(&self, port: u16) -> bool {
        match *self {
            PortMatcher::Single(p) => p == port,
            PortMatcher::Range(lo, hi) => (lo..=hi).contains(&port),
        }
    }
}

impl fmt::Display for PortMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortMatcher::Single(p) => write!(f, "{p}"),
            PortMatcher::Range(lo, hi) => write!(f, "{lo}-{hi}"),
        }
    }
}

/// One parsed policy rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub action: Action,
    /// `None` when the rule names no protocol, which matches any
    pub protocol: Option<Protocol>,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub port: Option<PortMatcher>,
    /// 1-based line the rule came from
    pub line: usize,
}

impl Rule {
    /// Build a rule that did not come from policy text
    pub fn new(action: Action, source: Endpoint, destination: Endpoint) -> Self {
        Self {
            action,
            protocol: None,
            source,
            destination,
            port: None,
            line: 0,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_port(mut self, port: PortMatcher) -> Self {
        self.port = Some(port);
        self
    }

    /// The rule a firewall falls back to when it has no policy
    pub fn deny_all() -> Self {
        Self::new(Action::Deny, Endpoint::Any, Endpoint::Any).with_protocol(Protocol::Any)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(protocol) = self.protocol {
            write!(f, " {protocol}")?;
        }
        write!(f, " from {} to {}", self.source, self.destination)?;
        if let Some(port) = self.port {
            write!(f, " port {port}")?;
        }
        Ok(())
    }
}
