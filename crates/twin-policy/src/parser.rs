//! Line-oriented policy parser
//!
//! Grammar, one rule per line, keywords case-insensitive:
//!
//! ```text
//! <allow|deny> [tcp|udp|icmp|dns|any] from <source> to <destination> [port <n>|<a>-<b>]
//! ```
//!
//! Blank lines and lines starting with `#` are ignored, and a `#` token
//! starts a trailing comment. A line that does not fit the grammar is
//! skipped and recorded as a [`PolicyParseError`].

use tracing::debug;

use crate::error::{PolicyParseError, SyntaxError};
use crate::rule::{Action, Endpoint, PortMatcher, Protocol, Rule};

/// An ordered list of rules for one firewall
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    pub rules: Vec<Rule>,
}

impl Policy {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Policy of a firewall that has none configured: deny everything
    pub fn fail_closed() -> Self {
        Self::new(vec![Rule::deny_all()])
    }

    /// Parse policy text, collecting skipped lines
    pub fn parse(text: &str) -> ParsedPolicy {
        parse_policy(text)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Result of parsing policy text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPolicy {
    pub policy: Policy,
    /// Lines that were skipped, in line order
    pub errors: Vec<PolicyParseError>,
}

/// Parse multi-line policy text
pub fn parse_policy(text: &str) -> ParsedPolicy {
    let mut parsed = ParsedPolicy::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_rule(line) {
            Ok(mut rule) => {
                rule.line = index + 1;
                parsed.policy.rules.push(rule);
            }
            Err(reason) => {
                debug!(line = index + 1, text = line, %reason, "Skipping policy line");
                parsed.errors.push(PolicyParseError {
                    line: index + 1,
                    text: line.to_string(),
                    reason,
                });
            }
        }
    }

    parsed
}

/// Parse a single trimmed, non-comment line
pub fn parse_rule(line: &str) -> Result<Rule, SyntaxError> {
    let mut tokens = line
        .split_whitespace()
        .take_while(|token| !token.starts_with('#'))
        .peekable();

    let word = tokens.next().ok_or(SyntaxError::Missing("action"))?;
    let action =
        Action::from_keyword(word).ok_or_else(|| SyntaxError::UnknownAction(word.to_string()))?;

    let protocol = match tokens.peek().and_then(|word| Protocol::from_keyword(word)) {
        Some(protocol) => {
            tokens.next();
            Some(protocol)
        }
        None => None,
    };

    expect_keyword(tokens.next(), "from")?;
    let source = tokens
        .next()
        .map(Endpoint::parse)
        .ok_or(SyntaxError::Missing("source"))?;

    expect_keyword(tokens.next(), "to")?;
    let destination = tokens
        .next()
        .map(Endpoint::parse)
        .ok_or(SyntaxError::Missing("destination"))?;

    let port = match tokens.next() {
        None => None,
        Some(word) if word.eq_ignore_ascii_case("port") => {
            let range = tokens.next().ok_or(SyntaxError::Missing("port number"))?;
            Some(parse_port(range)?)
        }
        Some(word) => return Err(SyntaxError::TrailingInput(word.to_string())),
    };

    if let Some(extra) = tokens.next() {
        return Err(SyntaxError::TrailingInput(extra.to_string()));
    }

    Ok(Rule {
        action,
        protocol,
        source,
        destination,
        port,
        line: 0,
    })
}

fn expect_keyword(token: Option<&str>, keyword: &'static str) -> Result<(), SyntaxError> {
    match token {
        Some(word) if word.eq_ignore_ascii_case(keyword) => Ok(()),
        Some(word) => Err(SyntaxError::Expected {
            expected: keyword,
            found: word.to_string(),
        }),
        None => Err(SyntaxError::Missing(keyword)),
    }
}

fn parse_port(text: &str) -> Result<PortMatcher, SyntaxError> {
    let invalid = || SyntaxError::InvalidPort(text.to_string());
    match text.split_once('-') {
        Some((lo, hi)) => {
            let lo: u16 = lo.parse().map_err(|_| invalid())?;
            let hi: u16 = hi.parse().map_err(|_| invalid())?;
            if lo > hi {
                return Err(invalid());
            }
            Ok(PortMatcher::Range(lo, hi))
        }
        None => text.parse().map(PortMatcher::Single).map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_rule() {
        let rule = parse_rule("allow tcp from Users to WebApp port 443").unwrap();
        assert_eq!(rule.action, Action::Allow);
        assert_eq!(rule.protocol, Some(Protocol::Tcp));
        assert_eq!(rule.source, Endpoint::Named("Users".into()));
        assert_eq!(rule.destination, Endpoint::Named("WebApp".into()));
        assert_eq!(rule.port, Some(PortMatcher::Single(443)));
    }

    #[test]
    fn test_protocol_is_optional() {
        let rule = parse_rule("deny from Guests to Internal").unwrap();
        assert_eq!(rule.protocol, None);
        assert_eq!(rule.port, None);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let rule = parse_rule("ALLOW UDP FROM any TO dns-1 PORT 53").unwrap();
        assert_eq!(rule.action, Action::Allow);
        assert_eq!(rule.protocol, Some(Protocol::Udp));
        assert_eq!(rule.source, Endpoint::Any);
        // Names keep their case
        assert_eq!(rule.destination, Endpoint::Named("dns-1".into()));
    }

    #[test]
    fn test_port_range() {
        let rule = parse_rule("allow tcp from a to b port 8000-8080").unwrap();
        assert_eq!(rule.port, Some(PortMatcher::Range(8000, 8080)));
        assert_eq!(
            parse_rule("allow tcp from a to b port 90-80"),
            Err(SyntaxError::InvalidPort("90-80".into()))
        );
        assert_eq!(
            parse_rule("allow tcp from a to b port http"),
            Err(SyntaxError::InvalidPort("http".into()))
        );
    }

    #[test]
    fn test_trailing_comment_and_garbage() {
        assert!(parse_rule("allow tcp from a to b port 22 # ssh").is_ok());
        assert_eq!(
            parse_rule("allow tcp from a to b via c"),
            Err(SyntaxError::TrailingInput("via".into()))
        );
        assert_eq!(
            parse_rule("allow tcp from a to b port 22 now"),
            Err(SyntaxError::TrailingInput("now".into()))
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            parse_rule("permit tcp from a to b"),
            Err(SyntaxError::UnknownAction("permit".into()))
        );
        assert_eq!(
            parse_rule("allow tcp a to b"),
            Err(SyntaxError::Expected {
                expected: "from",
                found: "a".into()
            })
        );
        assert_eq!(parse_rule("allow tcp from a to"), Err(SyntaxError::Missing("destination")));
        assert_eq!(parse_rule("allow tcp from a"), Err(SyntaxError::Missing("to")));
    }

    #[test]
    fn test_malformed_lines_are_skipped_and_reported() {
        let text = "\n# comment\nallow tcp from a to b port 443\n  garbage here  \ndeny any from Any to Any\n";
        let parsed = parse_policy(text);

        assert_eq!(parsed.policy.len(), 2);
        assert_eq!(parsed.policy.rules[0].line, 3);
        assert_eq!(parsed.policy.rules[1].line, 5);

        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 4);
        assert_eq!(parsed.errors[0].text, "garbage here");
        assert_eq!(
            parsed.errors[0].reason,
            SyntaxError::UnknownAction("garbage".into())
        );
    }

    #[test]
    fn test_empty_text() {
        let parsed = parse_policy("  \n\n# nothing\n");
        assert!(parsed.policy.is_empty());
        assert!(parsed.errors.is_empty());
    }
}
