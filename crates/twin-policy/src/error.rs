//! Error types for policy parsing

use thiserror::Error;

/// Why a policy line could not be turned into a rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("Unknown action `{0}`, expected allow or deny")]
    UnknownAction(String),

    #[error("Expected `{expected}`, found `{found}`")]
    Expected { expected: &'static str, found: String },

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid port `{0}`")]
    InvalidPort(String),

    #[error("Unexpected trailing input `{0}`")]
    TrailingInput(String),
}

/// A policy line that was skipped during parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {line}: {reason} in `{text}`")]
pub struct PolicyParseError {
    /// 1-based line number within the policy text
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
    pub reason: SyntaxError,
}
