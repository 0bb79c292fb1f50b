//! # Twin Policy
//!
//! Firewall policy language for the network digital twin.
//!
//! A policy is plain text, one rule per line:
//!
//! ```text
//! # web tier
//! allow tcp from Users to WebApp port 443
//! allow dns from Any to resolver
//! deny any from Any to Any
//! ```
//!
//! Rules are evaluated in order and the first match decides. When nothing
//! matches the traffic is denied. Lines that fail to parse are skipped and
//! reported as [`PolicyParseError`]s rather than aborting the whole policy.
//!
//! ## Modules
//!
//! - [`rule`]: Rule types (action, protocol, endpoints, ports)
//! - [`parser`]: Line-oriented parser with per-line error reporting
//! - [`evaluator`]: First-match evaluation against a flow
//! - [`validator`]: Reference checks against a topology
//! - [`error`]: Parse error types

pub mod error;
pub mod evaluator;
pub mod parser;
pub mod rule;
pub mod validator;

pub use error::*;
pub use evaluator::*;
pub use parser::*;
pub use rule::*;
pub use validator::*;
