//! Identifiers for topology and scenario entities
//!
//! Ids are opaque strings authored by the topology editor. Each entity kind
//! gets its own newtype so a link id can never be passed where a node id is
//! expected.

use std::borrow::Borrow;

use derive_more::Display;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[display("{_0}")]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an id from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the id as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Unique identifier of a node in a topology
    NodeId
}

string_id! {
    /// Unique identifier of a link in a topology
    LinkId
}

string_id! {
    /// Unique identifier of a traffic flow within a scenario
    FlowId
}
