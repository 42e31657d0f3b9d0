//! Type-safe identifier wrappers around `u32`.
//!
//! Every unit in the negotiation has a strongly-typed global id to prevent
//! accidental mixing of arbiter and agent identifiers at compile time. The
//! orchestrator assigns ids; by convention a field id is `y * side + x` and
//! agent ids enumerate columns, then rows, then blocks.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an identifier from its raw value.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Return the inner `u32` value.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Global identifier of a board position, shared by the Cell Arbiter that
    /// governs it.
    FieldId
}

define_id! {
    /// Global identifier of a Constraint Agent (a row, column, or block).
    AgentId
}
