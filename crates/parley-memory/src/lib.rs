//! Negotiation memory for Cell Arbiters and Constraint Agents.
//!
//! This crate contains the state layer of the negotiation -- everything that
//! records offers, weights, collisions, and learned rewards without touching
//! channels or tasks. It sits between `parley-types` (which defines the
//! primitives) and `parley-core` (which runs the message protocols).
//!
//! # Modules
//!
//! - [`offer`] -- One unique bid under negotiation ([`OfferRecord`])
//! - [`arbiter_memory`] -- Per-arbiter offers, weight knowledge, denials ([`ArbiterMemory`])
//! - [`agent_memory`] -- Per-agent rewards, collisions, masks, priorities ([`AgentMemory`])
//! - [`error`] -- Error types for memory operations ([`MemoryError`])

pub mod agent_memory;
pub mod arbiter_memory;
pub mod error;
pub mod offer;

// Re-export primary types at crate root for convenience.
pub use agent_memory::{AgentMemory, FieldMemory};
pub use arbiter_memory::{ArbiterMemory, TieBreak};
pub use error::MemoryError;
pub use offer::{OfferRecord, WeightKnowledge};
