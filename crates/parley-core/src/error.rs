//! Error types for the negotiation units.
//!
//! Every error in this module is fatal for the unit that returns it: the
//! unit's task ends with `Err` and the supervisor holding its `JoinHandle`
//! decides whether to respawn it from its seed. Messages that are merely
//! stale never produce an error.

use parley_memory::MemoryError;
use parley_types::{AgentId, ArenaError, FieldId};

/// Fatal errors of a Cell Arbiter.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// A peer sent a message no in-flight interleaving can explain.
    #[error("arbiter {field}: protocol violation: {detail}")]
    ProtocolViolation {
        /// The arbiter that detected the violation.
        field: FieldId,
        /// What was violated.
        detail: String,
    },

    /// A fourth distinct agent tried to register.
    #[error("arbiter {field}: {source}")]
    CapacityExceeded {
        /// The arbiter whose slot table is full.
        field: FieldId,
        /// The underlying arena error.
        source: ArenaError,
    },

    /// The arbiter memory rejected an operation.
    #[error("arbiter memory error: {source}")]
    Memory {
        /// The underlying memory error.
        #[from]
        source: MemoryError,
    },
}

/// Fatal errors of a Constraint Agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A peer sent a message no in-flight interleaving can explain.
    #[error("agent {agent}: protocol violation: {detail}")]
    ProtocolViolation {
        /// The agent that detected the violation.
        agent: AgentId,
        /// What was violated.
        detail: String,
    },

    /// More arbiters registered than the agent has fields.
    #[error("agent {agent}: {source}")]
    CapacityExceeded {
        /// The agent whose field table is full.
        agent: AgentId,
        /// The underlying arena error.
        source: ArenaError,
    },

    /// The agent memory rejected an operation.
    #[error("agent memory error: {source}")]
    Memory {
        /// The underlying memory error.
        #[from]
        source: MemoryError,
    },
}
