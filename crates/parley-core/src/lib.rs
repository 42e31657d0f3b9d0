//! Negotiation protocols of the Parley distributed Sudoku core.
//!
//! A board of side `N = rank²` is solved by two kinds of units talking over
//! mailboxes:
//!
//! - one **Cell Arbiter** per field, deciding the field's digit with the three
//!   agents that cover it ([`arbiter`]);
//! - one **Constraint Agent** per row, column, and block, keeping digits
//!   unique across its `N` fields and learning rewards ([`agent`]).
//!
//! An external orchestrator spawns the units, wires them with registration
//! messages, drives rounds with resets and `StartBidding`, and collects
//! `FieldResolved` events through an [`OrchestratorHandle`].
//!
//! # Round ordering
//!
//! The orchestrator resets every agent and waits for their
//! `RoundResetAck`s before resetting the arbiters, and sends `StartBidding`
//! only once every arbiter has acknowledged. Late bids from the previous
//! round then reach each arbiter before its reset. Units hold each other's
//! handles, so a unit only exits on `Stop` or a fatal error.
//!
//! # Modules
//!
//! - [`arbiter`] -- Cell Arbiter state machine and task ([`CellArbiter`], [`spawn_arbiter`])
//! - [`agent`] -- Constraint Agent protocol and task ([`ConstraintAgent`], [`spawn_agent`])
//! - [`messages`] -- Mailbox message and orchestrator event types
//! - [`handle`] -- Cloneable unit addresses
//! - [`snapshot`] -- Serializable inspection views
//! - [`config`] -- YAML configuration ([`ParleyConfig`])
//! - [`error`] -- Fatal unit errors

pub mod agent;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod handle;
pub mod messages;
pub mod snapshot;

pub use agent::{AgentSeed, ConstraintAgent, spawn_agent};
pub use arbiter::{ArbiterSeed, CellArbiter, spawn_arbiter};
pub use config::{ConfigError, ParleyConfig};
pub use error::{AgentError, ArbiterError};
pub use handle::{AgentHandle, ArbiterHandle, OrchestratorHandle};
pub use messages::{AgentMessage, ArbiterMessage, OrchestratorEvent, UnitId, WeightEntry};
pub use snapshot::{AgentSnapshot, ArbiterPhase, ArbiterSnapshot, FieldSnapshot};
