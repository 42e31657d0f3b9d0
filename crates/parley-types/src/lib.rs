//! Shared type definitions for the Parley negotiation core.
//!
//! This crate is the single source of truth for the primitives used by both
//! the memory layer (`parley-memory`) and the protocol layer (`parley-core`).
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe numeric wrappers for arbiter (field) and agent identifiers
//! - [`board`] -- Digits, weights, positions, mask states, and reset kinds
//! - [`arena`] -- Fixed-capacity slot arena mapping global ids to local indices

pub mod arena;
pub mod board;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use arena::{ArenaError, SlotArena};
pub use board::{
    Digit, MaskState, NO_DIGIT, Position, ResetKind, SLOTS_PER_ARBITER, Weight, digit_index,
    is_valid_digit,
};
pub use ids::{AgentId, FieldId};
