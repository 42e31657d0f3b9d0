//! Board primitives shared by arbiters and agents.
//!
//! A board of side `N` holds digits `1..=N`; the value [`NO_DIGIT`] (zero)
//! marks an empty field, an opt-out bid, or a round that ended without
//! consensus, depending on context.

use serde::{Deserialize, Serialize};

/// A Sudoku digit. Zero means "none".
pub type Digit = u8;

/// A learned reward weight.
pub type Weight = f32;

/// The "no digit" value.
pub const NO_DIGIT: Digit = 0;

/// Number of Constraint Agents negotiating at every Cell Arbiter
/// (row, column, block).
pub const SLOTS_PER_ARBITER: usize = 3;

/// Whether `digit` is a placeable digit on a board of the given side.
pub const fn is_valid_digit(digit: Digit, side: usize) -> bool {
    digit != NO_DIGIT && (digit as usize) <= side
}

/// Zero-based array index of a nonzero digit.
///
/// Returns `None` for [`NO_DIGIT`].
pub const fn digit_index(digit: Digit) -> Option<usize> {
    match digit.checked_sub(1) {
        Some(index) => Some(index as usize),
        None => None,
    }
}

/// Global position of a board field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column, starting at zero.
    pub x: u16,
    /// Row, starting at zero.
    pub y: u16,
}

impl Position {
    /// Create a position from its column and row.
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Mutability state of a field as seen by a Constraint Agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskState {
    /// Mutable; the field takes part in negotiation.
    #[default]
    Free,
    /// Solved in an earlier small round of the current big round.
    /// Undone only by a hard reset.
    Soft,
    /// Puzzle clue. Never mutable.
    Hard,
}

impl MaskState {
    /// Whether the field is fixed (softly or hard).
    pub const fn is_masked(self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Granularity of a round reset issued by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetKind {
    /// Start a new small round: solved fields are temporarily locked.
    Soft,
    /// Start a new big round: temporary locks are released.
    Hard,
}
