//! Error types for the parley-memory crate.
//!
//! Memory operations validate every index and digit they are given and
//! return typed errors rather than panicking. The protocol layer wraps these
//! into its own fatal error variants.

use parley_types::{Digit, MaskState};

/// Errors that can occur during arbiter or agent memory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// A field index outside `0..side` was used.
    #[error("field index {index} out of range for board side {side}")]
    FieldOutOfRange {
        /// The offending field index.
        index: usize,
        /// The board side length.
        side: usize,
    },

    /// An arbiter slot outside `0..3` was used.
    #[error("arbiter slot {slot} out of range")]
    SlotOutOfRange {
        /// The offending slot.
        slot: usize,
    },

    /// A digit outside `1..=side` was used where a placeable digit is required.
    #[error("digit {digit} out of range for board side {side}")]
    DigitOutOfRange {
        /// The offending digit.
        digit: Digit,
        /// The board side length.
        side: usize,
    },

    /// A masked field was about to be modified.
    #[error("field {index} is masked ({mask:?}) and cannot be modified")]
    FieldMasked {
        /// The field index.
        index: usize,
        /// The field's mask state.
        mask: MaskState,
    },

    /// A slot submitted a second offer while its first is still pending.
    #[error("slot {slot} already offers digit {pending}, cannot offer {offered}")]
    SlotBusy {
        /// The slot that offered twice.
        slot: usize,
        /// The digit still pending for that slot.
        pending: Digit,
        /// The digit it tried to offer.
        offered: Digit,
    },
}
