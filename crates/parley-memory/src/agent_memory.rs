//! Per-agent negotiation memory: rewards, collisions, masks, priorities.
//!
//! An [`AgentMemory`] belongs to one Constraint Agent (a row, column, or
//! block) and holds one [`FieldMemory`] per board position the agent covers,
//! indexed locally `0..side` in registration order.
//!
//! ## Rewards
//!
//! `rewards[digit]` is the learned weight of placing `digit` on a field. It
//! survives every reset and changes only through [`AgentMemory::grant_reward`],
//! applied by the orchestrator once per big round.
//!
//! ## Uniqueness
//!
//! A digit is accepted on, or finished on, at most one field of the agent at
//! a time. [`AgentMemory::holds_elsewhere`] is the check the protocol runs
//! before accepting a provisional winner, and [`AgentMemory::finish`] flags a
//! finalized digit as colliding on every other field.
//!
//! ## Resets
//!
//! A soft reset starts a new small round: fields finished with a digit are
//! promoted from `Free` to `Soft` and keep their value. A hard reset starts a
//! new big round: `Soft` fields are demoted back to `Free` and cleared. In both
//! cases masked fields stay pre-finished with every collision set, and their
//! digits are flagged as colliding on every field.

use tracing::debug;

use parley_types::{Digit, MaskState, NO_DIGIT, Weight, digit_index, is_valid_digit};

use crate::error::MemoryError;

/// Memory of a single field as seen by its agent.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMemory {
    rewards: Vec<Weight>,
    collisions: Vec<bool>,
    digit: Digit,
    mask: MaskState,
    accepted: Digit,
    finished: bool,
    digit_priority: Vec<Digit>,
}

impl FieldMemory {
    fn new(side: usize, initial_reward: Weight) -> Self {
        Self {
            rewards: vec![initial_reward; side],
            collisions: vec![false; side],
            digit: NO_DIGIT,
            mask: MaskState::Free,
            accepted: NO_DIGIT,
            finished: false,
            digit_priority: (1..=side).filter_map(|d| Digit::try_from(d).ok()).collect(),
        }
    }

    /// Current digit (the pending bid while negotiating, the result once finished).
    pub const fn digit(&self) -> Digit {
        self.digit
    }

    /// Mask state.
    pub const fn mask(&self) -> MaskState {
        self.mask
    }

    /// Provisionally accepted digit, zero when none.
    pub const fn accepted(&self) -> Digit {
        self.accepted
    }

    /// Whether this field's negotiation concluded for the round.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Learned reward for a digit, zero for an invalid digit.
    pub fn reward(&self, digit: Digit) -> Weight {
        digit_index(digit)
            .and_then(|i| self.rewards.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether a digit is currently known to conflict on this field.
    pub fn is_colliding(&self, digit: Digit) -> bool {
        digit_index(digit)
            .and_then(|i| self.collisions.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Digits ordered by descending reward, as of the last prioritization.
    pub fn digit_priority(&self) -> &[Digit] {
        &self.digit_priority
    }

    fn set_collision(&mut self, digit: Digit) {
        if let Some(flag) = digit_index(digit).and_then(|i| self.collisions.get_mut(i)) {
            *flag = true;
        }
    }

    fn reward_sum(&self) -> Weight {
        self.rewards.iter().sum()
    }

    /// Whether this field holds `digit` accepted or finished.
    fn holds(&self, digit: Digit) -> bool {
        digit != NO_DIGIT && (self.accepted == digit || (self.finished && self.digit == digit))
    }
}

/// State owned by one Constraint Agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMemory {
    side: usize,
    fields: Vec<FieldMemory>,
    field_priority: Vec<usize>,
}

impl AgentMemory {
    /// Create a memory for `side` fields with every reward set to `initial_reward`.
    pub fn new(side: usize, initial_reward: Weight) -> Self {
        Self {
            side,
            fields: (0..side)
                .map(|_| FieldMemory::new(side, initial_reward))
                .collect(),
            field_priority: (0..side).collect(),
        }
    }

    /// Board side length (number of fields and of digits).
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Read access to one field.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] for an invalid index.
    pub fn field(&self, index: usize) -> Result<&FieldMemory, MemoryError> {
        self.fields.get(index).ok_or(MemoryError::FieldOutOfRange {
            index,
            side: self.side,
        })
    }

    fn field_mut(&mut self, index: usize) -> Result<&mut FieldMemory, MemoryError> {
        let side = self.side;
        self.fields
            .get_mut(index)
            .ok_or(MemoryError::FieldOutOfRange { index, side })
    }

    /// Iterate over all fields in index order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldMemory> {
        self.fields.iter()
    }

    const fn check_digit(&self, digit: Digit) -> Result<(), MemoryError> {
        if is_valid_digit(digit, self.side) {
            Ok(())
        } else {
            Err(MemoryError::DigitOutOfRange {
                digit,
                side: self.side,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Seed a field's digit and mask at registration time.
    ///
    /// A clue (`hard = true`) becomes [`MaskState::Hard`]; anything else is
    /// [`MaskState::Free`]. Takes effect for negotiation after the next reset.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`], or
    /// [`MemoryError::DigitOutOfRange`] for a nonzero digit above the side.
    pub fn set_field(&mut self, index: usize, digit: Digit, hard: bool) -> Result<(), MemoryError> {
        if digit != NO_DIGIT {
            self.check_digit(digit)?;
        }
        let field = self.field_mut(index)?;
        field.digit = digit;
        field.mask = if hard { MaskState::Hard } else { MaskState::Free };
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Negotiation bookkeeping
    // -----------------------------------------------------------------------

    /// Store the digit a free field is currently bidding (zero for an opt-out).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldMasked`] if the field is not free.
    pub fn set_bid(&mut self, index: usize, digit: Digit) -> Result<(), MemoryError> {
        if digit != NO_DIGIT {
            self.check_digit(digit)?;
        }
        let field = self.field_mut(index)?;
        if field.mask.is_masked() {
            return Err(MemoryError::FieldMasked {
                index,
                mask: field.mask,
            });
        }
        field.digit = digit;
        Ok(())
    }

    /// Flag a digit as colliding on one field.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] or [`MemoryError::DigitOutOfRange`].
    pub fn set_collision(&mut self, index: usize, digit: Digit) -> Result<(), MemoryError> {
        self.check_digit(digit)?;
        self.field_mut(index)?.set_collision(digit);
        Ok(())
    }

    /// Flag a digit as colliding on every field.
    pub fn set_digit_colliding(&mut self, digit: Digit) {
        for field in &mut self.fields {
            field.set_collision(digit);
        }
    }

    /// Whether a field other than `index` holds `digit` accepted or finished.
    pub fn holds_elsewhere(&self, index: usize, digit: Digit) -> bool {
        self.fields
            .iter()
            .enumerate()
            .any(|(i, field)| i != index && field.holds(digit))
    }

    /// Provisionally accept a digit on a field.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] or [`MemoryError::DigitOutOfRange`].
    pub fn accept(&mut self, index: usize, digit: Digit) -> Result<(), MemoryError> {
        self.check_digit(digit)?;
        self.field_mut(index)?.accepted = digit;
        Ok(())
    }

    /// Drop a field's provisional acceptance.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] for an invalid index.
    pub fn clear_acceptance(&mut self, index: usize) -> Result<(), MemoryError> {
        self.field_mut(index)?.accepted = NO_DIGIT;
        Ok(())
    }

    /// Conclude a field's negotiation with `digit` (zero for no consensus).
    ///
    /// A nonzero digit is flagged as colliding on every other field.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] or [`MemoryError::DigitOutOfRange`].
    pub fn finish(&mut self, index: usize, digit: Digit) -> Result<(), MemoryError> {
        if digit != NO_DIGIT {
            self.check_digit(digit)?;
        }
        let field = self.field_mut(index)?;
        field.digit = digit;
        field.accepted = NO_DIGIT;
        field.finished = true;
        if digit != NO_DIGIT {
            for (i, other) in self.fields.iter_mut().enumerate() {
                if i != index {
                    other.set_collision(digit);
                }
            }
        }
        Ok(())
    }

    /// Best bid for a field: the highest-priority digit not flagged as
    /// colliding, with its reward as weight. `(0, 0.0)` when every digit
    /// collides.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::FieldOutOfRange`] for an invalid index.
    pub fn best_bid(&self, index: usize) -> Result<(Digit, Weight), MemoryError> {
        let field = self.field(index)?;
        Ok(field
            .digit_priority
            .iter()
            .find(|&&d| !field.is_colliding(d))
            .map_or((NO_DIGIT, 0.0), |&d| (d, field.reward(d))))
    }

    // -----------------------------------------------------------------------
    // Priorities
    // -----------------------------------------------------------------------

    /// Recompute digit priorities per field and the field priority order.
    ///
    /// Digits are ordered by descending reward and fields by ascending reward
    /// sum, so the least successful fields bid first. Both sorts are stable:
    /// equal rewards keep ascending digit and field order.
    pub fn prioritize(&mut self) {
        for field in &mut self.fields {
            let mut ranked: Vec<(Digit, Weight)> = (1..=self.side)
                .filter_map(|d| Digit::try_from(d).ok())
                .map(|d| (d, field.reward(d)))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            field.digit_priority = ranked.into_iter().map(|(d, _)| d).collect();
        }

        let mut sums: Vec<(usize, Weight)> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| (i, field.reward_sum()))
            .collect();
        sums.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.field_priority = sums.into_iter().map(|(i, _)| i).collect();
    }

    /// Field indices in bidding order, as of the last prioritization.
    pub fn field_priority(&self) -> &[usize] {
        &self.field_priority
    }

    // -----------------------------------------------------------------------
    // Learning
    // -----------------------------------------------------------------------

    /// Add `amount` to the reward of every free field's current nonzero digit.
    pub fn grant_reward(&mut self, amount: Weight) {
        for field in &mut self.fields {
            if field.mask != MaskState::Free {
                continue;
            }
            let digit = field.digit;
            if let Some(reward) = digit_index(digit).and_then(|i| field.rewards.get_mut(i)) {
                *reward += amount;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resets
    // -----------------------------------------------------------------------

    /// Reset before a new small round, locking digits found in this one.
    pub fn soft_reset(&mut self) {
        let mut promoted: usize = 0;
        for field in &mut self.fields {
            if field.finished && field.digit != NO_DIGIT && field.mask == MaskState::Free {
                field.mask = MaskState::Soft;
                promoted = promoted.saturating_add(1);
            }
        }
        let masked = self.clear_round();
        debug!(promoted, masked, "Agent memory soft reset");
    }

    /// Reset before a new big round, releasing soft locks. Rewards are kept.
    pub fn hard_reset(&mut self) {
        let mut demoted: usize = 0;
        for field in &mut self.fields {
            if field.mask == MaskState::Soft {
                field.mask = MaskState::Free;
                demoted = demoted.saturating_add(1);
            }
        }
        let masked = self.clear_round();
        debug!(demoted, masked, "Agent memory hard reset");
    }

    /// Clear round-scoped state. Masked fields keep their digit and are
    /// pre-finished; their digits collide everywhere. Returns how many fields
    /// are masked.
    fn clear_round(&mut self) -> usize {
        let mut fixed_digits = Vec::new();
        for field in &mut self.fields {
            let masked = field.mask.is_masked();
            field.collisions.iter_mut().for_each(|c| *c = masked);
            if masked && field.digit != NO_DIGIT {
                fixed_digits.push(field.digit);
            } else if !masked {
                field.digit = NO_DIGIT;
            }
            field.accepted = NO_DIGIT;
            field.finished = masked;
        }
        let masked_count = self.fields.iter().filter(|f| f.mask.is_masked()).count();
        for digit in fixed_digits {
            self.set_digit_colliding(digit);
        }
        masked_count
    }
}
