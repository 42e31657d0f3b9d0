//! Per-arbiter negotiation state.
//!
//! An [`ArbiterMemory`] belongs to exactly one Cell Arbiter and tracks the
//! offers of its three slots (row, column, block agents):
//!
//! - the digit each slot currently offers (zero when none is pending),
//! - one [`OfferRecord`] per distinct offered digit, in first-seen order,
//! - per-slot specify flags and pending request counters,
//! - digits denied for the rest of the round,
//! - which slots accepted the chosen best offer.
//!
//! ## Choosing the best offer
//!
//! Once every weight of every unique offer is known, the digit with the
//! strictly greatest weight sum wins. Equal sums are resolved by
//! [`TieBreak`]: the earliest offered digit by default, or the lowest digit.

use serde::Deserialize;

use parley_types::{Digit, NO_DIGIT, SLOTS_PER_ARBITER, Weight, digit_index, is_valid_digit};

use crate::error::MemoryError;
use crate::offer::OfferRecord;

/// How an arbiter resolves equal weight sums between unique offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The digit offered first wins.
    #[default]
    FirstSeen,
    /// The lowest digit wins.
    LowestDigit,
}

/// State owned by one Cell Arbiter.
#[derive(Debug, Clone)]
pub struct ArbiterMemory {
    side: usize,
    offers: [Digit; SLOTS_PER_ARBITER],
    unique: Vec<OfferRecord>,
    specify_flags: [bool; SLOTS_PER_ARBITER],
    pending_requests: [u32; SLOTS_PER_ARBITER],
    denied: Vec<bool>,
    accepted_by: [bool; SLOTS_PER_ARBITER],
    best_offer: Digit,
}

impl ArbiterMemory {
    /// Create an empty memory for a board of the given side.
    pub fn new(side: usize) -> Self {
        Self {
            side,
            offers: [NO_DIGIT; SLOTS_PER_ARBITER],
            unique: Vec::with_capacity(SLOTS_PER_ARBITER),
            specify_flags: [false; SLOTS_PER_ARBITER],
            pending_requests: [0; SLOTS_PER_ARBITER],
            denied: vec![false; side],
            accepted_by: [false; SLOTS_PER_ARBITER],
            best_offer: NO_DIGIT,
        }
    }

    /// Board side length this memory was sized for.
    pub const fn side(&self) -> usize {
        self.side
    }

    // -----------------------------------------------------------------------
    // Offers
    // -----------------------------------------------------------------------

    /// Digit currently offered by a slot (zero when none is pending).
    pub fn offer(&self, slot: usize) -> Digit {
        self.offers.get(slot).copied().unwrap_or(NO_DIGIT)
    }

    /// Digits currently offered by all three slots.
    pub const fn offers(&self) -> [Digit; SLOTS_PER_ARBITER] {
        self.offers
    }

    /// Number of slots with a pending offer.
    pub fn offer_count(&self) -> usize {
        self.offers.iter().filter(|&&d| d != NO_DIGIT).count()
    }

    /// Whether every slot has a pending offer.
    pub fn all_offered(&self) -> bool {
        self.offer_count() == SLOTS_PER_ARBITER
    }

    /// Unique offers in first-seen order.
    pub fn unique_offers(&self) -> &[OfferRecord] {
        &self.unique
    }

    /// Whether `digit` is currently one of the unique offers.
    pub fn is_offered(&self, digit: Digit) -> bool {
        self.unique.iter().any(|r| r.digit() == digit)
    }

    /// Record a bid from a slot.
    ///
    /// The bid's weight becomes the slot's known weight for that digit. A
    /// digit not yet under negotiation creates a new unique offer and clears
    /// the specify flags of the two other slots. Returns `true` when a new
    /// unique offer was created.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::SlotOutOfRange`], [`MemoryError::DigitOutOfRange`]
    /// or [`MemoryError::SlotBusy`] if the slot still has a pending offer.
    pub fn record_offer(
        &mut self,
        slot: usize,
        digit: Digit,
        weight: Weight,
    ) -> Result<bool, MemoryError> {
        if !is_valid_digit(digit, self.side) {
            return Err(MemoryError::DigitOutOfRange {
                digit,
                side: self.side,
            });
        }
        let current = self
            .offers
            .get_mut(slot)
            .ok_or(MemoryError::SlotOutOfRange { slot })?;
        if *current != NO_DIGIT {
            return Err(MemoryError::SlotBusy {
                slot,
                pending: *current,
                offered: digit,
            });
        }
        *current = digit;

        let is_new = !self.is_offered(digit);
        if is_new {
            self.unique.push(OfferRecord::new(digit));
            for (other, flag) in self.specify_flags.iter_mut().enumerate() {
                if other != slot {
                    *flag = false;
                }
            }
        }
        if let Some(record) = self.unique.iter_mut().find(|r| r.digit() == digit) {
            record.set_known(slot, weight);
        }
        Ok(is_new)
    }

    // -----------------------------------------------------------------------
    // Weight knowledge
    // -----------------------------------------------------------------------

    /// Unique digits whose weight for `slot` was neither reported nor requested.
    pub fn unknown_digits(&self, slot: usize) -> Vec<Digit> {
        self.unique
            .iter()
            .filter(|r| r.is_unknown(slot))
            .map(OfferRecord::digit)
            .collect()
    }

    /// Mark `digits` as requested from `slot` and count one outstanding request.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::SlotOutOfRange`] for an invalid slot.
    pub fn mark_requested(&mut self, slot: usize, digits: &[Digit]) -> Result<(), MemoryError> {
        let pending = self
            .pending_requests
            .get_mut(slot)
            .ok_or(MemoryError::SlotOutOfRange { slot })?;
        *pending = pending.saturating_add(1);
        for record in &mut self.unique {
            if digits.contains(&record.digit()) {
                record.mark_requested(slot);
            }
        }
        Ok(())
    }

    /// Close one outstanding request to `slot`.
    ///
    /// Returns `false` when no request was outstanding, meaning the reply is
    /// stale.
    pub fn complete_request(&mut self, slot: usize) -> bool {
        match self.pending_requests.get_mut(slot) {
            Some(pending) if *pending > 0 => {
                *pending = pending.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Number of outstanding requests to a slot.
    pub fn pending_requests(&self, slot: usize) -> u32 {
        self.pending_requests.get(slot).copied().unwrap_or(0)
    }

    /// Whether any slot has an outstanding request.
    pub fn requests_outstanding(&self) -> bool {
        self.pending_requests.iter().any(|&p| p > 0)
    }

    /// Record a slot's reported weight for a digit.
    ///
    /// Returns `false` when the digit is no longer under negotiation.
    pub fn record_weight(&mut self, slot: usize, digit: Digit, weight: Weight) -> bool {
        self.unique
            .iter_mut()
            .find(|r| r.digit() == digit)
            .is_some_and(|record| record.set_known(slot, weight))
    }

    /// Whether the arbiter has, or has requested, everything it needs from a slot.
    pub fn specify_flag(&self, slot: usize) -> bool {
        self.specify_flags.get(slot).copied().unwrap_or(false)
    }

    /// Set a slot's specify flag.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::SlotOutOfRange`] for an invalid slot.
    pub fn set_specify_flag(&mut self, slot: usize, value: bool) -> Result<(), MemoryError> {
        let flag = self
            .specify_flags
            .get_mut(slot)
            .ok_or(MemoryError::SlotOutOfRange { slot })?;
        *flag = value;
        Ok(())
    }

    /// Whether every slot's specify flag is set.
    pub fn all_specified(&self) -> bool {
        self.specify_flags.iter().all(|&f| f)
    }

    /// Whether every weight of every unique offer is known.
    pub fn all_weights_known(&self) -> bool {
        self.unique.iter().all(OfferRecord::is_fully_known)
    }

    // -----------------------------------------------------------------------
    // Denial and withdrawal
    // -----------------------------------------------------------------------

    /// Whether a digit is forbidden at this position for the rest of the round.
    pub fn is_denied(&self, digit: Digit) -> bool {
        digit_index(digit)
            .and_then(|i| self.denied.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// All denied digits in ascending order.
    pub fn denied_digits(&self) -> Vec<Digit> {
        (1..=self.side)
            .filter_map(|d| Digit::try_from(d).ok())
            .filter(|&d| self.is_denied(d))
            .collect()
    }

    /// Withdraw a digit from the negotiation.
    ///
    /// Denies the digit, drops its unique offer, clears every slot offer equal
    /// to it, and resets acceptances and the best offer. Returns the slots that
    /// had offered the digit; they must be told their offer was rejected.
    pub fn withdraw(&mut self, digit: Digit) -> Vec<usize> {
        if let Some(flag) = digit_index(digit).and_then(|i| self.denied.get_mut(i)) {
            *flag = true;
        }
        self.unique.retain(|r| r.digit() != digit);

        let mut offered_by = Vec::new();
        for (slot, offer) in self.offers.iter_mut().enumerate() {
            if *offer == digit && digit != NO_DIGIT {
                *offer = NO_DIGIT;
                offered_by.push(slot);
            }
        }

        self.clear_acceptances();
        offered_by
    }

    // -----------------------------------------------------------------------
    // Decision and acceptance
    // -----------------------------------------------------------------------

    /// Choose the best offer once every weight is known.
    ///
    /// Stores and returns the winning digit, or `None` if some weight is
    /// still missing or nothing is offered.
    pub fn choose_best(&mut self, tie_break: TieBreak) -> Option<Digit> {
        if self.unique.is_empty() || !self.all_weights_known() {
            return None;
        }

        let mut best: Option<(Digit, Weight)> = None;
        for record in &self.unique {
            let Some(sum) = record.weight_sum() else {
                continue;
            };
            let replace = match best {
                None => true,
                Some((best_digit, best_sum)) => match sum.total_cmp(&best_sum) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Equal => {
                        tie_break == TieBreak::LowestDigit && record.digit() < best_digit
                    }
                    std::cmp::Ordering::Less => false,
                },
            };
            if replace {
                best = Some((record.digit(), sum));
            }
        }

        let (digit, _) = best?;
        self.best_offer = digit;
        self.accepted_by = [false; SLOTS_PER_ARBITER];
        Some(digit)
    }

    /// The chosen best offer, zero until one is chosen.
    pub const fn best_offer(&self) -> Digit {
        self.best_offer
    }

    /// Set the best offer directly. Used when finalizing with no consensus.
    pub const fn set_best_offer(&mut self, digit: Digit) {
        self.best_offer = digit;
    }

    /// Count a slot's acceptance of `digit`.
    ///
    /// Returns `false` (and counts nothing) when `digit` is not the current
    /// best offer. A repeated acceptance from the same slot counts once.
    pub fn accept(&mut self, slot: usize, digit: Digit) -> bool {
        if self.best_offer == NO_DIGIT || digit != self.best_offer {
            return false;
        }
        match self.accepted_by.get_mut(slot) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Number of slots that accepted the current best offer.
    pub fn acceptance_count(&self) -> usize {
        self.accepted_by.iter().filter(|&&a| a).count()
    }

    /// Whether all three slots accepted the current best offer.
    pub fn all_accepted(&self) -> bool {
        self.best_offer != NO_DIGIT && self.acceptance_count() == SLOTS_PER_ARBITER
    }

    const fn clear_acceptances(&mut self) {
        self.accepted_by = [false; SLOTS_PER_ARBITER];
        self.best_offer = NO_DIGIT;
    }

    /// Clear all round state.
    pub fn reset(&mut self) {
        self.offers = [NO_DIGIT; SLOTS_PER_ARBITER];
        self.unique.clear();
        self.specify_flags = [false; SLOTS_PER_ARBITER];
        self.pending_requests = [0; SLOTS_PER_ARBITER];
        self.denied.iter_mut().for_each(|d| *d = false);
        self.clear_acceptances();
    }
}
