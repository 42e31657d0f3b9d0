//! A unique bid under negotiation at a Cell Arbiter.
//!
//! Several slots may offer the same digit; the arbiter keeps one
//! [`OfferRecord`] per distinct digit and tracks, per slot, whether the
//! slot's weight for that digit is unknown, requested, or known.

use parley_types::{Digit, SLOTS_PER_ARBITER, Weight};

/// What an arbiter knows about one slot's weight for one digit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum WeightKnowledge {
    /// Nothing known and nothing asked yet.
    #[default]
    Unknown,
    /// An information request covering this digit is in flight.
    Requested,
    /// The slot reported (or bid with) this weight.
    Known(Weight),
}

/// One distinct digit currently offered at an arbiter.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferRecord {
    digit: Digit,
    weights: [WeightKnowledge; SLOTS_PER_ARBITER],
}

impl OfferRecord {
    /// Create a record for a newly offered digit with nothing known.
    pub fn new(digit: Digit) -> Self {
        Self {
            digit,
            weights: [WeightKnowledge::Unknown; SLOTS_PER_ARBITER],
        }
    }

    /// The offered digit.
    pub const fn digit(&self) -> Digit {
        self.digit
    }

    /// Weight knowledge for a slot, `None` for an out-of-range slot.
    pub fn knowledge(&self, slot: usize) -> Option<WeightKnowledge> {
        self.weights.get(slot).copied()
    }

    /// Whether the slot's weight has been neither requested nor reported.
    pub fn is_unknown(&self, slot: usize) -> bool {
        matches!(self.knowledge(slot), Some(WeightKnowledge::Unknown))
    }

    /// Record a slot's weight. Returns `false` for an out-of-range slot.
    pub fn set_known(&mut self, slot: usize, weight: Weight) -> bool {
        match self.weights.get_mut(slot) {
            Some(entry) => {
                *entry = WeightKnowledge::Known(weight);
                true
            }
            None => false,
        }
    }

    /// Mark a slot's weight as requested if it is still unknown.
    ///
    /// Returns `true` if the state changed.
    pub fn mark_requested(&mut self, slot: usize) -> bool {
        match self.weights.get_mut(slot) {
            Some(entry) if *entry == WeightKnowledge::Unknown => {
                *entry = WeightKnowledge::Requested;
                true
            }
            _ => false,
        }
    }

    /// Whether every slot's weight is known.
    pub fn is_fully_known(&self) -> bool {
        self.weights
            .iter()
            .all(|w| matches!(w, WeightKnowledge::Known(_)))
    }

    /// Sum of the three slot weights, available once all are known.
    pub fn weight_sum(&self) -> Option<Weight> {
        self.weights.iter().try_fold(0.0, |acc, w| match w {
            WeightKnowledge::Known(weight) => Some(acc + weight),
            WeightKnowledge::Unknown | WeightKnowledge::Requested => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_knows_nothing() {
        let record = OfferRecord::new(4);
        assert_eq!(record.digit(), 4);
        assert!(record.is_unknown(0));
        assert!(record.is_unknown(2));
        assert!(!record.is_fully_known());
        assert_eq!(record.weight_sum(), None);
    }

    #[test]
    fn weight_sum_requires_all_slots() {
        let mut record = OfferRecord::new(2);
        assert!(record.set_known(0, 5.0));
        assert!(record.set_known(1, 2.0));
        assert_eq!(record.weight_sum(), None);
        assert!(record.mark_requested(2));
        assert_eq!(record.knowledge(2), Some(WeightKnowledge::Requested));
        assert_eq!(record.weight_sum(), None);
        assert!(record.set_known(2, 2.0));
        assert!(record.is_fully_known());
        assert_eq!(record.weight_sum(), Some(9.0));
    }

    #[test]
    fn mark_requested_only_moves_unknown() {
        let mut record = OfferRecord::new(1);
        assert!(record.set_known(0, 1.0));
        assert!(!record.mark_requested(0));
        assert_eq!(record.knowledge(0), Some(WeightKnowledge::Known(1.0)));
        assert!(record.mark_requested(1));
        assert!(!record.mark_requested(1));
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let mut record = OfferRecord::new(1);
        assert!(!record.set_known(3, 1.0));
        assert!(!record.mark_requested(3));
        assert_eq!(record.knowledge(3), None);
        assert!(!record.is_unknown(3));
    }
}
