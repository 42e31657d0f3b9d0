//! Read-only views of unit state returned by `Inspect` requests.

use serde::Serialize;

use parley_types::{AgentId, Digit, FieldId, MaskState, Position, SLOTS_PER_ARBITER};

/// Where a Cell Arbiter stands in the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterPhase {
    /// Reset, no offer received yet.
    #[default]
    Idle,
    /// Fewer than three slots hold an offer.
    Collecting,
    /// All slots offered; waiting for weight reports.
    AwaitingInfo,
    /// A provisional winner was announced; waiting for acceptances.
    Decided,
    /// The field is resolved for this round.
    Finalized,
}

/// Snapshot of a Cell Arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbiterSnapshot {
    /// The arbiter's field.
    pub field: FieldId,
    /// The field's board position.
    pub position: Position,
    /// Current phase.
    pub phase: ArbiterPhase,
    /// Registered agents in slot order.
    pub agents: Vec<AgentId>,
    /// Pending offer per slot (0 = none).
    pub offers: [Digit; SLOTS_PER_ARBITER],
    /// Distinct digits under negotiation, in first-seen order.
    pub unique_offers: Vec<Digit>,
    /// Digits withdrawn this round.
    pub denied: Vec<Digit>,
    /// Provisional winner or final result (0 = none).
    pub best_offer: Digit,
    /// Slots that accepted the provisional winner.
    pub acceptance_count: usize,
}

/// Snapshot of one field as an agent sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSnapshot {
    /// The field's arbiter, if registered.
    pub field: Option<FieldId>,
    /// Current bid or final digit (0 = none).
    pub digit: Digit,
    /// Provisionally accepted digit (0 = none).
    pub accepted: Digit,
    /// Mutability state.
    pub mask: MaskState,
    /// Whether the field is done for this round.
    pub finished: bool,
}

/// Snapshot of a Constraint Agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSnapshot {
    /// The agent.
    pub agent: AgentId,
    /// One entry per local field index.
    pub fields: Vec<FieldSnapshot>,
}

impl AgentSnapshot {
    /// Nonzero digits of finished fields, in field order.
    pub fn resolved_digits(&self) -> Vec<Digit> {
        self.fields
            .iter()
            .filter(|f| f.finished && f.digit != 0)
            .map(|f| f.digit)
            .collect()
    }
}
