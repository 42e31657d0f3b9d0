//! Mailbox message types.
//!
//! Negotiation messages carry the sender's handle as `reply_to`; the handle's
//! id is how the receiver identifies which slot (arbiter side) or field
//! (agent side) the message belongs to.

use tokio::sync::oneshot;

use parley_types::{AgentId, Digit, FieldId, Position, ResetKind, Weight};

use crate::handle::{AgentHandle, ArbiterHandle};
use crate::snapshot::{AgentSnapshot, ArbiterSnapshot};

/// One `(digit, weight, collides)` triple of a weight report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightEntry {
    /// The digit asked about.
    pub digit: Digit,
    /// The agent's learned reward for the digit at this field.
    pub weight: Weight,
    /// Whether the digit is collision-flagged at this field.
    pub collides: bool,
}

/// Messages accepted by a Cell Arbiter.
#[derive(Debug)]
pub enum ArbiterMessage {
    /// Register an agent into the next free slot.
    RegisterAgent {
        /// The agent to register.
        agent: AgentHandle,
    },
    /// Clear all round state.
    ResetRound,
    /// An agent offers a digit (0 = opt out).
    Bid {
        /// The offered digit.
        digit: Digit,
        /// The agent's weight for it.
        weight: Weight,
        /// The bidding agent.
        reply_to: AgentHandle,
    },
    /// Answer to an information request.
    WeightReport {
        /// One entry per requested digit.
        entries: Vec<WeightEntry>,
        /// The reporting agent.
        reply_to: AgentHandle,
    },
    /// An agent refuses the provisional winner.
    Withdraw {
        /// The refused digit.
        digit: Digit,
        /// The refusing agent.
        reply_to: AgentHandle,
    },
    /// An agent accepts the provisional winner.
    Accept {
        /// The accepted digit.
        digit: Digit,
        /// The accepting agent.
        reply_to: AgentHandle,
    },
    /// Return a snapshot of the arbiter's state.
    Inspect {
        /// Where to send the snapshot.
        reply_to: oneshot::Sender<ArbiterSnapshot>,
    },
    /// End the arbiter's task.
    Stop,
}

/// Messages accepted by a Constraint Agent.
#[derive(Debug)]
pub enum AgentMessage {
    /// Register an arbiter as the next local field.
    RegisterArbiter {
        /// The arbiter to register.
        arbiter: ArbiterHandle,
        /// Initial digit of the field (0 = empty).
        digit: Digit,
        /// Whether the field is a puzzle clue.
        hard_mask: bool,
    },
    /// Start a new small (`Soft`) or big (`Hard`) round.
    ResetRound {
        /// Reset granularity.
        kind: ResetKind,
    },
    /// Issue the initial bids of a round.
    StartBidding,
    /// Reinforce the digits currently placed on free fields.
    GrantReward {
        /// Reward delta, possibly negative.
        amount: Weight,
    },
    /// An arbiter asks for weights of several digits.
    InfoRequest {
        /// The digits asked about.
        digits: Vec<Digit>,
        /// The asking arbiter.
        reply_to: ArbiterHandle,
    },
    /// The agent's pending offer was withdrawn.
    Rejected {
        /// The rejected digit.
        digit: Digit,
        /// The rejecting arbiter.
        reply_to: ArbiterHandle,
    },
    /// An arbiter announces its provisional winner.
    ProvisionalWinner {
        /// The winning digit.
        digit: Digit,
        /// The announcing arbiter.
        reply_to: ArbiterHandle,
    },
    /// An arbiter resolved its field for this round.
    Finalized {
        /// The final digit (0 = no consensus).
        digit: Digit,
        /// The resolving arbiter.
        reply_to: ArbiterHandle,
    },
    /// Return a snapshot of the agent's state.
    Inspect {
        /// Where to send the snapshot.
        reply_to: oneshot::Sender<AgentSnapshot>,
    },
    /// End the agent's task.
    Stop,
}

/// Identifies a unit in orchestrator events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitId {
    /// A Cell Arbiter.
    Arbiter(FieldId),
    /// A Constraint Agent.
    Agent(AgentId),
}

impl core::fmt::Display for UnitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Arbiter(field) => write!(f, "arbiter {field}"),
            Self::Agent(agent) => write!(f, "agent {agent}"),
        }
    }
}

/// Events reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// Outcome of a registration request.
    PeerRegistered {
        /// The unit that was asked to register a peer.
        unit: UnitId,
        /// The peer it was asked to register.
        peer: UnitId,
        /// Whether the peer got a slot.
        accepted: bool,
    },
    /// An arbiter resolved its field for this round.
    FieldResolved {
        /// The resolved field.
        field: FieldId,
        /// Its board position.
        position: Position,
        /// The final digit (0 = no consensus).
        digit: Digit,
    },
    /// A unit finished a round reset.
    RoundResetAck {
        /// The unit that reset.
        unit: UnitId,
    },
    /// An agent applied a reward.
    RewardAck {
        /// The rewarded agent.
        agent: AgentId,
    },
}
