//! Constraint Agent: one row, column, or block of the board.
//!
//! An agent governs `side` fields and must place every digit at most once
//! among them. It bids on each open field, answers weight requests from the
//! field arbiters, refuses provisional winners it already holds elsewhere,
//! and learns rewards between big rounds.
//!
//! [`spawn_agent`] starts the task; [`ConstraintAgent::handle`] is the
//! synchronous per-message step, mirroring the arbiter.
//!
//! An accepted winner stays accepted until the field is rejected, receives a
//! new provisional winner, or finishes. Arbiters reject only the slots that
//! offered a withdrawn digit, so an agent that accepted a winner without
//! offering it keeps holding that digit for a while and refuses it at its
//! other fields in the meantime.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parley_memory::AgentMemory;
use parley_types::{AgentId, Digit, FieldId, NO_DIGIT, ResetKind, SlotArena, Weight};

use crate::config::ParleyConfig;
use crate::error::AgentError;
use crate::handle::{AgentHandle, ArbiterHandle, OrchestratorHandle};
use crate::messages::{AgentMessage, ArbiterMessage, OrchestratorEvent, UnitId, WeightEntry};
use crate::snapshot::{AgentSnapshot, FieldSnapshot};

/// Construction parameters of a Constraint Agent.
#[derive(Debug, Clone)]
pub struct AgentSeed {
    /// Global id of the agent.
    pub agent: AgentId,
    /// Board side length: number of fields and highest digit.
    pub side: usize,
    /// Reward every (field, digit) pair starts with.
    pub initial_reward: Weight,
    /// Where acknowledgements go.
    pub orchestrator: OrchestratorHandle,
}

impl AgentSeed {
    /// Build a seed from the shared configuration.
    pub fn from_config(agent: AgentId, config: &ParleyConfig, orchestrator: OrchestratorHandle) -> Self {
        Self {
            agent,
            side: config.board.side(),
            initial_reward: config.learning.initial_reward,
            orchestrator,
        }
    }
}

/// State of one Constraint Agent.
#[derive(Debug)]
pub struct ConstraintAgent {
    agent: AgentId,
    memory: AgentMemory,
    arbiters: SlotArena<FieldId, ArbiterHandle>,
    orchestrator: OrchestratorHandle,
    me: AgentHandle,
}

/// Spawn an agent task.
///
/// Returns the agent's handle and the task's join handle; the task resolves
/// to `Err` when the agent dies from a fatal error.
pub fn spawn_agent(seed: AgentSeed) -> (AgentHandle, JoinHandle<Result<(), AgentError>>) {
    let (handle, inbox) = AgentHandle::channel(seed.agent);
    let agent = ConstraintAgent::new(seed, handle.clone());
    let task = tokio::spawn(agent.run(inbox));
    (handle, task)
}

impl ConstraintAgent {
    /// Create an agent that signs its outgoing messages with `me`.
    pub fn new(seed: AgentSeed, me: AgentHandle) -> Self {
        Self {
            agent: seed.agent,
            memory: AgentMemory::new(seed.side, seed.initial_reward),
            arbiters: SlotArena::with_capacity(seed.side),
            orchestrator: seed.orchestrator,
            me,
        }
    }

    /// Drain the mailbox until `Stop`, a closed mailbox, or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by [`Self::handle`].
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<AgentMessage>,
    ) -> Result<(), AgentError> {
        info!(agent = %self.agent, side = self.memory.side(), "Agent started");
        while let Some(message) = inbox.recv().await {
            if matches!(message, AgentMessage::Stop) {
                break;
            }
            if let Err(err) = self.handle(message) {
                error!(agent = %self.agent, error = %err, "Agent stopped on fatal error");
                return Err(err);
            }
        }
        info!(agent = %self.agent, "Agent stopped");
        Ok(())
    }

    /// Read access to the agent's memory.
    pub const fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Process one message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProtocolViolation`] for messages from unknown
    /// arbiters or rejections and results that contradict the field's state,
    /// [`AgentError::CapacityExceeded`] when more arbiters register than the
    /// agent has fields, and [`AgentError::Memory`] for invalid digits.
    pub fn handle(&mut self, message: AgentMessage) -> Result<(), AgentError> {
        match message {
            AgentMessage::RegisterArbiter {
                arbiter,
                digit,
                hard_mask,
            } => self.on_register(arbiter, digit, hard_mask),
            AgentMessage::ResetRound { kind } => {
                self.on_reset(kind);
                Ok(())
            }
            AgentMessage::StartBidding => self.on_start_bidding(),
            AgentMessage::GrantReward { amount } => {
                self.memory.grant_reward(amount);
                debug!(agent = %self.agent, amount, "Reward granted");
                self.orchestrator
                    .notify(OrchestratorEvent::RewardAck { agent: self.agent });
                Ok(())
            }
            AgentMessage::InfoRequest { digits, reply_to } => self.on_info_request(&reply_to, &digits),
            AgentMessage::Rejected { digit, reply_to } => self.on_rejected(&reply_to, digit),
            AgentMessage::ProvisionalWinner { digit, reply_to } => {
                self.on_provisional_winner(&reply_to, digit)
            }
            AgentMessage::Finalized { digit, reply_to } => self.on_finalized(&reply_to, digit),
            AgentMessage::Inspect { reply_to } => {
                if reply_to.send(self.snapshot()).is_err() {
                    debug!(agent = %self.agent, "Inspector went away before the snapshot");
                }
                Ok(())
            }
            AgentMessage::Stop => Ok(()),
        }
    }

    /// Read-only view of the agent.
    pub fn snapshot(&self) -> AgentSnapshot {
        let fields = self
            .memory
            .fields()
            .enumerate()
            .map(|(index, field)| FieldSnapshot {
                field: self.arbiters.id_at(index),
                digit: field.digit(),
                accepted: field.accepted(),
                mask: field.mask(),
                finished: field.is_finished(),
            })
            .collect();
        AgentSnapshot {
            agent: self.agent,
            fields,
        }
    }

    // -----------------------------------------------------------------------
    // Orchestrator requests
    // -----------------------------------------------------------------------

    fn on_register(&mut self, arbiter: ArbiterHandle, digit: Digit, hard_mask: bool) -> Result<(), AgentError> {
        let field = arbiter.field();
        let unit = UnitId::Agent(self.agent);
        let peer = UnitId::Arbiter(field);
        let registered = self
            .arbiters
            .register(field, arbiter)
            .map_err(|source| AgentError::CapacityExceeded {
                agent: self.agent,
                source,
            })
            .and_then(|index| {
                self.memory.set_field(index, digit, hard_mask)?;
                Ok(index)
            });

        match registered {
            Ok(index) => {
                debug!(agent = %self.agent, field = %field, index, digit, hard_mask, "Arbiter registered");
                self.orchestrator.notify(OrchestratorEvent::PeerRegistered {
                    unit,
                    peer,
                    accepted: true,
                });
                Ok(())
            }
            Err(err) => {
                warn!(agent = %self.agent, field = %field, error = %err, "Arbiter registration refused");
                self.orchestrator.notify(OrchestratorEvent::PeerRegistered {
                    unit,
                    peer,
                    accepted: false,
                });
                Err(err)
            }
        }
    }

    fn on_reset(&mut self, kind: ResetKind) {
        match kind {
            ResetKind::Soft => self.memory.soft_reset(),
            ResetKind::Hard => self.memory.hard_reset(),
        }
        debug!(agent = %self.agent, ?kind, "Agent round reset");
        self.orchestrator.notify(OrchestratorEvent::RoundResetAck {
            unit: UnitId::Agent(self.agent),
        });
    }

    fn on_start_bidding(&mut self) -> Result<(), AgentError> {
        self.memory.prioritize();
        let order = self.memory.field_priority().to_vec();
        for index in order {
            if index >= self.arbiters.len() {
                continue;
            }
            let field = self.memory.field(index)?;
            if field.is_finished() || field.mask().is_masked() {
                continue;
            }
            self.send_best_bid(index)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Arbiter messages
    // -----------------------------------------------------------------------

    fn on_info_request(&self, from: &ArbiterHandle, digits: &[Digit]) -> Result<(), AgentError> {
        let index = self.index_of(from)?;
        let field = self.memory.field(index)?;
        if field.is_finished() {
            debug!(agent = %self.agent, field = %from.field(), "Stale info request ignored");
            return Ok(());
        }
        let entries = digits
            .iter()
            .map(|&digit| WeightEntry {
                digit,
                weight: field.reward(digit),
                collides: field.is_colliding(digit),
            })
            .collect();
        from.send(ArbiterMessage::WeightReport {
            entries,
            reply_to: self.me.clone(),
        });
        Ok(())
    }

    fn on_rejected(&mut self, from: &ArbiterHandle, digit: Digit) -> Result<(), AgentError> {
        let index = self.index_of(from)?;
        let field = self.memory.field(index)?;
        if field.is_finished() {
            debug!(agent = %self.agent, field = %from.field(), digit, "Stale rejection ignored");
            return Ok(());
        }
        if field.digit() != digit {
            return Err(self.violation(format!(
                "field {} rejected digit {digit} but the pending bid is {}",
                from.field(),
                field.digit()
            )));
        }
        self.memory.clear_acceptance(index)?;
        self.memory.set_collision(index, digit)?;
        debug!(agent = %self.agent, field = %from.field(), digit, "Bid rejected, rebidding");
        self.send_best_bid(index)
    }

    fn on_provisional_winner(&mut self, from: &ArbiterHandle, digit: Digit) -> Result<(), AgentError> {
        let index = self.index_of(from)?;
        let field = self.memory.field(index)?;
        if field.is_finished() {
            debug!(agent = %self.agent, field = %from.field(), digit, "Stale provisional winner ignored");
            return Ok(());
        }

        if self.memory.holds_elsewhere(index, digit) || field.is_colliding(digit) {
            self.memory.set_collision(index, digit)?;
            debug!(agent = %self.agent, field = %from.field(), digit, "Provisional winner refused");
            from.send(ArbiterMessage::Withdraw {
                digit,
                reply_to: self.me.clone(),
            });
        } else {
            self.memory.accept(index, digit)?;
            debug!(agent = %self.agent, field = %from.field(), digit, "Provisional winner accepted");
            from.send(ArbiterMessage::Accept {
                digit,
                reply_to: self.me.clone(),
            });
        }
        Ok(())
    }

    fn on_finalized(&mut self, from: &ArbiterHandle, digit: Digit) -> Result<(), AgentError> {
        let index = self.index_of(from)?;
        let field = self.memory.field(index)?;
        if field.is_finished() {
            debug!(agent = %self.agent, field = %from.field(), digit, "Stale result ignored");
            return Ok(());
        }
        if digit != NO_DIGIT && field.accepted() != digit {
            return Err(self.violation(format!(
                "field {} finalized digit {digit} but this agent accepted {}",
                from.field(),
                field.accepted()
            )));
        }
        self.memory.finish(index, digit)?;
        debug!(agent = %self.agent, field = %from.field(), digit, "Field finished");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn send_best_bid(&mut self, index: usize) -> Result<(), AgentError> {
        let (digit, weight) = self.memory.best_bid(index)?;
        self.memory.set_bid(index, digit)?;
        match self.arbiters.get(index) {
            Some(arbiter) => {
                debug!(agent = %self.agent, field = %arbiter.field(), digit, weight, "Bidding");
                arbiter.send(ArbiterMessage::Bid {
                    digit,
                    weight,
                    reply_to: self.me.clone(),
                });
            }
            None => warn!(agent = %self.agent, index, "No arbiter registered for field"),
        }
        Ok(())
    }

    fn index_of(&self, from: &ArbiterHandle) -> Result<usize, AgentError> {
        self.arbiters
            .index_of(from.field())
            .ok_or_else(|| self.violation(format!("message from unregistered arbiter {}", from.field())))
    }

    const fn violation(&self, detail: String) -> AgentError {
        AgentError::ProtocolViolation {
            agent: self.agent,
            detail,
        }
    }
}
