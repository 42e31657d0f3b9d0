//! Cell Arbiter: the negotiation unit of one board field.
//!
//! An arbiter has three slots, one per Constraint Agent governing its field
//! (column, row, block). Each round it collects one offer per slot, asks every
//! slot for its weight of every distinct offered digit, withdraws digits any
//! slot reports as colliding, and announces the digit with the greatest
//! weight sum as provisional winner. Three acceptances finalize the field; a
//! bid of 0 (an agent with nothing left to offer) finalizes it with 0.
//!
//! # Architecture
//!
//! [`spawn_arbiter`] starts a tokio task that owns a [`CellArbiter`] and
//! drains its mailbox. [`CellArbiter::handle`] is synchronous: it updates the
//! [`ArbiterMemory`], queues follow-up messages, and returns. A returned error
//! ends the task.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parley_memory::{ArbiterMemory, TieBreak};
use parley_types::{
    AgentId, Digit, FieldId, NO_DIGIT, Position, SLOTS_PER_ARBITER, SlotArena, Weight,
    is_valid_digit,
};

use crate::config::ParleyConfig;
use crate::error::ArbiterError;
use crate::handle::{AgentHandle, ArbiterHandle, OrchestratorHandle};
use crate::messages::{AgentMessage, ArbiterMessage, OrchestratorEvent, UnitId, WeightEntry};
use crate::snapshot::{ArbiterPhase, ArbiterSnapshot};

/// Construction parameters of a Cell Arbiter.
#[derive(Debug, Clone)]
pub struct ArbiterSeed {
    /// Global id of the field.
    pub field: FieldId,
    /// Board position of the field.
    pub position: Position,
    /// Board side length.
    pub side: usize,
    /// How equal weight sums are resolved.
    pub tie_break: TieBreak,
    /// Where resolutions and acknowledgements go.
    pub orchestrator: OrchestratorHandle,
}

impl ArbiterSeed {
    /// Build a seed from the shared configuration.
    pub fn from_config(
        field: FieldId,
        position: Position,
        config: &ParleyConfig,
        orchestrator: OrchestratorHandle,
    ) -> Self {
        Self {
            field,
            position,
            side: config.board.side(),
            tie_break: config.negotiation.tie_break,
            orchestrator,
        }
    }
}

/// State of one Cell Arbiter.
#[derive(Debug)]
pub struct CellArbiter {
    field: FieldId,
    position: Position,
    tie_break: TieBreak,
    phase: ArbiterPhase,
    memory: ArbiterMemory,
    agents: SlotArena<AgentId, AgentHandle>,
    orchestrator: OrchestratorHandle,
    me: ArbiterHandle,
}

/// Spawn an arbiter task.
///
/// Returns the arbiter's handle and the task's join handle; the task
/// resolves to `Err` when the arbiter dies from a fatal error.
pub fn spawn_arbiter(seed: ArbiterSeed) -> (ArbiterHandle, JoinHandle<Result<(), ArbiterError>>) {
    let (handle, inbox) = ArbiterHandle::channel(seed.field);
    let arbiter = CellArbiter::new(seed, handle.clone());
    let task = tokio::spawn(arbiter.run(inbox));
    (handle, task)
}

impl CellArbiter {
    /// Create an arbiter that signs its outgoing messages with `me`.
    pub fn new(seed: ArbiterSeed, me: ArbiterHandle) -> Self {
        Self {
            field: seed.field,
            position: seed.position,
            tie_break: seed.tie_break,
            phase: ArbiterPhase::Idle,
            memory: ArbiterMemory::new(seed.side),
            agents: SlotArena::with_capacity(SLOTS_PER_ARBITER),
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
        mut inbox: mpsc::UnboundedReceiver<ArbiterMessage>,
    ) -> Result<(), ArbiterError> {
        info!(field = %self.field, position = %self.position, "Arbiter started");
        while let Some(message) = inbox.recv().await {
            if matches!(message, ArbiterMessage::Stop) {
                break;
            }
            if let Err(err) = self.handle(message) {
                error!(field = %self.field, error = %err, "Arbiter stopped on fatal error");
                return Err(err);
            }
        }
        info!(field = %self.field, "Arbiter stopped");
        Ok(())
    }

    /// Current phase.
    pub const fn phase(&self) -> ArbiterPhase {
        self.phase
    }

    /// Process one message.
    ///
    /// # Errors
    ///
    /// Returns [`ArbiterError::ProtocolViolation`] for messages from
    /// unregistered agents, out-of-range digits, double bids, and
    /// withdrawals of anything but the announced winner. Returns
    /// [`ArbiterError::CapacityExceeded`] when a fourth agent registers.
    pub fn handle(&mut self, message: ArbiterMessage) -> Result<(), ArbiterError> {
        match message {
            ArbiterMessage::RegisterAgent { agent } => self.on_register(agent),
            ArbiterMessage::ResetRound => {
                self.on_reset();
                Ok(())
            }
            ArbiterMessage::Bid {
                digit,
                weight,
                reply_to,
            } => self.on_bid(&reply_to, digit, weight),
            ArbiterMessage::WeightReport { entries, reply_to } => {
                self.on_weight_report(&reply_to, &entries)
            }
            ArbiterMessage::Withdraw { digit, reply_to } => self.on_withdraw(&reply_to, digit),
            ArbiterMessage::Accept { digit, reply_to } => self.on_accept(&reply_to, digit),
            ArbiterMessage::Inspect { reply_to } => {
                if reply_to.send(self.snapshot()).is_err() {
                    debug!(field = %self.field, "Inspector went away before the snapshot");
                }
                Ok(())
            }
            ArbiterMessage::Stop => Ok(()),
        }
    }

    /// Read-only view of the arbiter.
    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            field: self.field,
            position: self.position,
            phase: self.phase,
            agents: self.agents.iter().map(|(_, id, _)| id).collect(),
            offers: self.memory.offers(),
            unique_offers: self
                .memory
                .unique_offers()
                .iter()
                .map(parley_memory::OfferRecord::digit)
                .collect(),
            denied: self.memory.denied_digits(),
            best_offer: self.memory.best_offer(),
            acceptance_count: self.memory.acceptance_count(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn on_register(&mut self, agent: AgentHandle) -> Result<(), ArbiterError> {
        let agent_id = agent.agent();
        let unit = UnitId::Arbiter(self.field);
        let peer = UnitId::Agent(agent_id);
        match self.agents.register(agent_id, agent) {
            Ok(slot) => {
                debug!(field = %self.field, agent = %agent_id, slot, "Agent registered");
                self.orchestrator.notify(OrchestratorEvent::PeerRegistered {
                    unit,
                    peer,
                    accepted: true,
                });
                Ok(())
            }
            Err(source) => {
                warn!(field = %self.field, agent = %agent_id, "Agent registration refused");
                self.orchestrator.notify(OrchestratorEvent::PeerRegistered {
                    unit,
                    peer,
                    accepted: false,
                });
                Err(ArbiterError::CapacityExceeded {
                    field: self.field,
                    source,
                })
            }
        }
    }

    fn on_reset(&mut self) {
        self.memory.reset();
        self.phase = ArbiterPhase::Idle;
        debug!(field = %self.field, "Arbiter round reset");
        self.orchestrator.notify(OrchestratorEvent::RoundResetAck {
            unit: UnitId::Arbiter(self.field),
        });
    }

    // -----------------------------------------------------------------------
    // Negotiation
    // -----------------------------------------------------------------------

    fn on_bid(&mut self, from: &AgentHandle, digit: Digit, weight: Weight) -> Result<(), ArbiterError> {
        let slot = self.slot_of(from)?;
        if self.phase == ArbiterPhase::Finalized {
            debug!(field = %self.field, slot, digit, "Stale bid after finalization");
            return Ok(());
        }
        if digit != NO_DIGIT && !is_valid_digit(digit, self.memory.side()) {
            return Err(self.violation(format!(
                "slot {slot} bid digit {digit} outside 1..={}",
                self.memory.side()
            )));
        }
        if digit == NO_DIGIT {
            info!(field = %self.field, slot, "Agent opted out, finalizing without consensus");
            self.finalize(NO_DIGIT);
            return Ok(());
        }
        let pending = self.memory.offer(slot);
        if pending != NO_DIGIT {
            return Err(self.violation(format!(
                "slot {slot} bid {digit} while its offer of {pending} is pending"
            )));
        }
        if self.memory.is_denied(digit) {
            debug!(field = %self.field, slot, digit, "Bid for denied digit rejected");
            from.send(AgentMessage::Rejected {
                digit,
                reply_to: self.me.clone(),
            });
            return Ok(());
        }

        let is_new = self.memory.record_offer(slot, digit, weight)?;
        debug!(field = %self.field, slot, digit, weight, is_new, "Offer recorded");
        self.attempt_progress()
    }

    fn on_weight_report(&mut self, from: &AgentHandle, entries: &[WeightEntry]) -> Result<(), ArbiterError> {
        let slot = self.slot_of(from)?;
        if self.phase == ArbiterPhase::Finalized || !self.memory.complete_request(slot) {
            debug!(field = %self.field, slot, "Stale weight report ignored");
            return Ok(());
        }

        for entry in entries {
            if entry.collides {
                self.withdraw_digit(entry.digit);
            } else if !self.memory.record_weight(slot, entry.digit, entry.weight) {
                debug!(field = %self.field, slot, digit = entry.digit, "Weight for withdrawn digit ignored");
            }
        }
        self.attempt_progress()
    }

    fn on_withdraw(&mut self, from: &AgentHandle, digit: Digit) -> Result<(), ArbiterError> {
        let slot = self.slot_of(from)?;
        if self.phase == ArbiterPhase::Finalized || !self.memory.is_offered(digit) {
            debug!(field = %self.field, slot, digit, "Stale withdrawal ignored");
            return Ok(());
        }
        // A digit still on offer can only be withdrawn as the announced winner.
        if self.phase != ArbiterPhase::Decided || digit != self.memory.best_offer() {
            return Err(self.violation(format!(
                "slot {slot} withdrew {digit}, which was never announced as winner"
            )));
        }
        debug!(field = %self.field, slot, digit, "Provisional winner refused");
        self.withdraw_digit(digit);
        self.attempt_progress()
    }

    fn on_accept(&mut self, from: &AgentHandle, digit: Digit) -> Result<(), ArbiterError> {
        let slot = self.slot_of(from)?;
        if self.phase != ArbiterPhase::Decided || !self.memory.accept(slot, digit) {
            debug!(field = %self.field, slot, digit, "Stale acceptance ignored");
            return Ok(());
        }
        if self.memory.all_accepted() {
            self.finalize(digit);
        }
        Ok(())
    }

    /// Ask for missing weights; announce a winner once everything is known.
    fn attempt_progress(&mut self) -> Result<(), ArbiterError> {
        if matches!(self.phase, ArbiterPhase::Decided | ArbiterPhase::Finalized) {
            return Ok(());
        }
        if !self.memory.all_offered() {
            self.phase = ArbiterPhase::Collecting;
            return Ok(());
        }

        for slot in 0..SLOTS_PER_ARBITER {
            if self.memory.specify_flag(slot) {
                continue;
            }
            let digits = self.memory.unknown_digits(slot);
            if !digits.is_empty() {
                self.memory.mark_requested(slot, &digits)?;
                debug!(field = %self.field, slot, ?digits, "Requesting weights");
                self.send_to_slot(
                    slot,
                    AgentMessage::InfoRequest {
                        digits,
                        reply_to: self.me.clone(),
                    },
                );
            }
            self.memory.set_specify_flag(slot, true)?;
        }

        if self.memory.all_specified() && !self.memory.requests_outstanding() {
            if let Some(winner) = self.memory.choose_best(self.tie_break) {
                self.phase = ArbiterPhase::Decided;
                debug!(field = %self.field, digit = winner, "Provisional winner chosen");
                for slot in 0..SLOTS_PER_ARBITER {
                    self.send_to_slot(
                        slot,
                        AgentMessage::ProvisionalWinner {
                            digit: winner,
                            reply_to: self.me.clone(),
                        },
                    );
                }
                return Ok(());
            }
        }
        self.phase = ArbiterPhase::AwaitingInfo;
        Ok(())
    }

    fn withdraw_digit(&mut self, digit: Digit) {
        let offered_by = self.memory.withdraw(digit);
        self.phase = ArbiterPhase::Collecting;
        debug!(field = %self.field, digit, ?offered_by, "Digit withdrawn");
        for slot in offered_by {
            self.send_to_slot(
                slot,
                AgentMessage::Rejected {
                    digit,
                    reply_to: self.me.clone(),
                },
            );
        }
    }

    fn finalize(&mut self, digit: Digit) {
        self.memory.set_best_offer(digit);
        self.phase = ArbiterPhase::Finalized;
        for (_, _, agent) in self.agents.iter() {
            agent.send(AgentMessage::Finalized {
                digit,
                reply_to: self.me.clone(),
            });
        }
        info!(field = %self.field, position = %self.position, digit, "Field resolved");
        self.orchestrator.notify(OrchestratorEvent::FieldResolved {
            field: self.field,
            position: self.position,
            digit,
        });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn slot_of(&self, from: &AgentHandle) -> Result<usize, ArbiterError> {
        self.agents
            .index_of(from.agent())
            .ok_or_else(|| ArbiterError::ProtocolViolation {
                field: self.field,
                detail: format!("message from unregistered agent {}", from.agent()),
            })
    }

    const fn violation(&self, detail: String) -> ArbiterError {
        ArbiterError::ProtocolViolation {
            field: self.field,
            detail,
        }
    }

    fn send_to_slot(&self, slot: usize, message: AgentMessage) {
        match self.agents.get(slot) {
            Some(agent) => {
                agent.send(message);
            }
            None => warn!(field = %self.field, slot, "No agent registered in slot"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Harness {
        arbiter: CellArbiter,
        agents: Vec<(AgentHandle, UnboundedReceiver<AgentMessage>)>,
        events: UnboundedReceiver<OrchestratorEvent>,
    }

    fn harness(side: usize, tie_break: TieBreak) -> Harness {
        let (orchestrator, events) = OrchestratorHandle::channel();
        let (me, _inbox) = ArbiterHandle::channel(FieldId::new(10));
        let seed = ArbiterSeed {
            field: FieldId::new(10),
            position: Position::new(1, 1),
            side,
            tie_break,
            orchestrator,
        };
        let mut arbiter = CellArbiter::new(seed, me);
        let mut agents = Vec::new();
        for raw in [1, 10, 19] {
            let (handle, rx) = AgentHandle::channel(AgentId::new(raw));
            arbiter
                .handle(ArbiterMessage::RegisterAgent {
                    agent: handle.clone(),
                })
                .unwrap();
            agents.push((handle, rx));
        }
        let mut h = Harness {
            arbiter,
            agents,
            events,
        };
        h.drain_events();
        h
    }

    impl Harness {
        fn agent(&self, slot: usize) -> AgentHandle {
            self.agents.get(slot).unwrap().0.clone()
        }

        fn bid(&mut self, slot: usize, digit: Digit, weight: Weight) {
            let reply_to = self.agent(slot);
            self.arbiter
                .handle(ArbiterMessage::Bid {
                    digit,
                    weight,
                    reply_to,
                })
                .unwrap();
        }

        fn report(&mut self, slot: usize, entries: &[(Digit, Weight, bool)]) {
            let reply_to = self.agent(slot);
            let entries = entries
                .iter()
                .map(|&(digit, weight, collides)| WeightEntry {
                    digit,
                    weight,
                    collides,
                })
                .collect();
            self.arbiter
                .handle(ArbiterMessage::WeightReport { entries, reply_to })
                .unwrap();
        }

        fn accept(&mut self, slot: usize, digit: Digit) {
            let reply_to = self.agent(slot);
            self.arbiter
                .handle(ArbiterMessage::Accept { digit, reply_to })
                .unwrap();
        }

        fn inbox(&mut self, slot: usize) -> Vec<AgentMessage> {
            let rx = &mut self.agents.get_mut(slot).unwrap().1;
            let mut out = Vec::new();
            while let Ok(message) = rx.try_recv() {
                out.push(message);
            }
            out
        }

        fn drain_events(&mut self) -> Vec<OrchestratorEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn requested(&mut self, slot: usize) -> Vec<Digit> {
            self.inbox(slot)
                .into_iter()
                .filter_map(|m| match m {
                    AgentMessage::InfoRequest { digits, .. } => Some(digits),
                    _ => None,
                })
                .flatten()
                .collect()
        }

        /// Bids 1, 2, 3 with weights 1, 2, 3 from slots 0, 1, 2.
        fn three_bids(&mut self) {
            self.bid(0, 1, 1.0);
            self.bid(1, 2, 2.0);
            self.bid(2, 3, 3.0);
        }
    }

    fn winners(messages: &[AgentMessage]) -> Vec<Digit> {
        messages
            .iter()
            .filter_map(|m| match m {
                AgentMessage::ProvisionalWinner { digit, .. } => Some(*digit),
                _ => None,
            })
            .collect()
    }

    fn rejections(messages: &[AgentMessage]) -> Vec<Digit> {
        messages
            .iter()
            .filter_map(|m| match m {
                AgentMessage::Rejected { digit, .. } => Some(*digit),
                _ => None,
            })
            .collect()
    }

    fn finals(messages: &[AgentMessage]) -> Vec<Digit> {
        messages
            .iter()
            .filter_map(|m| match m {
                AgentMessage::Finalized { digit, .. } => Some(*digit),
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Registration and reset
    // =========================================================================

    #[test]
    fn registration_is_acknowledged() {
        let (orchestrator, mut events) = OrchestratorHandle::channel();
        let (me, _inbox) = ArbiterHandle::channel(FieldId::new(0));
        let seed = ArbiterSeed::from_config(
            FieldId::new(0),
            Position::new(0, 0),
            &ParleyConfig::default(),
            orchestrator,
        );
        let mut arbiter = CellArbiter::new(seed, me);
        let (agent, _rx) = AgentHandle::channel(AgentId::new(7));
        arbiter
            .handle(ArbiterMessage::RegisterAgent { agent })
            .unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            OrchestratorEvent::PeerRegistered {
                unit: UnitId::Arbiter(FieldId::new(0)),
                peer: UnitId::Agent(AgentId::new(7)),
                accepted: true,
            }
        );
    }

    #[test]
    fn fourth_agent_is_a_capacity_error() {
        let mut h = harness(9, TieBreak::FirstSeen);
        let (extra, _rx) = AgentHandle::channel(AgentId::new(99));
        let result = h.arbiter.handle(ArbiterMessage::RegisterAgent { agent: extra });
        assert!(matches!(result, Err(ArbiterError::CapacityExceeded { .. })));
        assert_eq!(
            h.drain_events(),
            vec![OrchestratorEvent::PeerRegistered {
                unit: UnitId::Arbiter(FieldId::new(10)),
                peer: UnitId::Agent(AgentId::new(99)),
                accepted: false,
            }]
        );
    }

    #[test]
    fn unregistered_sender_is_a_protocol_violation() {
        let mut h = harness(9, TieBreak::FirstSeen);
        let (stranger, _rx) = AgentHandle::channel(AgentId::new(42));
        let result = h.arbiter.handle(ArbiterMessage::Bid {
            digit: 1,
            weight: 0.0,
            reply_to: stranger,
        });
        assert!(matches!(result, Err(ArbiterError::ProtocolViolation { .. })));
    }

    #[test]
    fn reset_clears_round_and_acknowledges() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 4, 1.0);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Collecting);
        h.arbiter.handle(ArbiterMessage::ResetRound).unwrap();
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Idle);
        assert_eq!(h.arbiter.snapshot().offers, [0, 0, 0]);
        assert_eq!(
            h.drain_events(),
            vec![OrchestratorEvent::RoundResetAck {
                unit: UnitId::Arbiter(FieldId::new(10)),
            }]
        );
    }

    // =========================================================================
    // Scenario: three distinct bids
    // =========================================================================

    #[test]
    fn each_slot_is_asked_about_the_other_digits() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 1, 1.0);
        h.bid(1, 2, 2.0);
        assert!(h.requested(0).is_empty());
        h.bid(2, 3, 3.0);

        let mut asked0 = h.requested(0);
        let mut asked1 = h.requested(1);
        let mut asked2 = h.requested(2);
        asked0.sort_unstable();
        asked1.sort_unstable();
        asked2.sort_unstable();
        assert_eq!(asked0, vec![2, 3]);
        assert_eq!(asked1, vec![1, 3]);
        assert_eq!(asked2, vec![1, 2]);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::AwaitingInfo);
    }

    #[test]
    fn highest_weight_sum_wins() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.three_bids();
        for slot in 0..3 {
            h.inbox(slot);
        }
        h.report(0, &[(2, 5.0, false), (3, 2.0, false)]);
        h.report(1, &[(1, 1.0, false), (3, 3.0, false)]);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::AwaitingInfo);
        h.report(2, &[(1, 2.0, false), (2, 2.0, false)]);

        // sums: 1 -> 4, 2 -> 9, 3 -> 8
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Decided);
        for slot in 0..3 {
            assert_eq!(winners(&h.inbox(slot)), vec![2]);
        }
    }

    #[test]
    fn equal_sums_follow_the_tie_break() {
        for (tie_break, expected) in [(TieBreak::FirstSeen, 3), (TieBreak::LowestDigit, 1)] {
            let mut h = harness(9, tie_break);
            h.bid(0, 3, 1.0);
            h.bid(1, 1, 1.0);
            h.bid(2, 1, 1.0);
            h.report(0, &[(1, 1.0, false)]);
            h.report(1, &[(3, 1.0, false)]);
            h.report(2, &[(3, 1.0, false)]);
            assert_eq!(winners(&h.inbox(0)), vec![expected]);
        }
    }

    #[test]
    fn identical_bids_need_no_information() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 5, 1.0);
        h.bid(1, 5, 1.0);
        h.bid(2, 5, 1.0);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Decided);
        assert_eq!(winners(&h.inbox(1)), vec![5]);
    }

    // =========================================================================
    // Scenario: collision report withdraws a digit
    // =========================================================================

    #[test]
    fn colliding_digit_is_withdrawn_and_rejected() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.three_bids();
        for slot in 0..3 {
            h.inbox(slot);
        }
        h.report(1, &[(1, 0.0, true), (3, 3.0, false)]);

        assert_eq!(rejections(&h.inbox(0)), vec![1]);
        assert!(rejections(&h.inbox(1)).is_empty());
        let snapshot = h.arbiter.snapshot();
        assert_eq!(snapshot.offers, [0, 2, 3]);
        assert_eq!(snapshot.denied, vec![1]);
        assert_eq!(snapshot.unique_offers, vec![2, 3]);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Collecting);

        // The rejected slot rebids a fresh digit; negotiation resumes.
        h.bid(0, 8, 4.0);
        let mut asked1 = h.requested(1);
        asked1.sort_unstable();
        assert_eq!(asked1, vec![8]);
        let mut asked2 = h.requested(2);
        asked2.sort_unstable();
        assert_eq!(asked2, vec![8]);
    }

    #[test]
    fn denied_digit_is_rejected_without_state_change() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.three_bids();
        h.report(1, &[(1, 0.0, true), (3, 3.0, false)]);
        h.inbox(0);

        h.bid(0, 1, 9.0);
        assert_eq!(rejections(&h.inbox(0)), vec![1]);
        assert_eq!(h.arbiter.snapshot().offers, [0, 2, 3]);
    }

    #[test]
    fn double_bid_is_fatal() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 1, 1.0);
        let reply_to = h.agent(0);
        let result = h.arbiter.handle(ArbiterMessage::Bid {
            digit: 2,
            weight: 1.0,
            reply_to,
        });
        assert!(matches!(result, Err(ArbiterError::ProtocolViolation { .. })));
    }

    #[test]
    fn out_of_range_digit_is_fatal() {
        let mut h = harness(4, TieBreak::FirstSeen);
        let reply_to = h.agent(0);
        let result = h.arbiter.handle(ArbiterMessage::Bid {
            digit: 5,
            weight: 1.0,
            reply_to,
        });
        assert!(matches!(result, Err(ArbiterError::ProtocolViolation { .. })));
    }

    // =========================================================================
    // Scenario: opt-out finalizes with zero
    // =========================================================================

    #[test]
    fn opt_out_finalizes_with_zero() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 1, 1.0);
        h.bid(1, NO_DIGIT, 0.0);

        assert_eq!(h.arbiter.phase(), ArbiterPhase::Finalized);
        for slot in 0..3 {
            assert_eq!(finals(&h.inbox(slot)), vec![0]);
        }
        assert_eq!(
            h.drain_events(),
            vec![OrchestratorEvent::FieldResolved {
                field: FieldId::new(10),
                position: Position::new(1, 1),
                digit: 0,
            }]
        );

        // Everything afterwards is stale.
        h.bid(2, 3, 1.0);
        h.bid(1, NO_DIGIT, 0.0);
        assert!(h.drain_events().is_empty());
        assert!(h.inbox(2).is_empty());
    }

    // =========================================================================
    // Scenario: consensus
    // =========================================================================

    #[test]
    fn three_acceptances_finalize() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.three_bids();
        h.report(0, &[(2, 5.0, false), (3, 2.0, false)]);
        h.report(1, &[(1, 1.0, false), (3, 3.0, false)]);
        h.report(2, &[(1, 2.0, false), (2, 2.0, false)]);
        for slot in 0..3 {
            h.inbox(slot);
        }

        h.accept(0, 2);
        h.accept(0, 2);
        h.accept(1, 2);
        assert_eq!(h.arbiter.snapshot().acceptance_count, 2);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Decided);
        h.accept(2, 2);

        assert_eq!(h.arbiter.phase(), ArbiterPhase::Finalized);
        for slot in 0..3 {
            assert_eq!(finals(&h.inbox(slot)), vec![2]);
        }
        assert_eq!(
            h.drain_events(),
            vec![OrchestratorEvent::FieldResolved {
                field: FieldId::new(10),
                position: Position::new(1, 1),
                digit: 2,
            }]
        );
    }

    #[test]
    fn acceptance_of_other_digit_is_stale() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 5, 1.0);
        h.bid(1, 5, 1.0);
        h.bid(2, 5, 1.0);
        h.accept(0, 4);
        assert_eq!(h.arbiter.snapshot().acceptance_count, 0);
    }

    #[test]
    fn withdrawal_of_winner_rejects_its_offerers() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 5, 1.0);
        h.bid(1, 5, 1.0);
        h.bid(2, 6, 0.0);
        h.report(0, &[(6, 0.0, false)]);
        h.report(1, &[(6, 0.0, false)]);
        h.report(2, &[(5, 0.0, false)]);
        assert_eq!(winners(&h.inbox(2)), vec![5]);
        h.accept(0, 5);

        let reply_to = h.agent(2);
        h.arbiter
            .handle(ArbiterMessage::Withdraw { digit: 5, reply_to })
            .unwrap();

        assert_eq!(rejections(&h.inbox(0)), vec![5]);
        assert_eq!(rejections(&h.inbox(1)), vec![5]);
        assert!(rejections(&h.inbox(2)).is_empty());
        let snapshot = h.arbiter.snapshot();
        assert_eq!(snapshot.offers, [0, 0, 6]);
        assert_eq!(snapshot.best_offer, 0);
        assert_eq!(snapshot.acceptance_count, 0);

        // A repeated withdrawal is stale.
        let reply_to = h.agent(1);
        h.arbiter
            .handle(ArbiterMessage::Withdraw { digit: 5, reply_to })
            .unwrap();
        assert!(h.inbox(0).is_empty());
    }

    #[test]
    fn withdrawal_of_a_losing_offer_is_fatal() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 5, 1.0);
        h.bid(1, 5, 1.0);
        h.bid(2, 6, 0.0);
        h.report(0, &[(6, 0.0, false)]);
        h.report(1, &[(6, 0.0, false)]);
        h.report(2, &[(5, 0.0, false)]);
        assert_eq!(h.arbiter.phase(), ArbiterPhase::Decided);

        let reply_to = h.agent(0);
        let result = h.arbiter.handle(ArbiterMessage::Withdraw { digit: 6, reply_to });
        assert!(matches!(result, Err(ArbiterError::ProtocolViolation { .. })));
        let snapshot = h.arbiter.snapshot();
        assert!(snapshot.denied.is_empty());
        assert_eq!(snapshot.best_offer, 5);
    }

    #[test]
    fn withdrawal_before_a_decision_is_fatal() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 4, 1.0);
        let reply_to = h.agent(1);
        let result = h.arbiter.handle(ArbiterMessage::Withdraw { digit: 4, reply_to });
        assert!(matches!(result, Err(ArbiterError::ProtocolViolation { .. })));

        // A digit nobody offers is a late withdrawal, not a violation.
        let reply_to = h.agent(1);
        h.arbiter
            .handle(ArbiterMessage::Withdraw { digit: 7, reply_to })
            .unwrap();
    }

    #[test]
    fn report_without_pending_request_is_stale() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 1, 1.0);
        h.report(0, &[(1, 0.0, true)]);
        assert!(h.arbiter.snapshot().denied.is_empty());
        assert_eq!(h.arbiter.snapshot().offers, [1, 0, 0]);
    }

    #[test]
    fn snapshot_serializes() {
        let mut h = harness(9, TieBreak::FirstSeen);
        h.bid(0, 3, 1.0);
        let json = serde_json::to_value(h.arbiter.snapshot()).unwrap();
        assert_eq!(json["phase"], "collecting");
        assert_eq!(json["offers"][0], 3);
        assert_eq!(json["agents"].as_array().unwrap().len(), 3);
    }
}
