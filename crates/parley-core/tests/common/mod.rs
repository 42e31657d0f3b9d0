//! Shared test orchestrator: spawns and wires a whole board of units.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use parley_core::{
    AgentError, AgentHandle, AgentMessage, AgentSeed, AgentSnapshot, ArbiterError, ArbiterHandle,
    ArbiterMessage, ArbiterSeed, OrchestratorEvent, OrchestratorHandle, ParleyConfig, spawn_agent,
    spawn_arbiter,
};
use parley_types::{AgentId, Digit, FieldId, Position, ResetKind, Weight};

/// Upper bound for any single wait on the event stream.
pub const WAIT: Duration = Duration::from_secs(10);

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fully wired board driven the way an orchestrator would drive it.
pub struct Board {
    /// Block side length.
    pub rank: usize,
    /// Board side length.
    pub side: usize,
    /// Arbiter handles and tasks, row-major.
    pub arbiters: Vec<(ArbiterHandle, JoinHandle<Result<(), ArbiterError>>)>,
    /// Agent handles and tasks: columns, then rows, then blocks.
    pub agents: Vec<(AgentHandle, JoinHandle<Result<(), AgentError>>)>,
    /// The orchestrator's event stream.
    pub events: UnboundedReceiver<OrchestratorEvent>,
}

/// Agent ids of the column, row and block covering `(x, y)`.
pub fn covering_agents(rank: usize, x: usize, y: usize) -> [AgentId; 3] {
    let side = rank * rank;
    let block = (y / rank) * rank + x / rank;
    [
        AgentId::new(u32::try_from(x).unwrap()),
        AgentId::new(u32::try_from(side + y).unwrap()),
        AgentId::new(u32::try_from(2 * side + block).unwrap()),
    ]
}

impl Board {
    /// Spawn every unit and register all peers. `clues` is row-major, 0 = empty.
    pub async fn spawn(config: &ParleyConfig, clues: &[Digit]) -> Self {
        let rank = usize::from(config.board.rank);
        let side = config.board.side();
        assert_eq!(clues.len(), side * side);
        let (orchestrator, events) = OrchestratorHandle::channel();

        let agents: Vec<_> = (0..3 * side)
            .map(|raw| {
                let id = AgentId::new(u32::try_from(raw).unwrap());
                spawn_agent(AgentSeed::from_config(id, config, orchestrator.clone()))
            })
            .collect();

        let mut arbiters = Vec::new();
        for y in 0..side {
            for x in 0..side {
                let field = FieldId::new(u32::try_from(y * side + x).unwrap());
                let position = Position::new(u16::try_from(x).unwrap(), u16::try_from(y).unwrap());
                arbiters.push(spawn_arbiter(ArbiterSeed::from_config(
                    field,
                    position,
                    config,
                    orchestrator.clone(),
                )));
            }
        }

        let mut board = Self {
            rank,
            side,
            arbiters,
            agents,
            events,
        };

        let mut expected = 0;
        for y in 0..side {
            for x in 0..side {
                let digit = clues[y * side + x];
                let arbiter = board.arbiter(x, y).clone();
                for agent_id in covering_agents(rank, x, y) {
                    let agent = board.agent(agent_id).clone();
                    assert!(arbiter.send(ArbiterMessage::RegisterAgent {
                        agent: agent.clone()
                    }));
                    assert!(agent.send(AgentMessage::RegisterArbiter {
                        arbiter: arbiter.clone(),
                        digit,
                        hard_mask: digit != 0,
                    }));
                    expected += 2;
                }
            }
        }
        for _ in 0..expected {
            match board.next_event().await {
                OrchestratorEvent::PeerRegistered { accepted, .. } => assert!(accepted),
                other => panic!("unexpected event during wiring: {other:?}"),
            }
        }
        board
    }

    /// Handle of the arbiter at `(x, y)`.
    pub fn arbiter(&self, x: usize, y: usize) -> &ArbiterHandle {
        &self.arbiters[y * self.side + x].0
    }

    /// Handle of an agent by id.
    pub fn agent(&self, id: AgentId) -> &AgentHandle {
        &self.agents[usize::try_from(id.into_inner()).unwrap()].0
    }

    /// Ids of every field on the board.
    pub fn all_fields(&self) -> BTreeSet<FieldId> {
        self.arbiters.iter().map(|(a, _)| a.field()).collect()
    }

    /// Next orchestrator event, failing the test after [`WAIT`].
    pub async fn next_event(&mut self) -> OrchestratorEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an orchestrator event")
            .expect("event stream closed")
    }

    /// Reset every unit (agents first, then arbiters) and wait for all acks.
    pub async fn reset(&mut self, kind: ResetKind) {
        for (agent, _) in &self.agents {
            assert!(agent.send(AgentMessage::ResetRound { kind }));
        }
        self.await_reset_acks(self.agents.len()).await;
        for (arbiter, _) in &self.arbiters {
            assert!(arbiter.send(ArbiterMessage::ResetRound));
        }
        self.await_reset_acks(self.arbiters.len()).await;
    }

    async fn await_reset_acks(&mut self, count: usize) {
        for _ in 0..count {
            match self.next_event().await {
                OrchestratorEvent::RoundResetAck { .. } => {}
                other => panic!("unexpected event during reset: {other:?}"),
            }
        }
    }

    /// Run one small round and collect the result of every field in `open`.
    pub async fn round(
        &mut self,
        kind: ResetKind,
        open: &BTreeSet<FieldId>,
    ) -> BTreeMap<FieldId, Digit> {
        self.reset(kind).await;
        for (agent, _) in &self.agents {
            assert!(agent.send(AgentMessage::StartBidding));
        }
        let mut results = BTreeMap::new();
        while results.len() < open.len() {
            match self.next_event().await {
                OrchestratorEvent::FieldResolved { field, digit, .. } => {
                    assert!(open.contains(&field), "field {field} was not open");
                    assert!(
                        results.insert(field, digit).is_none(),
                        "field {field} resolved twice"
                    );
                }
                other => panic!("unexpected event during round: {other:?}"),
            }
        }
        results
    }

    /// Reward every agent and wait for the acks.
    pub async fn grant_reward(&mut self, amount: Weight) {
        for (agent, _) in &self.agents {
            assert!(agent.send(AgentMessage::GrantReward { amount }));
        }
        for _ in 0..self.agents.len() {
            assert!(matches!(
                self.next_event().await,
                OrchestratorEvent::RewardAck { .. }
            ));
        }
    }

    /// Snapshot of every agent, in id order.
    pub async fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        let mut snapshots = Vec::new();
        for (agent, _) in &self.agents {
            snapshots.push(agent.inspect().await.unwrap());
        }
        snapshots
    }

    /// Every agent holds each nonzero finished digit at most once.
    pub async fn assert_unique_per_agent(&self) {
        for snapshot in self.agent_snapshots().await {
            let digits = snapshot.resolved_digits();
            let unique: BTreeSet<_> = digits.iter().collect();
            assert_eq!(
                unique.len(),
                digits.len(),
                "agent {} holds a digit twice: {digits:?}",
                snapshot.agent
            );
        }
    }

    /// The digit each agent records for a field matches the arbiter's result.
    pub async fn assert_results_agree(&self, results: &BTreeMap<FieldId, Digit>) {
        for snapshot in self.agent_snapshots().await {
            for field in &snapshot.fields {
                let Some(id) = field.field else { continue };
                if let Some(&digit) = results.get(&id) {
                    assert!(field.finished, "agent {} has field {id} open", snapshot.agent);
                    assert_eq!(field.digit, digit, "agent {} disagrees on field {id}", snapshot.agent);
                }
            }
        }
    }

    /// Stop every unit and check that none of them died.
    pub async fn shutdown(self) {
        for (agent, task) in self.agents {
            assert!(agent.send(AgentMessage::Stop));
            assert!(timeout(WAIT, task).await.unwrap().unwrap().is_ok());
        }
        for (arbiter, task) in self.arbiters {
            assert!(arbiter.send(ArbiterMessage::Stop));
            assert!(timeout(WAIT, task).await.unwrap().unwrap().is_ok());
        }
    }
}
