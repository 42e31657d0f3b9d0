//! Cloneable mailbox addresses of the units.
//!
//! A handle pairs a unit's global id with the sending half of its mailbox.
//! Mailboxes are unbounded, so a send never blocks; a send to a unit whose
//! task has ended is logged and dropped.

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use parley_types::{AgentId, FieldId};

use crate::messages::{AgentMessage, ArbiterMessage, OrchestratorEvent};
use crate::snapshot::{AgentSnapshot, ArbiterSnapshot};

/// Address of a Cell Arbiter.
#[derive(Debug, Clone)]
pub struct ArbiterHandle {
    field: FieldId,
    tx: mpsc::UnboundedSender<ArbiterMessage>,
}

impl ArbiterHandle {
    /// Create a handle together with the mailbox it feeds.
    pub fn channel(field: FieldId) -> (Self, mpsc::UnboundedReceiver<ArbiterMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { field, tx }, rx)
    }

    /// The arbiter's field id.
    pub const fn field(&self) -> FieldId {
        self.field
    }

    /// Queue a message. Returns `false` if the arbiter is gone.
    pub fn send(&self, message: ArbiterMessage) -> bool {
        if self.tx.send(message).is_err() {
            warn!(field = %self.field, "Arbiter mailbox closed, message dropped");
            return false;
        }
        true
    }

    /// Whether the arbiter's task has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the arbiter for a snapshot. `None` if it is gone.
    pub async fn inspect(&self) -> Option<ArbiterSnapshot> {
        let (reply_to, rx) = oneshot::channel();
        if !self.send(ArbiterMessage::Inspect { reply_to }) {
            return None;
        }
        rx.await.ok()
    }
}

/// Address of a Constraint Agent.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    agent: AgentId,
    tx: mpsc::UnboundedSender<AgentMessage>,
}

impl AgentHandle {
    /// Create a handle together with the mailbox it feeds.
    pub fn channel(agent: AgentId) -> (Self, mpsc::UnboundedReceiver<AgentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { agent, tx }, rx)
    }

    /// The agent's id.
    pub const fn agent(&self) -> AgentId {
        self.agent
    }

    /// Queue a message. Returns `false` if the agent is gone.
    pub fn send(&self, message: AgentMessage) -> bool {
        if self.tx.send(message).is_err() {
            warn!(agent = %self.agent, "Agent mailbox closed, message dropped");
            return false;
        }
        true
    }

    /// Whether the agent's task has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the agent for a snapshot. `None` if it is gone.
    pub async fn inspect(&self) -> Option<AgentSnapshot> {
        let (reply_to, rx) = oneshot::channel();
        if !self.send(AgentMessage::Inspect { reply_to }) {
            return None;
        }
        rx.await.ok()
    }
}

/// Address of the orchestrator's event stream.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl OrchestratorHandle {
    /// Create a handle together with the event stream it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an event. A missing orchestrator is logged and ignored.
    pub fn notify(&self, event: OrchestratorEvent) {
        if let Err(err) = self.tx.send(event) {
            warn!(event = ?err.0, "Orchestrator gone, event dropped");
        }
    }
}
