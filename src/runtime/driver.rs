//! Async host for a [`TimelineCoordinator`].
//!
//! One task owns the coordinator and processes commands in arrival order.
//! Fetch requests go to the transport fire-and-forget; their responses come
//! back through [`SyncHandle::deliver`] like any other inbound frame.

use std::collections::VecDeque;
use std::sync::Arc;

use time::OffsetDateTime;
use timeline_protocol::{AgentId, InboundMessage, ItemId, TimelineTransport};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CoordinatorConfig;
use crate::error::{DriverStopped, InitError};
use crate::runtime::coordinator::TimelineCoordinator;
use crate::runtime::counters::SyncCounters;
use crate::runtime::effects::TimelineEffect;
use crate::runtime::init_waiters::{InitReply, InitWaiters};
use crate::runtime::store::TimelineStore;

enum Command {
    Inbound(InboundMessage),
    WaitForInitialSync {
        agent_id: AgentId,
        reply: InitReply,
    },
    LoadOlder(AgentId),
    RecordUserMessage {
        agent_id: AgentId,
        text: String,
        timestamp: OffsetDateTime,
        reply: oneshot::Sender<ItemId>,
    },
    DeleteAgent(AgentId),
    Counters(oneshot::Sender<SyncCounters>),
    Shutdown,
}

/// Cloneable entry point into a running [`SyncDriver`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Inbound(_) => "Inbound",
            Self::WaitForInitialSync { .. } => "WaitForInitialSync",
            Self::LoadOlder(_) => "LoadOlder",
            Self::RecordUserMessage { .. } => "RecordUserMessage",
            Self::DeleteAgent(_) => "DeleteAgent",
            Self::Counters(_) => "Counters",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SyncHandle {
    /// Feeds one decoded inbound frame to the driver.
    pub fn deliver(&self, message: InboundMessage) -> Result<(), DriverStopped> {
        self.send(Command::Inbound(message))
    }

    /// Starts (or joins) the initial sync for an agent and waits for it to
    /// settle.
    pub async fn wait_for_initial_sync(
        &self,
        agent_id: impl Into<AgentId>,
    ) -> Result<(), InitError> {
        let (reply, receiver) = oneshot::channel();
        self.send(Command::WaitForInitialSync {
            agent_id: agent_id.into(),
            reply,
        })?;
        receiver.await.map_err(|_| InitError::DriverStopped)?
    }

    pub fn load_older(&self, agent_id: impl Into<AgentId>) -> Result<(), DriverStopped> {
        self.send(Command::LoadOlder(agent_id.into()))
    }

    /// Records an optimistic user message and returns its client-side id.
    pub async fn record_user_message(
        &self,
        agent_id: impl Into<AgentId>,
        text: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> Result<ItemId, DriverStopped> {
        let (reply, receiver) = oneshot::channel();
        self.send(Command::RecordUserMessage {
            agent_id: agent_id.into(),
            text: text.into(),
            timestamp,
            reply,
        })?;
        receiver.await.map_err(|_| DriverStopped)
    }

    pub fn delete_agent(&self, agent_id: impl Into<AgentId>) -> Result<(), DriverStopped> {
        self.send(Command::DeleteAgent(agent_id.into()))
    }

    /// Counters as of every command sent before this call.
    pub async fn counters(&self) -> Result<SyncCounters, DriverStopped> {
        let (reply, receiver) = oneshot::channel();
        self.send(Command::Counters(reply))?;
        receiver.await.map_err(|_| DriverStopped)
    }

    /// Asks the driver to stop. Pending waiters fail with
    /// [`InitError::DriverStopped`].
    pub fn shutdown(&self) -> Result<(), DriverStopped> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), DriverStopped> {
        self.sender.send(command).map_err(|_| DriverStopped)
    }
}

pub struct SyncDriver<T: ?Sized, S> {
    coordinator: TimelineCoordinator<S>,
    transport: Arc<T>,
    waiters: InitWaiters,
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl<T, S> SyncDriver<T, S>
where
    T: TimelineTransport + ?Sized,
    S: TimelineStore + Send + 'static,
{
    pub fn new(config: CoordinatorConfig, store: S, transport: Arc<T>) -> (Self, SyncHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let driver = Self {
            coordinator: TimelineCoordinator::new(config, store),
            transport,
            waiters: InitWaiters::new(),
            receiver,
        };
        (driver, SyncHandle { sender })
    }

    /// Runs until [`SyncHandle::shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        let stopped = self.waiters.stop_all();
        debug!(pending_waiters = stopped, "sync driver stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn handle(&mut self, command: Command) -> bool {
        let effects = match command {
            Command::Inbound(message) => self.coordinator.handle_inbound(message),
            Command::WaitForInitialSync { agent_id, reply } => {
                let sync = self.coordinator.begin_initial_sync(&agent_id);
                self.waiters.register(agent_id, sync.direction, reply);
                sync.effects
            }
            Command::LoadOlder(agent_id) => self.coordinator.load_older(&agent_id),
            Command::RecordUserMessage {
                agent_id,
                text,
                timestamp,
                reply,
            } => {
                let id = self
                    .coordinator
                    .record_local_user_message(&agent_id, text, timestamp);
                let _ = reply.send(id);
                Vec::new()
            }
            Command::DeleteAgent(agent_id) => self.coordinator.remove_agent(&agent_id),
            Command::Counters(reply) => {
                let _ = reply.send(self.coordinator.counters());
                Vec::new()
            }
            Command::Shutdown => return false,
        };
        self.perform(effects);
        true
    }

    fn perform(&mut self, effects: Vec<TimelineEffect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                TimelineEffect::Fetch(request) => {
                    if let Err(error) = self.transport.send_fetch(request.clone()) {
                        warn!(
                            agent_id = %request.agent_id,
                            direction = request.direction.as_str(),
                            error = %error,
                            "transport refused fetch"
                        );
                        queue.extend(
                            self.coordinator
                                .handle_fetch_failure(&request, &error.to_string()),
                        );
                    }
                }
                TimelineEffect::ResolveInit {
                    agent_id,
                    direction,
                } => {
                    self.waiters.resolve(&agent_id, direction);
                }
                TimelineEffect::RejectInit {
                    agent_id,
                    direction,
                    error,
                } => {
                    self.waiters.reject(&agent_id, direction, &error);
                }
                TimelineEffect::CancelInit {
                    agent_id,
                    direction,
                } => {
                    self.waiters.cancel(&agent_id, direction);
                }
            }
        }
    }
}
