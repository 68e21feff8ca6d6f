//! Pending "wait until first sync" futures.

use std::collections::HashMap;

use timeline_protocol::{AgentId, FetchDirection};
use tokio::sync::oneshot;

use crate::error::InitError;

pub type InitReply = oneshot::Sender<Result<(), InitError>>;

/// Waiters keyed by agent and the direction of the fetch they wait on.
/// Several callers may wait on the same key; they settle together.
#[derive(Debug, Default)]
pub struct InitWaiters {
    waiters: HashMap<(AgentId, FetchDirection), Vec<InitReply>>,
}

impl InitWaiters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_id: AgentId, direction: FetchDirection, reply: InitReply) {
        self.waiters
            .entry((agent_id, direction))
            .or_default()
            .push(reply);
    }

    /// Completes every waiter under the key. Returns how many were waiting.
    pub fn resolve(&mut self, agent_id: &AgentId, direction: FetchDirection) -> usize {
        self.settle(agent_id, direction, || Ok(()))
    }

    pub fn reject(&mut self, agent_id: &AgentId, direction: FetchDirection, message: &str) -> usize {
        self.settle(agent_id, direction, || {
            Err(InitError::Rejected {
                agent_id: agent_id.clone(),
                message: message.to_string(),
            })
        })
    }

    pub fn cancel(&mut self, agent_id: &AgentId, direction: FetchDirection) -> usize {
        self.settle(agent_id, direction, || {
            Err(InitError::Cancelled {
                agent_id: agent_id.clone(),
            })
        })
    }

    /// Fails every outstanding waiter with [`InitError::DriverStopped`].
    pub fn stop_all(&mut self) -> usize {
        let mut settled = 0;
        for (_, replies) in self.waiters.drain() {
            for reply in replies {
                let _ = reply.send(Err(InitError::DriverStopped));
                settled += 1;
            }
        }
        settled
    }

    fn settle(
        &mut self,
        agent_id: &AgentId,
        direction: FetchDirection,
        outcome: impl Fn() -> Result<(), InitError>,
    ) -> usize {
        let Some(replies) = self.waiters.remove(&(agent_id.clone(), direction)) else {
            return 0;
        };
        let count = replies.len();
        for reply in replies {
            // The caller may have stopped waiting.
            let _ = reply.send(outcome());
        }
        count
    }
}
