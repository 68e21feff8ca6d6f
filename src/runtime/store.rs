//! Destination for per-agent state the coordinator publishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use timeline_protocol::{AgentId, StreamItem};

use crate::core::lifecycle::StatusView;
use crate::core::sequence_gate::Cursor;

/// Reactive store the coordinator writes after each mutation.
///
/// Writes are whole-value replacements; implementations never need to merge.
pub trait TimelineStore {
    fn write_tail(&mut self, agent_id: &AgentId, tail: &[StreamItem]);
    fn write_head(&mut self, agent_id: &AgentId, head: &[StreamItem]);
    fn write_cursor(&mut self, agent_id: &AgentId, cursor: Option<&Cursor>);
    fn write_initializing(&mut self, agent_id: &AgentId, initializing: bool);
    fn write_status(&mut self, agent_id: &AgentId, status: StatusView);
    fn remove_agent(&mut self, agent_id: &AgentId);
}

/// Last published state of one agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub cursor: Option<Cursor>,
    pub tail: Vec<StreamItem>,
    pub head: Vec<StreamItem>,
    pub initializing: bool,
    pub status: Option<StatusView>,
}

impl AgentSnapshot {
    /// Tail followed by head, the order a transcript renders in.
    #[must_use]
    pub fn items(&self) -> Vec<&StreamItem> {
        self.tail.iter().chain(self.head.iter()).collect()
    }
}

/// Shareable in-memory store. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    agents: Arc<Mutex<HashMap<AgentId, AgentSnapshot>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, agent_id: &AgentId) -> Option<AgentSnapshot> {
        lock_unpoisoned(&self.agents).get(agent_id).cloned()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = lock_unpoisoned(&self.agents).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn update(&self, agent_id: &AgentId, apply: impl FnOnce(&mut AgentSnapshot)) {
        let mut agents = lock_unpoisoned(&self.agents);
        apply(agents.entry(agent_id.clone()).or_default());
    }
}

impl TimelineStore for MemoryStore {
    fn write_tail(&mut self, agent_id: &AgentId, tail: &[StreamItem]) {
        self.update(agent_id, |snapshot| snapshot.tail = tail.to_vec());
    }

    fn write_head(&mut self, agent_id: &AgentId, head: &[StreamItem]) {
        self.update(agent_id, |snapshot| snapshot.head = head.to_vec());
    }

    fn write_cursor(&mut self, agent_id: &AgentId, cursor: Option<&Cursor>) {
        self.update(agent_id, |snapshot| snapshot.cursor = cursor.cloned());
    }

    fn write_initializing(&mut self, agent_id: &AgentId, initializing: bool) {
        self.update(agent_id, |snapshot| snapshot.initializing = initializing);
    }

    fn write_status(&mut self, agent_id: &AgentId, status: StatusView) {
        self.update(agent_id, |snapshot| snapshot.status = Some(status));
    }

    fn remove_agent(&mut self, agent_id: &AgentId) {
        lock_unpoisoned(&self.agents).remove(agent_id);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
