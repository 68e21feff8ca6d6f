//! Deterministic in-memory server implementing the `timeline_protocol`
//! transport contract.
//!
//! The server keeps one canonical log per agent and answers fetch requests the
//! way a real server would, including `reset` responses for cursors issued
//! under a retired epoch. Responses and live events are queued in an outbox;
//! tests either drain it by hand (to drop, duplicate or reorder frames) or
//! install a delivery callback for hands-off operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;
use timeline_protocol::{
    AgentId, AgentStatus, AgentStatusSnapshot, AgentStreamMessage, Epoch, FetchDirection,
    FetchRequest, FetchResponse, InboundMessage, SeqCursor, StreamEvent, StreamItem,
    TimelineEntry, TimelineTransport, TransportError,
};

/// Provider name stamped on every entry.
pub const MOCK_PROVIDER: &str = "mock";

type Delivery = Box<dyn Fn(InboundMessage) + Send + Sync>;

#[derive(Debug, Clone)]
struct AgentLog {
    epoch: Epoch,
    entries: Vec<TimelineEntry>,
}

impl AgentLog {
    fn next_seq(&self) -> u64 {
        self.entries.last().map_or(1, |entry| entry.seq + 1)
    }
}

#[derive(Default)]
struct ServerState {
    logs: HashMap<AgentId, AgentLog>,
    outbox: VecDeque<InboundMessage>,
    requests: Vec<FetchRequest>,
    fail_next: Option<String>,
    closed: bool,
    epoch_counter: u64,
}

/// In-memory timeline server.
#[derive(Default)]
pub struct MockTimelineServer {
    state: Mutex<ServerState>,
    delivery: Mutex<Option<Delivery>>,
}

impl MockTimelineServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every queued frame to `deliver` instead of the outbox.
    pub fn connect(&self, deliver: impl Fn(InboundMessage) + Send + Sync + 'static) {
        *lock_unpoisoned(&self.delivery) = Some(Box::new(deliver));
        let pending = std::mem::take(&mut lock_unpoisoned(&self.state).outbox);
        for message in pending {
            self.dispatch(message);
        }
    }

    /// Current epoch of an agent's log, creating the log on first use.
    pub fn epoch(&self, agent_id: &AgentId) -> Epoch {
        let mut state = lock_unpoisoned(&self.state);
        ensure_log(&mut state, agent_id).epoch.clone()
    }

    /// Appends an item to the canonical log without pushing a live event.
    pub fn append(&self, agent_id: &AgentId, item: StreamItem) -> (Epoch, TimelineEntry) {
        let mut state = lock_unpoisoned(&self.state);
        let log = ensure_log(&mut state, agent_id);
        let entry = TimelineEntry {
            seq: log.next_seq(),
            provider: MOCK_PROVIDER.to_string(),
            timestamp: item.timestamp,
            item,
        };
        log.entries.push(entry.clone());
        (log.epoch.clone(), entry)
    }

    /// Appends an item and pushes the matching sequenced live event.
    pub fn publish(&self, agent_id: &AgentId, item: StreamItem) -> InboundMessage {
        let (epoch, entry) = self.append(agent_id, item);
        let message = InboundMessage::AgentStream(
            AgentStreamMessage::new(
                agent_id.clone(),
                StreamEvent::Timeline { item: entry.item },
                entry.timestamp,
            )
            .sequenced(epoch, entry.seq),
        );
        self.dispatch(message.clone());
        message
    }

    /// Pushes an unsequenced live event (deltas, turn markers).
    pub fn push_event(
        &self,
        agent_id: &AgentId,
        event: StreamEvent,
        timestamp: OffsetDateTime,
    ) -> InboundMessage {
        let message =
            InboundMessage::AgentStream(AgentStreamMessage::new(agent_id.clone(), event, timestamp));
        self.dispatch(message.clone());
        message
    }

    /// Pushes an authoritative status snapshot.
    pub fn push_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        at: OffsetDateTime,
    ) -> InboundMessage {
        let message = InboundMessage::AgentUpdate(AgentStatusSnapshot {
            agent_id: agent_id.clone(),
            status,
            updated_at: at,
            last_activity_at: at,
            title: None,
        });
        self.dispatch(message.clone());
        message
    }

    /// Simulates a server restart: the log is kept but a new epoch is issued.
    pub fn rollover_epoch(&self, agent_id: &AgentId) -> Epoch {
        let mut state = lock_unpoisoned(&self.state);
        state.epoch_counter += 1;
        let epoch = Epoch::new(format!("epoch-{}", state.epoch_counter));
        ensure_log(&mut state, agent_id).epoch = epoch.clone();
        epoch
    }

    /// Answers the next fetch request with a transport-reported error.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        lock_unpoisoned(&self.state).fail_next = Some(message.into());
    }

    /// Makes `send_fetch` refuse requests outright.
    pub fn close(&self) {
        lock_unpoisoned(&self.state).closed = true;
    }

    /// Takes every queued frame in delivery order.
    pub fn drain(&self) -> Vec<InboundMessage> {
        lock_unpoisoned(&self.state).outbox.drain(..).collect()
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        lock_unpoisoned(&self.state).requests.clone()
    }

    /// Full canonical log of an agent.
    pub fn log(&self, agent_id: &AgentId) -> Vec<TimelineEntry> {
        lock_unpoisoned(&self.state)
            .logs
            .get(agent_id)
            .map(|log| log.entries.clone())
            .unwrap_or_default()
    }

    fn dispatch(&self, message: InboundMessage) {
        let delivery = lock_unpoisoned(&self.delivery);
        match delivery.as_ref() {
            Some(deliver) => deliver(message),
            None => lock_unpoisoned(&self.state).outbox.push_back(message),
        }
    }
}

impl TimelineTransport for MockTimelineServer {
    fn send_fetch(&self, request: FetchRequest) -> Result<(), TransportError> {
        let response = {
            let mut state = lock_unpoisoned(&self.state);
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.requests.push(request.clone());
            let fail_next = state.fail_next.take();
            let log = ensure_log(&mut state, &request.agent_id).clone();
            match fail_next {
                Some(error) => FetchResponse::failed(
                    request.agent_id.clone(),
                    request.direction,
                    log.epoch,
                    error,
                ),
                None => answer(&log, &request),
            }
        };

        self.dispatch(InboundMessage::TimelineFetch(response));
        Ok(())
    }
}

fn ensure_log<'a>(state: &'a mut ServerState, agent_id: &AgentId) -> &'a mut AgentLog {
    state
        .logs
        .entry(agent_id.clone())
        .or_insert_with(|| AgentLog {
            epoch: Epoch::new("epoch-0"),
            entries: Vec::new(),
        })
}

fn answer(log: &AgentLog, request: &FetchRequest) -> FetchResponse {
    let limit = request.limit.max(1) as usize;
    let anchored = request
        .cursor
        .as_ref()
        .filter(|cursor| cursor.epoch == log.epoch);

    let (direction_window, reset) = match (request.direction, anchored, &request.cursor) {
        (FetchDirection::Tail, _, _) | (_, None, None) => (Window::Tail, false),
        (_, None, Some(_)) => (Window::Tail, true),
        (FetchDirection::After, Some(cursor), _) => (Window::After(cursor.seq), false),
        (FetchDirection::Before, Some(cursor), _) => (Window::Before(cursor.seq), false),
    };

    let (entries, has_older, has_newer) = match direction_window {
        Window::Tail => {
            let skip = log.entries.len().saturating_sub(limit);
            (log.entries[skip..].to_vec(), skip > 0, false)
        }
        Window::After(seq) => {
            let newer: Vec<_> = log.entries.iter().filter(|e| e.seq > seq).collect();
            let page: Vec<_> = newer.iter().take(limit).map(|e| (*e).clone()).collect();
            let has_older = log.entries.first().is_some_and(|first| first.seq <= seq);
            (page, has_older, newer.len() > limit)
        }
        Window::Before(seq) => {
            let older: Vec<_> = log.entries.iter().filter(|e| e.seq < seq).collect();
            let skip = older.len().saturating_sub(limit);
            let page = older[skip..].iter().map(|e| (*e).clone()).collect();
            (page, skip > 0, true)
        }
    };

    let fallback_end = match direction_window {
        Window::After(seq) if !reset => Some(seq),
        _ => None,
    };

    FetchResponse {
        agent_id: request.agent_id.clone(),
        direction: request.direction,
        reset,
        epoch: log.epoch.clone(),
        start_cursor: entries.first().map(|entry| SeqCursor { seq: entry.seq }),
        end_cursor: entries
            .last()
            .map(|entry| entry.seq)
            .or(fallback_end)
            .map(|seq| SeqCursor { seq }),
        entries,
        error: None,
        has_older,
        has_newer,
    }
}

enum Window {
    Tail,
    After(u64),
    Before(u64),
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
