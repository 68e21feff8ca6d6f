//! Per-agent synchronization state machine.
//!
//! Every input runs through the pure components in `core`; results are
//! written to the [`TimelineStore`] and any follow-up work (fetches, waiter
//! resolution) is returned as [`TimelineEffect`]s for the host to perform.

use std::collections::HashMap;

use time::OffsetDateTime;
use timeline_protocol::{
    AgentId, AgentStatusSnapshot, AgentStreamMessage, Epoch, FetchCursor, FetchDirection,
    FetchRequest, FetchResponse, InboundMessage, ItemId, StreamEvent, StreamItem, TimelineEntry,
    TurnOutcome,
};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::core::bootstrap::{self, BootstrapInput};
use crate::core::init_resolution::{self, InitResolutionInput};
use crate::core::lifecycle::{self, StatusView};
use crate::core::reducer::{self, EventSource};
use crate::core::sequence_gate::{self, CatchUpAnchor, Cursor, GateDecision, GateInput};
use crate::runtime::agent::{AgentTimeline, TimelineView};
use crate::runtime::counters::SyncCounters;
use crate::runtime::effects::TimelineEffect;
use crate::runtime::store::TimelineStore;

/// What [`TimelineCoordinator::begin_initial_sync`] started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSync {
    /// Direction the caller's waiter is settled under.
    pub direction: FetchDirection,
    /// Empty when an initial sync was already pending, or when an in-flight
    /// catch-up will settle it.
    pub effects: Vec<TimelineEffect>,
}

pub struct TimelineCoordinator<S> {
    config: CoordinatorConfig,
    store: S,
    agents: HashMap<AgentId, AgentTimeline>,
    counters: SyncCounters,
}

impl<S: TimelineStore> TimelineCoordinator<S> {
    pub fn new(config: CoordinatorConfig, store: S) -> Self {
        Self {
            config,
            store,
            agents: HashMap::new(),
            counters: SyncCounters::default(),
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    pub fn counters(&self) -> SyncCounters {
        self.counters
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeline(&self, agent_id: &AgentId) -> Option<TimelineView<'_>> {
        self.agents.get(agent_id).map(TimelineView::from)
    }

    /// Starts the first sync for an agent: a `tail` fetch when nothing is
    /// loaded yet, otherwise an `after` fetch from the current cursor. An
    /// `after` catch-up already in flight is reused instead of sending another.
    pub fn begin_initial_sync(&mut self, agent_id: &AgentId) -> InitialSync {
        let agent = self.agents.entry(agent_id.clone()).or_default();
        if let Some(direction) = agent.pending_init {
            debug!(
                agent_id = %agent_id,
                direction = direction.as_str(),
                "initial sync already pending"
            );
            return InitialSync {
                direction,
                effects: Vec::new(),
            };
        }

        let (direction, cursor) = match &agent.cursor {
            Some(cursor) => (
                FetchDirection::After,
                Some(cursor.catch_up_anchor().fetch_cursor()),
            ),
            None => (FetchDirection::Tail, None),
        };
        agent.initializing = true;
        agent.pending_init = Some(direction);
        self.store.write_initializing(agent_id, true);

        if direction == FetchDirection::After {
            if agent.catch_up_in_flight {
                debug!(
                    agent_id = %agent_id,
                    "initial sync waits on the in-flight catch-up"
                );
                return InitialSync {
                    direction,
                    effects: Vec::new(),
                };
            }
            agent.catch_up_in_flight = true;
        }
        info!(
            agent_id = %agent_id,
            direction = direction.as_str(),
            "initial sync started"
        );

        InitialSync {
            direction,
            effects: vec![TimelineEffect::Fetch(fetch_request(
                &self.config,
                agent_id,
                direction,
                cursor,
            ))],
        }
    }

    pub fn handle_fetch_response(&mut self, response: FetchResponse) -> Vec<TimelineEffect> {
        let agent_id = response.agent_id.clone();
        match self.scope(&agent_id) {
            Some(mut scope) => scope.fetch_response(&response),
            None => {
                debug!(agent_id = %agent_id, "fetch response for unknown agent dropped");
                Vec::new()
            }
        }
    }

    /// Fails an outstanding request that never produced a response.
    pub fn handle_fetch_failure(
        &mut self,
        request: &FetchRequest,
        error: &str,
    ) -> Vec<TimelineEffect> {
        match self.scope(&request.agent_id) {
            Some(mut scope) => scope.fetch_failed(request.direction, error),
            None => Vec::new(),
        }
    }

    pub fn handle_stream_event(&mut self, message: AgentStreamMessage) -> Vec<TimelineEffect> {
        let agent_id = message.agent_id.clone();
        self.scope_or_insert(&agent_id).stream_event(&message)
    }

    /// Authoritative status always replaces whatever was derived locally.
    pub fn handle_status_snapshot(&mut self, snapshot: &AgentStatusSnapshot) {
        let view = StatusView::from(snapshot);
        let scope = self.scope_or_insert(&snapshot.agent_id);
        scope.agent.status = Some(view);
        scope.store.write_status(&snapshot.agent_id, view);
    }

    pub fn handle_inbound(&mut self, message: InboundMessage) -> Vec<TimelineEffect> {
        match message {
            InboundMessage::TimelineFetch(response) => self.handle_fetch_response(response),
            InboundMessage::AgentStream(message) => self.handle_stream_event(message),
            InboundMessage::AgentUpdate(snapshot) => {
                self.handle_status_snapshot(&snapshot);
                Vec::new()
            }
            InboundMessage::AgentDeleted { agent_id } => self.remove_agent(&agent_id),
        }
    }

    /// Requests the page before the oldest loaded entry. No-op while a page
    /// is loading or when the server reported nothing older.
    pub fn load_older(&mut self, agent_id: &AgentId) -> Vec<TimelineEffect> {
        match self.scope(agent_id) {
            Some(mut scope) => scope.load_older(),
            None => Vec::new(),
        }
    }

    /// Shows a user message immediately. The server's echo with the same id
    /// replaces it.
    pub fn record_local_user_message(
        &mut self,
        agent_id: &AgentId,
        text: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> ItemId {
        let id = ItemId::generate();
        let item = StreamItem::user_message(id.clone(), timestamp, text);
        let mut scope = self.scope_or_insert(agent_id);
        let (changed_tail, changed_head) = scope.fold(&item, EventSource::Provisional);
        scope.publish(changed_tail, changed_head, false);
        id
    }

    /// Drops all state for an agent and cancels its pending init waiter.
    pub fn remove_agent(&mut self, agent_id: &AgentId) -> Vec<TimelineEffect> {
        self.store.remove_agent(agent_id);
        let Some(agent) = self.agents.remove(agent_id) else {
            return Vec::new();
        };
        info!(agent_id = %agent_id, "agent removed");
        agent
            .pending_init
            .map(|direction| TimelineEffect::CancelInit {
                agent_id: agent_id.clone(),
                direction,
            })
            .into_iter()
            .collect()
    }

    fn scope<'a>(&'a mut self, agent_id: &'a AgentId) -> Option<AgentScope<'a, S>> {
        let agent = self.agents.get_mut(agent_id)?;
        Some(AgentScope {
            agent_id,
            agent,
            config: &self.config,
            store: &mut self.store,
            counters: &mut self.counters,
        })
    }

    fn scope_or_insert<'a>(&'a mut self, agent_id: &'a AgentId) -> AgentScope<'a, S> {
        AgentScope {
            agent_id,
            agent: self.agents.entry(agent_id.clone()).or_default(),
            config: &self.config,
            store: &mut self.store,
            counters: &mut self.counters,
        }
    }
}

/// One agent's state together with the coordinator-wide pieces it updates.
struct AgentScope<'a, S> {
    agent_id: &'a AgentId,
    agent: &'a mut AgentTimeline,
    config: &'a CoordinatorConfig,
    store: &'a mut S,
    counters: &'a mut SyncCounters,
}

impl<S: TimelineStore> AgentScope<'_, S> {
    fn fetch_response(&mut self, response: &FetchResponse) -> Vec<TimelineEffect> {
        if let Some(error) = response.error.as_deref() {
            return self.fetch_failed(response.direction, error);
        }

        let decision = bootstrap::decide(BootstrapInput {
            direction: response.direction,
            reset: response.reset,
            epoch: &response.epoch,
            end_seq: response.end_seq(),
            has_cursor: self.agent.cursor.is_some(),
            has_newer: response.has_newer,
            is_initializing: self.agent.initializing,
            has_active_init_deferred: self.agent.pending_init.is_some(),
            newest_known_seq: self.agent.newest_known_in(&response.epoch),
        });

        let mut effects = Vec::new();
        let stale = if decision.replace {
            self.replace(response, decision.catch_up, &mut effects);
            false
        } else if response.direction == FetchDirection::Before {
            self.prepend(response)
        } else {
            self.merge_forward(response, &mut effects)
        };

        self.settle_init(response, stale, &mut effects);
        effects
    }

    fn fetch_failed(&mut self, direction: FetchDirection, error: &str) -> Vec<TimelineEffect> {
        self.counters.fetch_errors += 1;
        warn!(
            agent_id = %self.agent_id,
            direction = direction.as_str(),
            error,
            "timeline fetch failed"
        );
        match direction {
            FetchDirection::Before => self.agent.loading_older = false,
            FetchDirection::Tail | FetchDirection::After => self.agent.catch_up_in_flight = false,
        }

        let mut effects = Vec::new();
        if let Some(pending) = self.agent.pending_init.take() {
            warn!(agent_id = %self.agent_id, "initial sync rejected");
            effects.push(TimelineEffect::RejectInit {
                agent_id: self.agent_id.clone(),
                direction: pending,
                error: error.to_string(),
            });
        }
        self.set_initializing(false);
        effects
    }

    /// Rebuilds the transcript from a response.
    fn replace(
        &mut self,
        response: &FetchResponse,
        catch_up: Option<CatchUpAnchor>,
        effects: &mut Vec<TimelineEffect>,
    ) {
        self.counters.bootstraps += 1;

        let agent = &mut *self.agent;
        agent.tail = reducer::hydrate(&response.entries);
        let head_cleared = reducer::clear_head(&mut agent.head);
        agent.cursor = response.end_seq().map(|end_seq| {
            let start_seq = response.start_seq().unwrap_or(end_seq);
            Cursor::spanning(response.epoch.clone(), start_seq, end_seq)
        });
        agent.history_floor = response.start_seq();
        agent.has_older = response.has_older;
        agent.loading_older = false;
        agent.catch_up_in_flight = false;
        if agent.newest_known_in(&response.epoch).is_none() {
            agent.newest_known = None;
        }

        info!(
            agent_id = %self.agent_id,
            epoch = %response.epoch,
            direction = response.direction.as_str(),
            reset = response.reset,
            entries = response.entries.len(),
            end_seq = ?response.end_seq(),
            "timeline replaced from fetch"
        );
        self.publish(true, head_cleared, true);

        if let Some(anchor) = catch_up {
            effects.extend(self.schedule_catch_up(anchor));
        }
    }

    /// Folds a `before` page in front of the tail. Returns true when the page
    /// belongs to a retired epoch.
    fn prepend(&mut self, response: &FetchResponse) -> bool {
        self.agent.loading_older = false;
        if self.is_retired(&response.epoch) {
            self.drop_stale_response(response);
            return true;
        }

        let tail = std::mem::take(&mut self.agent.tail);
        let (tail, changed) = reducer::prepend_history(tail, &response.entries);
        self.agent.tail = tail;
        if let Some(start_seq) = response.start_seq() {
            self.agent.history_floor = Some(
                self.agent
                    .history_floor
                    .map_or(start_seq, |floor| floor.min(start_seq)),
            );
        }
        self.agent.has_older = response.has_older;
        debug!(
            agent_id = %self.agent_id,
            entries = response.entries.len(),
            has_older = response.has_older,
            "older history loaded"
        );
        self.publish(changed, false, false);
        false
    }

    /// Gates each entry of a forward page against the cursor. Returns true
    /// when the page belongs to a retired epoch.
    fn merge_forward(&mut self, response: &FetchResponse, effects: &mut Vec<TimelineEffect>) -> bool {
        if self.is_retired(&response.epoch) {
            self.drop_stale_response(response);
            return true;
        }
        if response.direction == FetchDirection::After {
            self.agent.catch_up_in_flight = false;
        }

        let mut entries: Vec<&TimelineEntry> = response.entries.iter().collect();
        entries.sort_by_key(|entry| entry.seq);

        let (mut changed_tail, mut changed_head, mut cursor_changed) = (false, false, false);
        let mut gap_anchor = None;
        for entry in entries {
            let decision = self.gate(&response.epoch, entry.seq);
            match decision {
                GateDecision::Init | GateDecision::Accept => {
                    let (tail, head) = self.fold(&entry.item, EventSource::Canonical);
                    changed_tail |= tail;
                    changed_head |= head;
                    self.advance(decision, &response.epoch, entry.seq);
                    cursor_changed = true;
                }
                GateDecision::DropStale => {}
                GateDecision::DropEpoch => break,
                GateDecision::Gap => {
                    self.agent.note_newest(&response.epoch, entry.seq);
                    gap_anchor = self.agent.cursor.as_ref().map(Cursor::catch_up_anchor);
                    break;
                }
            }
        }
        self.publish(changed_tail, changed_head, cursor_changed);

        let anchor = gap_anchor.or_else(|| {
            (response.has_newer || self.agent.behind_live())
                .then(|| self.agent.cursor.as_ref().map(Cursor::catch_up_anchor))
                .flatten()
        });
        if let Some(anchor) = anchor {
            effects.extend(self.schedule_catch_up(anchor));
        }
        false
    }

    fn settle_init(
        &mut self,
        response: &FetchResponse,
        stale: bool,
        effects: &mut Vec<TimelineEffect>,
    ) {
        let resolve = init_resolution::should_resolve(InitResolutionInput {
            has_active_init_deferred: self.agent.pending_init.is_some(),
            is_initializing: self.agent.initializing,
            init_request_direction: self.agent.pending_init,
            response_direction: response.direction,
            reset: response.reset,
            response_stale: stale,
        });

        if resolve {
            if let Some(direction) = self.agent.pending_init.take() {
                info!(
                    agent_id = %self.agent_id,
                    direction = direction.as_str(),
                    "initial sync resolved"
                );
                effects.push(TimelineEffect::ResolveInit {
                    agent_id: self.agent_id.clone(),
                    direction,
                });
            }
            self.set_initializing(false);
        } else if self.agent.initializing && self.agent.pending_init.is_none() {
            self.set_initializing(false);
        }
    }

    fn stream_event(&mut self, message: &AgentStreamMessage) -> Vec<TimelineEffect> {
        let mut effects = Vec::new();
        match (&message.event, message.gate_position()) {
            (StreamEvent::Timeline { item }, Some((epoch, seq))) => {
                self.gated_item(item, epoch, seq, &mut effects);
            }
            (event, _) => {
                let tail = std::mem::take(&mut self.agent.tail);
                let head = std::mem::take(&mut self.agent.head);
                let outcome =
                    reducer::apply(tail, head, event, message.timestamp, EventSource::Provisional);
                let (changed_tail, changed_head) = (outcome.changed_tail, outcome.changed_head);
                self.agent.tail = outcome.tail;
                self.agent.head = outcome.head;
                self.publish(changed_tail, changed_head, false);
            }
        }

        if let Some(outcome) = message.event.turn_outcome() {
            self.apply_turn_outcome(outcome, message.timestamp);
        }
        effects
    }

    fn gated_item(
        &mut self,
        item: &StreamItem,
        epoch: &Epoch,
        seq: u64,
        effects: &mut Vec<TimelineEffect>,
    ) {
        if self.agent.cursor.is_none() && self.agent.initializing {
            self.agent.note_newest(epoch, seq);
            debug!(
                agent_id = %self.agent_id,
                epoch = %epoch,
                seq,
                "live event held until bootstrap completes"
            );
            return;
        }

        let decision = self.gate(epoch, seq);
        match decision {
            GateDecision::Init | GateDecision::Accept => {
                let (changed_tail, changed_head) = self.fold(item, EventSource::Canonical);
                self.advance(decision, epoch, seq);
                self.publish(changed_tail, changed_head, true);
            }
            GateDecision::DropStale => {
                debug!(agent_id = %self.agent_id, epoch = %epoch, seq, "duplicate live event dropped");
            }
            GateDecision::DropEpoch => {
                debug!(agent_id = %self.agent_id, epoch = %epoch, seq, "live event from retired epoch dropped");
            }
            GateDecision::Gap => {
                self.agent.note_newest(epoch, seq);
                if let Some(anchor) = self.agent.cursor.as_ref().map(Cursor::catch_up_anchor) {
                    info!(
                        agent_id = %self.agent_id,
                        epoch = %epoch,
                        seq,
                        end_seq = anchor.end_seq,
                        "gap detected"
                    );
                    effects.extend(self.schedule_catch_up(anchor));
                }
            }
        }
    }

    fn apply_turn_outcome(&mut self, outcome: TurnOutcome, at: OffsetDateTime) {
        let Some(current) = self.agent.status else {
            return;
        };
        if let Some(patch) = lifecycle::derive_patch(current, outcome, at) {
            let view = patch.into_view();
            debug!(
                agent_id = %self.agent_id,
                status = view.status.as_str(),
                "optimistic status applied"
            );
            self.agent.status = Some(view);
            self.store.write_status(self.agent_id, view);
        }
    }

    fn load_older(&mut self) -> Vec<TimelineEffect> {
        if self.agent.loading_older || !self.agent.has_older {
            return Vec::new();
        }
        let Some(cursor) = &self.agent.cursor else {
            return Vec::new();
        };

        let anchor = FetchCursor {
            epoch: cursor.epoch.clone(),
            seq: self.agent.history_floor.unwrap_or(cursor.start_seq),
        };
        self.agent.loading_older = true;
        debug!(agent_id = %self.agent_id, seq = anchor.seq, "loading older history");
        vec![TimelineEffect::Fetch(fetch_request(
            self.config,
            self.agent_id,
            FetchDirection::Before,
            Some(anchor),
        ))]
    }

    fn schedule_catch_up(&mut self, anchor: CatchUpAnchor) -> Option<TimelineEffect> {
        if self.agent.catch_up_in_flight {
            debug!(agent_id = %self.agent_id, "catch-up already in flight");
            return None;
        }
        self.agent.catch_up_in_flight = true;
        self.counters.catch_ups_scheduled += 1;
        info!(
            agent_id = %self.agent_id,
            epoch = %anchor.epoch,
            end_seq = anchor.end_seq,
            "catch-up scheduled"
        );
        Some(TimelineEffect::Fetch(fetch_request(
            self.config,
            self.agent_id,
            FetchDirection::After,
            Some(anchor.fetch_cursor()),
        )))
    }

    fn gate(&mut self, epoch: &Epoch, seq: u64) -> GateDecision {
        let decision = sequence_gate::classify(GateInput {
            cursor: self.agent.cursor.as_ref(),
            epoch,
            seq,
        });
        self.counters.record_gate(decision);
        decision
    }

    fn advance(&mut self, decision: GateDecision, epoch: &Epoch, seq: u64) {
        if let Some(cursor) =
            sequence_gate::next_cursor(self.agent.cursor.as_ref(), decision, epoch, seq)
        {
            self.agent.cursor = Some(cursor);
        }
    }

    fn fold(&mut self, item: &StreamItem, source: EventSource) -> (bool, bool) {
        let tail = std::mem::take(&mut self.agent.tail);
        let head = std::mem::take(&mut self.agent.head);
        let outcome = reducer::apply_item(tail, head, item, source);
        self.agent.tail = outcome.tail;
        self.agent.head = outcome.head;
        (outcome.changed_tail, outcome.changed_head)
    }

    fn publish(&mut self, tail: bool, head: bool, cursor: bool) {
        if tail {
            self.store.write_tail(self.agent_id, &self.agent.tail);
        }
        if head {
            self.store.write_head(self.agent_id, &self.agent.head);
        }
        if cursor {
            self.store.write_cursor(self.agent_id, self.agent.cursor.as_ref());
        }
    }

    fn set_initializing(&mut self, initializing: bool) {
        if self.agent.initializing != initializing {
            self.agent.initializing = initializing;
            self.store.write_initializing(self.agent_id, initializing);
        }
    }

    fn is_retired(&self, epoch: &Epoch) -> bool {
        self.agent
            .cursor
            .as_ref()
            .is_some_and(|cursor| cursor.epoch != *epoch)
    }

    fn drop_stale_response(&mut self, response: &FetchResponse) {
        self.counters.dropped_epoch += response.entries.len() as u64;
        debug!(
            agent_id = %self.agent_id,
            epoch = %response.epoch,
            direction = response.direction.as_str(),
            "fetch response from retired epoch dropped"
        );
    }
}

fn fetch_request(
    config: &CoordinatorConfig,
    agent_id: &AgentId,
    direction: FetchDirection,
    cursor: Option<FetchCursor>,
) -> FetchRequest {
    FetchRequest {
        agent_id: agent_id.clone(),
        direction,
        cursor,
        limit: config.fetch_limit,
        projection: config.projection,
    }
}
