//! Folds accepted events into an agent's head/tail item buffers.
//!
//! The tail holds the canonical transcript. The head holds provisional items
//! of the in-flight turn until their canonical counterpart lands in the tail,
//! at which point the head copy is evicted. Items are unique by id across
//! both buffers.

mod merge;
mod text;

use time::OffsetDateTime;
use timeline_protocol::{ItemId, StreamEvent, StreamItem, TimelineEntry};

use merge::merge_item;

/// Where an event came from, which decides the buffer it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Gate-accepted live timeline events and fetched entries.
    Canonical,
    /// Unsequenced events and optimistic local items.
    Provisional,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReduceOutcome {
    pub tail: Vec<StreamItem>,
    pub head: Vec<StreamItem>,
    pub changed_tail: bool,
    pub changed_head: bool,
}

impl ReduceOutcome {
    fn unchanged(tail: Vec<StreamItem>, head: Vec<StreamItem>) -> Self {
        Self {
            tail,
            head,
            changed_tail: false,
            changed_head: false,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.changed_tail || self.changed_head
    }
}

/// Folds one event into the buffers.
///
/// Turn markers carry no item and leave both buffers as they are. Text
/// deltas append verbatim; a delta for an item the tail already holds is
/// dropped.
#[must_use]
pub fn apply(
    tail: Vec<StreamItem>,
    head: Vec<StreamItem>,
    event: &StreamEvent,
    timestamp: OffsetDateTime,
    source: EventSource,
) -> ReduceOutcome {
    match event_item(event, timestamp) {
        Some(item) => apply_item(tail, head, &item, source),
        None => ReduceOutcome::unchanged(tail, head),
    }
}

/// Folds one item into the buffers, routed by `source`.
#[must_use]
pub fn apply_item(
    mut tail: Vec<StreamItem>,
    mut head: Vec<StreamItem>,
    item: &StreamItem,
    source: EventSource,
) -> ReduceOutcome {
    match source {
        EventSource::Canonical => {
            let changed_tail = upsert(&mut tail, item);
            let changed_head = evict(&mut head, &item.id);
            ReduceOutcome {
                tail,
                head,
                changed_tail,
                changed_head,
            }
        }
        EventSource::Provisional => {
            if contains(&tail, &item.id) {
                return ReduceOutcome::unchanged(tail, head);
            }
            let changed_head = upsert(&mut head, item);
            ReduceOutcome {
                tail,
                head,
                changed_tail: false,
                changed_head,
            }
        }
    }
}

/// Builds a tail from fetched entries: seq order, repeated seqs skipped.
#[must_use]
pub fn hydrate(entries: &[TimelineEntry]) -> Vec<StreamItem> {
    let mut tail = Vec::with_capacity(entries.len());
    for entry in ordered_unique(entries) {
        upsert(&mut tail, &entry.item);
    }
    tail
}

/// Folds older entries in front of `tail`. Items whose id is already present
/// are skipped. Returns the new tail and whether anything was added.
#[must_use]
pub fn prepend_history(tail: Vec<StreamItem>, entries: &[TimelineEntry]) -> (Vec<StreamItem>, bool) {
    let older: Vec<StreamItem> = hydrate(entries)
        .into_iter()
        .filter(|item| !contains(&tail, &item.id))
        .collect();
    if older.is_empty() {
        return (tail, false);
    }

    let mut merged = older;
    merged.extend(tail);
    (merged, true)
}

/// Drops every provisional item. Returns whether the head was non-empty.
pub fn clear_head(head: &mut Vec<StreamItem>) -> bool {
    let had_items = !head.is_empty();
    head.clear();
    had_items
}

/// Item payload an event contributes, if any.
fn event_item(event: &StreamEvent, timestamp: OffsetDateTime) -> Option<StreamItem> {
    match event {
        StreamEvent::Timeline { item } => Some(item.clone()),
        StreamEvent::AssistantDelta { item_id, delta } => Some(StreamItem::assistant_message(
            item_id.clone(),
            timestamp,
            delta.as_str(),
        )),
        StreamEvent::ThoughtDelta { item_id, delta } => {
            Some(StreamItem::thought(item_id.clone(), timestamp, delta.as_str()))
        }
        StreamEvent::TurnStarted
        | StreamEvent::TurnCompleted
        | StreamEvent::TurnCanceled { .. }
        | StreamEvent::TurnFailed { .. } => None,
    }
}

fn ordered_unique(entries: &[TimelineEntry]) -> impl Iterator<Item = &TimelineEntry> {
    let mut sorted: Vec<&TimelineEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| entry.seq);
    sorted.dedup_by_key(|entry| entry.seq);
    sorted.into_iter()
}

fn upsert(buffer: &mut Vec<StreamItem>, item: &StreamItem) -> bool {
    match buffer.iter_mut().find(|existing| existing.id == item.id) {
        Some(existing) => merge_item(existing, item),
        None => {
            buffer.push(item.clone());
            true
        }
    }
}

fn evict(buffer: &mut Vec<StreamItem>, id: &ItemId) -> bool {
    let before = buffer.len();
    buffer.retain(|item| item.id != *id);
    buffer.len() != before
}

fn contains(buffer: &[StreamItem], id: &ItemId) -> bool {
    buffer.iter().any(|item| item.id == *id)
}
