use timeline_protocol::{Epoch, FetchDirection, StreamItem};

use crate::core::lifecycle::StatusView;
use crate::core::sequence_gate::Cursor;

/// Everything the coordinator tracks for one agent.
#[derive(Debug, Clone, Default)]
pub(crate) struct AgentTimeline {
    pub cursor: Option<Cursor>,
    pub tail: Vec<StreamItem>,
    pub head: Vec<StreamItem>,
    pub initializing: bool,
    /// Direction of the fetch the active init waiter is tied to.
    pub pending_init: Option<FetchDirection>,
    pub catch_up_in_flight: bool,
    pub loading_older: bool,
    /// Newest live position seen but not yet applied.
    pub newest_known: Option<(Epoch, u64)>,
    /// Oldest seq currently held in the tail.
    pub history_floor: Option<u64>,
    pub has_older: bool,
    pub status: Option<StatusView>,
}

impl AgentTimeline {
    pub fn note_newest(&mut self, epoch: &Epoch, seq: u64) {
        if let Some((known_epoch, known_seq)) = &mut self.newest_known {
            if known_epoch == epoch {
                *known_seq = (*known_seq).max(seq);
                return;
            }
        }
        self.newest_known = Some((epoch.clone(), seq));
    }

    /// Newest known seq in `epoch`, if one was observed.
    pub fn newest_known_in(&self, epoch: &Epoch) -> Option<u64> {
        self.newest_known
            .as_ref()
            .filter(|(known_epoch, _)| known_epoch == epoch)
            .map(|(_, seq)| *seq)
    }

    /// True when a live position beyond the cursor was observed.
    pub fn behind_live(&self) -> bool {
        match &self.cursor {
            Some(cursor) => self
                .newest_known_in(&cursor.epoch)
                .is_some_and(|newest| newest > cursor.end_seq),
            None => false,
        }
    }
}

/// Borrowed read view of one agent's state.
#[derive(Debug, Clone, Copy)]
pub struct TimelineView<'a> {
    pub cursor: Option<&'a Cursor>,
    pub tail: &'a [StreamItem],
    pub head: &'a [StreamItem],
    pub initializing: bool,
    pub status: Option<StatusView>,
}

impl<'a> From<&'a AgentTimeline> for TimelineView<'a> {
    fn from(agent: &'a AgentTimeline) -> Self {
        Self {
            cursor: agent.cursor.as_ref(),
            tail: &agent.tail,
            head: &agent.head,
            initializing: agent.initializing,
            status: agent.status,
        }
    }
}
