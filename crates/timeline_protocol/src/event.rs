use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{AgentId, Epoch, ItemId};
use crate::item::StreamItem;

/// Live event pushed for one agent, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A sequenced entry of the canonical log.
    Timeline { item: StreamItem },
    /// Unsequenced assistant text chunk for the turn currently streaming.
    AssistantDelta { item_id: ItemId, delta: String },
    /// Unsequenced reasoning text chunk for the turn currently streaming.
    ThoughtDelta { item_id: ItemId, delta: String },
    TurnStarted,
    TurnCompleted,
    TurnCanceled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    TurnFailed {
        error: String,
    },
}

/// Terminal outcome of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnOutcome {
    Completed,
    Canceled,
    Failed,
}

impl StreamEvent {
    /// Returns the turn outcome when this event terminates a turn.
    #[must_use]
    pub fn turn_outcome(&self) -> Option<TurnOutcome> {
        match self {
            Self::TurnCompleted => Some(TurnOutcome::Completed),
            Self::TurnCanceled { .. } => Some(TurnOutcome::Canceled),
            Self::TurnFailed { .. } => Some(TurnOutcome::Failed),
            Self::Timeline { .. }
            | Self::AssistantDelta { .. }
            | Self::ThoughtDelta { .. }
            | Self::TurnStarted => None,
        }
    }
}

/// Envelope of a live stream event as delivered by the transport.
///
/// `seq`/`epoch` are only present for events that are part of the sequenced
/// log (`timeline` events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStreamMessage {
    pub agent_id: AgentId,
    pub event: StreamEvent,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,
}

impl AgentStreamMessage {
    #[must_use]
    pub fn new(agent_id: impl Into<AgentId>, event: StreamEvent, timestamp: OffsetDateTime) -> Self {
        Self {
            agent_id: agent_id.into(),
            event,
            timestamp,
            seq: None,
            epoch: None,
        }
    }

    #[must_use]
    pub fn sequenced(mut self, epoch: impl Into<Epoch>, seq: u64) -> Self {
        self.epoch = Some(epoch.into());
        self.seq = Some(seq);
        self
    }

    /// Returns the log position when this event must pass the sequence gate.
    #[must_use]
    pub fn gate_position(&self) -> Option<(&Epoch, u64)> {
        match (&self.event, &self.epoch, self.seq) {
            (StreamEvent::Timeline { .. }, Some(epoch), Some(seq)) => Some((epoch, seq)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::{AgentStreamMessage, StreamEvent, TurnOutcome};
    use crate::item::StreamItem;

    #[test]
    fn terminal_detection_matches_turn_markers() {
        assert_eq!(StreamEvent::TurnStarted.turn_outcome(), None);
        assert_eq!(
            StreamEvent::TurnCompleted.turn_outcome(),
            Some(TurnOutcome::Completed)
        );
        assert_eq!(
            StreamEvent::TurnCanceled { reason: None }.turn_outcome(),
            Some(TurnOutcome::Canceled)
        );
        assert_eq!(
            StreamEvent::TurnFailed {
                error: "boom".to_string()
            }
            .turn_outcome(),
            Some(TurnOutcome::Failed)
        );
    }

    #[test]
    fn only_sequenced_timeline_events_are_gated() {
        let ts = datetime!(2026-02-14 00:00:00 UTC);
        let timeline = StreamEvent::Timeline {
            item: StreamItem::user_message("u1", ts, "hello"),
        };

        let unsequenced = AgentStreamMessage::new("agent-1", timeline.clone(), ts);
        assert!(unsequenced.gate_position().is_none());

        let sequenced = AgentStreamMessage::new("agent-1", timeline, ts).sequenced("e1", 4);
        let (epoch, seq) = sequenced.gate_position().expect("gated");
        assert_eq!(epoch.as_str(), "e1");
        assert_eq!(seq, 4);

        let delta = AgentStreamMessage::new(
            "agent-1",
            StreamEvent::AssistantDelta {
                item_id: "m1".into(),
                delta: "x".to_string(),
            },
            ts,
        )
        .sequenced("e1", 5);
        assert!(delta.gate_position().is_none());
    }

    #[test]
    fn unit_turn_markers_round_trip_through_type_tag() {
        let value = serde_json::to_value(StreamEvent::TurnCompleted).expect("serialize");
        assert_eq!(value, json!({ "type": "turn_completed" }));

        let parsed: StreamEvent =
            serde_json::from_value(json!({ "type": "turn_failed", "error": "quota" }))
                .expect("deserialize");
        assert_eq!(
            parsed,
            StreamEvent::TurnFailed {
                error: "quota".to_string()
            }
        );
    }
}
