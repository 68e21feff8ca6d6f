//! Optimistic agent status derived from terminal turn events.
//!
//! Patches produced here are tentative. The next authoritative
//! [`AgentStatusSnapshot`](timeline_protocol::AgentStatusSnapshot) overwrites
//! them by value.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use timeline_protocol::{AgentStatus, AgentStatusSnapshot, TurnOutcome};

/// Status fields this engine tracks for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: AgentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
}

impl From<&AgentStatusSnapshot> for StatusView {
    fn from(snapshot: &AgentStatusSnapshot) -> Self {
        Self {
            status: snapshot.status,
            updated_at: snapshot.updated_at,
            last_activity_at: snapshot.last_activity_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: AgentStatus,
    pub updated_at: OffsetDateTime,
    pub last_activity_at: OffsetDateTime,
}

impl StatusPatch {
    #[must_use]
    pub fn into_view(self) -> StatusView {
        StatusView {
            status: self.status,
            updated_at: self.updated_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Returns the optimistic patch for a terminal event, or `None` when the
/// event would not change anything.
#[must_use]
pub fn derive_patch(
    current: StatusView,
    outcome: TurnOutcome,
    event_at: OffsetDateTime,
) -> Option<StatusPatch> {
    let status = match (outcome, current.status) {
        (TurnOutcome::Completed | TurnOutcome::Canceled, AgentStatus::Running) => {
            AgentStatus::Idle
        }
        (TurnOutcome::Completed | TurnOutcome::Canceled, _) => return None,
        (TurnOutcome::Failed, AgentStatus::Closed) => return None,
        (TurnOutcome::Failed, _) => AgentStatus::Error,
    };

    let patch = StatusPatch {
        status,
        updated_at: current.updated_at.max(event_at),
        last_activity_at: current.last_activity_at.max(event_at),
    };

    let unchanged = patch.status == current.status
        && patch.updated_at == current.updated_at
        && patch.last_activity_at == current.last_activity_at;
    (!unchanged).then_some(patch)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use timeline_protocol::{AgentStatus, TurnOutcome};

    use super::{derive_patch, StatusPatch, StatusView};

    fn view(status: AgentStatus) -> StatusView {
        StatusView {
            status,
            updated_at: datetime!(2026-02-14 00:00:10 UTC),
            last_activity_at: datetime!(2026-02-14 00:00:10 UTC),
        }
    }

    #[test]
    fn completion_idles_a_running_agent() {
        let patch = derive_patch(
            view(AgentStatus::Running),
            TurnOutcome::Completed,
            datetime!(2026-02-14 00:00:20 UTC),
        );
        assert_eq!(
            patch,
            Some(StatusPatch {
                status: AgentStatus::Idle,
                updated_at: datetime!(2026-02-14 00:00:20 UTC),
                last_activity_at: datetime!(2026-02-14 00:00:20 UTC),
            })
        );
    }

    #[test]
    fn cancel_idles_a_running_agent() {
        let patch = derive_patch(
            view(AgentStatus::Running),
            TurnOutcome::Canceled,
            datetime!(2026-02-14 00:00:11 UTC),
        )
        .expect("patch");
        assert_eq!(patch.status, AgentStatus::Idle);
    }

    #[test]
    fn completion_does_not_touch_non_running_states() {
        for status in [AgentStatus::Error, AgentStatus::Closed, AgentStatus::Idle] {
            assert_eq!(
                derive_patch(
                    view(status),
                    TurnOutcome::Completed,
                    datetime!(2026-02-14 00:00:20 UTC)
                ),
                None,
                "{status:?}"
            );
        }
    }

    #[test]
    fn failure_marks_error_but_never_reopens_closed() {
        let patch = derive_patch(
            view(AgentStatus::Running),
            TurnOutcome::Failed,
            datetime!(2026-02-14 00:00:20 UTC),
        )
        .expect("patch");
        assert_eq!(patch.status, AgentStatus::Error);

        assert_eq!(
            derive_patch(
                view(AgentStatus::Closed),
                TurnOutcome::Failed,
                datetime!(2026-02-14 00:00:20 UTC)
            ),
            None
        );
    }

    #[test]
    fn failure_on_error_only_bumps_timestamps() {
        let current = view(AgentStatus::Error);
        let patch = derive_patch(
            current,
            TurnOutcome::Failed,
            datetime!(2026-02-14 00:00:30 UTC),
        )
        .expect("timestamps move forward");
        assert_eq!(patch.status, AgentStatus::Error);
        assert_eq!(patch.into_view().status, AgentStatus::Error);

        assert_eq!(
            derive_patch(
                current,
                TurnOutcome::Failed,
                datetime!(2026-02-14 00:00:05 UTC)
            ),
            None
        );
    }

    #[test]
    fn timestamps_never_rewind() {
        let patch = derive_patch(
            view(AgentStatus::Running),
            TurnOutcome::Completed,
            datetime!(2026-02-14 00:00:01 UTC),
        )
        .expect("status changes");
        assert_eq!(patch.updated_at, datetime!(2026-02-14 00:00:10 UTC));
        assert_eq!(patch.last_activity_at, datetime!(2026-02-14 00:00:10 UTC));
    }
}
