//! Replace-vs-merge decision for historical fetch responses.

use timeline_protocol::{Epoch, FetchDirection};

use crate::core::sequence_gate::CatchUpAnchor;

#[derive(Debug, Clone, Copy)]
pub struct BootstrapInput<'a> {
    pub direction: FetchDirection,
    pub reset: bool,
    pub epoch: &'a Epoch,
    /// Newest seq covered by the response, if any.
    pub end_seq: Option<u64>,
    /// Whether the agent already holds a cursor.
    pub has_cursor: bool,
    /// Server-reported flag that entries newer than `end_seq` exist.
    pub has_newer: bool,
    pub is_initializing: bool,
    pub has_active_init_deferred: bool,
    /// Newest seq observed on live events of `epoch`, if any.
    pub newest_known_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapDecision {
    pub replace: bool,
    pub catch_up: Option<CatchUpAnchor>,
}

impl BootstrapDecision {
    fn merge() -> Self {
        Self {
            replace: false,
            catch_up: None,
        }
    }
}

/// Decides how a successful fetch response is folded in.
///
/// A response replaces local state when it is the agent's first bootstrap,
/// answers a pending initialization with a `tail` fetch, or carries `reset`.
/// A replace that does not reach the newest known server position also
/// yields a catch-up anchor at the response's end.
#[must_use]
pub fn decide(input: BootstrapInput<'_>) -> BootstrapDecision {
    let initial_tail = input.direction == FetchDirection::Tail
        && (input.is_initializing || input.has_active_init_deferred);
    let replace = input.reset || !input.has_cursor || initial_tail;

    if !replace {
        return BootstrapDecision::merge();
    }

    let end_seq = input.end_seq.unwrap_or(0);
    let behind_live = input
        .newest_known_seq
        .is_some_and(|newest| newest > end_seq);
    let catch_up = (input.has_newer || behind_live).then(|| CatchUpAnchor {
        epoch: input.epoch.clone(),
        end_seq,
    });

    BootstrapDecision { replace, catch_up }
}
