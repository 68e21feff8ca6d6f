//! Ordering and idempotence gate for sequenced timeline events.
//!
//! The gate is the single place where transport-level reordering, duplication
//! and epoch staleness are detected. It classifies; the caller mutates.

use serde::{Deserialize, Serialize};
use timeline_protocol::{Epoch, FetchCursor};

/// Contiguous accepted range of an agent's log within one epoch.
///
/// Invariant: `start_seq <= end_seq`, and `end_seq` never decreases while the
/// epoch is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub epoch: Epoch,
    pub start_seq: u64,
    pub end_seq: u64,
}

/// Last known-good position a catch-up fetch resumes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatchUpAnchor {
    pub epoch: Epoch,
    pub end_seq: u64,
}

impl CatchUpAnchor {
    #[must_use]
    pub fn fetch_cursor(&self) -> FetchCursor {
        FetchCursor {
            epoch: self.epoch.clone(),
            seq: self.end_seq,
        }
    }
}

impl Cursor {
    /// Cursor created by the first accepted position of an epoch.
    #[must_use]
    pub fn start(epoch: Epoch, seq: u64) -> Self {
        Self {
            epoch,
            start_seq: seq,
            end_seq: seq,
        }
    }

    /// Cursor covering `start_seq..=end_seq`, normalized so start never exceeds end.
    #[must_use]
    pub fn spanning(epoch: Epoch, start_seq: u64, end_seq: u64) -> Self {
        Self {
            epoch,
            start_seq: start_seq.min(end_seq),
            end_seq,
        }
    }

    /// Returns this cursor advanced to `seq`. Never moves backwards.
    #[must_use]
    pub fn advanced_to(&self, seq: u64) -> Self {
        Self {
            epoch: self.epoch.clone(),
            start_seq: self.start_seq,
            end_seq: self.end_seq.max(seq),
        }
    }

    #[must_use]
    pub fn catch_up_anchor(&self) -> CatchUpAnchor {
        CatchUpAnchor {
            epoch: self.epoch.clone(),
            end_seq: self.end_seq,
        }
    }
}

/// Classification of one `(epoch, seq)` pair against a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateDecision {
    /// No cursor yet; the caller creates one at this position.
    Init,
    /// Contiguous; the caller advances `end_seq`.
    Accept,
    /// Duplicate or already applied.
    DropStale,
    /// Position from a generation that is no longer current.
    DropEpoch,
    /// One or more positions are missing; the cursor must stay put.
    Gap,
}

impl GateDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Accept => "accept",
            Self::DropStale => "drop_stale",
            Self::DropEpoch => "drop_epoch",
            Self::Gap => "gap",
        }
    }

    /// True when the event should be folded into the transcript.
    #[must_use]
    pub fn applies(self) -> bool {
        matches!(self, Self::Init | Self::Accept)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub cursor: Option<&'a Cursor>,
    pub epoch: &'a Epoch,
    pub seq: u64,
}

/// Classifies one position. Epoch transitions are only ever established by a
/// bootstrap replace, so any epoch mismatch here is stale.
#[must_use]
pub fn classify(input: GateInput<'_>) -> GateDecision {
    let Some(cursor) = input.cursor else {
        return GateDecision::Init;
    };

    if cursor.epoch != *input.epoch {
        return GateDecision::DropEpoch;
    }

    if input.seq <= cursor.end_seq {
        return GateDecision::DropStale;
    }

    if input.seq == cursor.end_seq + 1 {
        GateDecision::Accept
    } else {
        GateDecision::Gap
    }
}

/// Returns the cursor after applying `decision` for `(epoch, seq)`.
///
/// Only `Init` and `Accept` produce a different cursor.
#[must_use]
pub fn next_cursor(
    cursor: Option<&Cursor>,
    decision: GateDecision,
    epoch: &Epoch,
    seq: u64,
) -> Option<Cursor> {
    match decision {
        GateDecision::Init => Some(Cursor::start(epoch.clone(), seq)),
        GateDecision::Accept => cursor.map(|cursor| cursor.advanced_to(seq)),
        GateDecision::DropStale | GateDecision::DropEpoch | GateDecision::Gap => cursor.cloned(),
    }
}
