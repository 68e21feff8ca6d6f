use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{AgentId, Epoch};
use crate::item::StreamItem;

/// Direction of a historical range fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    /// Newest page of the log.
    Tail,
    /// Entries strictly older than the request cursor.
    Before,
    /// Entries strictly newer than the request cursor.
    After,
}

impl FetchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tail => "tail",
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// Server-side shaping applied to fetched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineProjection {
    /// Consecutive chunks of one item are collapsed by the server.
    #[default]
    Projected,
    /// Every log entry is returned as recorded.
    Canonical,
}

impl TimelineProjection {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "projected" => Self::Projected,
            "canonical" => Self::Canonical,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projected => "projected",
            Self::Canonical => "canonical",
        }
    }
}

/// Position a fetch is anchored at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchCursor {
    pub epoch: Epoch,
    pub seq: u64,
}

/// Bound of a fetched range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqCursor {
    pub seq: u64,
}

/// Historical record of the per-agent log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub seq: u64,
    pub provider: String,
    pub item: StreamItem,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub agent_id: AgentId,
    pub direction: FetchDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<FetchCursor>,
    pub limit: u32,
    pub projection: TimelineProjection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub agent_id: AgentId,
    pub direction: FetchDirection,
    pub reset: bool,
    pub epoch: Epoch,
    pub start_cursor: Option<SeqCursor>,
    pub end_cursor: Option<SeqCursor>,
    pub entries: Vec<TimelineEntry>,
    pub error: Option<String>,
    #[serde(default)]
    pub has_older: bool,
    #[serde(default)]
    pub has_newer: bool,
}

impl FetchResponse {
    /// Builds a failed response, used when a request never reached the server.
    #[must_use]
    pub fn failed(
        agent_id: impl Into<AgentId>,
        direction: FetchDirection,
        epoch: impl Into<Epoch>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            direction,
            reset: false,
            epoch: epoch.into(),
            start_cursor: None,
            end_cursor: None,
            entries: Vec::new(),
            error: Some(error.into()),
            has_older: false,
            has_newer: false,
        }
    }

    /// Newest seq covered by this response: the reported end cursor, or the
    /// last entry when the server omitted it.
    #[must_use]
    pub fn end_seq(&self) -> Option<u64> {
        self.end_cursor
            .map(|cursor| cursor.seq)
            .or_else(|| self.entries.iter().map(|entry| entry.seq).max())
    }

    /// Oldest seq covered by this response.
    #[must_use]
    pub fn start_seq(&self) -> Option<u64> {
        self.start_cursor
            .map(|cursor| cursor.seq)
            .or_else(|| self.entries.iter().map(|entry| entry.seq).min())
    }
}
