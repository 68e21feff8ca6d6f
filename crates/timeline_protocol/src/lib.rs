//! Wire contract shared by the timeline sync engine and its transports.
//!
//! This crate defines the per-agent event log vocabulary (epochs, sequenced
//! timeline entries, stream items and live stream events), the historical
//! fetch request/response envelopes, and the authoritative agent status
//! snapshot. It contains no synchronization logic: ordering, merging and
//! catch-up decisions belong to `timeline_sync`.
//!
//! Every message is JSON with snake_case field names. Inbound frames are
//! discriminated by a top-level `type` field, see [`InboundMessage`].

mod error;
mod event;
mod fetch;
mod ids;
mod item;
mod message;
mod status;
mod transport;

pub use error::{ProtocolError, TransportError};
pub use event::{AgentStreamMessage, StreamEvent, TurnOutcome};
pub use fetch::{
    FetchCursor, FetchDirection, FetchRequest, FetchResponse, SeqCursor, TimelineEntry,
    TimelineProjection,
};
pub use ids::{AgentId, Epoch, ItemId};
pub use item::{
    ActivityLevel, CompactionStatus, ItemBody, ItemKind, StreamItem, TodoEntry, ToolCallStatus,
};
pub use message::{InboundMessage, OutboundMessage};
pub use status::{AgentStatus, AgentStatusSnapshot};
pub use transport::TimelineTransport;

/// Timestamp type used across the protocol, serialized as RFC3339.
pub type Timestamp = time::OffsetDateTime;
