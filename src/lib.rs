//! Client-side timeline synchronization for agent transcripts.
//!
//! Keeps a locally rendered transcript consistent with a server-authoritative,
//! per-agent event log that arrives over an unreliable push transport, with
//! on-demand historical fetches filling the holes.
//!
//! Invariant: only the coordinator mutates per-agent state; every input is
//! classified by the sequence gate before it can touch the tail.
//!
//! # Public API Overview
//! - [`core`] holds the pure pieces: sequence gate, bootstrap and
//!   init-resolution policies, the stream reducer and the lifecycle deriver.
//! - [`TimelineCoordinator`] wires them together and returns
//!   [`TimelineEffect`]s instead of performing I/O.
//! - [`SyncDriver`] runs a coordinator on a tokio task against a
//!   [`TimelineTransport`](timeline_protocol::TimelineTransport); callers talk
//!   to it through a [`SyncHandle`].
//! - [`MemoryStore`] is a ready-made [`TimelineStore`] for hosts and tests.

pub mod config;
pub mod logging;

pub mod core;
pub mod error;
pub mod runtime;

pub use crate::config::{CoordinatorConfig, EnvConfig};
pub use crate::core::lifecycle::StatusView;
pub use crate::core::sequence_gate::{CatchUpAnchor, Cursor, GateDecision};
pub use crate::error::{DriverStopped, InitError};
pub use crate::logging::LoggingError;
pub use crate::runtime::{
    AgentSnapshot, InitialSync, MemoryStore, SyncCounters, SyncDriver, SyncHandle,
    TimelineCoordinator, TimelineEffect, TimelineStore, TimelineView,
};

pub use timeline_protocol as protocol;
