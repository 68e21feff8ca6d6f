//! Pure synchronization components.
//!
//! Nothing in here performs I/O or holds state between calls; the runtime
//! coordinator owns per-agent state and feeds it through these functions.

pub mod bootstrap;
pub mod init_resolution;
pub mod lifecycle;
pub mod reducer;
pub mod sequence_gate;
