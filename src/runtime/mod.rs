//! Stateful orchestration around the pure `core` components.

mod agent;
pub mod coordinator;
pub mod counters;
pub mod driver;
pub mod effects;
pub mod init_waiters;
pub mod store;

pub use agent::TimelineView;
pub use coordinator::{InitialSync, TimelineCoordinator};
pub use counters::SyncCounters;
pub use driver::{SyncDriver, SyncHandle};
pub use effects::TimelineEffect;
pub use init_waiters::InitWaiters;
pub use store::{AgentSnapshot, MemoryStore, TimelineStore};
