use timeline_protocol::{AgentId, FetchDirection, FetchRequest};

/// Side effect requested by the coordinator. The host performs these in
/// order after each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEffect {
    /// Hand a fetch request to the transport.
    Fetch(FetchRequest),
    /// Complete the initial-sync waiters registered under `direction`.
    ResolveInit {
        agent_id: AgentId,
        direction: FetchDirection,
    },
    /// Fail the initial-sync waiters registered under `direction`.
    RejectInit {
        agent_id: AgentId,
        direction: FetchDirection,
        error: String,
    },
    /// The agent went away while its waiters were pending.
    CancelInit {
        agent_id: AgentId,
        direction: FetchDirection,
    },
}

impl TimelineEffect {
    #[must_use]
    pub fn as_fetch(&self) -> Option<&FetchRequest> {
        match self {
            Self::Fetch(request) => Some(request),
            _ => None,
        }
    }
}
