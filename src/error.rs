use thiserror::Error;
use timeline_protocol::AgentId;

/// Why waiting for an agent's initial sync did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("initial sync for agent {agent_id} failed: {message}")]
    Rejected { agent_id: AgentId, message: String },
    #[error("initial sync for agent {agent_id} was cancelled")]
    Cancelled { agent_id: AgentId },
    #[error("sync driver stopped")]
    DriverStopped,
}

/// The driver task is gone and can no longer accept commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sync driver stopped")]
pub struct DriverStopped;

impl From<DriverStopped> for InitError {
    fn from(_: DriverStopped) -> Self {
        Self::DriverStopped
    }
}

#[cfg(test)]
mod tests {
    use timeline_protocol::AgentId;

    use super::{DriverStopped, InitError};

    #[test]
    fn messages_name_the_agent() {
        let error = InitError::Rejected {
            agent_id: AgentId::new("agent-1"),
            message: "history unavailable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "initial sync for agent agent-1 failed: history unavailable"
        );
        assert_eq!(InitError::from(DriverStopped), InitError::DriverStopped);
    }
}
