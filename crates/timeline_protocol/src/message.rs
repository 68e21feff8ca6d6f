use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::event::AgentStreamMessage;
use crate::fetch::{FetchRequest, FetchResponse};
use crate::ids::AgentId;
use crate::status::AgentStatusSnapshot;

/// Frame received from the server, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    TimelineFetch(FetchResponse),
    AgentStream(AgentStreamMessage),
    AgentUpdate(AgentStatusSnapshot),
    AgentDeleted { agent_id: AgentId },
}

impl InboundMessage {
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|source| ProtocolError::Decode { source })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode { source })
    }

    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::TimelineFetch(response) => &response.agent_id,
            Self::AgentStream(message) => &message.agent_id,
            Self::AgentUpdate(snapshot) => &snapshot.agent_id,
            Self::AgentDeleted { agent_id } => agent_id,
        }
    }
}

/// Frame sent to the server, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    FetchTimeline(FetchRequest),
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode { source })
    }

    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|source| ProtocolError::Decode { source })
    }
}
