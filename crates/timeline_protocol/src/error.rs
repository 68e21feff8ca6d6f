use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode inbound frame: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode outbound frame: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Failure handing a request to the transport. The request never reached the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport rejected request: {message}")]
    Rejected { message: String },
}

impl TransportError {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
