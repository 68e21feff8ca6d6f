use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::ids::ItemId;

/// One transcript item. Identity is by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamItem {
    pub id: ItemId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub body: ItemBody,
}

/// Kind-specific payload of a [`StreamItem`], tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemBody {
    UserMessage {
        text: String,
    },
    AssistantMessage {
        text: String,
    },
    ToolCall {
        name: String,
        status: ToolCallStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Thought {
        text: String,
    },
    ActivityLog {
        level: ActivityLevel,
        message: String,
    },
    TodoList {
        items: Vec<TodoEntry>,
    },
    Compaction {
        status: CompactionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pre_tokens: Option<u64>,
    },
}

/// Discriminant of [`ItemBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    UserMessage,
    AssistantMessage,
    ToolCall,
    Thought,
    ActivityLog,
    TodoList,
    Compaction,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserMessage => "user_message",
            Self::AssistantMessage => "assistant_message",
            Self::ToolCall => "tool_call",
            Self::Thought => "thought",
            Self::ActivityLog => "activity_log",
            Self::TodoList => "todo_list",
            Self::Compaction => "compaction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl ToolCallStatus {
    /// Progress rank; a tool call never moves to a lower rank.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Canceled => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStatus {
    Loading,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub text: String,
    pub completed: bool,
}

impl StreamItem {
    #[must_use]
    pub fn new(id: impl Into<ItemId>, timestamp: OffsetDateTime, body: ItemBody) -> Self {
        Self {
            id: id.into(),
            timestamp,
            body,
        }
    }

    #[must_use]
    pub fn user_message(
        id: impl Into<ItemId>,
        timestamp: OffsetDateTime,
        text: impl Into<String>,
    ) -> Self {
        Self::new(id, timestamp, ItemBody::UserMessage { text: text.into() })
    }

    #[must_use]
    pub fn assistant_message(
        id: impl Into<ItemId>,
        timestamp: OffsetDateTime,
        text: impl Into<String>,
    ) -> Self {
        Self::new(id, timestamp, ItemBody::AssistantMessage { text: text.into() })
    }

    #[must_use]
    pub fn thought(id: impl Into<ItemId>, timestamp: OffsetDateTime, text: impl Into<String>) -> Self {
        Self::new(id, timestamp, ItemBody::Thought { text: text.into() })
    }

    #[must_use]
    pub fn tool_call(
        id: impl Into<ItemId>,
        timestamp: OffsetDateTime,
        name: impl Into<String>,
        status: ToolCallStatus,
    ) -> Self {
        Self::new(
            id,
            timestamp,
            ItemBody::ToolCall {
                name: name.into(),
                status,
                input: None,
                result: None,
                error: None,
            },
        )
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.body.kind()
    }

    /// Returns accumulated text for text-bearing kinds.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ItemBody::UserMessage { text }
            | ItemBody::AssistantMessage { text }
            | ItemBody::Thought { text } => Some(text),
            ItemBody::ActivityLog { message, .. } => Some(message),
            ItemBody::ToolCall { .. } | ItemBody::TodoList { .. } | ItemBody::Compaction { .. } => {
                None
            }
        }
    }
}

impl ItemBody {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::UserMessage { .. } => ItemKind::UserMessage,
            Self::AssistantMessage { .. } => ItemKind::AssistantMessage,
            Self::ToolCall { .. } => ItemKind::ToolCall,
            Self::Thought { .. } => ItemKind::Thought,
            Self::ActivityLog { .. } => ItemKind::ActivityLog,
            Self::TodoList { .. } => ItemKind::TodoList,
            Self::Compaction { .. } => ItemKind::Compaction,
        }
    }
}
