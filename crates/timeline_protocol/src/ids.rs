use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of one agent whose timeline is synchronized.
    AgentId
);

string_id!(
    /// Stable identity of a stream item; deliveries sharing an id merge.
    ItemId
);

string_id!(
    /// Opaque connection/session generation issued by the server.
    ///
    /// Epochs are only ever compared for equality, never ordered.
    Epoch
);

impl ItemId {
    /// Generates a fresh client-side item id for optimistic local items.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentId, Epoch, ItemId};

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&AgentId::new("agent-1")).expect("serialize agent id");
        assert_eq!(json, "\"agent-1\"");

        let epoch: Epoch = serde_json::from_str("\"e7\"").expect("deserialize epoch");
        assert_eq!(epoch.as_str(), "e7");
    }

    #[test]
    fn generated_item_ids_are_unique() {
        let first = ItemId::generate();
        let second = ItemId::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 36);
    }
}
