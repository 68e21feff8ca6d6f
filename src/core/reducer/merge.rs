//! Same-id merge rules per item kind.

use timeline_protocol::{ItemBody, StreamItem};

use super::text::append_chunk;

/// Merges `incoming` into `existing` (same id). Returns whether anything changed.
///
/// The existing item keeps its original timestamp. Text-bearing kinds append
/// the incoming text as a chunk; every other kind is idempotent under
/// re-merge.
pub fn merge_item(existing: &mut StreamItem, incoming: &StreamItem) -> bool {
    if existing.kind() != incoming.kind() {
        if *existing == *incoming {
            return false;
        }
        *existing = incoming.clone();
        return true;
    }

    match (&mut existing.body, &incoming.body) {
        (ItemBody::UserMessage { text }, ItemBody::UserMessage { text: incoming }) => {
            replace_if_different(text, incoming)
        }
        (
            ItemBody::AssistantMessage { text },
            ItemBody::AssistantMessage { text: chunk },
        )
        | (ItemBody::Thought { text }, ItemBody::Thought { text: chunk }) => {
            append_chunk(text, chunk)
        }
        (
            ItemBody::ToolCall {
                name,
                status,
                input,
                result,
                error,
            },
            ItemBody::ToolCall {
                name: next_name,
                status: next_status,
                input: next_input,
                result: next_result,
                error: next_error,
            },
        ) => {
            let mut changed = false;
            if !next_name.is_empty() {
                changed |= replace_if_different(name, next_name);
            }
            if next_status.rank() > status.rank() {
                *status = *next_status;
                changed = true;
            }
            changed |= overwrite_present(input, next_input);
            changed |= overwrite_present(result, next_result);
            changed |= overwrite_present(error, next_error);
            changed
        }
        (
            ItemBody::ActivityLog { level, message },
            ItemBody::ActivityLog {
                level: next_level,
                message: next_message,
            },
        ) => {
            let level_changed = *level != *next_level;
            *level = *next_level;
            replace_if_different(message, next_message) | level_changed
        }
        (ItemBody::TodoList { items }, ItemBody::TodoList { items: next_items }) => {
            if items == next_items {
                false
            } else {
                items.clone_from(next_items);
                true
            }
        }
        (
            ItemBody::Compaction { status, pre_tokens },
            ItemBody::Compaction {
                status: next_status,
                pre_tokens: next_pre_tokens,
            },
        ) => {
            let mut changed = false;
            if compaction_rank(*next_status) > compaction_rank(*status) {
                *status = *next_status;
                changed = true;
            }
            changed | overwrite_present(pre_tokens, next_pre_tokens)
        }
        // Kinds were checked equal above.
        _ => false,
    }
}

fn replace_if_different(target: &mut String, incoming: &str) -> bool {
    if target == incoming {
        return false;
    }
    incoming.clone_into(target);
    true
}

fn overwrite_present<T: Clone + PartialEq>(target: &mut Option<T>, incoming: &Option<T>) -> bool {
    match incoming {
        Some(value) if target.as_ref() != Some(value) => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn compaction_rank(status: timeline_protocol::CompactionStatus) -> u8 {
    match status {
        timeline_protocol::CompactionStatus::Loading => 0,
        timeline_protocol::CompactionStatus::Completed => 1,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;
    use timeline_protocol::{
        ActivityLevel, CompactionStatus, ItemBody, StreamItem, TodoEntry, ToolCallStatus,
    };

    use super::merge_item;

    fn ts() -> time::OffsetDateTime {
        datetime!(2026-02-14 00:00:00 UTC)
    }

    fn tool(status: ToolCallStatus, result: Option<serde_json::Value>) -> StreamItem {
        StreamItem::new(
            "tool-1",
            ts(),
            ItemBody::ToolCall {
                name: "bash".to_string(),
                status,
                input: Some(json!({ "command": "ls" })),
                result,
                error: None,
            },
        )
    }

    #[test]
    fn assistant_chunks_accumulate_and_keep_first_timestamp() {
        let mut item = StreamItem::assistant_message("m1", ts(), "Hel");
        let later = StreamItem::assistant_message("m1", datetime!(2026-02-14 00:00:05 UTC), "lo");

        assert!(merge_item(&mut item, &later));
        assert_eq!(item.text(), Some("Hello"));
        assert_eq!(item.timestamp, ts());
    }

    #[test]
    fn repeated_thought_chunks_are_all_kept() {
        let mut item = StreamItem::thought("t1", ts(), "ha");
        assert!(merge_item(&mut item, &StreamItem::thought("t1", ts(), "ha")));
        assert!(!merge_item(&mut item, &StreamItem::thought("t1", ts(), "")));
        assert_eq!(item.text(), Some("haha"));
    }

    #[test]
    fn tool_call_status_only_advances() {
        let mut item = tool(ToolCallStatus::Running, None);
        let completed = tool(ToolCallStatus::Completed, Some(json!({ "exit_code": 0 })));

        assert!(merge_item(&mut item, &completed));
        assert!(!merge_item(&mut item, &completed));

        let late_running = tool(ToolCallStatus::Running, None);
        assert!(!merge_item(&mut item, &late_running));
        assert_eq!(item, completed);
    }

    #[test]
    fn todo_list_is_replaced_wholesale() {
        let mut item = StreamItem::new(
            "todo-1",
            ts(),
            ItemBody::TodoList {
                items: vec![TodoEntry {
                    text: "a".to_string(),
                    completed: false,
                }],
            },
        );
        let next = StreamItem::new(
            "todo-1",
            ts(),
            ItemBody::TodoList {
                items: vec![
                    TodoEntry {
                        text: "a".to_string(),
                        completed: true,
                    },
                    TodoEntry {
                        text: "b".to_string(),
                        completed: false,
                    },
                ],
            },
        );

        assert!(merge_item(&mut item, &next));
        assert_eq!(item, next);
        assert!(!merge_item(&mut item, &next));
    }

    #[test]
    fn compaction_completes_and_records_tokens() {
        let mut item = StreamItem::new(
            "c1",
            ts(),
            ItemBody::Compaction {
                status: CompactionStatus::Loading,
                pre_tokens: None,
            },
        );
        let done = StreamItem::new(
            "c1",
            ts(),
            ItemBody::Compaction {
                status: CompactionStatus::Completed,
                pre_tokens: Some(120_000),
            },
        );
        assert!(merge_item(&mut item, &done));

        let stale = StreamItem::new(
            "c1",
            ts(),
            ItemBody::Compaction {
                status: CompactionStatus::Loading,
                pre_tokens: None,
            },
        );
        assert!(!merge_item(&mut item, &stale));
        assert_eq!(item, done);
    }

    #[test]
    fn kind_mismatch_replaces_item() {
        let mut item = StreamItem::assistant_message("x", ts(), "text");
        let replacement = StreamItem::new(
            "x",
            ts(),
            ItemBody::ActivityLog {
                level: ActivityLevel::Warning,
                message: "rewritten".to_string(),
            },
        );
        assert!(merge_item(&mut item, &replacement));
        assert_eq!(item, replacement);
    }
}
