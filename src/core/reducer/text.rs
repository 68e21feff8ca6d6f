//! Chunked text accumulation.

/// Appends a streamed chunk. Returns whether `text` changed.
///
/// Chunks are appended verbatim: text content says nothing about whether a
/// chunk was delivered before, so duplicates are stopped upstream (sequence
/// gate for logged items, tail membership for provisional ones).
pub fn append_chunk(text: &mut String, chunk: &str) -> bool {
    if chunk.is_empty() {
        return false;
    }
    text.push_str(chunk);
    true
}

#[cfg(test)]
mod tests {
    use super::append_chunk;

    fn appended(existing: &str, chunk: &str) -> String {
        let mut text = existing.to_string();
        append_chunk(&mut text, chunk);
        text
    }

    #[test]
    fn appends_chunks_in_order() {
        let mut text = String::new();
        for chunk in ["Hello", ", ", "world"] {
            assert!(append_chunk(&mut text, chunk));
        }
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn chunk_sharing_letters_with_the_text_is_kept_whole() {
        assert_eq!(appended("Hel", "lo"), "Hello");
        assert_eq!(appended("ha", "ha"), "haha");
        assert_eq!(appended("日本", "本語"), "日本本語");
    }

    #[test]
    fn empty_chunk_is_noop() {
        let mut text = "abc".to_string();
        assert!(!append_chunk(&mut text, ""));
        assert_eq!(text, "abc");
    }
}
