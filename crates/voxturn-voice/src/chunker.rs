//! Paragraph chunker for the agent's token stream.
//!
//! Accumulates text fragments and finalizes a chunk every time the buffer
//! contains a paragraph break (two consecutive newlines). The chunk includes
//! the separator; whatever follows it stays buffered. At stream end,
//! [`Chunker::flush`] turns a non-empty remainder into the last chunk.
//!
//! Boundaries depend only on the concatenated input, never on how it was
//! fragmented: feeding `"a\n\nb"` at once or as `["a\n", "\nb"]` yields the
//! same chunks.

/// Paragraph separator that closes a chunk.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// A chunk whose text is final. Ordinals start at 0 and increase by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedChunk {
    pub ordinal: u32,
    pub text: String,
}

/// Stateful paragraph splitter. One instance per turn.
#[derive(Debug, Default)]
pub struct Chunker {
    buffer: String,
    next_ordinal: u32,
}

impl Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every chunk it completes, in order.
    pub fn append(&mut self, fragment: &str) -> Vec<FinalizedChunk> {
        if fragment.is_empty() {
            return Vec::new();
        }

        // The buffer never holds a complete separator between calls, so a
        // new one can start at most one byte before the appended text.
        let mut search_from = floor_char_boundary(&self.buffer, self.buffer.len().saturating_sub(1));
        self.buffer.push_str(fragment);

        let mut finalized = Vec::new();
        while let Some(pos) = self.buffer[search_from..].find(PARAGRAPH_BREAK) {
            let end = search_from + pos + PARAGRAPH_BREAK.len();
            let rest = self.buffer.split_off(end);
            let text = std::mem::replace(&mut self.buffer, rest);
            finalized.push(self.finalize(text));
            search_from = 0;
        }

        finalized
    }

    /// Finalize whatever remains as the turn's last chunk.
    ///
    /// Returns `None` when the remainder is empty.
    pub fn flush(&mut self) -> Option<FinalizedChunk> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.buffer);
        Some(self.finalize(text))
    }

    /// Text buffered but not yet finalized.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Number of chunks finalized so far.
    pub const fn finalized_count(&self) -> u32 {
        self.next_ordinal
    }

    fn finalize(&mut self, text: String) -> FinalizedChunk {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        FinalizedChunk { ordinal, text }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> Vec<FinalizedChunk> {
        let mut chunker = Chunker::new();
        let mut out: Vec<FinalizedChunk> = fragments.iter().flat_map(|f| chunker.append(f)).collect();
        out.extend(chunker.flush());
        out
    }

    fn texts(chunks: &[FinalizedChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn trailing_separator_leaves_nothing_to_flush() {
        let mut chunker = Chunker::new();
        let chunks = chunker.append("Hello there.\n\nHow are you?\n\n");
        assert_eq!(texts(&chunks), vec!["Hello there.\n\n", "How are you?\n\n"]);
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn separator_split_across_fragments() {
        let mut chunker = Chunker::new();
        assert!(chunker.append("Hel").is_empty());
        assert!(chunker.append("lo there.\n").is_empty());
        let chunks = chunker.append("\nHow are you?");
        assert_eq!(texts(&chunks), vec!["Hello there.\n\n"]);
        assert_eq!(chunker.pending(), "How are you?");

        let last = chunker.flush().unwrap();
        assert_eq!(last.text, "How are you?");
        assert_eq!(last.ordinal, 1);
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(run(&[]).is_empty());
        assert!(run(&["", ""]).is_empty());
    }

    #[test]
    fn ordinals_are_strictly_increasing() {
        let chunks = run(&["a\n\nb\n\n", "c\n", "\nd"]);
        let ordinals: Vec<u32> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        assert_eq!(texts(&chunks), vec!["a\n\n", "b\n\n", "c\n\n", "d"]);
    }

    #[test]
    fn boundaries_do_not_depend_on_fragmentation() {
        let text = "First paragraph.\n\nSecond one\nspans lines.\n\n\nThird, with ünïcödé.\n\nTail";
        let whole = run(&[text]);

        // Every two-way split.
        for (i, _) in text.char_indices() {
            let (a, b) = text.split_at(i);
            assert_eq!(run(&[a, b]), whole, "split at byte {i}");
        }

        // One character at a time.
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(run(&refs), whole);
    }

    #[test]
    fn run_of_newlines_yields_separator_only_chunk() {
        let chunks = run(&["a\n\n\n\nb"]);
        assert_eq!(texts(&chunks), vec!["a\n\n", "\n\n", "b"]);
    }

    #[test]
    fn finalized_count_tracks_emitted_chunks() {
        let mut chunker = Chunker::new();
        chunker.append("x\n\ny");
        assert_eq!(chunker.finalized_count(), 1);
        chunker.flush();
        assert_eq!(chunker.finalized_count(), 2);
    }
}
