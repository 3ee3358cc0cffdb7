//! Line-boundary chunking for embedding input.

use serde::{Deserialize, Serialize};

/// A slice of a file's content. `content` is always an exact substring of the
/// source, starting at byte offset `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub start: usize,
    pub content: String,
}

/// Split `content` into chunks of at most `max_chars` characters.
///
/// Boundaries only fall directly after a `\n`. A single line longer than
/// `max_chars` becomes its own (oversized) chunk. Whitespace-only chunks are
/// dropped, and chunk indices stay contiguous.
pub fn chunk_by_lines(content: &str, max_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut chunk_start = 0usize;
    let mut chunk_end = 0usize;
    let mut chunk_chars = 0usize;

    let flush = |start: usize, end: usize, chunks: &mut Vec<TextChunk>| {
        let slice = &content[start..end];
        if !slice.trim().is_empty() {
            chunks.push(TextChunk {
                index: chunks.len(),
                start,
                content: slice.to_string(),
            });
        }
    };

    for line in content.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if chunk_chars > 0 && chunk_chars + line_chars > max_chars {
            flush(chunk_start, chunk_end, &mut chunks);
            chunk_start = chunk_end;
            chunk_chars = 0;
        }
        chunk_end += line.len();
        chunk_chars += line_chars;
    }

    if chunk_end > chunk_start {
        flush(chunk_start, chunk_end, &mut chunks);
    }

    chunks
}
