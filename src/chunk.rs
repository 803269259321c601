//! Fixed-size overlapping character chunker.
//!
//! Splits review text into [`ChunkText`]s of at most `chunk_chars` characters,
//! with consecutive chunks sharing `overlap_chars` characters so that answer
//! context does not lose sentences cut at a window boundary.
//!
//! Boundaries are always `char` boundaries, so multi-byte text never splits
//! mid-codepoint. Each chunk carries its ordinal and a SHA-256 hash of its
//! text.

use sha2::{Digest, Sha256};

use crate::models::ChunkText;

/// Split text into overlapping character windows.
///
/// The window advances by `chunk_chars - overlap_chars` each step; the caller
/// must ensure `overlap_chars < chunk_chars` (config validation enforces
/// this). Empty input yields no chunks. Deterministic for a given input.
pub fn chunk_text(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<ChunkText> {
    if text.is_empty() {
        return Vec::new();
    }

    let byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = byte_offsets.len();
    let step = chunk_chars - overlap_chars;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < total_chars {
        let end = (start + chunk_chars).min(total_chars);
        let byte_start = byte_offsets[start];
        let byte_end = if end == total_chars {
            text.len()
        } else {
            byte_offsets[end]
        };

        chunks.push(make_chunk(index, &text[byte_start..byte_end]));
        index += 1;

        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

fn make_chunk(index: usize, text: &str) -> ChunkText {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    ChunkText {
        index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 500, 100).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("A short review.", 500, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "A short review.");
    }

    #[test]
    fn test_chunks_never_exceed_budget() {
        let text = "x".repeat(2357);
        for chunk in chunk_text(&text, 500, 100) {
            assert!(chunk.text.chars().count() <= 500);
        }
    }

    #[test]
    fn test_overlap_shared_between_neighbors() {
        let text: String = ('a'..='z').cycle().take(1200).collect();
        let chunks = chunk_text(&text, 500, 100);
        assert!(chunks.len() >= 2);

        let first: Vec<char> = chunks[0].text.chars().collect();
        let second: Vec<char> = chunks[1].text.chars().collect();
        let tail: String = first[first.len() - 100..].iter().collect();
        let head: String = second[..100].iter().collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn test_indices_contiguous() {
        let text = "y".repeat(3000);
        let chunks = chunk_text(&text, 500, 100);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        // 600 two-byte characters force a split inside multi-byte territory
        let text = "ñ".repeat(600);
        let chunks = chunk_text(&text, 500, 100);
        assert_eq!(chunks[0].text.chars().count(), 500);
        for chunk in &chunks {
            assert!(chunk.text.chars().all(|c| c == 'ñ'));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Review paragraph. ".repeat(80);
        let a = chunk_text(&text, 500, 100);
        let b = chunk_text(&text, 500, 100);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
        }
    }

    #[test]
    fn test_full_coverage_no_gaps() {
        let text: String = ('0'..='9').cycle().take(1750).collect();
        let chunks = chunk_text(&text, 500, 100);
        // Reassembling with the overlap dropped must restore the input.
        let mut rebuilt: String = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            let chars: Vec<char> = chunk.text.chars().collect();
            rebuilt.extend(&chars[100.min(chars.len())..]);
        }
        assert_eq!(rebuilt, text);
    }
}
