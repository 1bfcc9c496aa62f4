//! Paragraph and sentence aware text chunking with overlap

use std::sync::OnceLock;

use regex::Regex;

use super::normalize::normalize;
use crate::error::{Error, Result};

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\n\s*\n)+").expect("valid paragraph regex"))
}

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"))
}

/// Text chunker with a soft character budget and trailing overlap.
///
/// All lengths are counted in characters, so overlap tails are always cut on
/// character boundaries. A single sentence longer than the budget is emitted whole.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Soft chunk budget in characters
    max_len: usize,
    /// Characters carried from the end of one chunk into the next
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. `max_len` must be positive; an overlap that is not
    /// smaller than `max_len` is clamped to `max_len - 1`.
    pub fn new(max_len: usize, overlap: usize) -> Result<Self> {
        if max_len == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        let overlap = if overlap >= max_len {
            tracing::warn!(
                "Chunk overlap {} >= chunk size {}, clamping to {}",
                overlap,
                max_len,
                max_len - 1
            );
            max_len - 1
        } else {
            overlap
        };
        Ok(Self { max_len, overlap })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into normalized, non-empty chunks
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buf: Vec<&str> = Vec::new();
        // Owned overlap tail that seeds `buf` after each emit
        let mut tail = String::new();
        let mut size = 0usize;

        for sentence in split_sentences(text) {
            let len = sentence.chars().count();
            if size + len > self.max_len && (!buf.is_empty() || !tail.is_empty()) {
                let joined = join_buffer(&tail, &buf);
                tail = if self.overlap > 0 {
                    last_chars(&joined, self.overlap).to_string()
                } else {
                    String::new()
                };
                chunks.push(joined);
                buf.clear();
                buf.push(sentence);
                size = tail.chars().count() + len;
            } else {
                buf.push(sentence);
                size += len;
            }
        }

        if !buf.is_empty() || !tail.is_empty() {
            chunks.push(join_buffer(&tail, &buf));
        }

        chunks
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Paragraphs split on blank lines, then sentences split after terminal punctuation
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for paragraph in paragraph_break().split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let mut start = 0;
        for m in sentence_break().find_iter(paragraph) {
            // punctuation is a single ASCII byte and stays with its sentence
            sentences.push(&paragraph[start..m.start() + 1]);
            start = m.end();
        }
        if start < paragraph.len() {
            sentences.push(&paragraph[start..]);
        }
    }
    sentences
}

fn join_buffer(tail: &str, buf: &[&str]) -> String {
    let mut out = String::from(tail);
    for part in buf {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

/// The last `n` characters of `s` (all of it when shorter)
fn last_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Six ~100 character sentences, 600 characters of prose in total
    fn six_sentences() -> String {
        (0..6)
            .map(|i| {
                let mut s = format!("Sentence number {} talks about quarterly revenue ", i);
                while s.len() < 98 {
                    s.push('x');
                }
                s.push('.');
                s
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_two_chunks_with_overlap_prefix() {
        let text = six_sentences();
        assert!((590..=610).contains(&text.chars().count()));

        let chunker = TextChunker::new(500, 120).unwrap();
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);

        let first = &chunks[0];
        let tail = last_chars(first, 120).trim_start();
        assert!(chunks[1].starts_with(tail));
    }

    #[test]
    fn test_overlap_property_holds_for_every_pair() {
        let text = vec![six_sentences(); 4].join(" ");
        let chunker = TextChunker::new(300, 50).unwrap();
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let tail = last_chars(&pair[0], 50).trim();
            assert!(pair[1].starts_with(tail), "{:?} !~ {:?}", pair[1], tail);
        }
    }

    #[test]
    fn test_fresh_text_reconstructs_source() {
        let text = vec![six_sentences(); 3]
            .join(" ")
            .replace(". Sentence", ".\n\n  Sentence");
        let chunker = TextChunker::new(300, 50).unwrap();
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 2);

        let mut rebuilt = chunks[0].clone();
        for pair in chunks.windows(2) {
            let tail = last_chars(&pair[0], 50).trim();
            let fresh = pair[1]
                .strip_prefix(tail)
                .unwrap_or_else(|| panic!("{:?} does not start with {:?}", pair[1], tail));
            rebuilt.push(' ');
            rebuilt.push_str(fresh.trim_start());
        }
        assert_eq!(rebuilt, normalize(&text));
    }

    #[test]
    fn test_chunking_normalized_text_is_stable() {
        let text = normalize(&vec![six_sentences(); 2].join("\n\n"));
        let chunker = TextChunker::new(250, 40).unwrap();
        let chunks = chunker.chunk(&text);
        assert_eq!(chunker.chunk(&normalize(&text)), chunks);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 250 + 40);
        }
    }

    #[test]
    fn test_no_overlap() {
        let chunker = TextChunker::new(120, 0).unwrap();
        let chunks = chunker.chunk(&six_sentences());
        assert_eq!(chunks.len(), 6);
        assert!(chunks.iter().all(|c| c.ends_with('.')));
    }

    #[test]
    fn test_empty_and_blank_input() {
        let chunker = TextChunker::new(500, 120).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n \t ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(500, 120).unwrap();
        let chunks = chunker.chunk("First para.\n\n  Second   para line one.\nline two!");
        assert_eq!(chunks, vec!["First para. Second para line one. line two!"]);
    }

    #[test]
    fn test_oversized_sentence_emitted_whole() {
        let long = "word ".repeat(200);
        let text = format!("Short intro. {}end.", long);
        let chunker = TextChunker::new(100, 10).unwrap();
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks[0], "Short intro.");
        assert!(chunks[1].chars().count() > 100);
        assert!(chunks[1].ends_with("end."));
    }

    #[test]
    fn test_chunks_are_normalized() {
        let chunker = TextChunker::new(40, 5).unwrap();
        for chunk in chunker.chunk("Tabs\tand   spaces.  New\nlines here!\n\nAnother paragraph?") {
            assert_eq!(chunk, normalize(&chunk));
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_multibyte_overlap_is_char_based() {
        let text = "Größenwachstum überall sichtbar. Ähnliche Ergebnisse für Übersee. Schöne Zahlen!";
        let chunker = TextChunker::new(40, 7).unwrap();
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        let tail = last_chars(&chunks[0], 7).trim();
        assert!(chunks[1].starts_with(tail));
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(matches!(TextChunker::new(0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_overlap_clamped() {
        let chunker = TextChunker::new(10, 50).unwrap();
        assert_eq!(chunker.overlap(), 9);
        assert_eq!(chunker.max_len(), 10);
    }

    #[test]
    fn test_last_chars() {
        assert_eq!(last_chars("abcdef", 3), "def");
        assert_eq!(last_chars("ab", 3), "ab");
        assert_eq!(last_chars("äöü", 2), "öü");
    }
}
