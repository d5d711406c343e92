//! Page chunking with overlap, splitting on whitespace where possible.

/// Default target size for a chunk, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Default number of trailing characters repeated at the start of the next chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// Overlap is capped at half the chunk size so every chunk makes progress.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size / 2),
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters.
    ///
    /// Text that already fits is returned untouched (trimmed). Longer text is
    /// re-joined word by word with single spaces; consecutive chunks share up
    /// to `chunk_overlap` characters of whole words.
    pub fn split(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;

        for piece in self.pieces(text) {
            let piece_len = piece.chars().count();
            let separator = usize::from(!current.is_empty());

            if current_len + separator + piece_len > self.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));
                let keep = self.overlap_tail(&current);
                current.drain(..current.len() - keep);
                current_len = joined_len(&current);

                // The overlap plus this piece may still be too long
                if !current.is_empty() && current_len + 1 + piece_len > self.chunk_size {
                    current.clear();
                    current_len = 0;
                }
            }

            if !current.is_empty() {
                current_len += 1;
            }
            current_len += piece_len;
            current.push(piece);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }

    /// Words of `text`, with any word longer than a chunk cut into chunk-sized slices.
    fn pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        for word in text.split_whitespace() {
            if word.chars().count() <= self.chunk_size {
                out.push(word);
                continue;
            }
            let mut start = 0;
            let mut count = 0;
            for (idx, _) in word.char_indices() {
                if count == self.chunk_size {
                    out.push(&word[start..idx]);
                    start = idx;
                    count = 0;
                }
                count += 1;
            }
            out.push(&word[start..]);
        }
        out
    }

    /// How many trailing words of `words` fit in the overlap budget.
    fn overlap_tail(&self, words: &[&str]) -> usize {
        let mut used = 0;
        let mut keep = 0;
        for word in words.iter().rev() {
            let len = word.chars().count() + usize::from(keep > 0);
            if used + len > self.chunk_overlap {
                break;
            }
            used += len;
            keep += 1;
        }
        keep
    }
}

fn joined_len(words: &[&str]) -> usize {
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::default();
        assert_eq!(
            splitter.split("  Toru walked to the meadow.\n"),
            vec!["Toru walked to the meadow.".to_string()]
        );
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(TextSplitter::default().split(" \n\t ").is_empty());
    }

    #[test]
    fn test_long_text_respects_chunk_size_and_overlaps() {
        let splitter = TextSplitter::new(50, 12);
        let text = (0..60).map(|i| format!("w{:02}", i)).collect::<Vec<_>>().join(" ");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {}", chunk);
        }
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].starts_with(last_word) || pair[1].contains(&format!(" {}", last_word)),
                "expected overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
        // Every word survives
        for i in 0..60 {
            let word = format!("w{:02}", i);
            assert!(chunks.iter().any(|c| c.split(' ').any(|w| w == word)));
        }
    }

    #[test]
    fn test_oversized_word_is_cut() {
        let splitter = TextSplitter::new(10, 0);
        let chunks = splitter.split(&"ä".repeat(25));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_overlap_is_capped() {
        let splitter = TextSplitter::new(10, 100);
        assert_eq!(splitter.chunk_overlap, 5);
    }
}
