use crate::document::Document;
use crate::error::{RagError, Result};

/// Boundaries a chunk prefers to end on, strongest first
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits text into overlapping windows measured in characters.
///
/// Each window ends on the last paragraph, line or word boundary found in its
/// second half, or is cut hard at `chunk_size` when there is none. The next
/// window starts `chunk_overlap` characters before the previous one ended, so
/// every chunk after the first begins with exactly `chunk_overlap` characters
/// repeated from its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(TextSplitter {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        if chars.is_empty() {
            return chunks;
        }

        let mut start = 0;
        loop {
            let hard_end = start + self.chunk_size;
            if hard_end >= chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }

            let end = self.window_end(&chars, start, hard_end);
            chunks.push(chars[start..end].iter().collect());

            // end - start > chunk_overlap, so the next window always advances
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Split every document, copying its metadata into each chunk
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|document| {
                self.split_text(&document.content)
                    .into_iter()
                    .map(|content| Document {
                        content,
                        metadata: document.metadata.clone(),
                    })
            })
            .collect()
    }

    fn window_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let min_end = start + (self.chunk_overlap + 1).max(self.chunk_size / 2);

        for separator in SEPARATORS {
            let separator: Vec<char> = separator.chars().collect();
            if let Some(end) = last_boundary(chars, &separator, min_end, hard_end) {
                return end;
            }
        }

        hard_end
    }
}

/// Largest `end` in `min_end..=max_end` such that `chars[..end]` ends with `separator`
fn last_boundary(chars: &[char], separator: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    (min_end.max(separator.len())..=max_end)
        .rev()
        .find(|&end| chars[end - separator.len()..end] == *separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().skip(overlap));
            }
        }
        text
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(TextSplitter::new(10, 10), Err(RagError::Config(_))));
        assert!(matches!(TextSplitter::new(0, 0), Err(RagError::Config(_))));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(1000, 20).unwrap();
        assert!(splitter.split_text("").is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let splitter = TextSplitter::new(1000, 20).unwrap();
        let text = "The quick brown fox.";
        assert_eq!(splitter.split_text(text), vec![text.to_string()]);
    }

    #[test]
    fn text_of_exactly_chunk_size_is_one_chunk() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert_eq!(splitter.split_text("abcdefghij").len(), 1);
    }

    #[test]
    fn hard_cuts_without_separators() {
        let splitter = TextSplitter::new(1000, 20).unwrap();
        let text = "a".repeat(1200);
        let chunks = splitter.split_text(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 220);
        assert_eq!(reconstruct(&chunks, 20), text);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(20, 3).unwrap();
        let text = "one two three\n\nfour five six seven eight";
        let chunks = splitter.split_text(text);

        assert_eq!(chunks[0], "one two three\n\n");
        assert!(chunks[1].starts_with("e\n\n"));
        assert_eq!(reconstruct(&chunks, 3), text);
    }

    #[test]
    fn falls_back_to_word_boundaries() {
        let splitter = TextSplitter::new(12, 2).unwrap();
        let text = "alpha beta gamma delta";
        let chunks = splitter.split_text(text);

        assert_eq!(chunks[0], "alpha beta ");
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let text = "ééééééé";
        let chunks = splitter.split_text(text);

        assert_eq!(chunks[0], "éééé");
        assert_eq!(reconstruct(&chunks, 1), text);
    }

    #[test]
    fn split_documents_copies_metadata() {
        let splitter = TextSplitter::new(1000, 20).unwrap();
        let document = Document::new("x".repeat(1500)).with_metadata("source", "a.txt");

        let chunks = splitter.split_documents(&[document.clone(), Document::new("")]);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.metadata, document.metadata);
        }
    }

    fn splitter_and_text() -> impl Strategy<Value = (usize, usize, String)> {
        (1usize..120).prop_flat_map(|size| {
            (
                Just(size),
                0..size,
                "[a-zé \n]{0,600}",
            )
        })
    }

    fn splitter_and_short_text() -> impl Strategy<Value = (usize, usize, String)> {
        (1usize..120).prop_flat_map(|size| {
            (
                Just(size),
                0..size,
                proptest::collection::vec(proptest::char::range('a', 'z'), 1..=size)
                    .prop_map(String::from_iter),
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_input((size, overlap, text) in splitter_and_text()) {
            let splitter = TextSplitter::new(size, overlap).unwrap();
            let chunks = splitter.split_text(&text);

            prop_assert_eq!(reconstruct(&chunks, overlap), text.clone());

            let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
            prop_assert!(total >= text.chars().count());

            for chunk in &chunks {
                let len = chunk.chars().count();
                prop_assert!(len >= 1 && len <= size);
            }
        }

        #[test]
        fn short_content_is_a_single_identical_chunk((size, overlap, text) in splitter_and_short_text()) {
            let splitter = TextSplitter::new(size, overlap).unwrap();
            prop_assert_eq!(splitter.split_text(&text), vec![text.clone()]);
        }
    }
}
