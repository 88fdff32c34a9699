//! Sentence-bounded document chunking.
//!
//! Sentences are greedily packed into chunks of roughly `chunk_size`
//! characters. Each new chunk is seeded with the tail of the previous one so
//! a fact split across a boundary is still retrievable from either side.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub overlap: usize,
    /// Chunks shorter than this are dropped as noise.
    pub min_chunk_len: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            min_chunk_len: 20,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split extracted document text into overlapping chunks.
    ///
    /// Empty input yields an empty result; this never fails. Input shorter
    /// than the minimum chunk length is returned as-is in a single chunk.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        if char_len(&normalized) < self.config.min_chunk_len {
            return vec![normalized];
        }

        let sentences = split_sentences(&normalized);
        if sentences.len() <= 1 && char_len(&normalized) > self.config.chunk_size {
            // Unstructured text without sentence boundaries.
            return self.fixed_width(&normalized);
        }

        self.pack_sentences(sentences)
    }

    fn pack_sentences(&self, sentences: Vec<String>) -> Vec<String> {
        // A sentence longer than this could blow past the size bound even in
        // a freshly seeded chunk, so such sentences are pre-sliced.
        let max_piece = self
            .config
            .chunk_size
            .saturating_sub(self.config.overlap + 1)
            .max(1);

        let mut chunks: Vec<String> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for sentence in sentences {
            for piece in slice_chars(&sentence, max_piece) {
                let piece_chars = char_len(&piece);
                // A freshly seeded buffer never closes here: the seed is at
                // most `overlap` chars and a piece at most `max_piece`, which
                // together fit under the size bound.
                if !buffer.is_empty() && buffer_chars + 1 + piece_chars > self.config.chunk_size {
                    let seed = self.overlap_seed(&buffer);
                    chunks.push(std::mem::take(&mut buffer));
                    buffer_chars = char_len(&seed);
                    buffer = seed;
                }

                if buffer.is_empty() {
                    buffer = piece;
                    buffer_chars = piece_chars;
                } else {
                    buffer.push(' ');
                    buffer.push_str(&piece);
                    buffer_chars += 1 + piece_chars;
                }
            }
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        chunks
            .into_iter()
            .filter(|c| char_len(c) >= self.config.min_chunk_len)
            .collect()
    }

    /// Tail of a closed chunk used to seed the next one, trimmed forward to
    /// the nearest word boundary so the seed never starts mid-word.
    fn overlap_seed(&self, chunk: &str) -> String {
        let chars: Vec<char> = chunk.chars().collect();
        if chars.len() <= self.config.overlap {
            return chunk.trim().to_string();
        }

        let tail: String = chars[chars.len() - self.config.overlap..].iter().collect();
        match tail.split_once(' ') {
            Some((_, rest)) => rest.trim().to_string(),
            None => tail.trim().to_string(),
        }
    }

    fn fixed_width(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self
            .config
            .chunk_size
            .saturating_sub(self.config.overlap)
            .max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.config.chunk_size).min(chars.len());
            let slice: String = chars[start..end].iter().collect();
            if char_len(slice.trim()) >= self.config.min_chunk_len {
                chunks.push(slice.trim().to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split on `.`, `!` or `?` followed by whitespace. The terminator stays with
/// its sentence. Input is already whitespace-normalized.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;

    for i in 0..chars.len() {
        if matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1) == Some(&' ') {
            let sentence: String = chars[start..=i].iter().collect();
            if !sentence.trim().is_empty() {
                sentences.push(sentence.trim().to_string());
            }
            start = i + 2;
        }
    }

    if start < chars.len() {
        let rest: String = chars[start..].iter().collect();
        if !rest.trim().is_empty() {
            sentences.push(rest.trim().to_string());
        }
    }

    sentences
}

/// Slice a string into pieces of at most `max_chars` characters.
fn slice_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_chunker() -> Chunker {
        Chunker::default()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(default_chunker().chunk("").is_empty());
        assert!(default_chunker().chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn short_input_survives_as_single_chunk() {
        let chunks = default_chunker().chunk("Tiny note.");
        assert_eq!(chunks, vec!["Tiny note.".to_string()]);
    }

    #[test]
    fn chunks_respect_size_bound() {
        let text = "The quick brown fox jumps over the lazy dog near the river bank. ".repeat(40);
        let chunker = default_chunker();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let len = chunk.chars().count();
            assert!(len <= 500 + 50, "chunk of {} chars exceeds bound", len);
            assert!(len >= 20, "chunk of {} chars below minimum", len);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "The quick brown fox jumps over the lazy dog near the river bank. ".repeat(40);
        let chunks = default_chunker().chunk(&text);
        assert!(chunks.len() > 1);

        // Each chunk after the first starts with the word-trimmed tail of the
        // previous one.
        for pair in chunks.windows(2) {
            let first_words: Vec<&str> = pair[1].split(' ').take(2).collect();
            let seed = first_words.join(" ");
            assert!(
                pair[0].contains(&seed),
                "chunk does not continue from previous: {:?}",
                seed
            );
        }
    }

    #[test]
    fn every_sentence_lands_in_some_chunk() {
        let sentences: Vec<String> = (0..30)
            .map(|i| format!("Sentence number {} carries a distinct payload marker.", i))
            .collect();
        let text = sentences.join(" ");
        let chunks = default_chunker().chunk(&text);

        for sentence in &sentences {
            assert!(
                chunks.iter().any(|c| c.contains(sentence)),
                "lost sentence: {}",
                sentence
            );
        }
    }

    #[test]
    fn unstructured_text_falls_back_to_fixed_width() {
        // No sentence boundaries at all.
        let text = "lorem ipsum dolor sit amet ".repeat(60).replace('.', "");
        let chunks = default_chunker().chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500);
        }
    }

    #[test]
    fn giant_sentence_is_sliced_rather_than_dropped() {
        let giant = format!("{} end here.", "word ".repeat(300).trim());
        let text = format!("A leading sentence sits in front. {} A trailing one closes.", giant);
        let chunks = default_chunker().chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 550);
        }
        assert!(chunks.iter().any(|c| c.contains("end here.")));
    }

    #[test]
    fn whitespace_is_normalized() {
        let chunks = default_chunker().chunk("Spaced    out\n\nwords   across lines.");
        assert_eq!(chunks, vec!["Spaced out words across lines.".to_string()]);
    }
}
