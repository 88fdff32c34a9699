//! Lexical TF-IDF retrieval over document chunks.
//!
//! No embeddings: scoring is term overlap weighted by inverse document
//! frequency, with a coverage multiplier rewarding chunks that match a larger
//! fraction of the query. Mutations only mark the derived statistics stale;
//! the rebuild happens lazily on the next search so bulk loads stay cheap.

use std::collections::{HashMap, HashSet};

use super::store::DocumentChunk;

/// Divisor scale for the length-normalized term frequency
/// (`occurrences / (chunk_len / TF_LENGTH_SCALE)`). Not canonical TF, kept
/// for compatibility with existing relevance behavior; tune here if needed.
const TF_LENGTH_SCALE: f64 = 100.0;

/// Tokens this short carry no signal and are dropped before indexing.
const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "but", "not", "you", "all", "any", "can", "had", "has",
    "her", "him", "his", "how", "its", "our", "out", "she", "too", "use", "who", "will", "with",
    "this", "that", "what", "when", "where", "which", "while", "your", "from", "they", "them",
    "then", "than", "there", "their", "these", "those", "have", "been", "were", "would", "could",
    "should", "about", "into", "some", "such", "only", "other", "more", "most", "over", "very",
];

/// One retrieval hit, ordered by descending score.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// Relevance score, always positive for returned results.
    pub score: f64,
    /// Display label of the owning document.
    pub source: String,
}

/// TF-IDF index over the current chunk set.
///
/// Owns its derived statistics; the chunk list itself is supplied by the
/// external store and mirrored here.
pub struct RetrievalIndex {
    chunks: Vec<DocumentChunk>,
    term_sets: Vec<HashSet<String>>,
    idf: HashMap<String, f64>,
    stale: bool,
}

impl RetrievalIndex {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            term_sets: Vec::new(),
            idf: HashMap::new(),
            stale: false,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Add chunks to the index. Statistics are rebuilt on the next search,
    /// not here, so repeated loads during ingestion don't thrash.
    pub fn load(&mut self, chunks: Vec<DocumentChunk>) {
        if chunks.is_empty() {
            return;
        }
        self.chunks.extend(chunks);
        self.stale = true;
    }

    /// Drop every chunk belonging to a document.
    pub fn remove(&mut self, document_id: &str) {
        let before = self.chunks.len();
        self.chunks.retain(|c| c.document_id != document_id);
        if self.chunks.len() != before {
            self.stale = true;
        }
    }

    /// Search the index. Returns at most `top_k` results with
    /// `score > min_score`, best first. An empty query or an empty index
    /// yields an empty result, never an error.
    pub fn search(&mut self, query: &str, top_k: usize, min_score: f64) -> Vec<RetrievalResult> {
        if self.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }
        self.rebuild_if_stale();

        let query_terms = unique_tokens(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<RetrievalResult> = Vec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            let matching: Vec<&String> = query_terms
                .iter()
                .filter(|t| self.term_sets[i].contains(*t))
                .collect();
            if matching.is_empty() {
                continue;
            }

            let content_lower = chunk.content.to_lowercase();
            let length_norm =
                (chunk.content.chars().count() as f64 / TF_LENGTH_SCALE).max(f64::EPSILON);

            let mut weighted = 0.0;
            for term in &matching {
                let occurrences = content_lower.matches(term.as_str()).count() as f64;
                let idf = self.idf.get(term.as_str()).copied().unwrap_or(1.0);
                weighted += occurrences / length_norm * idf;
            }

            let coverage = matching.len() as f64 / query_terms.len() as f64;
            let score = weighted / query_terms.len() as f64 * (1.0 + coverage);

            if score > min_score {
                results.push(RetrievalResult {
                    chunk: chunk.clone(),
                    score,
                    source: chunk.document_name.clone(),
                });
            }
        }

        // Stable sort keeps original chunk order for ties.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    fn rebuild_if_stale(&mut self) {
        if !self.stale {
            return;
        }

        self.term_sets = self
            .chunks
            .iter()
            .map(|c| unique_tokens(&c.content).into_iter().collect())
            .collect();

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for terms in &self.term_sets {
            for term in terms {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let total = self.chunks.len() as f64;
        self.idf = document_frequency
            .into_iter()
            .map(|(term, df)| {
                // Smoothed so rare terms don't dominate and df can never be 0.
                let idf = ((total + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
                (term, idf)
            })
            .collect();

        self.stale = false;
        tracing::debug!(
            chunks = self.chunks.len(),
            terms = self.idf.len(),
            "rebuilt retrieval index"
        );
    }
}

impl Default for RetrievalIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenize for indexing and querying: lowercase, split on anything that is
/// not alphanumeric, drop short tokens and stop words, dedupe preserving
/// first occurrence.
fn unique_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if token.len() < MIN_TOKEN_LEN || STOP_WORDS.contains(&token) {
            continue;
        }
        if seen.insert(token.to_string()) {
            tokens.push(token.to_string());
        }
    }

    tokens
}
