//! Explicit session state for indexing and question answering.
//!
//! The LLM client, embedding client, flat index, and chunk store travel
//! together in one [`Session`] value passed into each operation, rather than
//! living in process-wide mutable globals. A caller holds exactly one
//! session at a time; nothing ambient is shared between sessions.

use anyhow::Result;
use std::collections::HashMap;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::index::FlatIndex;
use crate::llm::{LlmClient, NO_CONTEXT_ANSWER};
use crate::models::StoredChunk;

pub struct Session {
    config: Config,
    llm: LlmClient,
    embedder: EmbeddingClient,
    index: FlatIndex,
    /// Index position → source URL and chunk text. In-memory only; vectors
    /// loaded from a persisted index file have no entry here and contribute
    /// nothing to answer context.
    store: HashMap<usize, StoredChunk>,
}

impl Session {
    /// Build clients from config and load the index file if one exists,
    /// else start with an empty index of the configured dimensionality.
    pub fn open(config: &Config) -> Result<Self> {
        let llm = LlmClient::new(&config.llm)?;
        let embedder = EmbeddingClient::new(&config.embedding)?;
        let index = FlatIndex::load_or_empty(&config.index.path, config.embedding.dims)?;

        Ok(Self {
            config: config.clone(),
            llm,
            embedder,
            index,
            store: HashMap::new(),
        })
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Summarize review content with the session's LLM.
    pub async fn summarize(&self, content: &str) -> Result<String> {
        self.llm.summarize(content).await
    }

    /// Chunk, embed, and append review text to the index, then persist the
    /// index file wholesale. Returns the number of chunks stored.
    pub async fn ingest(&mut self, text: &str, source_url: &str) -> Result<usize> {
        let chunks = chunk_text(
            text,
            self.config.index.chunk_chars,
            self.config.index.overlap_chars,
        );
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;

        let first = self.index.add(vectors)?;
        for (offset, chunk) in chunks.iter().enumerate() {
            self.store.insert(
                first + offset,
                StoredChunk {
                    source_url: source_url.to_string(),
                    text: chunk.text.clone(),
                },
            );
        }

        self.index.save(&self.config.index.path)?;
        Ok(chunks.len())
    }

    /// Answer a question over the indexed chunks.
    ///
    /// An empty index short-circuits to the fixed no-information response
    /// without contacting the embedder. Otherwise the query is embedded,
    /// the `top_k` nearest positions are retrieved, and the stored texts
    /// for those positions become the answer context.
    pub async fn ask(&self, question: &str) -> Result<String> {
        if self.index.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let query = self.embedder.embed_query(question).await?;
        let hits = self.index.search(&query, self.config.index.top_k);

        let context = self.context_for(&hits);
        if context.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        self.llm.answer(&context, question).await
    }

    /// Concatenate the stored texts for a set of hits. Positions without a
    /// stored chunk are skipped.
    fn context_for(&self, hits: &[crate::index::Hit]) -> String {
        let parts: Vec<&str> = hits
            .iter()
            .filter_map(|hit| self.store.get(&hit.position))
            .map(|stored| stored.text.as_str())
            .collect();
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Hit;
    use tempfile::TempDir;

    fn test_session(tmp: &TempDir) -> Session {
        let mut config = Config::minimal();
        config.index.path = tmp.path().join("reviews.idx");
        config.embedding.dims = 2;
        Session::open(&config).unwrap()
    }

    #[tokio::test]
    async fn test_ask_empty_index_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let session = test_session(&tmp);

        // No Ollama is running in tests; reaching the embedder would error.
        let answer = session.ask("is it good?").await.unwrap();
        assert_eq!(answer, NO_CONTEXT_ANSWER);
    }

    #[test]
    fn test_context_skips_positions_without_text() {
        let tmp = TempDir::new().unwrap();
        let mut session = test_session(&tmp);

        session
            .index
            .add(vec![vec![0.0, 0.0], vec![1.0, 1.0]])
            .unwrap();
        session.store.insert(
            1,
            StoredChunk {
                source_url: "https://example.test/reviews".to_string(),
                text: "a stored chunk".to_string(),
            },
        );

        let hits = vec![
            Hit {
                position: 0,
                distance: 0.0,
            },
            Hit {
                position: 1,
                distance: 2.0,
            },
        ];
        assert_eq!(session.context_for(&hits), "a stored chunk");
    }

    #[test]
    fn test_context_empty_when_no_stored_chunks() {
        let tmp = TempDir::new().unwrap();
        let mut session = test_session(&tmp);
        session.index.add(vec![vec![0.5, 0.5]]).unwrap();

        let hits = vec![Hit {
            position: 0,
            distance: 0.0,
        }];
        assert_eq!(session.context_for(&hits), "");
    }

    #[tokio::test]
    async fn test_ingest_empty_text_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut session = test_session(&tmp);

        let stored = session.ingest("", "https://example.test").await.unwrap();
        assert_eq!(stored, 0);
        assert_eq!(session.index_len(), 0);
        assert!(!tmp.path().join("reviews.idx").exists());
    }
}
