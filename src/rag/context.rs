//! Context building for RAG responses.

use super::SourceDocument;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorStore;
use std::sync::Arc;
use tracing::debug;

/// Builds context from search results for RAG.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_chunks: usize,
    min_score: f32,
}

impl ContextBuilder {
    /// Create a new context builder.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            max_chunks: 8,
            min_score: 0.0,
        }
    }

    /// Set the maximum number of context chunks.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Retrieve the passages most similar to `query`, best first.
    pub async fn build(&self, query: &str) -> Result<Vec<SourceDocument>> {
        let query_embedding = self.embedder.embed(query).await?;

        let results = self
            .vector_store
            .search_with_threshold(&query_embedding, self.max_chunks, self.min_score)
            .await?;

        debug!("Retrieved {} passages", results.len());
        Ok(results.into_iter().map(SourceDocument::from).collect())
    }
}

/// Passage texts joined for the prompt's context slot.
pub fn format_context_for_prompt(sources: &[SourceDocument]) -> String {
    sources
        .iter()
        .map(|source| source.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per passage for display to the user.
pub fn format_sources_for_display(sources: &[SourceDocument]) -> String {
    sources
        .iter()
        .map(|source| format!("{} (score: {:.2})", source.location(), source.score))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::KeywordEmbedder;
    use crate::vector_store::{Document, MemoryVectorStore};

    async fn store_with(docs: &[(&str, &str)]) -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new();
        let embedder = KeywordEmbedder;
        let mut documents = Vec::new();
        for (i, (title, content)) in docs.iter().enumerate() {
            documents.push(Document::new(
                format!("./manuals/{title}"),
                title.to_string(),
                Some(1),
                content.to_string(),
                embedder.embed(content).await.unwrap(),
                i as i32,
            ));
        }
        store.upsert_batch(&documents).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_build_ranks_and_limits() {
        let store = store_with(&[
            ("rims.pdf", "rim rim rim inspection"),
            ("valves.pdf", "valve core and valve cap"),
            ("ppe.pdf", "ppe checklist"),
        ])
        .await;

        let builder = ContextBuilder::new(store, Arc::new(KeywordEmbedder)).with_max_chunks(2);
        let sources = builder.build("which valve?").await.unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "valves.pdf");
        assert!(sources[0].score >= sources[1].score);
    }

    #[test]
    fn test_formatting() {
        let sources = vec![
            SourceDocument {
                content: "First".to_string(),
                source: "./manuals/a.pdf".to_string(),
                title: "a.pdf".to_string(),
                page: Some(3),
                score: 0.91,
            },
            SourceDocument {
                content: "Second".to_string(),
                source: "./resources/quick_reference.txt".to_string(),
                title: "quick_reference.txt".to_string(),
                page: None,
                score: 0.5,
            },
        ];

        assert_eq!(format_context_for_prompt(&sources), "First\n\nSecond");
        assert_eq!(
            format_sources_for_display(&sources),
            "a.pdf p. 3 (score: 0.91)\nquick_reference.txt (score: 0.50)"
        );
    }
}
