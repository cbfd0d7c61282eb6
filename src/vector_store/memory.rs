//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank, Document, IndexedSource, SearchResult, VectorStore};
use crate::error::{Result, TyrewiseError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, Document>>> {
        self.documents
            .read()
            .map_err(|e| TyrewiseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, Document>>> {
        self.documents
            .write()
            .map_err(|e| TyrewiseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        for doc in docs {
            store.insert(doc.id, doc.clone());
        }
        Ok(docs.len())
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let docs = self.read()?;

        let results: Vec<SearchResult> = docs
            .values()
            .map(|doc| SearchResult {
                score: cosine_similarity(query_embedding, &doc.embedding),
                document: doc.clone(),
            })
            .filter(|r| r.score >= min_score)
            .collect();

        Ok(rank(results, limit))
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let mut docs = self.write()?;
        let initial_len = docs.len();
        docs.retain(|_, doc| doc.source != source);
        Ok(initial_len - docs.len())
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let docs = self.read()?;

        let mut by_source: HashMap<String, IndexedSource> = HashMap::new();
        for doc in docs.values() {
            let entry = by_source
                .entry(doc.source.clone())
                .or_insert_with(|| IndexedSource {
                    source: doc.source.clone(),
                    title: doc.title.clone(),
                    chunk_count: 0,
                    indexed_at: doc.indexed_at,
                });

            entry.chunk_count += 1;
            if doc.indexed_at > entry.indexed_at {
                entry.indexed_at = doc.indexed_at;
            }
        }

        let mut sources: Vec<IndexedSource> = by_source.into_values().collect();
        sources.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(sources)
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, content: &str, embedding: Vec<f32>, order: i32) -> Document {
        Document::new(
            source.to_string(),
            source.rsplit('/').next().unwrap_or(source).to_string(),
            Some(1),
            content.to_string(),
            embedding,
            order,
        )
    }

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert_batch(&[
                doc("./manuals/a.pdf", "Inflate with nitrogen", vec![1.0, 0.0, 0.0], 0),
                doc("./manuals/a.pdf", "Check lock ring", vec![0.0, 1.0, 0.0], 1),
                doc("./manuals/b.pdf", "Deflate before removal", vec![0.7, 0.7, 0.0], 0),
            ])
            .await
            .unwrap();

        assert_eq!(store.document_count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "Inflate with nitrogen");
        assert!(results[0].score > results[1].score);

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].chunk_count, 2);
        assert!(sources.iter().any(|s| s.source == "./manuals/b.pdf"));

        assert_eq!(store.delete_by_source("./manuals/a.pdf").await.unwrap(), 2);
        assert_eq!(store.document_count().await.unwrap(), 1);
        let sources = store.list_sources().await.unwrap();
        assert!(sources.iter().all(|s| s.source != "./manuals/a.pdf"));
    }

    #[tokio::test]
    async fn test_threshold_filters_weak_matches() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                doc("q.txt", "match", vec![1.0, 0.0], 0),
                doc("q.txt", "orthogonal", vec![0.0, 1.0], 1),
            ])
            .await
            .unwrap();

        let results = store
            .search_with_threshold(&[1.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "match");
    }
}
