//! Index orchestrator for Tyrewise.
//!
//! Coordinates loading manuals and the quick reference, chunking, embedding
//! and storing them in the vector store.

use crate::chunking::{ChunkingConfig, RecursiveSplitter};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::loader::{self, LoadedPage};
use crate::manuals::ManualLibrary;
use crate::vector_store::{Document, SqliteVectorStore, VectorStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main orchestrator for building and maintaining the index.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    splitter: RecursiveSplitter,
}

impl Orchestrator {
    /// Create an orchestrator backed by OpenAI embeddings and the SQLite store.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?);

        Ok(Self::with_components(settings, embedder, vector_store))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        let splitter = RecursiveSplitter::new(ChunkingConfig {
            chunk_size: settings.index.chunk_size,
            chunk_overlap: settings.index.chunk_overlap,
        });

        Self {
            settings,
            embedder,
            vector_store,
            splitter,
        }
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The configured manuals directory.
    pub fn library(&self) -> ManualLibrary {
        ManualLibrary::new(self.settings.manuals_dir())
    }

    /// Index every manual and the quick reference, dropping sources whose
    /// files no longer exist.
    #[instrument(skip(self))]
    pub async fn index_all(&self) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut present = HashSet::new();

        let manuals = loader::list_manuals(&self.settings.manuals_dir())?;
        info!("Indexing {} manuals", manuals.len());

        for path in &manuals {
            eprintln!("  Loading {}", loader::title_of(path));
            let chunks = self.index_manual(path).await?;
            eprintln!("    {} chunks", chunks);
            present.insert(path.display().to_string());
            report.sources.push((path.display().to_string(), chunks));
        }

        let quick_reference = self.settings.quick_reference_path();
        if quick_reference.exists() {
            eprintln!("  Loading {}", loader::title_of(&quick_reference));
            let page = loader::load_text(&quick_reference)?;
            let chunks = self.index_pages(&page.source, &[page.clone()]).await?;
            eprintln!("    {} chunks", chunks);
            present.insert(page.source.clone());
            report.sources.push((page.source, chunks));
        } else {
            warn!("Quick reference not found at {:?}, skipping", quick_reference);
        }

        for stale in self.vector_store.list_sources().await? {
            if !present.contains(&stale.source) {
                let removed = self.vector_store.delete_by_source(&stale.source).await?;
                info!("Dropped {} chunks of missing source {}", removed, stale.source);
                report.removed_sources.push(stale.source);
            }
        }

        Ok(report)
    }

    /// Load, chunk, embed and store a single PDF manual.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn index_manual(&self, path: &Path) -> Result<usize> {
        let pages = loader::load_pdf(path).await?;
        self.index_pages(&path.display().to_string(), &pages).await
    }

    /// Replace the indexed chunks of `source` with chunks of `pages`.
    pub async fn index_pages(&self, source: &str, pages: &[LoadedPage]) -> Result<usize> {
        let chunks = self.splitter.split_pages(pages);

        self.vector_store.delete_by_source(source).await?;

        if chunks.is_empty() {
            warn!("No text extracted from {}", source);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let documents: Vec<Document> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                Document::new(
                    chunk.source,
                    chunk.title,
                    chunk.page,
                    chunk.content,
                    embedding,
                    chunk.order,
                )
            })
            .collect();

        self.vector_store.upsert_batch(&documents).await
    }

    /// Delete a manual file and its indexed chunks.
    #[instrument(skip(self))]
    pub async fn remove_manual(&self, filename: &str) -> Result<usize> {
        let path = self.library().remove(filename)?;
        self.vector_store
            .delete_by_source(&path.display().to_string())
            .await
    }
}

/// Result of indexing.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Indexed sources with their chunk counts.
    pub sources: Vec<(String, usize)>,
    /// Sources dropped because their files disappeared.
    pub removed_sources: Vec<String>,
}

impl IndexReport {
    /// Total chunks indexed.
    pub fn total_chunks(&self) -> usize {
        self.sources.iter().map(|(_, chunks)| chunks).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TyrewiseError;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;

    /// Deterministic embedder: counts of a few keywords.
    pub(crate) struct KeywordEmbedder;

    const KEYWORDS: [&str; 4] = ["valve", "rim", "pressure", "ppe"];

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let mut vector: Vec<f32> = KEYWORDS
                .iter()
                .map(|k| lower.matches(k).count() as f32)
                .collect();
            vector.push(0.01);
            Ok(vector)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    fn orchestrator(dir: &Path) -> Orchestrator {
        let mut settings = Settings::default();
        settings.index.manuals_dir = dir.join("manuals").display().to_string();
        settings.index.quick_reference = dir.join("quick_reference.txt").display().to_string();

        Orchestrator::with_components(
            settings,
            Arc::new(KeywordEmbedder),
            Arc::new(MemoryVectorStore::new()),
        )
    }

    #[tokio::test]
    async fn test_index_all_with_quick_reference_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("quick_reference.txt"),
            "Valve core removal\nURL: ./manuals/valves.pdf",
        )
        .unwrap();

        let orchestrator = orchestrator(dir.path());
        let report = orchestrator.index_all().await.unwrap();

        assert_eq!(report.total_chunks(), 1);
        assert_eq!(orchestrator.vector_store().document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reindexing_replaces_source_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let page = LoadedPage {
            source: "./manuals/rims.pdf".to_string(),
            title: "rims.pdf".to_string(),
            page: Some(1),
            text: "Rim inspection".to_string(),
        };

        orchestrator.index_pages(&page.source, &[page.clone()]).await.unwrap();
        orchestrator.index_pages(&page.source, &[page.clone()]).await.unwrap();

        assert_eq!(orchestrator.vector_store().document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_index_all_drops_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let page = LoadedPage {
            source: "./manuals/retired.pdf".to_string(),
            title: "retired.pdf".to_string(),
            page: Some(1),
            text: "Old rim procedure".to_string(),
        };
        orchestrator.index_pages(&page.source.clone(), &[page]).await.unwrap();

        let report = orchestrator.index_all().await.unwrap();

        assert_eq!(report.removed_sources, vec!["./manuals/retired.pdf"]);
        assert_eq!(orchestrator.vector_store().document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_missing_manual_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());

        let err = orchestrator.remove_manual("absent.pdf").await.unwrap_err();
        assert!(matches!(err, TyrewiseError::ManualNotFound(_)));
    }
}
