//! Post-processing of model answers.
//!
//! An answer may carry a ```` ```python ```` plotting block. The block is
//! removed from the text shown to the user, executed by the
//! [`RestrictedExecutor`] and, when it draws a figure, persisted by the
//! [`ArtifactStore`]. Independently a manual citation is pulled from the
//! retrieved passages.

pub mod artifacts;
pub mod citation;
pub mod code_block;
pub mod executor;

pub use artifacts::{Artifact, ArtifactStore, RenderOptions};
pub use citation::CitationExtractor;
pub use code_block::{extract_code, remove_code_blocks, strip_save_directives};
pub use executor::{ExecutionFailure, RenderedFigure, RestrictedExecutor};

use crate::config::Settings;
use crate::error::Result;
use crate::rag::SourceDocument;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// A post-processed answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedAnswer {
    /// Answer text without code blocks.
    pub text: String,
    /// Rendered chart, if the answer carried working plotting code.
    pub image: Option<PathBuf>,
    /// Manual citation found in the retrieved passages.
    pub url: Option<String>,
    /// Whether the answer carried a plotting block.
    pub code_detected: bool,
}

/// Code extraction, execution, persistence and citation in one pass.
pub struct ResponsePipeline {
    executor: RestrictedExecutor,
    store: ArtifactStore,
    citations: CitationExtractor,
}

impl ResponsePipeline {
    pub fn new(executor: RestrictedExecutor, store: ArtifactStore, citations: CitationExtractor) -> Self {
        Self {
            executor,
            store,
            citations,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = ArtifactStore::from_settings(settings);
        let executor = RestrictedExecutor::new(&settings.executor, store.options().clone());
        let citations = CitationExtractor::for_manuals_dir(&settings.index.manuals_dir)?;
        Ok(Self::new(executor, store, citations))
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.store
    }

    /// Post-process a raw answer.
    ///
    /// Code that fails to run yields no image. Failing to store a rendered
    /// image is an error.
    pub async fn process(&self, answer: &str, sources: &[SourceDocument]) -> Result<ProcessedAnswer> {
        let text = remove_code_blocks(answer);

        let code = extract_code(answer);
        let image = match &code {
            Some(code) => self.render_artifact(code).await?.map(|artifact| artifact.path),
            None => None,
        };

        let url = self.citations.extract_from_sources(sources);

        Ok(ProcessedAnswer {
            text,
            image,
            url,
            code_detected: code.is_some(),
        })
    }

    /// Run plotting code and store the figure it draws.
    pub async fn render_artifact(&self, code: &str) -> Result<Option<Artifact>> {
        info!("Detected Python code block, executing");
        let code = strip_save_directives(code);

        match self.executor.render(&code).await {
            Ok(figure) => self.store.persist(&figure).map(Some),
            Err(failure) => {
                warn!("Generated code did not produce a chart: {}", failure);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorSettings;
    use crate::error::TyrewiseError;
    use crate::pipeline::executor::matplotlib_version;
    use std::path::Path;

    fn pipeline(dir: &Path) -> ResponsePipeline {
        let store = ArtifactStore::new(dir.join("graphs"), RenderOptions::default());
        let executor = RestrictedExecutor::new(&ExecutorSettings::default(), store.options().clone());
        let citations = CitationExtractor::new(citation::DEFAULT_MANUALS_PREFIX).unwrap();
        ResponsePipeline::new(executor, store, citations)
    }

    fn source(content: &str) -> SourceDocument {
        SourceDocument {
            content: content.to_string(),
            source: "./resources/quick_reference.txt".to_string(),
            title: "quick_reference.txt".to_string(),
            page: None,
            score: 0.8,
        }
    }

    #[tokio::test]
    async fn test_plain_answer_with_citation() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![source("no reference here"), source("Operator manual: ./manuals/z.pdf")];

        let processed = pipeline(dir.path())
            .process("  Deflate before removing the rim.  ", &sources)
            .await
            .unwrap();

        assert_eq!(processed.text, "Deflate before removing the rim.");
        assert_eq!(processed.image, None);
        assert!(!processed.code_detected);
        assert_eq!(processed.url.as_deref(), Some("./manuals/z.pdf"));
    }

    #[tokio::test]
    async fn test_failing_code_degrades_to_no_image() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        for answer in [
            "Chart:\n```python\nplt.bar(['a'], [1]\n```",
            "Chart:\n```python\nprint(().__class__)\n```",
        ] {
            let processed = pipeline.process(answer, &[]).await.unwrap();
            assert_eq!(processed.text, "Chart:");
            assert_eq!(processed.image, None);
            assert!(processed.code_detected);
        }

        assert!(!dir.path().join("graphs").exists());
    }

    #[tokio::test]
    async fn test_bar_chart_is_persisted() {
        if matplotlib_version("python3").await.is_err() {
            eprintln!("python3 with matplotlib not available, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let answer = "Pressures:\n```python\nimport matplotlib.pyplot as plt\nplt.figure(figsize=(8, 6))\nplt.bar(['Front', 'Rear'], [95, 105])\nplt.savefig(\n    'pressures.png',\n    dpi=300,\n)\n```";

        let processed = pipeline(dir.path()).process(answer, &[]).await.unwrap();

        let image = processed.image.unwrap();
        assert_eq!(image.parent().unwrap(), dir.path().join("graphs"));
        let stem = image.file_stem().unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
        assert_eq!(image.extension().unwrap(), "png");
        assert!(std::fs::metadata(&image).unwrap().len() > 0);
        assert!(!dir.path().join("pressures.png").exists());
    }

    #[tokio::test]
    async fn test_unwritable_store_is_an_error() {
        if matplotlib_version("python3").await.is_err() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("graphs"), b"file in the way").unwrap();

        let err = pipeline(dir.path())
            .process("```python\nplt.plot([1, 2, 3])\n```", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TyrewiseError::ArtifactWrite { .. }));
    }
}
