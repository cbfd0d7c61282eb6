//! One chat turn: retrieve, answer, post-process.

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::pipeline::ResponsePipeline;
use crate::rag::{Conversation, Exchange, RagEngine, SourceDocument};
use crate::vector_store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Answer text without code blocks.
    pub text: String,
    /// Rendered chart, if any.
    pub image: Option<PathBuf>,
    /// Manual citation, if any.
    pub url: Option<String>,
    /// Whether the answer carried plotting code.
    pub code_detected: bool,
    /// Retrieved passages, best first.
    pub sources: Vec<SourceDocument>,
    /// The exchange to record in the conversation.
    pub exchange: Exchange,
}

impl TurnOutcome {
    /// Plotting code was present but produced no chart.
    pub fn chart_failed(&self) -> bool {
        self.code_detected && self.image.is_none()
    }
}

/// The chat assistant.
pub struct Assistant {
    engine: RagEngine,
    pipeline: ResponsePipeline,
}

impl Assistant {
    pub fn new(engine: RagEngine, pipeline: ResponsePipeline) -> Self {
        Self { engine, pipeline }
    }

    /// Assemble the OpenAI-backed assistant over an existing index.
    pub fn from_settings(
        settings: &Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let engine = RagEngine::from_settings(settings, vector_store, embedder)?;
        let pipeline = ResponsePipeline::from_settings(settings)?;
        Ok(Self::new(engine, pipeline))
    }

    pub fn pipeline(&self) -> &ResponsePipeline {
        &self.pipeline
    }

    /// Run one turn against `conversation` without modifying it.
    ///
    /// Callers record `outcome.exchange` once the turn has succeeded, so a
    /// failed turn leaves the history untouched.
    #[instrument(skip(self, conversation))]
    pub async fn respond(&self, conversation: &Conversation, question: &str) -> Result<TurnOutcome> {
        let response = self.engine.answer(question, conversation).await?;
        let processed = self.pipeline.process(&response.answer, &response.sources).await?;

        Ok(TurnOutcome {
            text: processed.text,
            image: processed.image,
            url: processed.url,
            code_detected: processed.code_detected,
            sources: response.sources,
            exchange: Exchange::new(question, response.answer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TyrewiseError;
    use crate::orchestrator::tests::KeywordEmbedder;
    use crate::pipeline::{citation, ArtifactStore, CitationExtractor, RenderOptions, RestrictedExecutor};
    use crate::rag::response::tests::{manual_store, ScriptedCompleter};
    use crate::rag::ContextBuilder;
    use crate::config::ExecutorSettings;

    async fn assistant(replies: Vec<Result<String>>, graphs: PathBuf) -> Assistant {
        let completer = Arc::new(ScriptedCompleter::new(replies));
        let context = ContextBuilder::new(manual_store().await, Arc::new(KeywordEmbedder));
        let engine = RagEngine::new(completer, context);

        let store = ArtifactStore::new(graphs, RenderOptions::default());
        let executor = RestrictedExecutor::new(&ExecutorSettings::default(), store.options().clone());
        let citations = CitationExtractor::new(citation::DEFAULT_MANUALS_PREFIX).unwrap();

        Assistant::new(engine, ResponsePipeline::new(executor, store, citations))
    }

    #[test]
    fn test_turn_records_raw_answer_after_success() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let raw = "Torque it to 0.5 Nm.\n```python\nplt.bar(['a'], [1]\n```";
            let assistant = assistant(vec![Ok(raw.to_string())], dir.path().join("graphs")).await;
            let mut conversation = Conversation::default();

            let outcome = assistant.respond(&conversation, "Valve torque?").await.unwrap();
            assert!(conversation.is_empty());

            conversation.record(outcome.exchange.clone());

            assert_eq!(outcome.text, "Torque it to 0.5 Nm.");
            assert_eq!(outcome.image, None);
            assert!(outcome.chart_failed());
            assert_eq!(outcome.url.as_deref(), Some("./manuals/valves.pdf"));
            assert_eq!(outcome.exchange.answer, raw);
            assert_eq!(conversation.len(), 1);
        });
    }

    #[tokio::test]
    async fn test_plain_answer_is_not_a_failed_chart() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = assistant(
            vec![Ok("Torque it to 0.5 Nm.".to_string())],
            dir.path().join("graphs"),
        )
        .await;

        let outcome = assistant
            .respond(&Conversation::default(), "Valve torque?")
            .await
            .unwrap();
        assert!(!outcome.code_detected);
        assert!(!outcome.chart_failed());
    }

    #[tokio::test]
    async fn test_failed_turn_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = assistant(
            vec![Err(TyrewiseError::OpenAI("unavailable".to_string()))],
            dir.path().join("graphs"),
        )
        .await;
        let conversation = Conversation::default();

        assert!(assistant.respond(&conversation, "Valve torque?").await.is_err());
        assert!(conversation.is_empty());
    }
}
