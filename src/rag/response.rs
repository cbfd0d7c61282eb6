//! RAG response generation.

use super::context::format_context_for_prompt;
use super::{ChatMessage, Completer, ContextBuilder, Conversation, OpenAICompleter, SourceDocument};
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// RAG engine for question answering.
pub struct RagEngine {
    completer: Arc<dyn Completer>,
    context_builder: ContextBuilder,
    prompts: Prompts,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(completer: Arc<dyn Completer>, context_builder: ContextBuilder) -> Self {
        Self {
            completer,
            context_builder,
            prompts: Prompts::default(),
        }
    }

    /// Build the OpenAI-backed engine described by `settings`.
    pub fn from_settings(
        settings: &Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let completer: Arc<dyn Completer> = Arc::new(OpenAICompleter::from_settings(&settings.rag)?);
        let context_builder = ContextBuilder::new(vector_store, embedder)
            .with_max_chunks(settings.rag.top_k)
            .with_min_score(settings.rag.min_score);
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        Ok(Self::new(completer, context_builder).with_prompts(prompts))
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Rewrite a follow-up into a question that stands on its own.
    ///
    /// Without history the question is returned unchanged.
    #[instrument(skip(self, conversation))]
    pub async fn condense(&self, question: &str, conversation: &Conversation) -> Result<String> {
        if conversation.is_empty() {
            return Ok(question.to_string());
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("chat_history".to_string(), conversation.render_history());

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.rag.condense, &vars);
        let standalone = self
            .completer
            .complete(&[ChatMessage::user(prompt)])
            .await?
            .trim()
            .to_string();

        debug!("Standalone question: {}", standalone);
        Ok(standalone)
    }

    /// Answer `question` from retrieved passages, given the conversation so far.
    ///
    /// The conversation is not modified; recording the exchange is up to the caller.
    #[instrument(skip(self, conversation), fields(history = conversation.len()))]
    pub async fn answer(&self, question: &str, conversation: &Conversation) -> Result<RagResponse> {
        info!("Processing question: {}", question);

        let standalone_question = self.condense(question, conversation).await?;
        let sources = self.context_builder.build(&standalone_question).await?;

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), standalone_question.clone());
        vars.insert("context".to_string(), format_context_for_prompt(&sources));
        vars.insert("chat_history".to_string(), conversation.render_history());

        let system_prompt = self
            .prompts
            .render_with_custom(&self.prompts.rag.system, &vars);
        let user_prompt = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        let answer = self
            .completer
            .complete(&[ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)])
            .await?;

        debug!("Generated response with {} sources", sources.len());

        Ok(RagResponse {
            answer,
            sources,
            standalone_question,
        })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone)]
pub struct RagResponse {
    /// The generated answer, unprocessed.
    pub answer: String,
    /// Retrieved passages, best first.
    pub sources: Vec<SourceDocument>,
    /// The question used for retrieval.
    pub standalone_question: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TyrewiseError;
    use crate::orchestrator::tests::KeywordEmbedder;
    use crate::rag::{Exchange, Role};
    use crate::vector_store::{Document, MemoryVectorStore};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedCompleter {
        replies: Mutex<VecDeque<Result<String>>>,
        pub(crate) requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedCompleter {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Completer for ScriptedCompleter {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.requests.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TyrewiseError::OpenAI("no scripted reply".to_string())))
        }
    }

    pub(crate) async fn manual_store() -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new();
        let content = "Valve core torque: 0.5 Nm.\nURL: ./manuals/valves.pdf";
        let embedding = KeywordEmbedder.embed(content).await.unwrap();
        store
            .upsert_batch(&[Document::new(
                "./resources/quick_reference.txt".to_string(),
                "quick_reference.txt".to_string(),
                None,
                content.to_string(),
                embedding,
                0,
            )])
            .await
            .unwrap();
        Arc::new(store)
    }

    async fn engine(completer: Arc<ScriptedCompleter>) -> RagEngine {
        let context = ContextBuilder::new(manual_store().await, Arc::new(KeywordEmbedder));
        RagEngine::new(completer, context)
    }

    #[tokio::test]
    async fn test_first_question_is_not_condensed() {
        let completer = Arc::new(ScriptedCompleter::new(vec![Ok("Use 0.5 Nm.".to_string())]));
        let engine = engine(completer.clone()).await;

        let response = engine
            .answer("Valve torque?", &Conversation::default())
            .await
            .unwrap();

        assert_eq!(response.answer, "Use 0.5 Nm.");
        assert_eq!(response.standalone_question, "Valve torque?");
        assert_eq!(response.sources.len(), 1);

        let requests = completer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, Role::System);
        assert!(requests[0][1].content.contains("Valve core torque"));
        assert!(requests[0][1].content.contains("Question: Valve torque?"));
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed_with_history() {
        let completer = Arc::new(ScriptedCompleter::new(vec![
            Ok("  What is the valve core torque for the spare?  ".to_string()),
            Ok("Same, 0.5 Nm.".to_string()),
        ]));
        let engine = engine(completer.clone()).await;

        let mut conversation = Conversation::default();
        conversation.record(Exchange::new("Valve torque?", "Use 0.5 Nm."));

        let response = engine.answer("And the spare?", &conversation).await.unwrap();

        assert_eq!(
            response.standalone_question,
            "What is the valve core torque for the spare?"
        );
        assert_eq!(conversation.len(), 1);

        let requests = completer.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0][0].content.contains("Follow Up Question: And the spare?"));
        assert!(requests[0][0].content.contains("Human: Valve torque?"));
        assert!(requests[1][1]
            .content
            .contains("Question: What is the valve core torque for the spare?"));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let completer = Arc::new(ScriptedCompleter::new(vec![Err(TyrewiseError::OpenAI(
            "rate limited".to_string(),
        ))]));
        let engine = engine(completer).await;

        let err = engine
            .answer("Valve torque?", &Conversation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TyrewiseError::OpenAI(_)));
    }
}
