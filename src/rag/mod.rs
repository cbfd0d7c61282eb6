//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! Retrieves manual passages for a question and asks the chat model to answer
//! from them, carrying the conversation so far.

mod completion;
pub mod context;
mod conversation;
pub(crate) mod response;

pub use completion::{ChatMessage, Completer, OpenAICompleter, Role};
pub use context::ContextBuilder;
pub use conversation::{Conversation, Exchange};
pub use response::{RagEngine, RagResponse};

use crate::vector_store::SearchResult;
use serde::Serialize;

/// A retrieved passage, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDocument {
    /// Passage text.
    pub content: String,
    /// Path of the file the passage came from.
    pub source: String,
    /// File name.
    pub title: String,
    /// Page number for PDF manuals.
    pub page: Option<u32>,
    /// Similarity score.
    pub score: f32,
}

impl SourceDocument {
    /// `title p. N`, or the title alone.
    pub fn location(&self) -> String {
        match self.page {
            Some(page) => format!("{} p. {}", self.title, page),
            None => self.title.clone(),
        }
    }
}

impl From<SearchResult> for SourceDocument {
    fn from(result: SearchResult) -> Self {
        Self {
            content: result.document.content,
            source: result.document.source,
            title: result.document.title,
            page: result.document.page,
            score: result.score,
        }
    }
}
