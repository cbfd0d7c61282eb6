//! Tyrewise - tyre maintenance safety assistant
//!
//! A retrieval-augmented chat assistant over tyre maintenance manuals.
//!
//! # Overview
//!
//! Tyrewise allows you to:
//! - Index a directory of PDF manuals and a quick reference file
//! - Ask questions and get answers grounded in the manuals
//! - Get charts rendered from plotting code in the answers
//! - Find the manual a procedure comes from
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `loader` - PDF and text loading
//! - `chunking` - Recursive text splitting
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `manuals` - The manuals directory
//! - `orchestrator` - Index building
//! - `rag` - Conversation, retrieval and answering
//! - `pipeline` - Answer post-processing (code blocks, charts, citations)
//! - `assistant` - A complete chat turn
//!
//! # Example
//!
//! ```rust,no_run
//! use tyrewise::assistant::Assistant;
//! use tyrewise::config::Settings;
//! use tyrewise::orchestrator::Orchestrator;
//! use tyrewise::rag::Conversation;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings.clone())?;
//!     orchestrator.index_all().await?;
//!
//!     let assistant = Assistant::from_settings(
//!         &settings,
//!         orchestrator.vector_store(),
//!         orchestrator.embedder(),
//!     )?;
//!     let mut conversation = Conversation::new(settings.rag.max_history);
//!
//!     let outcome = assistant.respond(&conversation, "How do I remove a lock ring?").await?;
//!     conversation.record(outcome.exchange.clone());
//!     println!("{}", outcome.text);
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod manuals;
pub mod openai;
pub mod orchestrator;
pub mod pipeline;
pub mod rag;
pub mod vector_store;

pub use error::{Result, TyrewiseError};
