//! Configuration module for Tyrewise.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ArtifactSettings, EmbeddingSettings, ExecutorSettings, GeneralSettings, IndexSettings,
    PromptSettings, RagSettings, ServerSettings, Settings,
};
