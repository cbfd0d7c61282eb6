//! Configuration settings for Tyrewise.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub rag: RagSettings,
    pub artifacts: ArtifactSettings,
    pub executor: ExecutorSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Index construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the PDF manuals.
    pub manuals_dir: String,
    /// Plain-text quick reference indexed alongside the manuals.
    pub quick_reference: String,
    /// Path to the SQLite vector database.
    pub sqlite_path: String,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            manuals_dir: "./manuals".to_string(),
            quick_reference: "./resources/quick_reference.txt".to_string(),
            sqlite_path: "./rag_index/vectors.db".to_string(),
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// RAG (Retrieval-Augmented Generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// LLM model for response generation.
    pub model: String,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Minimum similarity score for a passage to be used.
    pub min_score: f32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of question/answer exchanges kept in the conversation.
    pub max_history: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            top_k: 8,
            min_score: 0.0,
            temperature: 0.7,
            max_history: 10,
        }
    }
}

/// Chart artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Directory where rendered charts are written.
    pub dir: String,
    /// Raster resolution of saved charts.
    pub dpi: u32,
    /// Matplotlib style preset applied before the chart code runs.
    pub style: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: "./graphs".to_string(),
            dpi: 150,
            style: "ggplot".to_string(),
        }
    }
}

/// Restricted chart-code executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Python interpreter used to run chart code.
    pub interpreter: String,
    /// Wall-clock limit for a single render.
    pub timeout_secs: u64,
    /// Root modules the chart code may import.
    pub allowed_modules: Vec<String>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 30,
            allowed_modules: vec!["matplotlib".to_string()],
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TyrewiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tyrewise")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded manuals directory path.
    pub fn manuals_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.manuals_dir)
    }

    /// Get the expanded quick reference file path.
    pub fn quick_reference_path(&self) -> PathBuf {
        Self::expand_path(&self.index.quick_reference)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.index.sqlite_path)
    }

    /// Get the expanded artifact directory path.
    pub fn artifacts_dir(&self) -> PathBuf {
        Self::expand_path(&self.artifacts.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_layout() {
        let settings = Settings::default();
        assert_eq!(settings.index.chunk_size, 1000);
        assert_eq!(settings.index.chunk_overlap, 100);
        assert_eq!(settings.rag.top_k, 8);
        assert_eq!(settings.artifacts.dpi, 150);
        assert_eq!(settings.artifacts_dir(), PathBuf::from("./graphs"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [rag]
            model = "gpt-4o-mini"

            [executor]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.rag.model, "gpt-4o-mini");
        assert_eq!(settings.rag.top_k, 8);
        assert_eq!(settings.executor.timeout_secs, 5);
        assert_eq!(settings.executor.interpreter, "python3");
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.artifacts.style = "bmh".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.artifacts.style, "bmh");
    }
}
