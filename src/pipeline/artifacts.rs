//! Persisted chart images.

use super::executor::RenderedFigure;
use crate::config::{ArtifactSettings, Settings};
use crate::error::{Result, TyrewiseError};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// How figures are rasterised before they are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Output resolution.
    pub dpi: u32,
    /// Matplotlib style preset applied before the code runs.
    pub style: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            style: "ggplot".to_string(),
        }
    }
}

impl From<&ArtifactSettings> for RenderOptions {
    fn from(settings: &ArtifactSettings) -> Self {
        Self {
            dpi: settings.dpi,
            style: settings.style.clone(),
        }
    }
}

/// A stored chart image.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Uuid,
    /// `<artifacts_dir>/<id>.png`
    pub path: PathBuf,
}

impl Artifact {
    /// File name, as served under `/graphs`.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.id)
    }
}

/// Directory of rendered charts. Files are only ever added.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    options: RenderOptions,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.artifacts_dir(), RenderOptions::from(&settings.artifacts))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Options the executor rasterises with.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Write `figure` to a new `<uuid>.png` file.
    pub fn persist(&self, figure: &RenderedFigure) -> Result<Artifact> {
        std::fs::create_dir_all(&self.dir).map_err(|source| TyrewiseError::ArtifactWrite {
            path: self.dir.clone(),
            source,
        })?;

        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{id}.png"));

        std::fs::write(&path, figure.as_bytes()).map_err(|source| {
            TyrewiseError::ArtifactWrite {
                path: path.clone(),
                source,
            }
        })?;

        info!("Saved chart to {} ({} bytes)", path.display(), figure.len());
        Ok(Artifact { id, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::executor::PNG_SIGNATURE;

    fn figure() -> RenderedFigure {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(b"chart");
        RenderedFigure::from_png(png).unwrap()
    }

    #[test]
    fn test_persist_creates_dir_and_uuid_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("graphs"), RenderOptions::default());

        let artifact = store.persist(&figure()).unwrap();

        assert_eq!(artifact.path, dir.path().join("graphs").join(artifact.file_name()));
        assert_eq!(artifact.id.get_version_num(), 4);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), figure().as_bytes());
    }

    #[test]
    fn test_each_persist_is_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), RenderOptions::default());

        let a = store.persist(&figure()).unwrap();
        let b = store.persist(&figure()).unwrap();

        assert_ne!(a.path, b.path);
        assert!(a.path.exists() && b.path.exists());
    }

    #[test]
    fn test_write_failure_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("graphs");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = ArtifactStore::new(&blocker, RenderOptions::default());

        let err = store.persist(&figure()).unwrap_err();
        assert!(matches!(err, TyrewiseError::ArtifactWrite { .. }));
    }

    #[test]
    fn test_options_from_settings() {
        let settings = ArtifactSettings {
            dpi: 300,
            ..Default::default()
        };
        let options = RenderOptions::from(&settings);
        assert_eq!(options.dpi, 300);
        assert_eq!(options.style, "ggplot");
    }
}
