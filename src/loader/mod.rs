//! Source document loading.
//!
//! Manuals are PDFs whose text is extracted page by page with `pdftotext`;
//! the quick reference is plain UTF-8 text.

mod pdf;

pub use pdf::{load_pdf, split_pages};

use crate::error::{Result, TyrewiseError};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Extension identifying manual files.
pub const MANUAL_EXTENSION: &str = "pdf";

/// A unit of text loaded from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    /// Path of the file the text came from.
    pub source: String,
    /// File name used for display.
    pub title: String,
    /// 1-based page number for paginated sources.
    pub page: Option<u32>,
    /// Extracted text.
    pub text: String,
}

/// Whether `path` names a manual file.
pub fn is_manual(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MANUAL_EXTENSION))
}

/// List manual files in `dir`, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn list_manuals(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut manuals: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_manual(path))
        .collect();

    manuals.sort();
    Ok(manuals)
}

/// File name of `path` as a display title.
pub fn title_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load a plain text file as a single unpaginated page.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_text(path: &Path) -> Result<LoadedPage> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        TyrewiseError::Loader(format!("Cannot read {}: {}", path.display(), e))
    })?;

    debug!("Loaded {} characters", text.len());

    Ok(LoadedPage {
        source: path.display().to_string(),
        title: title_of(path),
        page: None,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_manuals_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-valves.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a-rims.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::create_dir(dir.path().join("archive.pdf")).unwrap();

        let manuals = list_manuals(dir.path()).unwrap();
        let names: Vec<String> = manuals.iter().map(|p| title_of(p)).collect();
        assert_eq!(names, vec!["a-rims.PDF", "b-valves.pdf"]);
    }

    #[test]
    fn test_list_manuals_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_manuals(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_load_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quick_reference.txt");
        std::fs::write(&path, "URL: ./manuals/rims.pdf\nTorque: 700 Nm").unwrap();

        let page = load_text(&path).unwrap();
        assert_eq!(page.title, "quick_reference.txt");
        assert_eq!(page.page, None);
        assert!(page.text.starts_with("URL:"));

        assert!(load_text(&dir.path().join("missing.txt")).is_err());
    }
}
