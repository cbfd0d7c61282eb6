//! The manuals directory: listing, storing and removing PDF manuals.

use crate::error::{Result, TyrewiseError};
use crate::loader::{is_manual, list_manuals, title_of};
use std::path::{Path, PathBuf};
use tracing::info;

/// A directory of PDF manuals.
#[derive(Debug, Clone)]
pub struct ManualLibrary {
    dir: PathBuf,
}

impl ManualLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the manuals.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of all manuals, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(list_manuals(&self.dir)?
            .iter()
            .map(|path| title_of(path))
            .collect())
    }

    /// Path of a manual, after validating its file name.
    pub fn path_of(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.dir.join(filename))
    }

    /// Store a manual, replacing any existing file of the same name.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(filename)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, bytes)?;
        info!("Stored manual {} ({} bytes)", filename, bytes.len());
        Ok(path)
    }

    /// Delete a manual file.
    pub fn remove(&self, filename: &str) -> Result<PathBuf> {
        let path = self.path_of(filename)?;
        if !path.is_file() {
            return Err(TyrewiseError::ManualNotFound(filename.to_string()));
        }
        std::fs::remove_file(&path)?;
        info!("Removed manual {}", filename);
        Ok(path)
    }
}

/// Accept plain `*.pdf` file names only; no directories, no traversal.
pub fn validate_filename(filename: &str) -> Result<()> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\', '\0'])
        || filename.contains("..");

    if invalid || !is_manual(Path::new(filename)) {
        return Err(TyrewiseError::InvalidInput(format!(
            "Invalid manual file name: {:?}",
            filename
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("rim-assembly.pdf").is_ok());
        assert!(validate_filename("Valve Guide.PDF").is_ok());

        assert!(validate_filename("").is_err());
        assert!(validate_filename("notes.txt").is_err());
        assert!(validate_filename("../secrets.pdf").is_err());
        assert!(validate_filename("sub/dir.pdf").is_err());
        assert!(validate_filename(".hidden.pdf").is_err());
        assert!(validate_filename("c:\\x.pdf").is_err());
    }

    #[test]
    fn test_save_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let library = ManualLibrary::new(dir.path().join("manuals"));

        assert!(library.list().unwrap().is_empty());

        library.save("b.pdf", b"%PDF-1.4").unwrap();
        library.save("a.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(library.list().unwrap(), vec!["a.pdf", "b.pdf"]);

        library.remove("a.pdf").unwrap();
        assert_eq!(library.list().unwrap(), vec!["b.pdf"]);

        assert!(matches!(
            library.remove("a.pdf"),
            Err(TyrewiseError::ManualNotFound(_))
        ));
    }
}
