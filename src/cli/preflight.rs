//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::error::{Result, TyrewiseError};
use crate::openai::require_api_key;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Indexing needs `pdftotext` and the API key for embeddings.
    Index,
    /// Answering questions needs the API key.
    Chat,
    /// Listing and removing manuals needs nothing external.
    Manuals,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Index => {
            require_api_key()?;
            check_tool("pdftotext")?;
        }
        Operation::Chat => {
            require_api_key()?;
        }
        Operation::Manuals => {}
    }
    Ok(())
}

/// Check if an external tool is available.
///
/// Only a missing binary fails; poppler tools exit non-zero on `-v` in some
/// releases.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-v").output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TyrewiseError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(TyrewiseError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_manuals_no_requirements() {
        assert!(check(Operation::Manuals).is_ok());
    }

    #[test]
    fn test_missing_tool() {
        assert!(matches!(
            check_tool("tyrewise-missing-tool"),
            Err(TyrewiseError::ToolNotFound(_))
        ));
    }
}
