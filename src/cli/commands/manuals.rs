//! Manuals command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{ManualsAction, Output};
use crate::config::Settings;
use crate::manuals::ManualLibrary;
use crate::vector_store::{SqliteVectorStore, VectorStore};
use anyhow::Result;
use std::collections::HashMap;

/// Run the manuals command.
pub async fn run_manuals(action: &ManualsAction, settings: &Settings) -> Result<()> {
    preflight::check(Operation::Manuals)?;

    let library = ManualLibrary::new(settings.manuals_dir());
    let store = SqliteVectorStore::new(&settings.sqlite_path())?;

    match action {
        ManualsAction::List => {
            let manuals = library.list()?;
            if manuals.is_empty() {
                Output::info(&format!("No manuals in {}", library.dir().display()));
                return Ok(());
            }

            let chunks: HashMap<String, u32> = store
                .list_sources()
                .await?
                .into_iter()
                .map(|s| (s.source, s.chunk_count))
                .collect();

            Output::header(&format!("Manuals in {}", library.dir().display()));
            for filename in &manuals {
                let source = library.path_of(filename)?.display().to_string();
                Output::manual_info(filename, chunks.get(&source).copied());
            }
        }

        ManualsAction::Remove { filename } => {
            let path = library.remove(filename)?;
            let removed = store.delete_by_source(&path.display().to_string()).await?;
            Output::success(&format!(
                "Deleted {} ({} indexed chunks removed)",
                filename, removed
            ));
        }
    }

    Ok(())
}
