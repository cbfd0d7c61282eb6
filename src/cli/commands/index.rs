//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Build or refresh the index from the manuals and the quick reference.
pub async fn run_index(settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tyrewise doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;

    Output::info(&format!(
        "Indexing manuals from {}",
        settings.manuals_dir().display()
    ));

    let report = orchestrator.index_all().await?;

    for source in &report.removed_sources {
        Output::info(&format!("Dropped {} (file no longer exists)", source));
    }

    if report.sources.is_empty() {
        Output::warning("Nothing to index. Add PDF manuals or a quick reference file.");
    } else {
        Output::success(&format!(
            "Indexed {} chunks from {} sources into {}",
            report.total_chunks(),
            report.sources.len(),
            settings.sqlite_path().display()
        ));
    }

    Ok(())
}
