//! Ask command implementation.

use super::chat::print_outcome;
use crate::assistant::Assistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Conversation;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, show_sources: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chat) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tyrewise doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    let assistant = Assistant::from_settings(
        &settings,
        orchestrator.vector_store(),
        orchestrator.embedder(),
    )?;

    let spinner = Output::spinner("Searching the manuals...");

    match assistant.respond(&Conversation::default(), question).await {
        Ok(outcome) => {
            spinner.finish_and_clear();
            print_outcome(&outcome, false);

            if show_sources && !outcome.sources.is_empty() {
                Output::header("Sources");
                for source in &outcome.sources {
                    Output::source(&source.location(), source.score, &source.content);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
