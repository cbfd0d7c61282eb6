//! Interactive chat command.

use crate::assistant::{Assistant, TurnOutcome};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Conversation;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chat) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tyrewise doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    if orchestrator.vector_store().document_count().await? == 0 {
        Output::warning("The index is empty. Run 'tyrewise index' first.");
    }

    let assistant = Assistant::from_settings(
        &settings,
        orchestrator.vector_store(),
        orchestrator.embedder(),
    )?;
    let mut conversation = Conversation::new(settings.rag.max_history);

    println!("\n{}", style("Tyrewise Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            conversation.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        let spinner = Output::spinner("Searching the manuals...");
        match assistant.respond(&conversation, input).await {
            Ok(outcome) => {
                spinner.finish_and_clear();
                conversation.record(outcome.exchange.clone());
                print_outcome(&outcome, true);
            }
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

/// Print the answer, the chart location and the citation.
pub(crate) fn print_outcome(outcome: &TurnOutcome, open_chart: bool) {
    println!("\n{} {}\n", style("Tyrewise:").cyan().bold(), outcome.text);

    if let Some(image) = &outcome.image {
        Output::success(&format!("Generated graph saved here: {}", image.display()));
        if open_chart {
            if let Err(e) = open_image(image) {
                Output::warning(&format!("Unable to open image automatically: {}", e));
            }
        }
    } else if outcome.chart_failed() {
        Output::warning("Failed to execute generated code; no chart was produced.");
    }

    if let Some(url) = &outcome.url {
        Output::citation(url);
    }
}

/// Open an image with the platform viewer.
fn open_image(path: &Path) -> io::Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };

    command.arg(path);
    launch(&mut command)
}

/// Run a launcher to completion; the launchers hand off to the viewer and exit.
fn launch(command: &mut Command) -> io::Result<()> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("viewer exited with {}", status)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_launch_waits_for_launcher() {
        assert!(launch(&mut Command::new("true")).is_ok());
        assert!(launch(&mut Command::new("false")).is_err());
        assert!(launch(&mut Command::new("tyrewise-no-such-viewer")).is_err());
    }
}
