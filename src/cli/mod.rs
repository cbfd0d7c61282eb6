//! CLI module for Tyrewise.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tyrewise - tyre maintenance safety assistant
///
/// Answers questions from your tyre maintenance manuals, draws charts on
/// request and points you to the procedure it used.
#[derive(Parser, Debug)]
#[command(name = "tyrewise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Build the index from the manuals and the quick reference
    Index,

    /// Start an interactive chat session
    Chat,

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Show the retrieved passages
        #[arg(short, long)]
        sources: bool,
    },

    /// Build the index, then start chatting
    Run,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the manuals directory
    Manuals {
        #[command(subcommand)]
        action: ManualsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ManualsAction {
    /// List manuals and their indexed chunk counts
    List,

    /// Delete a manual and its indexed chunks
    Remove {
        /// File name of the manual, e.g. rim-assembly.pdf
        filename: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["tyrewise", "-vv", "serve", "--port", "9000"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_manuals_remove() {
        let cli = Cli::parse_from(["tyrewise", "manuals", "remove", "valves.pdf"]);
        assert!(matches!(
            cli.command,
            Commands::Manuals {
                action: ManualsAction::Remove { ref filename }
            } if filename == "valves.pdf"
        ));
    }
}
