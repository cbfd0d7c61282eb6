//! Run command: index, then chat.

use super::{run_chat, run_index};
use crate::config::Settings;
use anyhow::Result;

/// Refresh the index and start the interactive chat.
pub async fn run_run(settings: Settings) -> Result<()> {
    run_index(&settings).await?;
    run_chat(settings).await
}
