use crate::cli::ux::{TerminalRenderer, get_theme, terminal_width};
use crate::svc::chat::Chat;
use ai_core::get_data_dir;
use ai_core::model::ProviderSettings;
use anyhow::{Context, Result};
use std::io::stdout;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

mod commands;
mod compl;
mod repl;
mod test_utils;

pub(crate) use repl::{Reply, process_message};

const HISTORY_FILE: &str = "history.txt";

/// Executes the chat command, starting an interactive REPL session.
pub async fn execute(settings: ProviderSettings) -> Result<()> {
    let chat = Chat::new(settings).context("Failed to initialize chat service")?;
    let theme = get_theme()?;
    let mut stdout = stdout();
    let mut renderer =
        TerminalRenderer::new(&mut stdout, &theme).with_partial_echo(terminal_width());

    let history_path = match get_data_dir() {
        Ok(dir) => Some(dir.join(HISTORY_FILE)),
        Err(e) => {
            warn!("History disabled, no data directory: {e}");
            None
        }
    };
    repl::run(Arc::new(Mutex::new(chat)), &mut renderer, history_path).await
}
