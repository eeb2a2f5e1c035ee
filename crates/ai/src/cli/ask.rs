use crate::cli::chat::{Reply, process_message};
use crate::cli::ux::{ChatMessageType, TerminalRenderer, get_theme, style_chat_text, terminal_width};
use crate::svc::chat::Chat;
use ai_core::model::ProviderSettings;
use anyhow::{Context, Result};
use std::io::stdout;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Answers a single prompt and returns.
pub async fn execute(prompt: &str, settings: ProviderSettings) -> Result<()> {
    let chat = Chat::new(settings).context("Failed to initialize chat service")?;
    let theme = get_theme()?;

    println!("{} {prompt}", style_chat_text("You:", ChatMessageType::User));
    println!();
    println!("{}", style_chat_text("AI:", ChatMessageType::Ai));

    let mut stdout = stdout();
    let mut renderer =
        TerminalRenderer::new(&mut stdout, &theme).with_partial_echo(terminal_width());
    let chat = Arc::new(Mutex::new(chat));

    match process_message(chat, &mut renderer, prompt, tokio::signal::ctrl_c()).await? {
        Reply::Failed(e) => Err(e),
        Reply::Completed | Reply::Cancelled => Ok(()),
    }
}
