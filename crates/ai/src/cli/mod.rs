//! Command line definition and entrypoint.
mod ask;
mod chat;
mod setup;
pub mod ux;

use ai_core::config::{API_KEY_ENV, Config};
use ai_core::model::ProviderSettings;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use crate::cli::ux::{ChatMessageType, style_chat_text};
use crate::log::setup_logging;

const KEYS_URL: &str = "https://openrouter.ai/keys";

/// AI - chat with OpenRouter models from the terminal.
///
/// Without a prompt, starts an interactive chat session.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Prompt to answer, then exit.
    prompt: Vec<String>,

    /// Store an OpenRouter API key in the config file.
    #[arg(long)]
    setup: bool,

    /// Model to use, e.g. "openai/gpt-4o-mini".
    #[arg(short, long)]
    model: Option<String>,

    /// Wait for the whole answer instead of streaming it.
    #[arg(long)]
    no_stream: bool,

    /// Show verbose logs.
    #[arg(short, long)]
    verbose: bool,
}

/// Runs the main CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        setup_logging().context("Failed to set up logging")?;
    }

    if cli.setup {
        return setup::execute();
    }

    let config = Config::load(None).context("Failed to load configuration")?;
    let Some(api_key) = config.resolve_api_key() else {
        eprintln!("{}", missing_key_help());
        std::process::exit(1);
    };

    let settings = ProviderSettings::from_config(&config, api_key, cli.model.as_deref())
        .with_stream(!cli.no_stream);
    debug!("Using {settings:?}");

    let prompt = cli.prompt.join(" ");
    if prompt.trim().is_empty() {
        chat::execute(settings).await
    } else {
        ask::execute(&prompt, settings).await
    }
}

fn missing_key_help() -> String {
    let title = style_chat_text("No API key found!", ChatMessageType::Error);
    format!(
        "{title}\n\n\
         Set one up with:\n  ai --setup\n\n\
         Or export it for this shell:\n  export {API_KEY_ENV}='your-key'\n\n\
         Get a key at {KEYS_URL}"
    )
}
