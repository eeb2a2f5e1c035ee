use crate::cli::ux::{ChatMessageType, style_chat_text};
use ai_core::config::Config;
use anyhow::{Context, Result};
use dialoguer::Password;
use std::path::PathBuf;
use tracing::debug;

/// Prompts for an OpenRouter API key and stores it in the config file.
pub fn execute() -> Result<()> {
    let api_key = Password::new()
        .with_prompt("Enter your OpenRouter API key")
        .interact()
        .context("Failed to read API key")?;
    save_api_key(&api_key, None)
}

pub fn save_api_key(api_key: &str, config_path: Option<PathBuf>) -> Result<()> {
    if api_key.trim().is_empty() {
        anyhow::bail!("API key cannot be empty");
    }

    let saved_to = Config::set_api_key(api_key, config_path).context("Failed to save API key")?;
    debug!("Stored API key in {}", saved_to.display());
    println!(
        "{}",
        style_chat_text("API key saved successfully!", ChatMessageType::Success)
    );
    Ok(())
}
