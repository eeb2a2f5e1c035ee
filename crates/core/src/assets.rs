use once_cell::sync::Lazy;
use std::path::PathBuf;

const APP_DIR: &str = "ai-cli";

static DEFAULT_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/ai-cli"))
});

// Fallback when XDG_CONFIG_HOME is unset. Resolves to %APPDATA% on windows.
static DEFAULT_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("~/.config/ai-cli"))
});

/// Directory holding `config.json`.
pub fn get_config_dir() -> PathBuf {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home).join(APP_DIR)
    } else {
        DEFAULT_CONFIG_DIR.clone()
    }
}

/// Directory for logs and input history. Created if missing.
pub fn get_data_dir() -> std::io::Result<PathBuf> {
    let path = if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join(APP_DIR)
    } else {
        DEFAULT_DATA_DIR.clone()
    };
    std::fs::create_dir_all(&path)?;
    Ok(path)
}
