//! Logging for ai.
use ai_core::get_data_dir;
use anyhow::Context;
use std::io::LineWriter;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::OffsetTime;

const LOG_FILE: &str = "ai.log";
const LOG_FILE_OLD: &str = "ai.log.old";
const MAX_LOG_SIZE: u64 = 100 * 1024;

/// Sends logs to `<data_dir>/ai.log`.
///
/// A log larger than 100KB is moved to `ai.log.old` first.
pub fn setup_logging() -> anyhow::Result<()> {
    let data_dir = get_data_dir().context("Failed to get data directory")?;
    let log_path = data_dir.join(LOG_FILE);

    if log_path.exists() && std::fs::metadata(&log_path)?.len() > MAX_LOG_SIZE {
        let backup_path = data_dir.join(LOG_FILE_OLD);
        if backup_path.exists() {
            std::fs::remove_file(&backup_path)?;
        }
        std::fs::rename(&log_path, backup_path)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    // Flush after every line
    let writer = Mutex::new(LineWriter::new(log_file));

    tracing_subscriber::fmt()
        .with_env_filter("ai=debug,ai_core=debug,rustyline=info")
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(OffsetTime::local_rfc_3339()?)
        .init();
    Ok(())
}
