use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A spinner shown until the first token arrives.
#[derive(Debug)]
pub struct GenerationSpinner {
    spinner: ProgressBar,
}

impl GenerationSpinner {
    pub fn new(msg: String) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message(msg);
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self { spinner }
    }

    /// Stops the spinner and clears it from the terminal.
    pub fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}
