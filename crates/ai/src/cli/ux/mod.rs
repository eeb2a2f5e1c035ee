mod highlight;
mod math;
mod panel;
mod presenter;
mod progress;
mod render;

pub use highlight::get_theme;
pub use panel::Panel;
pub use presenter::{ChatMessageType, format_footer_metrics, style_chat_text};
pub use progress::GenerationSpinner;
pub use render::TerminalRenderer;

use console::{Term, style};

/// Prints a formatted error message to stderr.
pub fn present_error(error: anyhow::Error) {
    let error_text = style("ERROR:").red().bold();
    eprintln!("\n{error_text} {error:#}");
}

/// Width of stdout when it is a terminal.
pub fn terminal_width() -> Option<usize> {
    let term = Term::stdout();
    if !term.is_term() {
        return None;
    }
    term.size_checked().map(|(_, cols)| cols as usize)
}
