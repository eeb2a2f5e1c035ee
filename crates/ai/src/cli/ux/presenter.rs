use ai_core::completion::CompletionMetrics;
use console::{Style, StyledObject};

/// Represents the type of a chat message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    /// The prompt for user input.
    Prompt,
    /// Label in front of the user's one-shot prompt.
    User,
    /// Label in front of the model's answer.
    Ai,
    /// Command feedback such as "Goodbye!".
    Info,
    /// Confirmation of a completed action.
    Success,
    /// Footer information, like metrics or status.
    Footer,
    /// An error message.
    Error,
}

/// Styles a string of text according to the specified `ChatMessageType`.
pub fn style_chat_text(text: &str, style: ChatMessageType) -> StyledObject<&str> {
    let style_obj = match style {
        ChatMessageType::Prompt => Style::new().green().bold(),
        ChatMessageType::User => Style::new().green().bold(),
        ChatMessageType::Ai => Style::new().cyan().bold(),
        ChatMessageType::Info => Style::new().yellow(),
        ChatMessageType::Success => Style::new().green(),
        ChatMessageType::Footer => Style::new().white().dim(),
        ChatMessageType::Error => Style::new().red().bold(),
    };
    style_obj.apply_to(text)
}

/// Formats the completion metrics into a string for display in the footer.
pub fn format_footer_metrics(
    metrics: &CompletionMetrics,
    finish_reason: Option<&str>,
    is_cancelled: bool,
) -> String {
    if is_cancelled {
        return "◼ Cancelled.".to_string();
    }

    let mut footer_complete = String::from("◼ Completed");
    if let Some(reason) = finish_reason {
        footer_complete.push_str(&format!(" ({reason})"));
    }
    footer_complete.push('.');

    let mut details = Vec::new();

    if metrics.prompt_eval_latency_ms > 0.0 {
        details.push(format!(
            "{:.2}s to first token",
            metrics.prompt_eval_latency_ms / 1000.0
        ));
    }
    if metrics.completion_latency_ms > 0.0 {
        details.push(format!(
            "{:.2}s total",
            (metrics.prompt_eval_latency_ms + metrics.completion_latency_ms) / 1000.0
        ));
    }

    if metrics.completion_tokens > 0 && metrics.completion_latency_ms > 0.0 {
        let tokens_per_sec =
            metrics.completion_tokens as f32 * 1000.0 / metrics.completion_latency_ms;
        details.push(format!("{tokens_per_sec:.2} tokens/s"));
    }

    if metrics.completion_tokens > 0 {
        details.push(format!("{} completion tokens", metrics.completion_tokens));
    }
    if metrics.prompt_tokens > 0 {
        details.push(format!("{} prompt tokens", metrics.prompt_tokens));
    }

    if details.is_empty() {
        footer_complete
    } else {
        format!("{} {}", footer_complete, details.join(". "))
    }
}
