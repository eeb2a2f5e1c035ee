use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    System,
    User,
    Assistant,
}

impl From<SenderType> for String {
    fn from(val: SenderType) -> Self {
        val.as_str().into()
    }
}

impl SenderType {
    /// Role name on the chat-completions wire.
    pub fn as_str(&self) -> &'static str {
        match &self {
            SenderType::System => "system",
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: SenderType,
}

impl ChatMessage {
    pub fn new(sender: SenderType, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender,
        }
    }
}

#[derive(Debug)]
pub enum Completion {
    Response(CompletionResponse),
    Metrics(CompletionMetrics),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionMetrics {
    pub prompt_tokens: u32,
    pub prompt_eval_latency_ms: f32,
    pub completion_tokens: u32,
    pub completion_latency_ms: f32,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// A chat model that streams its answer.
///
/// The returned stream owns everything it needs, so callers may hold it
/// across awaits without borrowing the model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>>;
}
