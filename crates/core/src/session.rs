//! A session is the conversation between the user and the model.
//!
//! Only user and assistant turns are kept. The system prompt is rebuilt for
//! each request so it reflects the working directory at that moment.
use crate::{
    completion::{CancellationToken, ChatMessage, Completion, CompletionModel, SenderType},
    prompt::system_prompt,
};
use anyhow::Result;
use futures::stream::BoxStream;
use std::path::PathBuf;
use tracing::debug;

pub struct Session {
    model: Box<dyn CompletionModel + Send + Sync>,
    messages: Vec<ChatMessage>,
    working_dir: Option<PathBuf>,
}

impl Session {
    pub fn new(model: Box<dyn CompletionModel + Send + Sync>) -> Self {
        Self {
            model,
            messages: Vec::new(),
            working_dir: None,
        }
    }

    /// Pins the directory described in the system prompt. Defaults to the
    /// process working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Swaps the model, keeping the conversation.
    pub fn set_model(&mut self, model: Box<dyn CompletionModel + Send + Sync>) {
        debug!("Switching model {} -> {}", self.model.name(), model.name());
        self.model = model;
    }

    pub fn add_message(&mut self, sender: SenderType, text: &str) {
        self.messages.push(ChatMessage::new(sender, text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends the assistant's completed answer.
    pub fn record_response(&mut self, text: &str) {
        self.add_message(SenderType::Assistant, text);
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    /// Messages sent on the wire: system prompt followed by the history.
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        let cwd = self
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut request = Vec::with_capacity(self.messages.len() + 1);
        request.push(ChatMessage::new(SenderType::System, system_prompt(&cwd)));
        request.extend(self.messages.iter().cloned());
        request
    }

    /// Streams the model's answer to the current conversation.
    pub async fn generate(
        &self,
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        let request = self.request_messages();
        self.model.complete(&request, cancel_token).await
    }
}
