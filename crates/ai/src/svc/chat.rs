#[cfg(test)]
use ai_core::completion::ChatMessage;
use ai_core::completion::{CancellationToken, Completion, SenderType};
use ai_core::get_completion_model;
use ai_core::model::ProviderSettings;
use ai_core::session::Session;
use anyhow::{Context, Result};
use futures::stream::BoxStream;
use tracing::debug;

/// Chat conversation between human and AI model
pub struct Chat {
    session: Session,
    settings: ProviderSettings,
    pending_write: Option<String>,
}

impl Chat {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let model = get_completion_model(settings.clone())
            .with_context(|| format!("Failed to create model '{}'", settings.model))?;

        Ok(Self {
            session: Session::new(model),
            settings,
            pending_write: None,
        })
    }

    #[cfg(test)]
    pub fn with_session(session: Session, settings: ProviderSettings) -> Self {
        Self {
            session,
            settings,
            pending_write: None,
        }
    }

    pub fn model_name(&self) -> &str {
        self.session.model_name()
    }

    /// Switches to `name` for later requests. History is kept.
    pub fn set_model(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Model name cannot be empty");
        }

        let settings = self.settings.clone().with_model(name);
        let model = get_completion_model(settings.clone())?;
        self.session.set_model(model);
        self.settings = settings;
        Ok(())
    }

    pub fn add_user_message(&mut self, text: &str) {
        self.session.add_message(SenderType::User, text);
    }

    /// Adds a file's contents to the conversation as user-provided context.
    pub fn add_file_context(&mut self, path: &str, content: &str) {
        debug!("Adding {} bytes from {path} to the conversation", content.len());
        let text = format!("Contents of {path}:\n```\n{}\n```", content.trim_end_matches('\n'));
        self.session.add_message(SenderType::User, &text);
    }

    pub fn record_response(&mut self, text: &str) {
        self.session.record_response(text);
    }

    pub fn clear_messages(&mut self) {
        self.session.clear_history();
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[ChatMessage] {
        self.session.messages()
    }

    /// Routes the next plain input line to `path` instead of the model.
    pub fn set_pending_write(&mut self, path: &str) {
        self.pending_write = Some(path.to_string());
    }

    pub fn pending_write(&self) -> Option<&str> {
        self.pending_write.as_deref()
    }

    pub fn take_pending_write(&mut self) -> Option<String> {
        self.pending_write.take()
    }

    /// Streams the model's answer to the conversation so far.
    ///
    /// The stream does not borrow the chat, so the caller may release its
    /// lock while the answer arrives.
    pub async fn stream_response(
        &self,
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        self.session.generate(cancel_token).await
    }
}
