//! A mock completion model for unit tests.
use crate::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel,
    CompletionResponse,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseMode {
    /// Streams "Hello" then " world".
    Text,
    /// Streams "Hello" then fails.
    Error,
}

/// Replays a canned answer and records every request it receives.
#[derive(Debug)]
pub(crate) struct TestProviderModel {
    mode: ResponseMode,
    pub(crate) requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl TestProviderModel {
    pub(crate) fn new(mode: ResponseMode) -> Self {
        Self {
            mode,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn response(text: &str, finish_reason: Option<&str>) -> Result<Completion> {
    Ok(Completion::Response(CompletionResponse {
        text: text.to_string(),
        finish_reason: finish_reason.map(str::to_string),
    }))
}

#[async_trait]
impl CompletionModel for TestProviderModel {
    fn name(&self) -> &str {
        "test-model"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let items = match self.mode {
            ResponseMode::Text => vec![
                response("Hello", None),
                response(" world", Some("stop")),
                Ok(Completion::Metrics(CompletionMetrics::default())),
            ],
            ResponseMode::Error => vec![
                response("Hello", None),
                Err(anyhow!("TestProviderModel error")),
            ],
        };
        Box::pin(stream::iter(items))
    }
}
