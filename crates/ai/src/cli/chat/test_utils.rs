#![cfg(test)]

//! Test utilities for chat modules

use crate::svc::chat::Chat;
use ai_core::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel,
    CompletionResponse,
};
use ai_core::model::ProviderSettings;
use ai_core::session::Session;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub type Requests = Arc<Mutex<Vec<Vec<ChatMessage>>>>;

/// A completion model that replays canned chunks.
pub struct MockModel {
    chunks: Vec<&'static str>,
    fail: bool,
    pub requests: Requests,
}

impl MockModel {
    /// Streams `chunks` then reports metrics.
    pub fn replying(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks.to_vec(),
            fail: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Streams `chunks` then fails.
    pub fn failing(chunks: &[&'static str]) -> Self {
        Self {
            fail: true,
            ..Self::replying(chunks)
        }
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    fn name(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut items: Vec<Result<Completion>> = self
            .chunks
            .iter()
            .map(|text| {
                Ok(Completion::Response(CompletionResponse {
                    text: text.to_string(),
                    ..Default::default()
                }))
            })
            .collect();
        if self.fail {
            items.push(Err(anyhow!("mock stream failed")));
        } else {
            items.push(Ok(Completion::Response(CompletionResponse {
                finish_reason: Some("stop".to_string()),
                ..Default::default()
            })));
            items.push(Ok(Completion::Metrics(CompletionMetrics {
                prompt_tokens: 12,
                completion_tokens: 3,
                prompt_eval_latency_ms: 50.0,
                completion_latency_ms: 150.0,
            })));
        }
        Box::pin(stream::iter(items))
    }
}

/// A chat backed by `model`, with the system prompt pinned to a temp dir.
pub fn mock_chat(model: MockModel) -> (Chat, Requests, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let requests = model.requests.clone();
    let session = Session::new(Box::new(model)).with_working_dir(dir.path());
    let settings = ProviderSettings::new("sk-test", "mock-model");
    (Chat::with_session(session, settings), requests, dir)
}
