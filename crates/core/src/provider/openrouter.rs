//! OpenRouter chat-completions client.
//!
//! OpenRouter speaks the OpenAI wire format, so requests go through
//! `async-openai` with OpenRouter's own request and chunk shapes. Chunks may
//! carry an `error` object instead of choices.
use super::openrouter_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStreamResponse, ErrorBody,
    RequestMessage, StreamOptions, UsageOptions,
};
use crate::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel,
    CompletionResponse,
};
use crate::model::ProviderSettings;
use anyhow::{Context, Result, anyhow};
use async_openai::Client as OpenAIClient;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::pin::Pin;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const REFERER: &str = "https://github.com/ai-cli";
const TITLE: &str = "AI CLI";

// Status codes only survive in the error text for failed event streams.
static STATUS_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:status code|code):?\s*(\d{3})\b").expect("valid status pattern")
});

type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<ChatCompletionStreamResponse, OpenAIError>> + Send>>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid or missing API key ({0}). Run `ai --setup` to store a new key.")]
    Unauthorized(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("OpenRouter error: {0}")]
    Api(String),
    #[error("Request failed: {0}")]
    Transport(String),
}

pub struct OpenRouterModel {
    model: String,
    stream: bool,
    client: OpenAIClient<OpenAIConfig>,
}

impl OpenRouterModel {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        // async-openai panics on keys that are not valid header values.
        HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|_| anyhow!("API key contains characters not allowed in a header"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_static(REFERER),
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_static(TITLE),
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.timeout)
            .read_timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let config = OpenAIConfig::new()
            .with_api_key(settings.api_key.clone())
            .with_api_base(settings.base_url.clone());
        let client = OpenAIClient::with_config(config).with_http_client(http_client);

        Ok(Self {
            model: settings.model,
            stream: settings.stream,
            client,
        })
    }

    fn build_request(&self, messages: &[ChatMessage]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| RequestMessage {
                    role: m.sender.as_str(),
                    content: m.text.clone(),
                })
                .collect(),
            stream: self.stream,
            stream_options: self.stream.then_some(StreamOptions {
                include_usage: true,
            }),
            usage: UsageOptions { include: true },
        }
    }
}

#[async_trait]
impl CompletionModel for OpenRouterModel {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, stream = self.stream))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        let request = self.build_request(messages);
        let client = self.client.clone();
        let stream = self.stream;
        debug!("Sending {} messages", messages.len());

        let outer_stream = async_stream::stream! {
            if cancel_token.is_cancelled() {
                yield Err(anyhow!("Cancelled by user"));
                return;
            }
            let start_time = Instant::now();

            if !stream {
                let response: Result<ChatCompletionResponse, OpenAIError> =
                    client.chat().create_byot(request).await;
                for item in full_response_items(response, start_time) {
                    yield item;
                }
                return;
            }

            let chunks: Result<ChunkStream, OpenAIError> =
                client.chat().create_stream_byot(request).await;
            let mut chunks = match chunks {
                Ok(chunks) => chunks,
                Err(err) => {
                    yield Err(map_openai_error(err).into());
                    return;
                }
            };

            let mut prev_time = start_time;
            let mut first_token_at: Option<Instant> = None;
            let mut prompt_eval_latency = 0.0;
            let mut completion_latency = 0.0;
            let mut usage_seen = false;

            while let Some(next) = chunks.next().await {
                if cancel_token.is_cancelled() {
                    yield Err(anyhow!("Cancelled by user"));
                    return;
                }

                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(OpenAIError::JSONDeserialize(err, _)) => {
                        warn!("Skipping malformed chunk: {err}");
                        continue;
                    }
                    Err(err) => {
                        yield Err(map_openai_error(err).into());
                        return;
                    }
                };

                if let Some(error) = chunk.error {
                    yield Err(ProviderError::Api(error.message).into());
                    return;
                }

                let now = Instant::now();
                let elapsed = now.duration_since(prev_time).as_secs_f32() * 1000.0;
                prev_time = now;

                if let Some(choice) = chunk.choices.first() {
                    let text = choice.delta.content.clone().unwrap_or_default();
                    if !text.is_empty() || choice.finish_reason.is_some() {
                        if first_token_at.is_none() {
                            first_token_at = Some(now);
                            prompt_eval_latency = elapsed;
                        } else {
                            completion_latency += elapsed;
                        }

                        yield Ok(Completion::Response(CompletionResponse {
                            text,
                            finish_reason: choice.finish_reason.map(|r| r.as_str().to_string()),
                        }));
                    }
                }

                if let Some(usage) = chunk.usage {
                    usage_seen = true;
                    yield Ok(Completion::Metrics(CompletionMetrics {
                        prompt_tokens: usage.prompt_tokens,
                        prompt_eval_latency_ms: prompt_eval_latency,
                        completion_tokens: usage.completion_tokens,
                        completion_latency_ms: completion_latency,
                    }));
                }
            }

            if !usage_seen {
                yield Ok(Completion::Metrics(CompletionMetrics {
                    prompt_eval_latency_ms: prompt_eval_latency,
                    completion_latency_ms: completion_latency,
                    ..Default::default()
                }));
            }
        };

        Box::pin(outer_stream)
    }
}

fn full_response_items(
    response: Result<ChatCompletionResponse, OpenAIError>,
    start_time: Instant,
) -> Vec<Result<Completion>> {
    let parsed = match response {
        Ok(parsed) => parsed,
        Err(err) => return vec![Err(map_openai_error(err).into())],
    };
    let elapsed = start_time.elapsed().as_secs_f32() * 1000.0;

    if let Some(error) = parsed.error {
        return vec![Err(ProviderError::Api(error.message).into())];
    }
    let Some(choice) = parsed.choices.into_iter().next() else {
        return vec![Err(anyhow!("OpenRouter response contained no choices"))];
    };

    let mut items = vec![Ok(Completion::Response(CompletionResponse {
        text: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason.map(|r| r.as_str().to_string()),
    }))];

    let (prompt_tokens, completion_tokens) = parsed
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();
    items.push(Ok(Completion::Metrics(CompletionMetrics {
        prompt_tokens,
        prompt_eval_latency_ms: elapsed,
        completion_tokens,
        completion_latency_ms: 0.0,
    })));
    items
}

/// Maps an `async-openai` failure onto a [`ProviderError`].
fn map_openai_error(err: OpenAIError) -> ProviderError {
    let text = err.to_string();
    let error = match err {
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) => status_error(status.as_u16(), text),
            None => ProviderError::Transport(text),
        },
        OpenAIError::ApiError(api) => match status_in(&text) {
            Some(status) => status_error(status, api.message),
            None => ProviderError::Api(api.message),
        },
        // Error bodies that do not fit the OpenAI error shape.
        OpenAIError::JSONDeserialize(_, content) => {
            match serde_json::from_str::<ErrorBody>(&content) {
                Ok(body) => match body.error.status() {
                    Some(status) => status_error(status, body.error.message),
                    None => ProviderError::Api(body.error.message),
                },
                Err(_) => ProviderError::Transport(text),
            }
        }
        _ => match status_in(&text) {
            Some(status) => status_error(status, canonical_reason(status, &text)),
            None => ProviderError::Transport(text),
        },
    };
    warn!("OpenRouter request failed: {error}");
    error
}

fn status_in(text: &str) -> Option<u16> {
    STATUS_CODE
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .filter(|status| *status >= 400)
}

fn canonical_reason(status: u16, fallback: &str) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or(fallback)
        .to_string()
}

fn status_error(status: u16, message: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Unauthorized(message),
        status => ProviderError::Http { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::SenderType;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    fn chunk(content: Option<&str>, finish_reason: Option<&str>) -> serde_json::Value {
        json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "created": 1730000000,
            "model": "x-ai/grok-4.1-fast:free",
            "choices": [{
                "index": 0,
                "delta": {"role": "assistant", "content": content},
                "finish_reason": finish_reason
            }]
        })
    }

    fn mock_event_stream_body() -> String {
        let events = vec![
            chunk(Some("Hello"), None),
            chunk(Some(" world"), None),
            chunk(Some(""), Some("stop")),
            json!({
                "id": "gen-1",
                "object": "chat.completion.chunk",
                "choices": [],
                "usage": {"prompt_tokens": 20, "completion_tokens": 30, "total_tokens": 50}
            }),
        ];

        let mut body = String::from(": OPENROUTER PROCESSING\n\n");
        for event in events {
            body.push_str(&format!("data: {}\n\n", serde_json::to_string(&event).unwrap()));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn settings_for(server: &MockServer) -> ProviderSettings {
        ProviderSettings::new("sk-or-test", "x-ai/grok-4.1-fast:free").with_base_url(server.uri())
    }

    fn user_message(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::new(SenderType::User, text)]
    }

    async fn collect(
        model: &OpenRouterModel,
        messages: &[ChatMessage],
    ) -> (Vec<CompletionResponse>, Vec<CompletionMetrics>, Vec<String>) {
        let mut stream = model.complete(messages, CancellationToken::new()).await;
        let mut responses = Vec::new();
        let mut metrics = Vec::new();
        let mut errors = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(Completion::Response(r)) => responses.push(r),
                Ok(Completion::Metrics(m)) => metrics.push(m),
                Err(e) => errors.push(e.to_string()),
            }
        }
        (responses, metrics, errors)
    }

    async fn mount_event_stream(server: &MockServer, body: String) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(server)
            .await;
    }

    #[test]
    fn test_build_request_asks_for_usage() {
        let settings = ProviderSettings::new("sk-or-test", "openai/gpt-4o-mini");
        let model = OpenRouterModel::new(settings.clone()).unwrap();
        let request = serde_json::to_value(model.build_request(&user_message("Hi"))).unwrap();

        assert_eq!(request["model"], "openai/gpt-4o-mini");
        assert_eq!(request["stream"], true);
        assert_eq!(request["stream_options"]["include_usage"], true);
        assert_eq!(request["usage"]["include"], true);
        assert_eq!(request["messages"], json!([{"role": "user", "content": "Hi"}]));

        let model = OpenRouterModel::new(settings.with_stream(false)).unwrap();
        let request = serde_json::to_value(model.build_request(&user_message("Hi"))).unwrap();
        assert_eq!(request["stream"], false);
        assert!(request.get("stream_options").is_none());
        assert_eq!(request["usage"]["include"], true);
    }

    #[test]
    fn test_status_in_error_text() {
        assert_eq!(
            status_in("stream failed: Invalid status code: 401 Unauthorized"),
            Some(401)
        );
        assert_eq!(status_in("No auth credentials found (code: 403)"), Some(403));
        assert_eq!(status_in("stream failed: connection reset"), None);
        assert_eq!(status_in("Invalid status code: 200 OK"), None);
    }

    #[test]
    fn test_api_error_status() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error": {"message": "No auth", "code": 401}}"#).unwrap();
        assert_eq!(body.error.status(), Some(401));

        let body: ErrorBody =
            serde_json::from_str(r#"{"error": {"message": "Bad", "code": "invalid"}}"#).unwrap();
        assert_eq!(body.error.status(), None);
    }

    #[tokio::test]
    async fn test_stream_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-or-test"))
            .and(header("http-referer", REFERER))
            .and(header("x-title", TITLE))
            .and(body_partial_json(json!({
                "model": "x-ai/grok-4.1-fast:free",
                "stream": true,
                "stream_options": {"include_usage": true},
                "usage": {"include": true},
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(mock_event_stream_body(), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let (responses, metrics, errors) = collect(&model, &user_message("Hi")).await;

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].text, "Hello");
        assert_eq!(responses[1].text, " world");
        assert_eq!(responses[2].text, "");
        assert_eq!(responses[2].finish_reason.as_deref(), Some("stop"));

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].prompt_tokens, 20);
        assert_eq!(metrics[0].completion_tokens, 30);
    }

    #[tokio::test]
    async fn test_stream_event_split_over_data_lines() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":\ndata: {\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        mount_event_stream(&server, body.to_string()).await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let (responses, _, errors) = collect(&model, &user_message("Hi")).await;

        assert!(errors.is_empty(), "{errors:?}");
        let text: String = responses.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(text, "Hi");
    }

    #[tokio::test]
    async fn test_stream_skips_malformed_chunks_and_stops_at_done() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\n\ndata: {{not json}}\n\ndata: {}\n\ndata: [DONE]\n\ndata: {}\n\n",
            chunk(Some("A"), None),
            chunk(Some("B"), Some("stop")),
            chunk(Some("after done"), None),
        );
        mount_event_stream(&server, body).await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let (responses, metrics, errors) = collect(&model, &user_message("Hi")).await;

        assert!(errors.is_empty(), "{errors:?}");
        let text: String = responses.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(text, "AB");
        // No usage chunk, timing-only metrics are still reported.
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].completion_tokens, 0);
    }

    #[tokio::test]
    async fn test_stream_error_chunk() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\n\ndata: {}\n\n",
            chunk(Some("partial"), None),
            json!({"error": {"code": 502, "message": "Provider returned error"}})
        );
        mount_event_stream(&server, body).await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let (responses, _, errors) = collect(&model, &user_message("Hi")).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(errors, vec!["OpenRouter error: Provider returned error"]);
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "No auth credentials found", "code": 401}
            })))
            .mount(&server)
            .await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let mut stream = model
            .complete(&user_message("Hi"), CancellationToken::new())
            .await;

        let err = stream.next().await.unwrap().unwrap_err();
        let provider_err = err.downcast_ref::<ProviderError>().unwrap();
        assert!(matches!(provider_err, ProviderError::Unauthorized(_)));
        assert!(err.to_string().contains("ai --setup"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let (responses, _, errors) = collect(&model, &user_message("Hi")).await;

        assert!(responses.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("HTTP 503"), "{errors:?}");
    }

    #[tokio::test]
    async fn test_non_streaming_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": false, "usage": {"include": true}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "gen-2",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Full answer"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenRouterModel::new(settings_for(&server).with_stream(false)).unwrap();
        let (responses, metrics, errors) = collect(&model, &user_message("Hi")).await;

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].text, "Full answer");
        assert_eq!(responses[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(metrics[0].prompt_tokens, 5);
        assert_eq!(metrics[0].completion_tokens, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_chunk() {
        let server = MockServer::start().await;
        mount_event_stream(&server, mock_event_stream_body()).await;

        let model = OpenRouterModel::new(settings_for(&server)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let mut stream = model.complete(&user_message("Hi"), token).await;

        let first = stream.next().await.unwrap();
        assert_eq!(first.unwrap_err().to_string(), "Cancelled by user");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_rejects_api_key_with_newline() {
        let settings = ProviderSettings::new("sk-or\nbroken", "m");
        assert!(OpenRouterModel::new(settings).is_err());
    }
}
