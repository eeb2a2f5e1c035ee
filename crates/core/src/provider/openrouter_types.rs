use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest {
    pub(super) model: String,
    pub(super) messages: Vec<RequestMessage>,
    pub(super) stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) stream_options: Option<StreamOptions>,
    pub(super) usage: UsageOptions,
}

#[derive(Debug, Serialize)]
pub(super) struct RequestMessage {
    pub(super) role: &'static str,
    pub(super) content: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StreamOptions {
    pub(super) include_usage: bool,
}

/// OpenRouter's switch for token accounting in the response.
#[derive(Debug, Serialize)]
pub(super) struct UsageOptions {
    pub(super) include: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionStreamResponse {
    #[serde(default)]
    pub(super) choices: Vec<ChatCompletionStreamChoice>,
    pub(super) usage: Option<Usage>,
    pub(super) error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionStreamChoice {
    #[serde(default)]
    pub(super) delta: Delta,
    pub(super) finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Delta {
    pub(super) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    pub(super) choices: Vec<ChatCompletionChoice>,
    pub(super) usage: Option<Usage>,
    pub(super) error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionChoice {
    pub(super) message: ResponseMessage,
    pub(super) finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponseMessage {
    pub(super) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Usage {
    pub(super) prompt_tokens: u32,
    pub(super) completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    #[serde(default)]
    pub(super) message: String,
    /// OpenRouter sends the HTTP status here, as a number.
    #[serde(default)]
    pub(super) code: Option<serde_json::Value>,
}

impl ApiError {
    pub(super) fn status(&self) -> Option<u16> {
        match self.code.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|c| u16::try_from(c).ok()),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Wrapper for error bodies returned with a non-success status.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub(super) error: ApiError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
    Error,
    #[serde(other)]
    Other,
}

impl FinishReason {
    pub(super) fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::FunctionCall => "function_call",
            FinishReason::Error => "error",
            FinishReason::Other => "other",
        }
    }
}
