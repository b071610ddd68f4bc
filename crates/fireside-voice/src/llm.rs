//! **Generation Client** — streaming podcast script and answer generation.
//!
//! Wraps an OpenAI-compatible chat-completions endpoint with `stream: true`.
//! Each call spawns a pump task that POSTs the request, frames the SSE body
//! through [`SseDecoder`](crate::sse::SseDecoder), and republishes text deltas
//! on a bounded channel. The channel closes on `[DONE]`, transport EOF, error,
//! or cancellation; no fragments are ever delivered after a failure.

use crate::error::{VoiceError, VoiceResult};
use crate::sse::{SseDecoder, SseEvent};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ENV_LLM_API_URL: &str = "FIRESIDE_LLM_API_URL";
const ENV_LLM_API_KEY: &str = "FIRESIDE_LLM_API_KEY";
const ENV_LLM_MODEL: &str = "FIRESIDE_LLM_MODEL";
const DEFAULT_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const DEFAULT_MODEL: &str = "glm-4.7-flashx";

const SCRIPT_SYSTEM_PROMPT: &str =
    "You are a podcast script writer. Generate engaging podcast content on the given topic.";

/// Fragments buffered between the pump task and the consumer.
const CHANNEL_CAPACITY: usize = 100;

/// Capability: produce ordered text-fragment streams from a prompt.
///
/// Fragments arrive in generation order and the stream closes on completion.
/// Implementations must not deliver fragments after a send error.
pub trait GenerationEngine: Send + Sync {
    /// Stream a podcast script for `topic`.
    fn generate_script(&self, scope: CancellationToken, topic: &str) -> mpsc::Receiver<String>;

    /// Stream an answer to a listener `question`, optionally seeded with
    /// `context` (e.g. the current topic).
    fn generate_answer(
        &self,
        scope: CancellationToken,
        question: &str,
        context: &str,
    ) -> mpsc::Receiver<String>;
}

// OpenAI-compatible request/response structures
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Streaming chunk from the chat endpoint (SSE data payload).
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Generation client for OpenAI-compatible chat-completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAiGeneration {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGeneration {
    /// Create with explicit endpoint, key, and model.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from environment: `FIRESIDE_LLM_API_URL`, `FIRESIDE_LLM_API_KEY`,
    /// `FIRESIDE_LLM_MODEL` (URL and model have defaults).
    pub fn from_env() -> VoiceResult<Self> {
        let api_url =
            std::env::var(ENV_LLM_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(ENV_LLM_API_KEY)
            .map_err(|_| VoiceError::Config(format!("{} not set", ENV_LLM_API_KEY)))?;
        let model = std::env::var(ENV_LLM_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_url, api_key, model))
    }

    fn stream_chat(
        &self,
        scope: CancellationToken,
        messages: Vec<ChatMessage>,
    ) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = self.client.clone();
        let url = self.api_url.clone();
        let key = self.api_key.clone();
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };

        tokio::spawn(async move {
            match pump_chat(client, url, key, body, scope, tx).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("generation stream cancelled"),
                Err(e) => warn!("generation stream failed: {}", e),
            }
        });

        rx
    }
}

/// Drive one streaming chat request to completion, forwarding text deltas.
async fn pump_chat(
    client: reqwest::Client,
    url: String,
    key: String,
    body: ChatRequest,
    scope: CancellationToken,
    tx: mpsc::Sender<String>,
) -> VoiceResult<()> {
    let response = tokio::select! {
        _ = scope.cancelled() => return Err(VoiceError::Cancelled),
        res = client.post(&url).bearer_auth(&key).json(&body).send() => res?,
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(VoiceError::Transport(format!(
            "LLM API error ({}): {}",
            status, text
        )));
    }

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = scope.cancelled() => return Err(VoiceError::Cancelled),
            chunk = stream.try_next() => chunk?,
        };
        let Some(bytes) = chunk else {
            // Transport EOF without a sentinel: stream is simply over.
            return Ok(());
        };

        for event in decoder.feed(&bytes) {
            let data = match event {
                SseEvent::Done => return Ok(()),
                SseEvent::Data(data) => data,
            };

            let parsed: StreamChunk = match serde_json::from_str(&data) {
                Ok(c) => c,
                Err(e) => {
                    debug!("skipping malformed chat event: {}", e);
                    continue;
                }
            };

            let Some(content) = parsed
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
            else {
                continue;
            };
            if content.is_empty() {
                continue;
            }

            tokio::select! {
                _ = scope.cancelled() => return Err(VoiceError::Cancelled),
                sent = tx.send(content.to_string()) => {
                    if sent.is_err() {
                        // Receiver dropped; nothing left to do.
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl GenerationEngine for OpenAiGeneration {
    fn generate_script(&self, scope: CancellationToken, topic: &str) -> mpsc::Receiver<String> {
        self.stream_chat(
            scope,
            vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SCRIPT_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: topic.to_string(),
                },
            ],
        )
    }

    fn generate_answer(
        &self,
        scope: CancellationToken,
        question: &str,
        context: &str,
    ) -> mpsc::Receiver<String> {
        let system = format!(
            "You are a helpful assistant answering questions about a podcast. Context: {}",
            context
        );
        self.stream_chat(
            scope,
            vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: question.to_string(),
                },
            ],
        )
    }
}
