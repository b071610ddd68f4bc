//! **Synthesis Client** — streaming text-to-speech over a GLM-style speech API.
//!
//! Presents one logical audio stream per call. Inputs longer than the
//! backend's ceiling are split by the [`chunker`](crate::chunker) and issued
//! as one request per segment, strictly sequentially, so audio order follows
//! plan order and backend load stays bounded. Streamed payloads arrive
//! base64-encoded and are decoded to raw audio bytes before republishing.

use crate::chunker::split_text;
use crate::error::{VoiceError, VoiceResult};
use crate::sse::{SseDecoder, SseEvent};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ENV_TTS_API_URL: &str = "FIRESIDE_TTS_API_URL";
const ENV_TTS_API_KEY: &str = "FIRESIDE_TTS_API_KEY";
const ENV_TTS_VOICE: &str = "FIRESIDE_TTS_VOICE";
const DEFAULT_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/audio/speech";
const DEFAULT_MODEL: &str = "glm-tts";
const DEFAULT_VOICE: &str = "tongtong";

/// Backend input ceiling in bytes; longer fragments are chunked.
const DEFAULT_MAX_INPUT_BYTES: usize = 1024;

/// Audio chunks buffered between the pump task and the player.
const CHANNEL_CAPACITY: usize = 32;

/// Capability: produce an ordered raw-audio-byte stream from text.
///
/// Empty input yields an immediately-closed stream.
pub trait SynthesisEngine: Send + Sync {
    fn synthesize_stream(&self, scope: CancellationToken, text: &str) -> mpsc::Receiver<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    response_format: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encode_format: Option<String>,
}

/// Streaming chunk from the speech endpoint; `delta.content` is base64 audio.
#[derive(Deserialize, Debug)]
struct SpeechChunk {
    choices: Vec<SpeechChoice>,
}

#[derive(Deserialize, Debug)]
struct SpeechChoice {
    #[serde(default)]
    delta: SpeechDelta,
}

#[derive(Deserialize, Debug, Default)]
struct SpeechDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Synthesis client for GLM-TTS-style speech APIs.
#[derive(Debug, Clone)]
pub struct GlmSynthesis {
    api_url: String,
    api_key: String,
    voice: String,
    speed: f64,
    volume: f64,
    max_input_bytes: usize,
    client: reqwest::Client,
}

impl GlmSynthesis {
    /// Create with explicit endpoint and key; voice and knobs take defaults.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            voice: DEFAULT_VOICE.to_string(),
            speed: 1.0,
            volume: 1.0,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            client: reqwest::Client::new(),
        }
    }

    /// Build from environment: `FIRESIDE_TTS_API_URL`, `FIRESIDE_TTS_API_KEY`,
    /// `FIRESIDE_TTS_VOICE` (URL and voice have defaults).
    pub fn from_env() -> VoiceResult<Self> {
        let api_url =
            std::env::var(ENV_TTS_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(ENV_TTS_API_KEY)
            .map_err(|_| VoiceError::Config(format!("{} not set", ENV_TTS_API_KEY)))?;
        let mut client = Self::new(api_url, api_key);
        if let Ok(voice) = std::env::var(ENV_TTS_VOICE) {
            client.voice = voice;
        }
        Ok(client)
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the speech speed, [0.5, 2.0].
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the volume, (0, 10].
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Override the backend input ceiling (bytes).
    pub fn with_max_input_bytes(mut self, max: usize) -> Self {
        self.max_input_bytes = max;
        self
    }

    /// Build the ordered request plan for `text`.
    fn plan(&self, text: &str) -> Vec<String> {
        if text.len() > self.max_input_bytes {
            split_text(text, self.max_input_bytes)
        } else {
            vec![text.to_string()]
        }
    }

    fn request_body(&self, input: String, streaming: bool) -> SpeechRequest {
        SpeechRequest {
            model: DEFAULT_MODEL.to_string(),
            input,
            voice: self.voice.clone(),
            response_format: if streaming { "pcm" } else { "wav" }.to_string(),
            stream: streaming,
            speed: (self.speed != 1.0).then_some(self.speed),
            volume: (self.volume != 1.0).then_some(self.volume),
            encode_format: streaming.then(|| "base64".to_string()),
        }
    }

    /// Non-streaming variant: same chunk plan, whole responses accumulated
    /// and concatenated in plan order.
    pub async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut audio = Vec::new();
        for segment in self.plan(text) {
            let body = self.request_body(segment, false);
            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(VoiceError::Transport(format!(
                    "TTS API error ({}): {}",
                    status, text
                )));
            }
            audio.extend_from_slice(&response.bytes().await?);
        }
        Ok(audio)
    }
}

/// Drive one streaming speech request, forwarding decoded audio chunks.
async fn pump_speech(
    client: reqwest::Client,
    url: String,
    key: String,
    body: SpeechRequest,
    scope: CancellationToken,
    tx: mpsc::Sender<Vec<u8>>,
) -> VoiceResult<()> {
    let response = tokio::select! {
        _ = scope.cancelled() => return Err(VoiceError::Cancelled),
        res = client.post(&url).bearer_auth(&key).json(&body).send() => res?,
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(VoiceError::Transport(format!(
            "TTS API error ({}): {}",
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
            return Ok(());
        };

        for event in decoder.feed(&bytes) {
            let data = match event {
                SseEvent::Done => return Ok(()),
                SseEvent::Data(data) => data,
            };

            let parsed: SpeechChunk = match serde_json::from_str(&data) {
                Ok(c) => c,
                Err(e) => {
                    debug!("skipping malformed speech event: {}", e);
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

            let audio = match BASE64.decode(content) {
                Ok(a) => a,
                Err(e) => {
                    debug!("skipping undecodable audio payload: {}", e);
                    continue;
                }
            };

            tokio::select! {
                _ = scope.cancelled() => return Err(VoiceError::Cancelled),
                sent = tx.send(audio) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl SynthesisEngine for GlmSynthesis {
    fn synthesize_stream(&self, scope: CancellationToken, text: &str) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let text = text.trim();
        if text.is_empty() {
            // Dropping the sender yields an immediately-closed stream.
            return rx;
        }

        let plan = self.plan(text);
        let client = self.client.clone();
        let url = self.api_url.clone();
        let key = self.api_key.clone();
        let bodies: Vec<SpeechRequest> = plan
            .into_iter()
            .map(|segment| self.request_body(segment, true))
            .collect();

        tokio::spawn(async move {
            for (i, body) in bodies.into_iter().enumerate() {
                let result = pump_speech(
                    client.clone(),
                    url.clone(),
                    key.clone(),
                    body,
                    scope.clone(),
                    tx.clone(),
                )
                .await;
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {
                        debug!("synthesis stream cancelled at segment {}", i);
                        return;
                    }
                    Err(e) => {
                        // One failed segment ends the whole logical stream.
                        warn!("synthesis segment {} failed: {}", i, e);
                        return;
                    }
                }
            }
        });

        rx
    }
}
