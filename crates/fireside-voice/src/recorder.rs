//! **Recording Source** contract — capture and transcribe one listener
//! utterance.
//!
//! Real implementations sit on a microphone plus an STT backend. The core only
//! needs the blocking-until-utterance shape; `ScriptedRecorder` serves queued
//! transcripts for tests and demos.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Capability: block until an utterance is captured and transcribed, or the
/// scope is cancelled.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    async fn record(&self, scope: CancellationToken) -> VoiceResult<String>;
}

/// Recorder that returns pre-queued utterances in order.
///
/// An empty queue yields a `Recording` error, which exercises the
/// orchestrator's degraded-continuation path.
pub struct ScriptedRecorder {
    utterances: Mutex<VecDeque<String>>,
}

impl ScriptedRecorder {
    pub fn new(utterances: impl IntoIterator<Item = String>) -> Self {
        Self {
            utterances: Mutex::new(utterances.into_iter().collect()),
        }
    }
}

#[async_trait]
impl RecordingSource for ScriptedRecorder {
    async fn record(&self, scope: CancellationToken) -> VoiceResult<String> {
        if scope.is_cancelled() {
            return Err(VoiceError::Cancelled);
        }
        self.utterances
            .lock()
            .expect("utterance lock")
            .pop_front()
            .ok_or_else(|| VoiceError::Recording("no utterance captured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_utterances_in_order() {
        let rec = ScriptedRecorder::new(["one".to_string(), "two".to_string()]);
        let scope = CancellationToken::new();
        assert_eq!(rec.record(scope.clone()).await.unwrap(), "one");
        assert_eq!(rec.record(scope.clone()).await.unwrap(), "two");
        assert!(rec.record(scope).await.is_err());
    }

    #[tokio::test]
    async fn cancelled_scope_aborts_record() {
        let rec = ScriptedRecorder::new(["ignored".to_string()]);
        let scope = CancellationToken::new();
        scope.cancel();
        let err = rec.record(scope).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
