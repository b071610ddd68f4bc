//! **Playback Sink** contract — consume an audio stream until exhausted,
//! cancelled, or explicitly stopped.
//!
//! Real implementations push bytes at an audio device; `NullSink` just drains
//! and counts, which is enough for tests, demos, and headless runs.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capability: play one audio-byte stream to completion.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Drain `audio` until it closes or `scope` is cancelled.
    ///
    /// Returns `Err(VoiceError::Cancelled)` on cancellation so callers can
    /// tell preemption from normal exhaustion; `stop()` ends the call with
    /// `Ok` like exhaustion does.
    async fn play(
        &self,
        scope: CancellationToken,
        audio: mpsc::Receiver<Vec<u8>>,
    ) -> VoiceResult<()>;

    /// Preempt an in-progress `play`. Idempotent.
    fn stop(&self) -> VoiceResult<()>;
}

/// Sink that discards audio, tracking how many bytes went by.
pub struct NullSink {
    bytes_played: AtomicUsize,
    // Fresh token per play; stop() cancels the current one.
    current: Mutex<CancellationToken>,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            bytes_played: AtomicUsize::new(0),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// Total bytes drained across all plays.
    pub fn bytes_played(&self) -> usize {
        self.bytes_played.load(Ordering::Relaxed)
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackSink for NullSink {
    async fn play(
        &self,
        scope: CancellationToken,
        mut audio: mpsc::Receiver<Vec<u8>>,
    ) -> VoiceResult<()> {
        let stop = {
            let mut current = self.current.lock().expect("sink token lock");
            *current = CancellationToken::new();
            current.clone()
        };

        loop {
            tokio::select! {
                _ = scope.cancelled() => return Err(VoiceError::Cancelled),
                _ = stop.cancelled() => {
                    debug!("playback stopped");
                    return Ok(());
                }
                chunk = audio.recv() => match chunk {
                    Some(bytes) => {
                        self.bytes_played.fetch_add(bytes.len(), Ordering::Relaxed);
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    fn stop(&self) -> VoiceResult<()> {
        self.current.lock().expect("sink token lock").cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drains_stream_to_exhaustion() {
        let sink = NullSink::new();
        let (tx, rx) = mpsc::channel(4);
        tx.send(vec![0u8; 10]).await.unwrap();
        tx.send(vec![0u8; 5]).await.unwrap();
        drop(tx);

        sink.play(CancellationToken::new(), rx).await.unwrap();
        assert_eq!(sink.bytes_played(), 15);
    }

    #[tokio::test]
    async fn cancellation_preempts_play() {
        let sink = NullSink::new();
        let scope = CancellationToken::new();
        let (_tx, rx) = mpsc::channel::<Vec<u8>>(4);

        scope.cancel();
        let err = sink.play(scope, rx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn stop_preempts_play() {
        let sink = std::sync::Arc::new(NullSink::new());
        let (_tx, rx) = mpsc::channel::<Vec<u8>>(4);

        let playing = {
            let sink = std::sync::Arc::clone(&sink);
            tokio::spawn(async move { sink.play(CancellationToken::new(), rx).await })
        };
        // Give the play loop a chance to park on the channel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.stop().unwrap();
        sink.stop().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), playing)
            .await
            .expect("play did not return after stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
