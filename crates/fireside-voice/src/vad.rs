//! **Voice-Activity Monitor** contract — the interruption signal source.
//!
//! Real implementations sit on a microphone and a VAD model; the core only
//! needs the signal-stream shape. `ScriptedVad` relays caller-injected
//! signals and is what the tests and demos wire in.

use crate::error::VoiceResult;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

/// Signals buffered while an interruption is being handled. A second signal
/// arriving mid-handling queues here rather than running concurrently.
const SIGNAL_CAPACITY: usize = 8;

/// Capability: emit one signal per detected listener utterance.
pub trait VadMonitor: Send + Sync {
    /// Begin monitoring. The stream closes when the monitor stops or `scope`
    /// is cancelled.
    fn start(&self, scope: CancellationToken) -> mpsc::Receiver<()>;

    /// Stop monitoring. Idempotent; must not block indefinitely.
    fn stop(&self) -> VoiceResult<()>;
}

/// Channel-backed monitor: relays signals injected through the paired sender.
///
/// Stands in for a real microphone/VAD stack in tests and demos. Survives the
/// stop-then-start flow: the injector source outlives each monitor run, and
/// `stop()` only ends the current run.
pub struct ScriptedVad {
    source: Arc<AsyncMutex<mpsc::Receiver<()>>>,
    stopped: Mutex<CancellationToken>,
}

impl ScriptedVad {
    /// Create a monitor and the sender used to inject detected-voice signals.
    pub fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);
        let vad = Self {
            source: Arc::new(AsyncMutex::new(rx)),
            stopped: Mutex::new(CancellationToken::new()),
        };
        (vad, tx)
    }
}

impl VadMonitor for ScriptedVad {
    fn start(&self, scope: CancellationToken) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);
        // Fresh stop token per run, so an earlier stop() does not kill the
        // next session's monitor.
        let stopped = {
            let mut guard = self.stopped.lock().expect("vad stop token lock");
            *guard = CancellationToken::new();
            guard.clone()
        };
        let source = Arc::clone(&self.source);

        tokio::spawn(async move {
            // A prior run holds this lock until it winds down; relays are
            // serial and the injector channel is never consumed.
            let mut source = source.lock().await;
            loop {
                tokio::select! {
                    _ = stopped.cancelled() => return,
                    _ = scope.cancelled() => return,
                    sig = source.recv() => match sig {
                        Some(()) => {
                            if tx.send(()).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    },
                }
            }
        });

        rx
    }

    fn stop(&self) -> VoiceResult<()> {
        // CancellationToken::cancel is safe to call any number of times.
        self.stopped.lock().expect("vad stop token lock").cancel();
        Ok(())
    }
}
