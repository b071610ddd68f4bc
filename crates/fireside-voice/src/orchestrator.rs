//! **Orchestrator** — the interruption-aware playback state machine.
//!
//! Coordinates script generation, synthesis, playback, and voice-activity
//! monitoring as concurrent tasks under one cancellation scope per session.
//! A detected-voice signal preempts playback, records the listener's question,
//! streams a spoken answer, and then resumes according to [`ResumePolicy`].
//!
//! Locking discipline: the state cell's lock is only held for the read/write
//! itself, never across an await; the session slot uses an async mutex because
//! `stop` joins background tasks while holding it.

use crate::error::{VoiceError, VoiceResult};
use crate::llm::GenerationEngine;
use crate::playback::PlaybackSink;
use crate::recorder::RecordingSource;
use crate::state::{SessionState, StateCell};
use crate::tts::SynthesisEngine;
use crate::vad::VadMonitor;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// What happens to the podcast once an interruption's answer has finished.
///
/// The original script stream is gone by then (its scope was cancelled), so
/// the choice is between regenerating and ending the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Generate a fresh script for the original topic and keep playing.
    #[default]
    RestartScript,
    /// Return to `Idle`; the session is over after the answer.
    EndSession,
}

/// Orchestrator tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Post-answer behavior (default: restart the script).
    pub resume_policy: ResumePolicy,
    /// Pass the session topic as context to answer generation (default: the
    /// question is answered without context).
    pub answer_with_topic_context: bool,
}

/// Collaborators and shared state, cloned into background tasks.
struct Inner {
    config: OrchestratorConfig,
    state: StateCell,
    llm: Arc<dyn GenerationEngine>,
    tts: Arc<dyn SynthesisEngine>,
    vad: Arc<dyn VadMonitor>,
    player: Arc<dyn PlaybackSink>,
    recorder: Arc<dyn RecordingSource>,
}

/// Per-session context shared between the playback loop, the interruption
/// monitor, and `stop`.
#[derive(Clone)]
struct SessionCtx {
    /// Lives from `start` until `stop` (or `EndSession`); parent of every
    /// scope below.
    token: CancellationToken,
    /// Scope of the *current* playback-or-answer pipeline. Replaced with a
    /// fresh child on interruption.
    scope: Arc<StdMutex<CancellationToken>>,
    /// Handle of the running playback loop, joined after its scope is
    /// cancelled so two pipelines never overlap.
    playback_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    tracker: TaskTracker,
    topic: Arc<str>,
}

impl SessionCtx {
    fn new(topic: &str) -> Self {
        let token = CancellationToken::new();
        let scope = token.child_token();
        Self {
            token,
            scope: Arc::new(StdMutex::new(scope)),
            playback_task: Arc::new(Mutex::new(None)),
            tracker: TaskTracker::new(),
            topic: Arc::from(topic),
        }
    }

    fn current_scope(&self) -> CancellationToken {
        self.scope.lock().expect("scope lock").clone()
    }

    /// Install and return a fresh scope for the next pipeline.
    fn replace_scope(&self) -> CancellationToken {
        let next = self.token.child_token();
        *self.scope.lock().expect("scope lock") = next.clone();
        next
    }
}

/// The interruption-aware podcast player.
pub struct Orchestrator {
    inner: Arc<Inner>,
    session: Mutex<Option<SessionCtx>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        llm: Arc<dyn GenerationEngine>,
        tts: Arc<dyn SynthesisEngine>,
        vad: Arc<dyn VadMonitor>,
        player: Arc<dyn PlaybackSink>,
        recorder: Arc<dyn RecordingSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: StateCell::new(),
                llm,
                tts,
                vad,
                player,
                recorder,
            }),
            session: Mutex::new(None),
        }
    }

    /// Current session state; callable from any task.
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Every state entered so far, in order. Diagnostic aid.
    pub fn state_history(&self) -> Vec<SessionState> {
        self.inner.state.history()
    }

    /// Begin a podcast session on `topic`.
    ///
    /// Rejects if a session is already active (documented choice: callers must
    /// `stop()` first; there is no implicit stop-then-start). Launches the
    /// playback loop and the interruption monitor under a fresh cancellation
    /// scope.
    pub async fn start(&self, topic: &str) -> VoiceResult<()> {
        let mut slot = self.session.lock().await;
        if let Some(existing) = slot.as_ref() {
            if !existing.token.is_cancelled() {
                return Err(VoiceError::Config(
                    "session already active; call stop() first".to_string(),
                ));
            }
        }

        info!("🎙️ starting podcast session: {}", topic);
        let session = SessionCtx::new(topic);
        self.inner.state.set(SessionState::Playing);

        let scope = session.current_scope();
        let script = self.inner.llm.generate_script(scope.child_token(), topic);
        let handle = session.tracker.spawn(playback_loop(
            Arc::clone(&self.inner),
            session.token.clone(),
            scope,
            script,
        ));
        *session.playback_task.lock().await = Some(handle);

        session
            .tracker
            .spawn(monitor_loop(Arc::clone(&self.inner), session.clone()));

        *slot = Some(session);
        Ok(())
    }

    /// Tear the session down: cancel everything, silence the player, stop the
    /// voice monitor, join the background tasks, and return to `Idle`.
    ///
    /// Idempotent; a second call is a no-op apart from re-quieting the
    /// collaborators.
    pub async fn stop(&self) -> VoiceResult<()> {
        let mut slot = self.session.lock().await;
        info!("🛑 stopping orchestrator");

        if let Err(e) = self.inner.player.stop() {
            warn!("player stop failed: {}", e);
        }
        if let Err(e) = self.inner.vad.stop() {
            warn!("vad stop failed: {}", e);
        }

        if let Some(session) = slot.take() {
            session.token.cancel();
            session.tracker.close();
            session.tracker.wait().await;
        }

        self.inner.state.set(SessionState::Idle);
        Ok(())
    }
}

/// Consume the script stream: for each fragment, synthesize then play, in
/// order. Natural stream end transitions to `Idle` and ends the session (the
/// session token is cancelled, reclaiming the slot for the next `start`);
/// cancellation exits without touching state (the cancelling party owns that
/// transition).
async fn playback_loop(
    inner: Arc<Inner>,
    session_token: CancellationToken,
    scope: CancellationToken,
    mut script: mpsc::Receiver<String>,
) {
    loop {
        tokio::select! {
            _ = scope.cancelled() => {
                debug!("playback loop cancelled");
                return;
            }
            fragment = script.recv() => match fragment {
                None => {
                    info!("script stream ended");
                    inner.state.set(SessionState::Idle);
                    session_token.cancel();
                    return;
                }
                Some(text) => {
                    if !play_fragment(&inner, &scope, &text).await {
                        return;
                    }
                }
            },
        }
    }
}

/// Synthesize and play one fragment. Returns false when the pipeline was
/// cancelled mid-play; other playback errors degrade to a warning.
async fn play_fragment(inner: &Inner, scope: &CancellationToken, text: &str) -> bool {
    debug!("playing fragment ({} bytes)", text.len());
    let audio = inner.tts.synthesize_stream(scope.child_token(), text);
    match inner.player.play(scope.child_token(), audio).await {
        Ok(()) => true,
        Err(e) if e.is_cancelled() => false,
        Err(e) => {
            warn!("playback error: {}", e);
            true
        }
    }
}

/// Watch the voice-activity signal stream and run the interruption handler
/// once per signal. Handling is inline, so a second signal queues in the
/// channel instead of racing a concurrent handler.
async fn monitor_loop(inner: Arc<Inner>, session: SessionCtx) {
    let mut signals = inner.vad.start(session.token.child_token());
    loop {
        tokio::select! {
            _ = session.token.cancelled() => {
                debug!("interruption monitor cancelled");
                return;
            }
            signal = signals.recv() => match signal {
                None => {
                    debug!("voice signal stream closed");
                    return;
                }
                Some(()) => handle_interruption(&inner, &session).await,
            },
        }
    }
}

/// The interrupt → record → respond → resume cycle.
async fn handle_interruption(inner: &Arc<Inner>, session: &SessionCtx) {
    info!("⚡ voice detected, interrupting playback");
    inner.state.set(SessionState::Interrupted);

    // Cancel the in-flight pipeline and wait for the loop to wind down so no
    // two pipelines are ever live at once.
    session.current_scope().cancel();
    if let Some(handle) = session.playback_task.lock().await.take() {
        let _ = handle.await;
    }
    // Buffered audio can survive scope cancellation; silence it explicitly.
    if let Err(e) = inner.player.stop() {
        warn!("player stop failed: {}", e);
    }

    inner.state.set(SessionState::Thinking);

    // The answer sub-session runs under a fresh scope; the old one is dead.
    let scope = session.replace_scope();
    let question = match inner.recorder.record(scope.clone()).await {
        Ok(q) => q,
        Err(e) if e.is_cancelled() => return,
        Err(e) => {
            // Degraded continuation: the question is lost, the show goes on.
            warn!("recording failed: {}", e);
            resume(inner, session, &scope).await;
            return;
        }
    };
    info!("listener question: {}", question);

    let context = if inner.config.answer_with_topic_context {
        session.topic.as_ref()
    } else {
        ""
    };
    let mut answer = inner
        .llm
        .generate_answer(scope.child_token(), &question, context);
    loop {
        let fragment = tokio::select! {
            _ = scope.cancelled() => return,
            fragment = answer.recv() => fragment,
        };
        let Some(text) = fragment else { break };
        if !play_fragment(inner, &scope, &text).await {
            return;
        }
    }

    resume(inner, session, &scope).await;
}

/// Post-answer continuation per [`ResumePolicy`].
async fn resume(inner: &Arc<Inner>, session: &SessionCtx, scope: &CancellationToken) {
    match inner.config.resume_policy {
        ResumePolicy::RestartScript => {
            info!("resuming: regenerating script for topic '{}'", session.topic);
            inner.state.set(SessionState::Playing);
            let script = inner
                .llm
                .generate_script(scope.child_token(), &session.topic);
            let handle = session.tracker.spawn(playback_loop(
                Arc::clone(inner),
                session.token.clone(),
                scope.clone(),
                script,
            ));
            *session.playback_task.lock().await = Some(handle);
        }
        ResumePolicy::EndSession => {
            info!("session ends after answer");
            session.token.cancel();
            inner.state.set(SessionState::Idle);
        }
    }
}
