//! # Fireside Voice — interruption-aware streaming podcast playback
//!
//! Streams a generated podcast script through text-to-speech to a playback
//! sink while watching for the listener speaking up. A detected voice stops
//! playback, records and transcribes the question, streams back a spoken
//! answer, and resumes the show.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────┐          │
//! │  │ Generation │ → │ Synthesis  │ → │ Playback     │          │
//! │  │ (SSE text) │   │ (SSE b64)  │   │ Sink         │          │
//! │  └────────────┘   └─────┬──────┘   └──────┬───────┘          │
//! │                   Text Chunker            │ kill signal      │
//! │  ┌────────────┐   ┌────────────┐   ┌──────┴───────┐          │
//! │  │ Voice      │ → │ Recording  │ → │ Interruption │          │
//! │  │ Monitor    │   │ Source     │   │ Handler      │          │
//! │  └────────────┘   └────────────┘   └──────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One cancellation scope covers each playback-or-answer pipeline; cancelling
//! it unblocks every derived stream and network call. Microphone capture,
//! speaker output, and VAD inference live behind the collaborator traits.

pub mod chunker;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod playback;
pub mod recorder;
pub mod sse;
pub mod state;
pub mod tts;
pub mod vad;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::split_text;
pub use error::{VoiceError, VoiceResult};
pub use llm::{GenerationEngine, OpenAiGeneration};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ResumePolicy};
pub use playback::{NullSink, PlaybackSink};
pub use recorder::{RecordingSource, ScriptedRecorder};
pub use sse::{SseDecoder, SseEvent};
pub use state::{SessionState, StateCell};
pub use tts::{GlmSynthesis, SynthesisEngine};
pub use vad::{ScriptedVad, VadMonitor};
