//! Fireside Demo — stream a generated podcast with live-backend clients.
//!
//! Wires `OpenAiGeneration` and `GlmSynthesis` into the orchestrator with a
//! `NullSink` (byte-counting playback) and a scripted voice monitor: fifteen
//! seconds in, a simulated interruption asks a canned question, the answer is
//! streamed and synthesized, and the script restarts. Ctrl+C to stop.
//!
//! Set `FIRESIDE_LLM_API_KEY` and `FIRESIDE_TTS_API_KEY` in `.env`.

use fireside_voice::{
    GlmSynthesis, NullSink, OpenAiGeneration, Orchestrator, OrchestratorConfig, ScriptedRecorder,
    ScriptedVad,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Fireside Demo — generated script -> TTS -> playback with a scripted interruption.");

    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "the borrow checker, explained for podcast listeners".to_string());

    let llm = Arc::new(OpenAiGeneration::from_env()?);
    let tts = Arc::new(GlmSynthesis::from_env()?);
    let (vad, vad_signal) = ScriptedVad::new();
    let player = Arc::new(NullSink::new());
    let recorder = Arc::new(ScriptedRecorder::new([
        "Can you give a concrete example of that?".to_string(),
    ]));

    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        llm,
        tts,
        Arc::new(vad),
        Arc::clone(&player) as Arc<dyn fireside_voice::PlaybackSink>,
        recorder,
    );

    // Simulate the listener speaking up mid-script.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        info!("(simulated interruption)");
        let _ = vad_signal.send(()).await;
    });

    orchestrator.start(&topic).await?;
    tokio::signal::ctrl_c().await?;
    orchestrator.stop().await?;
    info!("done; {} audio bytes played", player.bytes_played());
    Ok(())
}
