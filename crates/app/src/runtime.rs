//! Application wiring.
//!
//! Brings up the audio threads, tool registry, and transcript sinks
//! around a conversation transport, runs the dispatcher to completion,
//! and tears everything down in order.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use voxloop_audio::constants::duration_to_bytes;
use voxloop_audio::{ByteRing, CaptureThread, PlaybackQueue, PlaybackThread};
use voxloop_foundation::{AppState, AudioError, StateManager};
use voxloop_session::{
    ConsoleSink, ConversationEvent, ConversationSession, FileSink, SessionDispatcher,
    SessionError, SessionOutcome, SinkSet,
};

use crate::scripted::{self, ScriptedSession};
use crate::{tools, Settings};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Process exit code for a finished run.
pub fn exit_code(result: &Result<SessionOutcome, RuntimeError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(RuntimeError::Config(_)) => 2,
        Err(_) => 1,
    }
}

/// Replay a script file through the full pipeline.
///
/// `live_audio` opens the real capture and playback devices; without it
/// the run is pure software, suitable for headless environments.
pub async fn run_scripted(
    settings: Settings,
    script_path: &Path,
    live_audio: bool,
) -> Result<SessionOutcome, RuntimeError> {
    let events = scripted::load_script(script_path).map_err(RuntimeError::Config)?;
    let session = Arc::new(ScriptedSession::new());
    let rx = scripted::feed(events);
    run_with_transport(settings, session, rx, live_audio).await
}

/// Run the pipeline against an arbitrary transport.
pub async fn run_with_transport(
    settings: Settings,
    session: Arc<dyn ConversationSession>,
    events: mpsc::Receiver<ConversationEvent>,
    live_audio: bool,
) -> Result<SessionOutcome, RuntimeError> {
    let state = StateManager::new();

    let mut output = SinkSet::new().attach(Box::new(ConsoleSink));
    if let Some(path) = &settings.session.transcript_file {
        let sink = FileSink::create(path).map_err(|e| {
            RuntimeError::Config(format!(
                "Failed to open transcript file {}: {}",
                path.display(),
                e
            ))
        })?;
        output = output.attach(Box::new(sink));
    }

    let registry = tools::default_registry()
        .map_err(|e| RuntimeError::Config(format!("Tool registration failed: {}", e)))?;
    session
        .configure(settings.session_options(registry.descriptors()))
        .await?;

    let playback = Arc::new(PlaybackQueue::with_max_duration(
        settings.playback_capacity(),
    ));

    let mut capture = None;
    let mut playback_thread = None;
    let mut dispatcher = SessionDispatcher::new(session, playback.clone(), registry, output);

    if live_audio {
        let (writer, reader) = ByteRing::with_capacity(duration_to_bytes(settings.ring_capacity()));
        let (capture_thread, device_config) = CaptureThread::spawn(
            settings.capture_config(),
            writer,
            settings.audio.input_device,
        )?;
        info!(
            sample_rate = device_config.sample_rate,
            channels = device_config.channels,
            "Capture started"
        );
        capture = Some(capture_thread);
        playback_thread = Some(PlaybackThread::spawn(
            playback.clone(),
            settings.audio.output_device,
        )?);
        dispatcher = dispatcher.with_microphone(reader);
    }

    state
        .transition(AppState::Running)
        .map_err(|e| RuntimeError::Config(e.to_string()))?;

    let result = dispatcher.run(events).await;

    let _ = state.transition(AppState::Stopping);
    if let Some(capture) = capture {
        let stats = capture.stats();
        info!(
            captured = stats.chunks_captured.load(std::sync::atomic::Ordering::Relaxed),
            gated = stats.chunks_gated.load(std::sync::atomic::Ordering::Relaxed),
            dropped = stats.chunks_dropped.load(std::sync::atomic::Ordering::Relaxed),
            "Capture stats"
        );
        capture.stop();
    }
    if let Some(playback_thread) = playback_thread {
        playback_thread.stop();
    }
    let _ = state.transition(AppState::Stopped);

    result.map_err(RuntimeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_script(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("script.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", body).unwrap();
        path
    }

    #[tokio::test]
    async fn scripted_run_completes_without_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(
            &dir,
            r#"[
                {"type":"session_started"},
                {"type":"input_transcript","text":"goodbye"},
                {"type":"item_finished","item":{"kind":"function_call","name":"finish_conversation","call_id":"c1","arguments":"{}"}}
            ]"#,
        );

        let outcome = run_scripted(Settings::default(), &path, false).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Finished);
    }

    #[tokio::test]
    async fn exhausted_script_reads_as_transport_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(&dir, r#"[{"type":"session_started"}]"#);

        let outcome = run_scripted(Settings::default(), &path, false).await.unwrap();
        assert_eq!(outcome, SessionOutcome::TransportClosed);
    }

    #[tokio::test]
    async fn protocol_errors_map_to_exit_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(
            &dir,
            r#"[{"type":"error","message":"session rejected"}]"#,
        );

        let result = run_scripted(Settings::default(), &path, false).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Session(SessionError::Protocol(_)))
        ));
        assert_eq!(exit_code(&result), 1);
    }

    #[tokio::test]
    async fn missing_script_maps_to_exit_code_two() {
        let result = run_scripted(
            Settings::default(),
            Path::new("/nonexistent/script.json"),
            false,
        )
        .await;
        assert!(matches!(result, Err(RuntimeError::Config(_))));
        assert_eq!(exit_code(&result), 2);
    }

    #[tokio::test]
    async fn transcript_file_receives_the_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.txt");
        let path = write_script(
            &dir,
            r#"[
                {"type":"input_transcript","text":"hello there"},
                {"type":"session_terminated"}
            ]"#,
        );

        let mut settings = Settings::default();
        settings.session.transcript_file = Some(transcript.clone());
        run_scripted(settings, &path, false).await.unwrap();

        let text = std::fs::read_to_string(&transcript).unwrap();
        assert!(text.contains("hello there"));
    }
}
