//! Scripted conversation transport.
//!
//! Replays a JSON file of conversation events through the dispatcher with
//! no network involved. The session half records everything the
//! dispatcher sends so a run can be inspected afterwards.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use voxloop_session::{
    ConversationEvent, ConversationItem, ConversationSession, SessionError, SessionOptions,
};

/// Load a script: a JSON array of conversation events.
pub fn load_script(path: &Path) -> Result<Vec<ConversationEvent>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read script {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse script {}: {}", path.display(), e))
}

/// Feed scripted events into a channel the dispatcher can drain.
///
/// The sender task finishes when all events are delivered; the closed
/// channel then reads as the transport going away.
pub fn feed(events: Vec<ConversationEvent>) -> mpsc::Receiver<ConversationEvent> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        debug!("Script exhausted");
    });
    rx
}

/// Records what the dispatcher sends upstream.
#[derive(Default)]
pub struct ScriptedSession {
    configured: Mutex<Option<SessionOptions>>,
    appended_bytes: AtomicUsize,
    submitted: Mutex<Vec<ConversationItem>>,
    responses_requested: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configured(&self) -> Option<SessionOptions> {
        self.configured.lock().clone()
    }

    pub fn appended_bytes(&self) -> usize {
        self.appended_bytes.load(Ordering::Relaxed)
    }

    pub fn submitted(&self) -> Vec<ConversationItem> {
        self.submitted.lock().clone()
    }

    pub fn responses_requested(&self) -> usize {
        self.responses_requested.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConversationSession for ScriptedSession {
    async fn configure(&self, options: SessionOptions) -> Result<(), SessionError> {
        *self.configured.lock() = Some(options);
        Ok(())
    }

    async fn append_audio(&self, pcm: &[u8]) -> Result<(), SessionError> {
        self.appended_bytes.fetch_add(pcm.len(), Ordering::Relaxed);
        Ok(())
    }

    async fn submit_item(&self, item: ConversationItem) -> Result<(), SessionError> {
        debug!(call_id = %item.call_id, "Scripted session received item");
        self.submitted.lock().push(item);
        Ok(())
    }

    async fn request_response(&self) -> Result<(), SessionError> {
        self.responses_requested.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn script_files_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"[
                {{"type":"session_started"}},
                {{"type":"input_transcript","text":"hi"}},
                {{"type":"session_terminated"}}
            ]"#
        )
        .unwrap();

        let events = load_script(&path).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ConversationEvent::SessionStarted));
    }

    #[test]
    fn malformed_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not a script").unwrap();
        assert!(load_script(&path).is_err());
    }

    #[tokio::test]
    async fn feed_delivers_in_order_then_closes() {
        let events = vec![
            ConversationEvent::SessionStarted,
            ConversationEvent::SessionTerminated,
        ];
        let mut rx = feed(events);
        assert!(matches!(
            rx.recv().await,
            Some(ConversationEvent::SessionStarted)
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ConversationEvent::SessionTerminated)
        ));
        assert!(rx.recv().await.is_none());
    }
}
