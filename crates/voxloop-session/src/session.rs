//! The transport seam.

use async_trait::async_trait;
use voxloop_tools::ToolDescriptor;

use crate::error::SessionError;
use crate::events::ConversationItem;

/// Session-level configuration sent to the service before streaming.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub voice: String,
    pub transcription_model: String,
    pub turn_detection_threshold: f32,
    pub tools: Vec<ToolDescriptor>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            voice: "shimmer".to_string(),
            transcription_model: "whisper-1".to_string(),
            turn_detection_threshold: 0.8,
            tools: Vec::new(),
        }
    }
}

/// Outbound half of a conversation transport.
///
/// Implementations must tolerate concurrent callers; audio is appended
/// from the forwarder task while the dispatcher submits items.
#[async_trait]
pub trait ConversationSession: Send + Sync {
    /// Apply [`SessionOptions`] to the remote session.
    async fn configure(&self, options: SessionOptions) -> Result<(), SessionError>;

    /// Stream a chunk of microphone PCM upstream.
    async fn append_audio(&self, pcm: &[u8]) -> Result<(), SessionError>;

    /// Insert an item (for example a tool result) into the conversation.
    async fn submit_item(&self, item: ConversationItem) -> Result<(), SessionError>;

    /// Ask the assistant to respond to the conversation as it now stands.
    async fn request_response(&self) -> Result<(), SessionError>;
}
