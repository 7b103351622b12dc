//! The conversation event loop.
//!
//! One task owns the loop: it drains [`ConversationEvent`]s from the
//! transport and turns each into a local effect. Assistant audio goes to
//! the playback queue, user speech flushes it (barge-in), transcripts go
//! to the sinks, and finished function-call items run through the tool
//! registry with results submitted back upstream. The loop ends when the
//! finish tool confirms, the transport closes, or the service errors.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voxloop_audio::{BlockingReader, PlaybackQueue};
use voxloop_tools::{ToolCall, ToolRegistry, ToolReply};

use crate::error::SessionError;
use crate::events::{ConversationEvent, ConversationItem, FinishedItem};
use crate::forwarder::AudioForwarder;
use crate::session::ConversationSession;
use crate::transcript::{SinkSet, TranscriptSink};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Tool whose affirmative result ends the conversation.
    pub finish_tool: String,
    /// Bytes per microphone chunk forwarded upstream (100 ms at 24 kHz).
    pub forward_chunk_bytes: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            finish_tool: "finish_conversation".to_string(),
            forward_chunk_bytes: 4800,
        }
    }
}

/// Why a session loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The finish tool confirmed the user said goodbye.
    Finished,
    /// The transport or service ended the session.
    TransportClosed,
}

pub struct SessionDispatcher {
    session: Arc<dyn ConversationSession>,
    playback: Arc<PlaybackQueue>,
    tools: ToolRegistry,
    output: SinkSet,
    mic: Option<BlockingReader>,
    config: DispatcherConfig,
    speech_active: bool,
}

impl SessionDispatcher {
    pub fn new(
        session: Arc<dyn ConversationSession>,
        playback: Arc<PlaybackQueue>,
        tools: ToolRegistry,
        output: SinkSet,
    ) -> Self {
        Self {
            session,
            playback,
            tools,
            output,
            mic: None,
            config: DispatcherConfig::default(),
            speech_active: false,
        }
    }

    /// Forward microphone audio from this reader once the session starts.
    pub fn with_microphone(mut self, reader: BlockingReader) -> Self {
        self.mic = Some(reader);
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive the loop until the conversation ends.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ConversationEvent>,
    ) -> Result<SessionOutcome, SessionError> {
        let mut forwarder: Option<AudioForwarder> = None;

        let result = loop {
            let Some(event) = events.recv().await else {
                debug!("Event channel closed");
                break Ok(SessionOutcome::TransportClosed);
            };

            match event {
                ConversationEvent::SessionStarted => {
                    info!("Session started");
                    self.output.write_line(" * session started, speak to begin");
                    if let Some(reader) = self.mic.take() {
                        match AudioForwarder::spawn(
                            reader,
                            self.session.clone(),
                            self.config.forward_chunk_bytes,
                        ) {
                            Ok(f) => forwarder = Some(f),
                            Err(e) => break Err(e),
                        }
                    }
                }
                ConversationEvent::SpeechStarted => {
                    self.speech_active = true;
                    let flushed = self.playback.queued_bytes();
                    self.playback.clear();
                    debug!(flushed_bytes = flushed, "Speech started, playback flushed");
                    self.output.write_line(" <<< listening");
                }
                ConversationEvent::SpeechFinished => {
                    if self.speech_active {
                        self.speech_active = false;
                        debug!("Speech finished");
                    }
                }
                ConversationEvent::InputTranscript { text } => {
                    self.output.write_line(&format!(" >>> USER: {text}"));
                }
                ConversationEvent::OutputAudioDelta { bytes } => {
                    self.playback.enqueue(&bytes);
                }
                ConversationEvent::OutputTranscriptDelta { text } => {
                    self.output.write(&text);
                }
                ConversationEvent::ItemFinished { item } => {
                    match self.handle_item(item).await {
                        Ok(ItemOutcome::Continue) => {}
                        Ok(ItemOutcome::Finish) => break Ok(SessionOutcome::Finished),
                        Err(e) => break Err(e),
                    }
                }
                ConversationEvent::Error { message } => {
                    self.output.write_line(&format!(" !!! error: {message}"));
                    break Err(SessionError::Protocol(message));
                }
                ConversationEvent::SessionTerminated => {
                    info!("Session terminated by service");
                    break Ok(SessionOutcome::TransportClosed);
                }
            }
        };

        if let Some(forwarder) = forwarder {
            forwarder.shutdown().await;
        } else if let Some(mic) = self.mic.take() {
            mic.closer().close();
        }

        result
    }

    async fn handle_item(&mut self, item: FinishedItem) -> Result<ItemOutcome, SessionError> {
        let FinishedItem::FunctionCall {
            name,
            call_id,
            arguments,
        } = item
        else {
            // A spoken reply finished; terminate the streamed transcript line.
            self.output.write_line("");
            return Ok(ItemOutcome::Continue);
        };

        let call = ToolCall::new(&name, &call_id, arguments.as_deref().unwrap_or("{}"));
        match self.tools.dispatch(&call).await {
            ToolReply::NotApplicable => {
                warn!(tool = %name, "Call for unregistered tool ignored");
                Ok(ItemOutcome::Continue)
            }
            ToolReply::NoResult => Ok(ItemOutcome::Continue),
            ToolReply::Completed { call_id, value } => {
                if name == self.config.finish_tool && value == serde_json::Value::Bool(true) {
                    self.output.write_line(" * conversation finished");
                    return Ok(ItemOutcome::Finish);
                }
                let payload = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                debug!(tool = %name, call_id = %call_id, "Submitting tool result");
                self.session
                    .submit_item(ConversationItem::function_output(&call_id, &payload))
                    .await?;
                self.session.request_response().await?;
                Ok(ItemOutcome::Continue)
            }
        }
    }
}

enum ItemOutcome {
    Continue,
    Finish,
}
