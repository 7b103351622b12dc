//! Conversation stream data model.
//!
//! Events are what the transport delivers to the dispatcher; items are
//! what the dispatcher submits back. Both serialize with a `type` tag so
//! scripted sessions can be described as plain JSON.

use serde::{Deserialize, Serialize};

/// One event received on a live conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// The session handshake completed and streaming may begin.
    SessionStarted,
    /// Server-side turn detection heard the user start speaking.
    SpeechStarted,
    /// Server-side turn detection heard the user stop speaking.
    SpeechFinished,
    /// Final transcription of what the user said.
    InputTranscript { text: String },
    /// A slice of assistant speech, 16-bit mono PCM.
    OutputAudioDelta { bytes: Vec<u8> },
    /// A slice of the assistant's spoken text.
    OutputTranscriptDelta { text: String },
    /// A conversation item the assistant finished producing.
    ItemFinished { item: FinishedItem },
    /// The service reported a fault.
    Error { message: String },
    /// The service ended the session.
    SessionTerminated,
}

/// The payload of a finished conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinishedItem {
    /// The assistant requested a local tool by name.
    FunctionCall {
        name: String,
        call_id: String,
        arguments: Option<String>,
    },
    /// An ordinary message item; nothing to do locally.
    Message,
}

/// An item submitted back into the conversation by this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub call_id: String,
    pub output: String,
}

impl ConversationItem {
    /// The function-call-output item answering a tool call.
    pub fn function_output(call_id: &str, output: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            output: output.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json() {
        let json = r#"{"type":"input_transcript","text":"hello"}"#;
        let event: ConversationEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ConversationEvent::InputTranscript { ref text } if text == "hello"));
    }

    #[test]
    fn function_call_item_parses_with_optional_arguments() {
        let json = r#"{"type":"item_finished","item":{"kind":"function_call","name":"get_weather","call_id":"c1","arguments":null}}"#;
        let event: ConversationEvent = serde_json::from_str(json).unwrap();
        match event {
            ConversationEvent::ItemFinished {
                item: FinishedItem::FunctionCall { name, arguments, .. },
            } => {
                assert_eq!(name, "get_weather");
                assert!(arguments.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
