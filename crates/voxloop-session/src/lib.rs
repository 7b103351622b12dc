//! Conversation session wiring.
//!
//! This crate turns a stream of conversation events into local effects:
//! assistant audio into the playback queue, transcripts into the output
//! sinks, tool calls through the registry, and microphone audio forwarded
//! upstream. The transport producing the events lives behind the
//! [`ConversationSession`] trait so the loop can run against a live
//! backend or a scripted stand-in.

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod session;
pub mod transcript;

pub use dispatcher::{DispatcherConfig, SessionDispatcher, SessionOutcome};
pub use error::SessionError;
pub use events::{ConversationEvent, ConversationItem, FinishedItem};
pub use forwarder::AudioForwarder;
pub use session::{ConversationSession, SessionOptions};
pub use transcript::{ConsoleSink, FileSink, MemorySink, SinkSet, TranscriptSink};
