//! Microphone-to-session bridge.
//!
//! The capture ring is a blocking reader, the transport is async. A
//! dedicated thread reads fixed-size chunks from the ring and hands them
//! over a small channel to a task that appends them to the session. The
//! channel is bounded so a stalled transport backpressures into the ring
//! instead of buffering without limit.

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use voxloop_audio::{BlockingReader, RingCloser};

use crate::error::SessionError;
use crate::session::ConversationSession;

const CHANNEL_DEPTH: usize = 8;

/// How long a healthy transport gets to drain in-flight chunks at teardown.
const SHUTDOWN_DRAIN: std::time::Duration = std::time::Duration::from_secs(1);

pub struct AudioForwarder {
    closer: RingCloser,
    pump: Option<thread::JoinHandle<()>>,
    sender: tokio::task::JoinHandle<()>,
}

impl AudioForwarder {
    /// Start forwarding. Must be called from within a tokio runtime.
    pub fn spawn(
        reader: BlockingReader,
        session: Arc<dyn ConversationSession>,
        chunk_bytes: usize,
    ) -> Result<Self, SessionError> {
        let closer = reader.closer();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

        let pump = thread::Builder::new()
            .name("voxloop-mic-send".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; chunk_bytes];
                loop {
                    if reader.read_exact(&mut buf).is_err() {
                        // Ring closed, capture is over.
                        break;
                    }
                    if tx.blocking_send(buf.clone()).is_err() {
                        break;
                    }
                }
                debug!("Microphone pump thread exiting");
            })
            .map_err(|e| SessionError::Transport(format!("failed to spawn mic pump: {e}")))?;

        let sender = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if let Err(e) = session.append_audio(&chunk).await {
                    warn!(%e, "Failed to forward microphone audio, stopping");
                    break;
                }
            }
        });

        Ok(Self {
            closer,
            pump: Some(pump),
            sender,
        })
    }

    /// Close the ring, stop the sender, and wait for the pump to exit.
    ///
    /// In-flight chunks get a short grace period to drain; past that the
    /// sender task is aborted, which drops the channel receiver and errors
    /// out a pump blocked in `blocking_send` against a stalled transport.
    /// Only then is the pump joined, so teardown never waits on a wedged
    /// thread.
    pub async fn shutdown(mut self) {
        self.closer.close();
        if tokio::time::timeout(SHUTDOWN_DRAIN, &mut self.sender)
            .await
            .is_err()
        {
            warn!("Transport did not drain forwarded audio in time, aborting");
            self.sender.abort();
            let _ = (&mut self.sender).await;
        }
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!("Microphone pump thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use voxloop_audio::ByteRing;

    use crate::events::ConversationItem;
    use crate::session::SessionOptions;

    #[derive(Default)]
    struct RecordingSession {
        chunks: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl ConversationSession for RecordingSession {
        async fn configure(&self, _options: SessionOptions) -> Result<(), SessionError> {
            Ok(())
        }
        async fn append_audio(&self, pcm: &[u8]) -> Result<(), SessionError> {
            self.chunks.lock().push(pcm.to_vec());
            Ok(())
        }
        async fn submit_item(&self, _item: ConversationItem) -> Result<(), SessionError> {
            Ok(())
        }
        async fn request_response(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forwards_fixed_size_chunks_until_ring_closes() {
        let (writer, reader) = ByteRing::with_capacity(1024);
        let session = Arc::new(RecordingSession::default());
        let forwarder = AudioForwarder::spawn(reader, session.clone(), 16).unwrap();

        for i in 0..4u8 {
            writer.write(&[i; 16]).unwrap();
        }
        drop(writer); // closes the ring after the pump drains it

        forwarder.shutdown().await;

        let chunks = session.chunks.lock();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == 16));
        assert_eq!(chunks[2], vec![2u8; 16]);
    }

    /// `append_audio` that never completes, as after a protocol error has
    /// wedged the transport.
    struct StalledSession;

    #[async_trait]
    impl ConversationSession for StalledSession {
        async fn configure(&self, _options: SessionOptions) -> Result<(), SessionError> {
            Ok(())
        }
        async fn append_audio(&self, _pcm: &[u8]) -> Result<(), SessionError> {
            std::future::pending().await
        }
        async fn submit_item(&self, _item: ConversationItem) -> Result<(), SessionError> {
            Ok(())
        }
        async fn request_response(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_completes_when_the_transport_is_stalled() {
        let (writer, reader) = ByteRing::with_capacity(64 * 1024);
        let forwarder = AudioForwarder::spawn(reader, Arc::new(StalledSession), 16).unwrap();

        // Enough chunks to fill the channel and leave the pump parked in
        // blocking_send once the transport stops consuming.
        for i in 0..32u8 {
            writer.write(&[i; 16]).unwrap();
        }

        // Current-thread runtime: a shutdown that joins the pump while it
        // is still blocked would never return.
        tokio::time::timeout(std::time::Duration::from_secs(5), forwarder.shutdown())
            .await
            .expect("shutdown wedged on a stalled transport");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_unblocks_a_waiting_pump() {
        let (_writer, reader) = ByteRing::with_capacity(1024);
        let session = Arc::new(RecordingSession::default());
        let forwarder = AudioForwarder::spawn(reader, session.clone(), 16).unwrap();

        // Nothing written; the pump is blocked in read_exact.
        forwarder.shutdown().await;
        assert!(session.chunks.lock().is_empty());
    }
}
