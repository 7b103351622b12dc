//! Speaker output: a bounded byte queue drained by a continuously running
//! cpal output stream on its own thread.
//!
//! `clear()` implements barge-in: it discards everything queued but never
//! touches the stream, so playback resumes transparently on the next
//! `enqueue`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;

use crate::constants::{duration_to_bytes, SAMPLE_RATE_HZ};
use crate::device::DeviceCatalog;
use voxloop_foundation::AudioError;

/// Bounded FIFO of wire-format PCM awaiting playback.
pub struct PlaybackQueue {
    buffer: Mutex<VecDeque<u8>>,
    max_bytes: usize,
    dropped_bytes: AtomicU64,
}

impl PlaybackQueue {
    /// Queue bounded to `duration` of 24 kHz mono PCM.
    pub fn with_max_duration(duration: Duration) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            max_bytes: duration_to_bytes(duration),
            dropped_bytes: AtomicU64::new(0),
        }
    }

    /// Append a decoded segment. When the queue is at capacity the tail of
    /// the incoming segment is dropped; audio already queued is never
    /// disturbed.
    pub fn enqueue(&self, bytes: &[u8]) {
        let mut buffer = self.buffer.lock();
        let mut room = self.max_bytes.saturating_sub(buffer.len());
        // Never split a 16-bit sample across the capacity boundary.
        room &= !1;
        let take = room.min(bytes.len());
        buffer.extend(&bytes[..take]);
        drop(buffer);

        let overflow = bytes.len() - take;
        if overflow > 0 {
            self.dropped_bytes
                .fetch_add(overflow as u64, Ordering::Relaxed);
            tracing::warn!(overflow, "playback queue full, dropping audio");
        }
    }

    /// Discard all queued, not-yet-played audio (barge-in).
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn queued_bytes(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes.load(Ordering::Relaxed)
    }

    /// Pop complete samples into `out`, zero-filling on underrun.
    /// Called from the output stream callback.
    pub fn pop_samples(&self, out: &mut [i16]) {
        let mut buffer = self.buffer.lock();
        for slot in out.iter_mut() {
            if buffer.len() >= 2 {
                let lo = buffer.pop_front().unwrap_or(0);
                let hi = buffer.pop_front().unwrap_or(0);
                *slot = i16::from_le_bytes([lo, hi]);
            } else {
                *slot = 0;
            }
        }
    }
}

/// Handle to the dedicated playback thread owning the output stream.
pub struct PlaybackThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    queue: Arc<PlaybackQueue>,
}

impl PlaybackThread {
    /// Open the output device and start playing immediately; nothing is
    /// audible until bytes are enqueued.
    pub fn spawn(
        queue: Arc<PlaybackQueue>,
        device_index: Option<usize>,
    ) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let thread_queue = queue.clone();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("voxloop-playback".to_string())
            .spawn(move || {
                match open_output_stream(&thread_queue, device_index) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        while thread_running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(100));
                        }
                        drop(stream);
                        tracing::info!("playback thread shutting down");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn playback thread: {e}")))?;

        ready_rx
            .recv_timeout(Duration::from_secs(3))
            .map_err(|_| AudioError::Fatal("playback stream did not start in time".to_string()))??;

        Ok(Self {
            handle,
            running,
            queue,
        })
    }

    pub fn queue(&self) -> Arc<PlaybackQueue> {
        self.queue.clone()
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn open_output_stream(
    queue: &Arc<PlaybackQueue>,
    device_index: Option<usize>,
) -> Result<Stream, AudioError> {
    let catalog = DeviceCatalog::new();
    let device = catalog.open_output(device_index)?;
    if let Ok(name) = device.name() {
        tracing::info!(device = %name, "selected output device");
    }

    let default = device.default_output_config()?;
    let sample_format = default.sample_format();
    let config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE_HZ),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err: cpal::StreamError| {
        tracing::error!("playback stream error: {err}");
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let queue = queue.clone();
            device.build_output_stream(
                &config,
                move |out: &mut [i16], _: &_| {
                    queue.pop_samples(out);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::F32 => {
            let queue = queue.clone();
            let mut scratch: Vec<i16> = Vec::new();
            device.build_output_stream(
                &config,
                move |out: &mut [f32], _: &_| {
                    scratch.resize(out.len(), 0);
                    queue.pop_samples(&mut scratch);
                    for (dst, &src) in out.iter_mut().zip(scratch.iter()) {
                        *dst = f32::from(src) / 32768.0;
                    }
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?}"),
            });
        }
    };

    stream.play()?;
    Ok(stream)
}
