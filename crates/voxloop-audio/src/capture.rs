//! Microphone capture thread.
//!
//! A dedicated thread owns the cpal input stream (cpal streams are not
//! Send). The stream callback converts incoming samples to mono i16, runs
//! them through the noise gate, applies the silence-hangover drop policy,
//! and appends surviving chunks to the blocking ring buffer. The callback
//! never blocks beyond the ring's short critical section.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::constants::SAMPLE_RATE_HZ;
use crate::device::DeviceCatalog;
use crate::gate::{GateConfig, NoiseGate};
use crate::ring_buffer::ChunkWriter;
use voxloop_foundation::{AudioError, Clock, RealClock};

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub gate: GateConfig,
    /// How long after the last detected speech sub-threshold chunks are
    /// still forwarded, so pauses inside an utterance are not truncated.
    pub hangover: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            hangover: Duration::from_millis(5000),
        }
    }
}

/// Negotiated device parameters.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    /// Chunks appended to the ring.
    pub chunks_captured: AtomicU64,
    /// Chunks suppressed by the gate after the hangover elapsed.
    pub chunks_gated: AtomicU64,
    /// Chunks lost to ring overflow.
    pub chunks_dropped: AtomicU64,
}

/// Gate + hangover + ring-append stage shared by every sample-format arm
/// of the capture callback.
struct GatedChunkSink {
    gate: NoiseGate,
    writer: ChunkWriter,
    stats: Arc<CaptureStats>,
    clock: Arc<dyn Clock>,
    hangover: Duration,
    last_speech: Instant,
    channels: u16,
    mono: Vec<i16>,
    bytes: Vec<u8>,
}

impl GatedChunkSink {
    fn new(
        gate: NoiseGate,
        writer: ChunkWriter,
        stats: Arc<CaptureStats>,
        clock: Arc<dyn Clock>,
        hangover: Duration,
        channels: u16,
    ) -> Self {
        let last_speech = clock.now();
        Self {
            gate,
            writer,
            stats,
            clock,
            hangover,
            last_speech,
            channels,
            mono: Vec::new(),
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, interleaved: &[i16]) {
        self.mono.clear();
        if self.channels <= 1 {
            self.mono.extend_from_slice(interleaved);
        } else {
            let ch = usize::from(self.channels);
            self.mono.extend(interleaved.chunks_exact(ch).map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                (sum / ch as i32) as i16
            }));
        }

        let speech = self.gate.process(&mut self.mono);
        let now = self.clock.now();
        if speech {
            self.last_speech = now;
        } else if now.duration_since(self.last_speech) > self.hangover {
            self.stats.chunks_gated.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.bytes.clear();
        for sample in &self.mono {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
        match self.writer.write(&self.bytes) {
            Ok(()) => {
                self.stats.chunks_captured.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Handle to the dedicated capture thread.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureThread {
    pub fn spawn(
        config: CaptureConfig,
        writer: ChunkWriter,
        device_index: Option<usize>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        Self::spawn_with_clock(config, writer, device_index, Arc::new(RealClock))
    }

    pub fn spawn_with_clock(
        config: CaptureConfig,
        writer: ChunkWriter,
        device_index: Option<usize>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(CaptureStats::default());
        let failed = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let thread_running = running.clone();
        let thread_stats = stats.clone();
        let thread_failed = failed.clone();

        let handle = thread::Builder::new()
            .name("voxloop-capture".to_string())
            .spawn(move || {
                let setup = open_stream(
                    config,
                    writer,
                    device_index,
                    clock,
                    thread_stats,
                    thread_running.clone(),
                    thread_failed.clone(),
                );
                match setup {
                    Ok((stream, device_config)) => {
                        let _ = ready_tx.send(Ok(device_config));
                        while thread_running.load(Ordering::Relaxed)
                            && !thread_failed.load(Ordering::Relaxed)
                        {
                            thread::sleep(Duration::from_millis(100));
                        }
                        // Dropping the stream drops its callback, which
                        // drops the ChunkWriter and closes the ring so no
                        // reader stays blocked.
                        drop(stream);
                        tracing::info!("capture thread shutting down");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {e}")))?;

        let device_config = ready_rx
            .recv_timeout(Duration::from_secs(3))
            .map_err(|_| {
                AudioError::Fatal("no device configuration within startup timeout".to_string())
            })??;

        Ok((
            Self {
                handle,
                running,
                stats,
            },
            device_config,
        ))
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// Stop the stream and release the device. The ring is closed as the
    /// stream callback is dropped.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn open_stream(
    config: CaptureConfig,
    writer: ChunkWriter,
    device_index: Option<usize>,
    clock: Arc<dyn Clock>,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
) -> Result<(Stream, DeviceConfig), AudioError> {
    let catalog = DeviceCatalog::new();
    let device = catalog.open_input(device_index)?;
    if let Ok(name) = device.name() {
        tracing::info!(device = %name, host = ?catalog.host_id(), "selected input device");
    }

    let (stream_config, sample_format) = negotiate_config(&device)?;
    let device_config = DeviceConfig {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    };

    let gate = NoiseGate::new(config.gate, device_config.sample_rate);
    let sink = GatedChunkSink::new(
        gate,
        writer,
        stats,
        clock,
        config.hangover,
        device_config.channels,
    );

    let stream = build_stream(&device, &stream_config, sample_format, sink, running, failed)?;
    stream.play()?;
    Ok((stream, device_config))
}

/// One supported input mode, decoupled from cpal for selection logic.
struct InputMode {
    channels: u16,
    min_rate: u32,
    max_rate: u32,
    format: SampleFormat,
}

/// The wire format is 24 kHz mono i16; a device with no mode covering that
/// rate cannot feed this pipeline, so negotiation fails instead of
/// silently capturing at another rate.
fn negotiate_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let modes: Vec<InputMode> = device
        .supported_input_configs()?
        .map(|r| InputMode {
            channels: r.channels(),
            min_rate: r.min_sample_rate().0,
            max_rate: r.max_sample_rate().0,
            format: r.sample_format(),
        })
        .collect();

    match pick_input_mode(&modes) {
        Some((format, channels)) => Ok((
            StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(SAMPLE_RATE_HZ),
                buffer_size: cpal::BufferSize::Default,
            },
            format,
        )),
        None => Err(AudioError::FormatNotSupported {
            format: format!("no input mode covering {} Hz", SAMPLE_RATE_HZ),
        }),
    }
}

/// Pick the best mode covering the wire rate: i16 beats f32 beats the
/// rest, then fewest channels.
fn pick_input_mode(modes: &[InputMode]) -> Option<(SampleFormat, u16)> {
    modes
        .iter()
        .filter(|m| m.min_rate <= SAMPLE_RATE_HZ && SAMPLE_RATE_HZ <= m.max_rate)
        .min_by_key(|m| {
            let format_rank = match m.format {
                SampleFormat::I16 => 0,
                SampleFormat::F32 => 1,
                _ => 2,
            };
            (format_rank, m.channels)
        })
        .map(|m| (m.format, m.channels))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    sink: GatedChunkSink,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let err_fn = {
        let failed = failed.clone();
        move |err: cpal::StreamError| {
            tracing::error!("capture stream error: {err}");
            failed.store(true, Ordering::SeqCst);
        }
    };

    let mut sink = sink;
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &_| {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                sink.push(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[f32], _: &_| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    converted.clear();
                    converted.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
                    );
                    sink.push(&converted);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[u16], _: &_| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    converted.clear();
                    converted.extend(data.iter().map(|&s| (i32::from(s) - 32768) as i16));
                    sink.push(&converted);
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

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::ByteRing;
    use voxloop_foundation::TestClock;

    const CHUNK: usize = 240;

    fn sink_with_clock(
        hangover_ms: u64,
    ) -> (GatedChunkSink, crate::ring_buffer::BlockingReader, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        let (writer, reader) = ByteRing::with_capacity(1 << 16);
        let stats = Arc::new(CaptureStats::default());
        let gate = NoiseGate::new(GateConfig::default(), SAMPLE_RATE_HZ);
        let sink = GatedChunkSink::new(
            gate,
            writer,
            stats,
            clock.clone() as Arc<dyn Clock>,
            Duration::from_millis(hangover_ms),
            1,
        );
        (sink, reader, clock)
    }

    fn loud() -> Vec<i16> {
        vec![10_000i16; CHUNK]
    }

    fn quiet() -> Vec<i16> {
        vec![50i16; CHUNK]
    }

    #[test]
    fn speech_chunks_are_written() {
        let (mut sink, reader, _clock) = sink_with_clock(5000);
        sink.push(&loud());
        assert_eq!(reader.available(), CHUNK * 2);
        assert_eq!(sink.stats.chunks_captured.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn silence_within_hangover_is_kept() {
        let (mut sink, reader, clock) = sink_with_clock(5000);
        sink.push(&loud());
        clock.advance(Duration::from_millis(4000));
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 4);
        assert_eq!(sink.stats.chunks_gated.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn silence_past_hangover_is_dropped() {
        let (mut sink, reader, clock) = sink_with_clock(5000);
        sink.push(&loud());
        clock.advance(Duration::from_millis(5001));
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 2);
        assert_eq!(sink.stats.chunks_gated.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn hangover_boundary_keeps_the_chunk() {
        // Elapsed time equal to the hangover ties toward keeping audio;
        // only strictly-greater elapses drop.
        let (mut sink, reader, clock) = sink_with_clock(5000);
        sink.push(&loud());
        clock.advance(Duration::from_millis(5000));
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 4);
    }

    #[test]
    fn speech_reopens_the_stream_immediately() {
        let (mut sink, reader, clock) = sink_with_clock(5000);
        sink.push(&loud());

        clock.advance(Duration::from_secs(60));
        sink.push(&quiet());
        sink.push(&quiet());
        assert_eq!(sink.stats.chunks_gated.load(Ordering::Relaxed), 2);
        assert_eq!(reader.available(), CHUNK * 2);

        // A super-threshold chunk restarts the hangover window.
        sink.push(&loud());
        assert_eq!(reader.available(), CHUNK * 4);
        clock.advance(Duration::from_millis(1000));
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 6);
    }

    #[test]
    fn initial_silence_is_kept_until_hangover_elapses() {
        // The hangover timer starts at construction, mirroring a stream
        // that opens mid-conversation.
        let (mut sink, reader, clock) = sink_with_clock(5000);
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 2);

        clock.advance(Duration::from_millis(5001));
        sink.push(&quiet());
        assert_eq!(reader.available(), CHUNK * 2);
    }

    #[test]
    fn stereo_input_is_downmixed() {
        let clock = Arc::new(TestClock::new());
        let (writer, reader) = ByteRing::with_capacity(1 << 16);
        let gate = NoiseGate::new(GateConfig::default(), SAMPLE_RATE_HZ);
        let mut sink = GatedChunkSink::new(
            gate,
            writer,
            Arc::new(CaptureStats::default()),
            clock,
            Duration::from_millis(5000),
            2,
        );

        let interleaved = vec![8_000i16; CHUNK * 2];
        sink.push(&interleaved);
        // Two channels collapse into one mono sample per frame.
        assert_eq!(reader.available(), CHUNK * 2);
    }

    fn mode(channels: u16, min_rate: u32, max_rate: u32, format: SampleFormat) -> InputMode {
        InputMode {
            channels,
            min_rate,
            max_rate,
            format,
        }
    }

    #[test]
    fn mode_selection_prefers_i16_then_fewest_channels() {
        let modes = [
            mode(2, 8_000, 48_000, SampleFormat::F32),
            mode(2, 8_000, 48_000, SampleFormat::I16),
            mode(1, 8_000, 48_000, SampleFormat::I16),
        ];
        assert_eq!(pick_input_mode(&modes), Some((SampleFormat::I16, 1)));
    }

    #[test]
    fn mode_selection_rejects_devices_without_the_wire_rate() {
        // 44.1/48 kHz only; nothing covers 24 kHz, so capture must not
        // silently run at another rate.
        let modes = [
            mode(2, 44_100, 44_100, SampleFormat::I16),
            mode(2, 48_000, 48_000, SampleFormat::F32),
        ];
        assert_eq!(pick_input_mode(&modes), None);
    }

    #[test]
    fn mode_selection_accepts_a_range_spanning_the_wire_rate() {
        let modes = [mode(1, 16_000, 48_000, SampleFormat::F32)];
        assert_eq!(pick_input_mode(&modes), Some((SampleFormat::F32, 1)));
    }

    #[test]
    fn ring_overflow_counts_as_dropped() {
        let clock = Arc::new(TestClock::new());
        // Too small for a whole chunk.
        let (writer, _reader) = ByteRing::with_capacity(64);
        let gate = NoiseGate::new(GateConfig::default(), SAMPLE_RATE_HZ);
        let mut sink = GatedChunkSink::new(
            gate,
            writer,
            Arc::new(CaptureStats::default()),
            clock,
            Duration::from_millis(5000),
            1,
        );
        sink.push(&loud());
        assert_eq!(sink.stats.chunks_dropped.load(Ordering::Relaxed), 1);
    }
}
