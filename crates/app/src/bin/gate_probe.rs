//! Live microphone probe for tuning the noise gate.
//!
//! Captures from the selected device for a fixed duration and prints a
//! line per second with the gate counters and the peak level of the
//! audio that made it through, so a threshold can be picked by watching
//! the numbers while speaking and staying silent.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use clap::Parser;

use voxloop_app::Settings;
use voxloop_audio::{ByteRing, CaptureThread};

#[derive(Parser)]
#[command(name = "gate_probe")]
#[command(about = "Capture from the microphone and report noise gate activity")]
struct Cli {
    /// Input device index; default device if omitted
    #[arg(short = 'D', long)]
    device: Option<usize>,

    /// Probe duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Gate threshold in linear sample units
    #[arg(short, long)]
    threshold: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::default();
    if let Some(threshold) = cli.threshold {
        settings.audio.gate_threshold = threshold;
    }

    let (writer, reader) = ByteRing::with_capacity(
        voxloop_audio::constants::duration_to_bytes(Duration::from_secs(2)),
    );
    let (capture, device_config) =
        CaptureThread::spawn(settings.capture_config(), writer, cli.device)?;
    println!(
        "Capturing at {} Hz, {} channel(s), threshold {}",
        device_config.sample_rate, device_config.channels, settings.audio.gate_threshold
    );

    // Drain the ring and track the loudest sample seen each second.
    let peak = std::sync::Arc::new(std::sync::atomic::AtomicI32::new(0));
    let drain_peak = peak.clone();
    let drain = std::thread::spawn(move || {
        let mut buf = [0u8; 480];
        while reader.read_exact(&mut buf).is_ok() {
            for pair in buf.chunks_exact(2) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]).unsigned_abs() as i32;
                drain_peak.fetch_max(sample, Ordering::Relaxed);
            }
        }
    });

    let stats = capture.stats();
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(cli.duration) {
        std::thread::sleep(Duration::from_secs(1));
        println!(
            "peak={:5}  captured={}  gated={}  dropped={}",
            peak.swap(0, Ordering::Relaxed),
            stats.chunks_captured.load(Ordering::Relaxed),
            stats.chunks_gated.load(Ordering::Relaxed),
            stats.chunks_dropped.load(Ordering::Relaxed),
        );
    }

    capture.stop();
    drain.join().map_err(|_| "drain thread panicked")?;
    Ok(())
}
