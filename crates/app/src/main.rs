use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxloop_app::runtime::{self, RuntimeError};
use voxloop_app::Settings;
use voxloop_audio::DeviceCatalog;

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxloop.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

#[derive(Parser)]
#[command(name = "voxloop")]
#[command(about = "Realtime voice assistant with local tools")]
struct Cli {
    /// Configuration file (TOML); defaults to config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a JSON event script instead of connecting to a service
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Open the real capture and playback devices during a scripted run
    #[arg(long)]
    live_audio: bool,

    /// Input device index (overrides configuration)
    #[arg(long)]
    input_device: Option<usize>,

    /// Output device index (overrides configuration)
    #[arg(long)]
    output_device: Option<usize>,

    /// Append the transcript to this file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn list_devices() -> anyhow::Result<()> {
    let catalog = DeviceCatalog::new();
    println!("Input devices:");
    for device in catalog.input_devices()? {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  [{}] {}{}", device.index, device.name, marker);
    }
    println!("Output devices:");
    for device in catalog.output_devices()? {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  [{}] {}{}", device.index, device.name, marker);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    if cli.list_devices {
        if let Err(e) = list_devices() {
            eprintln!("Failed to enumerate devices: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let settings = match &cli.config {
        Some(path) => Settings::from_path(path),
        None => Settings::new(),
    };
    let mut settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    if cli.input_device.is_some() {
        settings.audio.input_device = cli.input_device;
    }
    if cli.output_device.is_some() {
        settings.audio.output_device = cli.output_device;
    }
    if cli.transcript.is_some() {
        settings.session.transcript_file = cli.transcript.clone();
    }

    let result = match &cli.script {
        Some(script) => runtime::run_scripted(settings, script, cli.live_audio).await,
        None => {
            // A live session needs credentials up front; fail fast before
            // touching any audio device.
            match settings.require_api_key() {
                Ok(_) => Err(RuntimeError::Config(
                    "No realtime transport is configured in this build; run with --script"
                        .to_string(),
                )),
                Err(e) => Err(RuntimeError::Config(e)),
            }
        }
    };

    match &result {
        Ok(outcome) => tracing::info!(?outcome, "Session ended"),
        Err(e) => tracing::error!(%e, "Session failed"),
    }
    std::process::exit(runtime::exit_code(&result));
}
