use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use voxloop_audio::{CaptureConfig, GateConfig};
use voxloop_session::SessionOptions;
use voxloop_tools::ToolDescriptor;

pub mod runtime;
pub mod scripted;
pub mod tools;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Input device index as listed by `--list-devices`; None = default.
    pub input_device: Option<usize>,
    /// Output device index; None = default.
    pub output_device: Option<usize>,
    /// Noise gate threshold in linear sample units (0..=32767).
    pub gate_threshold: f64,
    pub gate_attack_ms: f64,
    pub gate_release_ms: f64,
    /// How long after the gate closes mic audio keeps flowing upstream.
    pub silence_hangover_ms: u64,
    /// Capture ring capacity in seconds of audio.
    pub ring_capacity_secs: u64,
    /// Playback queue capacity in seconds of audio.
    pub playback_capacity_secs: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            gate_threshold: 200.0,
            gate_attack_ms: 100.0,
            gate_release_ms: 100.0,
            silence_hangover_ms: 5000,
            ring_capacity_secs: 10,
            playback_capacity_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub voice: String,
    pub transcription_model: String,
    pub turn_detection_threshold: f32,
    /// API key for the realtime service; falls back to OPENAI_API_KEY.
    pub api_key: Option<String>,
    /// Optional file the transcript is appended to.
    pub transcript_file: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            voice: "shimmer".to_string(),
            transcription_model: "whisper-1".to_string(),
            turn_detection_threshold: 0.8,
            api_key: None,
            transcript_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub session: SessionSettings,
}

impl Settings {
    /// Load settings from a specific config file path (for tests)
    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, String> {
        let mut builder = Config::builder();
        builder = builder.add_source(File::from(config_path.as_ref()).required(true));
        builder = builder.add_source(Environment::with_prefix("VOXLOOP").separator("__"));

        let config = builder
            .build()
            .map_err(|e| format!("Failed to build config: {}", e))?;
        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| format!("Failed to deserialize settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn new() -> Result<Self, String> {
        let mut builder = Config::builder();

        let config_path = Path::new("config/default.toml");
        if config_path.exists() {
            tracing::info!("Loading configuration from: {}", config_path.display());
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            tracing::warn!(
                "No configuration file at 'config/default.toml'. Using defaults and environment variables."
            );
        }

        builder = builder.add_source(Environment::with_prefix("VOXLOOP").separator("__"));

        let config = builder
            .build()
            .map_err(|e| format!("Failed to build config: {}", e))?;
        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| format!("Failed to deserialize settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&mut self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.audio.gate_threshold < 0.0 || self.audio.gate_threshold > 32767.0 {
            tracing::warn!(
                "Invalid gate_threshold {}. Defaulting to 200.",
                self.audio.gate_threshold
            );
            self.audio.gate_threshold = 200.0;
        }
        if self.audio.gate_attack_ms <= 0.0 {
            tracing::warn!(
                "Invalid gate_attack_ms {}. Defaulting to 100.",
                self.audio.gate_attack_ms
            );
            self.audio.gate_attack_ms = 100.0;
        }
        if self.audio.gate_release_ms <= 0.0 {
            tracing::warn!(
                "Invalid gate_release_ms {}. Defaulting to 100.",
                self.audio.gate_release_ms
            );
            self.audio.gate_release_ms = 100.0;
        }
        if self.audio.ring_capacity_secs == 0 {
            errors.push("Audio ring_capacity_secs must be >0".to_string());
        }
        if self.audio.playback_capacity_secs == 0 {
            errors.push("Audio playback_capacity_secs must be >0".to_string());
        }
        if !(0.0..=1.0).contains(&self.session.turn_detection_threshold) {
            tracing::warn!(
                "Invalid turn_detection_threshold {}. Defaulting to 0.8.",
                self.session.turn_detection_threshold
            );
            self.session.turn_detection_threshold = 0.8;
        }
        if self.session.voice.is_empty() {
            errors.push("Session voice must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    /// API key from settings or the OPENAI_API_KEY environment variable.
    pub fn require_api_key(&self) -> Result<String, String> {
        if let Some(key) = &self.session.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| "No API key: set session.api_key or OPENAI_API_KEY".to_string())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            gate: GateConfig {
                threshold: self.audio.gate_threshold,
                attack_ms: self.audio.gate_attack_ms,
                release_ms: self.audio.gate_release_ms,
            },
            hangover: Duration::from_millis(self.audio.silence_hangover_ms),
        }
    }

    pub fn ring_capacity(&self) -> Duration {
        Duration::from_secs(self.audio.ring_capacity_secs)
    }

    pub fn playback_capacity(&self) -> Duration {
        Duration::from_secs(self.audio.playback_capacity_secs)
    }

    pub fn session_options(&self, tools: Vec<ToolDescriptor>) -> SessionOptions {
        SessionOptions {
            voice: self.session.voice.clone(),
            transcription_model: self.session.transcription_model.clone(),
            turn_detection_threshold: self.session.turn_detection_threshold,
            tools,
        }
    }
}
