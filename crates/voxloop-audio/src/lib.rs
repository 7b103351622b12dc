pub mod capture;
pub mod constants;
pub mod device;
pub mod gate;
pub mod playback;
pub mod ring_buffer;

pub use capture::{CaptureConfig, CaptureStats, CaptureThread, DeviceConfig};
pub use constants::{BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE_HZ};
pub use device::{DeviceCatalog, DeviceInfo};
pub use gate::{GateConfig, NoiseGate};
pub use playback::{PlaybackQueue, PlaybackThread};
pub use ring_buffer::{BlockingReader, ByteRing, ChunkWriter, RingCloser};
