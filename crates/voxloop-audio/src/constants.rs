use std::time::Duration;

/// Wire PCM format: 16-bit signed little-endian mono at 24 kHz.
pub const SAMPLE_RATE_HZ: u32 = 24_000;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const CHANNELS: u16 = 1;

/// Bytes of wire-format PCM covering `duration`.
pub fn duration_to_bytes(duration: Duration) -> usize {
    let samples = (duration.as_secs_f64() * f64::from(SAMPLE_RATE_HZ)).round() as usize;
    samples * BYTES_PER_SAMPLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_is_48000_bytes() {
        assert_eq!(duration_to_bytes(Duration::from_secs(1)), 48_000);
    }

    #[test]
    fn sub_second_durations_round() {
        assert_eq!(duration_to_bytes(Duration::from_millis(100)), 4_800);
    }
}
