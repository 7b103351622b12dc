//! Attack/release noise gate over the rectified input signal.
//!
//! The gate serves two purposes on the capture path: its boolean verdict
//! feeds the silence-drop policy in `capture`, and its smoothed envelope is
//! applied in place as a gain-reduction factor so that below-threshold audio
//! fades out instead of being hard-muted.

/// Small constant added before the smoothing recurrence so the envelope
/// never reaches denormal range, subtracted again before applying gain.
const DC_OFFSET: f64 = 1.0e-25;

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// Open threshold in linear 16-bit amplitude units.
    pub threshold: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: 200.0,
            attack_ms: 100.0,
            release_ms: 100.0,
        }
    }
}

/// One-pole attack/release envelope follower gating a mono i16 stream.
///
/// Attack/release times and the sample rate are fixed at construction; the
/// threshold may be retuned at runtime. The envelope carries over between
/// calls and is never reset.
#[derive(Debug, Clone)]
pub struct NoiseGate {
    threshold: f64,
    threshold_db: f64,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
    sample_rate: u32,
}

fn time_coefficient(ms: f64, sample_rate: u32) -> f64 {
    (-1.0 / (0.001 * ms * f64::from(sample_rate))).exp()
}

fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

impl NoiseGate {
    pub fn new(config: GateConfig, sample_rate: u32) -> Self {
        let gate = Self {
            threshold: config.threshold,
            threshold_db: linear_to_db(config.threshold),
            attack_coef: time_coefficient(config.attack_ms, sample_rate),
            release_coef: time_coefficient(config.release_ms, sample_rate),
            envelope: DC_OFFSET,
            sample_rate,
        };
        tracing::debug!(
            threshold = gate.threshold,
            threshold_db = gate.threshold_db,
            sample_rate,
            "noise gate configured"
        );
        gate
    }

    /// Run one block through the gate, attenuating it in place.
    ///
    /// Returns true iff any sample in the block exceeded the linear
    /// threshold. The attenuation is applied regardless of the verdict:
    /// loud transients are smoothed by the attack ramp, not hard-gated.
    pub fn process(&mut self, samples: &mut [i16]) -> bool {
        let mut above_threshold = false;

        for sample in samples.iter_mut() {
            let key = f64::from(*sample).abs();

            let over = if key > self.threshold {
                above_threshold = true;
                1.0
            } else {
                0.0
            };

            let smoothed = self.run(over + DC_OFFSET);
            let gain = smoothed - DC_OFFSET;

            *sample = (f64::from(*sample) * gain) as i16;
        }

        above_threshold
    }

    /// One-pole smoothing: attack coefficient while the envelope rises,
    /// release while it falls.
    fn run(&mut self, input: f64) -> f64 {
        let coef = if input > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * (self.envelope - input) + input;
        self.envelope
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Retune the open threshold (linear units). Recomputes the cached dB
    /// value for diagnostics; the envelope state is left untouched.
    pub fn set_threshold(&mut self, linear: f64) {
        self.threshold = linear;
        self.threshold_db = linear_to_db(linear);
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
