use std::fmt;

use crate::error::StretchError;

/// Smallest accepted stretch ratio.
pub const MIN_RATIO: f64 = 0.01;
/// Largest accepted stretch ratio.
pub const MAX_RATIO: f64 = 100.0;
/// Default output block size hint, in samples per channel.
pub const DEFAULT_MAX_OUTPUT_BLOCK: usize = 1024;

/// Sharpening is ignored below this ratio; heavy compression has no room to
/// hold a transient at the analysis hop.
const SHARPEN_MIN_RATIO: f64 = 0.25;

/// Tuning of the transient detector.
///
/// The defaults are empirical. A bin counts as rising when its summed power
/// grows by more than `rise_db` over the previous frame; a frame is a
/// transient when more than `window_size / threshold_divisor` bins rise and
/// the count exceeds the previous frame's by more than
/// `window_size / margin_divisor`.
///
/// Bins whose power is below `floor_db` relative to `window_size²` are
/// ignored, so leakage and rounding noise around steady tones cannot add up
/// to a transient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientTuning {
    pub rise_db: f32,
    pub threshold_divisor: f32,
    pub margin_divisor: f32,
    pub floor_db: f32,
}

impl Default for TransientTuning {
    fn default() -> Self {
        Self {
            rise_db: 3.0,
            threshold_divisor: 4.5,
            margin_divisor: 20.0,
            floor_db: -90.0,
        }
    }
}

/// Parameters controlling a time stretcher.
#[derive(Debug, Clone, PartialEq)]
pub struct StretchParams {
    /// Output duration / input duration: >1.0 = slower (longer).
    pub stretch_ratio: f64,
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,
    /// Number of audio channels (default: 1).
    pub channels: u16,
    /// Detect transients and hold them unstretched (default: true).
    pub sharpen: bool,
    /// Largest block the caller will pull per `get_output` (default: 1024).
    pub max_output_block: usize,
    /// Transient detector thresholds.
    pub transient_tuning: TransientTuning,
}

impl StretchParams {
    /// Create new stretch parameters with the given ratio.
    pub fn new(stretch_ratio: f64) -> Self {
        Self {
            stretch_ratio,
            sample_rate: 44100,
            channels: 1,
            sharpen: true,
            max_output_block: DEFAULT_MAX_OUTPUT_BLOCK,
            transient_tuning: TransientTuning::default(),
        }
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the number of channels.
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Enable or disable transient sharpening.
    pub fn with_sharpening(mut self, sharpen: bool) -> Self {
        self.sharpen = sharpen;
        self
    }

    /// Set the maximum output block size hint.
    pub fn with_max_output_block(mut self, samples: usize) -> Self {
        self.max_output_block = samples;
        self
    }

    /// Override the transient detector thresholds.
    pub fn with_transient_tuning(mut self, tuning: TransientTuning) -> Self {
        self.transient_tuning = tuning;
        self
    }

    /// Checks that the parameters describe a usable stretcher.
    pub fn validate(&self) -> Result<(), StretchError> {
        validate_ratio(self.stretch_ratio)?;
        if self.channels == 0 {
            return Err(StretchError::InvalidFormat(
                "channel count must be at least 1".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(StretchError::InvalidFormat(
                "sample rate must be positive".to_string(),
            ));
        }
        if self.max_output_block == 0 {
            return Err(StretchError::InvalidFormat(
                "output block size must be positive".to_string(),
            ));
        }
        let t = &self.transient_tuning;
        if !(t.rise_db.is_finite()
            && t.floor_db.is_finite()
            && t.threshold_divisor > 0.0
            && t.margin_divisor > 0.0)
        {
            return Err(StretchError::InvalidFormat(format!(
                "invalid transient tuning: {:?}",
                t
            )));
        }
        Ok(())
    }
}

impl fmt::Display for StretchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ratio={:.4} rate={}Hz channels={} sharpen={} block={}",
            self.stretch_ratio, self.sample_rate, self.channels, self.sharpen, self.max_output_block
        )
    }
}

/// Checks a stretch ratio is finite and within `[MIN_RATIO, MAX_RATIO]`.
pub fn validate_ratio(ratio: f64) -> Result<(), StretchError> {
    if !ratio.is_finite() || !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(StretchError::InvalidRatio(format!(
            "{} is outside {}..={}",
            ratio, MIN_RATIO, MAX_RATIO
        )));
    }
    Ok(())
}

/// Window length and hop sizes derived from a ratio and sharpening flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopParameters {
    /// FFT size.
    pub window_size: usize,
    /// Analysis hop `n1`.
    pub input_increment: usize,
    /// Nominal synthesis hop `n2`.
    pub output_increment: usize,
    /// Rising-bin count a transient must exceed.
    pub transient_threshold: usize,
    /// Minimum growth of the rising-bin count over the previous frame.
    pub transient_margin: usize,
    /// Whether transient detection is actually in effect.
    pub sharpening: bool,
}

impl HopParameters {
    pub fn calculate(ratio: f64, sharpen: bool, tuning: &TransientTuning) -> Self {
        let sharpening = sharpen && ratio > SHARPEN_MIN_RATIO;
        let mut window_size = 1024;
        let (input_increment, output_increment);

        if ratio < 1.0 {
            let n1 = if ratio < 0.4 {
                window_size = 2048;
                1024
            } else if ratio < 0.8 {
                512
            } else {
                256
            };
            if sharpening {
                window_size = 2048;
            }
            input_increment = n1;
            output_increment = ((n1 as f64 * ratio).round() as usize).max(1);
        } else {
            let n2 = if ratio > 2.0 {
                window_size = 4096;
                512
            } else if ratio > 1.6 {
                window_size = 2048;
                384
            } else {
                256
            };
            if sharpening {
                window_size = window_size.max(2048);
            }
            let n1 = (n2 as f64 / ratio).round() as usize;
            if n1 == 0 {
                input_increment = 1;
                output_increment = ratio.round() as usize;
            } else {
                input_increment = n1;
                output_increment = n2;
            }
        }

        Self {
            window_size,
            input_increment,
            output_increment,
            transient_threshold: (window_size as f32 / tuning.threshold_divisor).round() as usize,
            transient_margin: (window_size as f32 / tuning.margin_divisor).round() as usize,
            sharpening,
        }
    }

    /// Nominal ratio actually achieved by integer hops, `n2 / n1`.
    #[inline]
    pub fn nominal_ratio(&self) -> f64 {
        self.output_increment as f64 / self.input_increment as f64
    }

    /// Upper bound on a single frame's synthesis hop.
    #[inline]
    pub fn max_hop(&self) -> usize {
        (self.input_increment.max(self.output_increment) * 2).min(self.window_size)
    }
}
