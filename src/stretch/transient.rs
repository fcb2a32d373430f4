//! Frame-to-frame transient detection on the channel-summed spectrum.

use rustfft::num_complex::Complex;

use crate::stretch::params::{HopParameters, TransientTuning};

/// Counts spectral bins whose power jumps between consecutive frames.
///
/// The detector remembers the previous frame's summed power spectrum and its
/// rising-bin count; both are updated on every call, transient or not.
#[derive(Debug, Clone)]
pub struct TransientDetector {
    prev_power: Vec<f32>,
    prev_score: usize,
    /// Linear power ratio equivalent to the tuning's dB rise.
    rise_ratio: f32,
    /// Bins at or below this power never count as rising.
    floor: f32,
    threshold: usize,
    margin: usize,
}

impl TransientDetector {
    pub fn new(hops: &HopParameters, tuning: &TransientTuning) -> Self {
        let wlen = hops.window_size as f32;
        Self {
            prev_power: vec![0.0; hops.window_size / 2 + 1],
            prev_score: 0,
            rise_ratio: 10f32.powf(tuning.rise_db / 10.0),
            floor: wlen * wlen * 10f32.powf(tuning.floor_db / 10.0),
            threshold: hops.transient_threshold,
            margin: hops.transient_margin,
        }
    }

    /// Rising-bin count of the last examined frame.
    #[inline]
    pub fn last_score(&self) -> usize {
        self.prev_score
    }

    /// Examines one frame given every channel's spectrum (bins `0..=wlen/2`
    /// are read) and returns whether it starts a transient.
    pub fn is_transient<S: AsRef<[Complex<f32>]>>(&mut self, spectra: &[S]) -> bool {
        let mut count = 0usize;
        for (bin, prev) in self.prev_power.iter_mut().enumerate() {
            let sum: Complex<f32> = spectra.iter().map(|s| s.as_ref()[bin]).sum();
            let power = sum.norm_sqr();
            // Bins that were silent have no level to rise from.
            if power > self.floor && *prev > 0.0 && power > *prev * self.rise_ratio {
                count += 1;
            }
            *prev = power;
        }

        let transient = count > self.threshold && count > self.prev_score + self.margin;
        self.prev_score = count;
        transient
    }
}
