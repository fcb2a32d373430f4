//! Window functions for spectral analysis and resynthesis.
//!
//! [`SampleWindow`] precomputes the coefficients once so the phase vocoder can
//! `cut` every frame with a single multiply pass.

use std::f64::consts::PI;

/// A precomputed periodic Hann window of fixed length.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    cache: Vec<f32>,
    area: f32,
}

impl SampleWindow {
    /// Builds a Hann window of the given length.
    pub fn new(len: usize) -> Self {
        let cache = hann_window(len);
        let area = energy_weighted_mean(&cache);
        Self { cache, area }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Multiplies `buf` by the window in place.
    ///
    /// `buf` must be exactly `len()` samples long.
    #[inline]
    pub fn cut(&self, buf: &mut [f32]) {
        debug_assert_eq!(buf.len(), self.cache.len());
        for (sample, &w) in buf.iter_mut().zip(self.cache.iter()) {
            *sample *= w;
        }
    }

    /// Energy-weighted mean coefficient, `Σw² / Σw`.
    ///
    /// Scaling an overlap-added sum of synthesis windows by this value gives
    /// the overlap gain of analysis × synthesis windows.
    #[inline]
    pub fn area(&self) -> f32 {
        self.area
    }

    /// Coefficient at `i`.
    #[inline]
    pub fn value(&self, i: usize) -> f32 {
        self.cache[i]
    }
}

/// Returns `Some(trivial_window)` for degenerate sizes (0 or 1), or `None`
/// to indicate the caller should compute the full window.
#[inline]
fn trivial_window(size: usize) -> Option<Vec<f32>> {
    match size {
        0 => Some(vec![]),
        1 => Some(vec![1.0]),
        _ => None,
    }
}

/// Periodic Hann: hops that divide the size overlap-add to a constant.
#[inline]
fn hann_window(size: usize) -> Vec<f32> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = (2.0 * PI * i as f64) / n;
            (0.5 * (1.0 - x.cos())) as f32
        })
        .collect()
}

fn energy_weighted_mean(cache: &[f32]) -> f32 {
    let sum: f64 = cache.iter().map(|&w| w as f64).sum();
    if sum <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = cache.iter().map(|&w| (w as f64) * (w as f64)).sum();
    (sum_sq / sum) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_properties() {
        let w = hann_window(1024);
        assert_eq!(w.len(), 1024);
        assert!(w[0].abs() < 1e-6);
        assert!((w[512] - 1.0).abs() < 1e-6);
        // Periodic: symmetric around the centre sample
        for i in 1..512 {
            assert!((w[i] - w[1024 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hann_overlap_add_is_constant() {
        let size = 1024;
        let hop = 256;
        let w = hann_window(size);
        let mut sum = vec![0.0f32; size * 3];
        let mut pos = 0;
        while pos + size <= sum.len() {
            for i in 0..size {
                sum[pos + i] += w[i];
            }
            pos += hop;
        }
        // Fully overlapped region
        for &s in &sum[size..2 * size] {
            assert!((s - 2.0).abs() < 1e-4, "overlap sum {}", s);
        }
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);
        assert_eq!(SampleWindow::new(0).area(), 0.0);
    }

    #[test]
    fn test_cut() {
        let window = SampleWindow::new(4);
        let mut data = vec![2.0, 2.0, 2.0, 2.0];
        window.cut(&mut data);
        assert!(data[0].abs() < 1e-6);
        assert!((data[1] - 1.0).abs() < 1e-6);
        assert!((data[2] - 2.0).abs() < 1e-6);
        assert!((data[3] - 1.0).abs() < 1e-6);
        for (i, &d) in data.iter().enumerate() {
            assert!((d - 2.0 * window.value(i)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hann_area() {
        // Σw² / Σw = (3/8) / (1/2) for a periodic Hann window
        let window = SampleWindow::new(2048);
        assert!((window.area() - 0.75).abs() < 1e-4);
        assert_eq!(window.len(), 2048);
    }
}
