//! FFT-related constants and phase utilities shared across the crate.

use rustfft::num_complex::Complex;
use std::f32::consts::PI;

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

const TWO_PI: f32 = 2.0 * PI;

/// Principal argument: maps any angle into (-PI, PI].
#[inline]
pub fn princarg(phase: f32) -> f32 {
    let p = phase - TWO_PI * ((phase + PI) / TWO_PI).floor();
    // floor() puts -PI into range and PI out of it; flip that edge.
    if p <= -PI {
        p + TWO_PI
    } else {
        p
    }
}
