//! The phase-vocoder time stretcher and its parameters.

pub mod params;
pub mod phase_lock;
pub mod stretcher;
pub mod transient;

pub use params::{HopParameters, StretchParams, TransientTuning, MAX_RATIO, MIN_RATIO};
pub use stretcher::{AudioTimeStretcher, StretchStats};
pub use transient::TransientDetector;
