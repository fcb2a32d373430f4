#![forbid(unsafe_code)]
//! Streaming phase-vocoder time stretching.
//!
//! `phasestretch` changes the duration of multi-channel audio without
//! changing its pitch. A block-based phase vocoder resynthesises each
//! analysis frame at a new hop; frames whose spectrum rises sharply across
//! many bins are treated as transients and kept at the analysis hop, with the
//! lost time made up by the frames around them.
//!
//! # Quick Start
//!
//! ```
//! use phasestretch::{AudioBuffer, StretchParams};
//!
//! // 1 second of 440 Hz sine at 44.1 kHz
//! let input: Vec<f32> = (0..44100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//! let buffer = AudioBuffer::from_mono(input, 44100).unwrap();
//!
//! let output = phasestretch::stretch(&buffer, &StretchParams::new(1.5)).unwrap();
//! assert_eq!(output.num_frames(), 66150);
//! ```
//!
//! # Streaming
//!
//! The [`AudioTimeStretcher`] takes planar blocks of any size and hands back
//! whatever output is ready:
//!
//! ```
//! use phasestretch::{AudioTimeStretcher, StretchParams};
//!
//! let params = StretchParams::new(0.8).with_channels(2);
//! let mut stretcher = AudioTimeStretcher::new(&params).unwrap();
//!
//! let left = vec![0.0f32; 4096];
//! let right = vec![0.0f32; 4096];
//! stretcher.put_input(&[&left, &right], 4096);
//!
//! let ready = stretcher.available_output();
//! let mut out = vec![vec![0.0f32; ready]; 2];
//! stretcher.get_output(&mut out, ready);
//! ```
//!
//! [`StreamProcessor`] adds latency compensation on top, and
//! [`FileTimeStretcher`] drives a whole file through it.

pub mod core;
pub mod error;
pub mod io;
pub mod stream;
pub mod stretch;

pub use core::types::{AudioBuffer, Sample};
pub use error::StretchError;
pub use stream::{FileTimeStretcher, StreamProcessor};
pub use stretch::{AudioTimeStretcher, StretchParams, StretchStats, TransientTuning};

/// Stretches a whole buffer.
///
/// The sample rate and channel count are taken from `buffer`, overriding
/// whatever is set in `params`. The output is time-aligned with the input
/// and exactly `ceil(frames * ratio)` frames long.
///
/// # Errors
///
/// Returns [`StretchError::InvalidRatio`] if the stretch ratio is out of range.
pub fn stretch(buffer: &AudioBuffer, params: &StretchParams) -> Result<AudioBuffer, StretchError> {
    let mut effective = params.clone();
    effective.sample_rate = buffer.sample_rate;
    effective.channels = buffer.channels;

    let mut processor = StreamProcessor::new(effective)?;
    let mut output = processor.process(&buffer.data)?;
    output.extend(processor.flush());
    AudioBuffer::new(output, buffer.channels, buffer.sample_rate)
}

/// Reads a WAV file, stretches it, and writes the result as 32-bit float WAV.
///
/// # Errors
///
/// Returns [`StretchError::IoError`] if the files cannot be read or written,
/// [`StretchError::InvalidFormat`] if the input is not a valid WAV file,
/// or [`StretchError::InvalidRatio`] if the stretch ratio is out of range.
pub fn stretch_wav_file(
    input_path: impl AsRef<std::path::Path>,
    output_path: impl AsRef<std::path::Path>,
    params: &StretchParams,
) -> Result<AudioBuffer, StretchError> {
    let buffer = io::wav::read_wav_file(input_path)?;
    let result = stretch(&buffer, params)?;
    io::wav::write_wav_file_float(output_path, &result)?;
    Ok(result)
}
