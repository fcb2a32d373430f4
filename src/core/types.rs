use crate::error::StretchError;

/// A single audio sample (32-bit float, nominal range -1.0 to 1.0).
pub type Sample = f32;

/// Buffer holding audio samples in interleaved format.
///
/// For mono audio, samples are stored sequentially: `[s0, s1, s2, ...]`
/// For stereo audio, samples are interleaved: `[L0, R0, L1, R1, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Raw interleaved sample data.
    pub data: Vec<Sample>,
    /// Number of channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new audio buffer.
    ///
    /// # Errors
    /// Returns `StretchError::InvalidFormat` if `channels` or `sample_rate` is
    /// zero, or if `data` is not a whole number of frames.
    pub fn new(data: Vec<Sample>, channels: u16, sample_rate: u32) -> Result<Self, StretchError> {
        if channels == 0 {
            return Err(StretchError::InvalidFormat(
                "channel count must be at least 1".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(StretchError::InvalidFormat(
                "sample rate must be positive".to_string(),
            ));
        }
        if data.len() % channels as usize != 0 {
            return Err(StretchError::InvalidFormat(format!(
                "{} samples is not a whole number of {}-channel frames",
                data.len(),
                channels
            )));
        }
        Ok(Self {
            data,
            channels,
            sample_rate,
        })
    }

    /// Create a mono buffer.
    pub fn from_mono(data: Vec<Sample>, sample_rate: u32) -> Result<Self, StretchError> {
        Self::new(data, 1, sample_rate)
    }

    /// Create an `AudioBuffer` from separate channel vectors.
    ///
    /// # Errors
    /// Returns error if channels have different lengths or invalid parameters.
    pub fn from_channels(
        channels_data: &[Vec<Sample>],
        sample_rate: u32,
    ) -> Result<Self, StretchError> {
        if channels_data.is_empty() {
            return Err(StretchError::InvalidFormat(
                "at least one channel is required".to_string(),
            ));
        }
        let num_frames = channels_data[0].len();
        if channels_data.iter().any(|ch| ch.len() != num_frames) {
            return Err(StretchError::InvalidFormat(
                "all channels must have the same number of samples".to_string(),
            ));
        }
        let mut data = Vec::with_capacity(num_frames * channels_data.len());
        interleave_into(channels_data, num_frames, &mut data);
        Self::new(data, channels_data.len() as u16, sample_rate)
    }

    /// Number of frames in the buffer (total samples / channels).
    pub fn num_frames(&self) -> usize {
        self.data.len() / self.channels.max(1) as usize
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a single channel's data as a new vector.
    pub fn channel_data(&self, channel: u16) -> Vec<Sample> {
        if channel >= self.channels {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(channel as usize)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }
}

/// Splits `frames` interleaved frames of `input` into the planar `out`
/// buffers, one per channel, each at least `frames` long.
#[inline]
pub fn deinterleave_into(input: &[Sample], frames: usize, out: &mut [Vec<Sample>]) {
    let num_channels = out.len();
    for (ch, channel) in out.iter_mut().enumerate() {
        for (dst, &src) in channel[..frames]
            .iter_mut()
            .zip(input.iter().skip(ch).step_by(num_channels))
        {
            *dst = src;
        }
    }
}

/// Appends the first `frames` samples of each planar buffer to `out`,
/// interleaved.
#[inline]
pub fn interleave_into(channels: &[Vec<Sample>], frames: usize, out: &mut Vec<Sample>) {
    out.reserve(frames * channels.len());
    for i in 0..frames {
        for ch in channels {
            out.push(ch[i]);
        }
    }
}
