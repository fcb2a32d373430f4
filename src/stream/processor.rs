use crate::core::types::{deinterleave_into, Sample};
use crate::error::StretchError;
use crate::stretch::params::StretchParams;
use crate::stretch::stretcher::AudioTimeStretcher;

/// Chunk-based front end to [`AudioTimeStretcher`] with latency handling.
///
/// The stretcher is primed with half a window of silence so the first input
/// sample lands at the centre of the first analysis frame, and the same
/// amount of output is discarded. Output is therefore time-aligned with the
/// input, and after [`flush`](Self::flush) the total output length is
/// exactly `ceil(input_frames * ratio)`.
pub struct StreamProcessor {
    stretcher: AudioTimeStretcher,
    channels: usize,
    ratio: f64,
    max_output_block: usize,
    /// Frames fed to the stretcher per `put_input` call.
    input_block: usize,
    /// Output frames still to drop before output counts.
    to_discard: usize,
    /// Target length contributed by input fed under earlier ratios.
    target_base: f64,
    /// Input frames fed under the current ratio.
    segment_frames: u64,
    input_frames: u64,
    output_frames: u64,
    planar_in: Vec<Vec<Sample>>,
    planar_out: Vec<Vec<Sample>>,
}

impl StreamProcessor {
    /// Creates a processor and primes its stretcher.
    pub fn new(params: StretchParams) -> Result<Self, StretchError> {
        let stretcher = AudioTimeStretcher::new(&params)?;
        let channels = params.channels as usize;
        let input_block = input_block_size(params.max_output_block, params.stretch_ratio);
        let mut processor = Self {
            stretcher,
            channels,
            ratio: params.stretch_ratio,
            max_output_block: params.max_output_block,
            input_block,
            to_discard: 0,
            target_base: 0.0,
            segment_frames: 0,
            input_frames: 0,
            output_frames: 0,
            planar_in: vec![vec![0.0; input_block]; channels],
            planar_out: vec![vec![0.0; params.max_output_block]; channels],
        };
        processor.prime();
        Ok(processor)
    }

    fn prime(&mut self) {
        let latency = self.stretcher.processing_latency();
        self.to_discard = latency;
        let mut sink = Vec::new();
        self.feed_silence(latency, &mut sink);
        debug_assert!(sink.is_empty());
    }

    /// Processes a chunk of interleaved samples and returns the interleaved
    /// output that became ready. The output may be empty while the stretcher
    /// fills its first window.
    ///
    /// # Errors
    ///
    /// Returns [`StretchError::InvalidFormat`] if `input` is not a whole
    /// number of frames.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, StretchError> {
        if input.len() % self.channels != 0 {
            return Err(StretchError::InvalidFormat(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                self.channels
            )));
        }
        let frames = input.len() / self.channels;
        let mut output = Vec::new();
        let mut pos = 0;
        while pos < frames {
            let n = self.input_block.min(frames - pos);
            deinterleave_into(
                &input[pos * self.channels..(pos + n) * self.channels],
                n,
                &mut self.planar_in,
            );
            self.count_input(n);
            self.feed(n, &mut output);
            pos += n;
        }
        Ok(output)
    }

    /// Processes `frames` frames of planar input, appending interleaved
    /// output to `output`.
    pub fn process_planar<S: AsRef<[f32]>>(
        &mut self,
        input: &[S],
        frames: usize,
        output: &mut Vec<f32>,
    ) {
        debug_assert!(input.len() >= self.channels);
        let mut pos = 0;
        while pos < frames {
            let n = self.input_block.min(frames - pos);
            for (dst, src) in self.planar_in.iter_mut().zip(input.iter()) {
                dst[..n].copy_from_slice(&src.as_ref()[pos..pos + n]);
            }
            self.count_input(n);
            self.feed(n, output);
            pos += n;
        }
    }

    /// Feeds silence until the output reaches the target length and returns
    /// the remaining interleaved output. Call [`reset`](Self::reset) before
    /// reusing the processor for a new stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let mut output = Vec::new();
        let target = self.target_frames();
        while self.output_frames < target {
            self.feed_silence(self.input_block, &mut output);
        }
        output
    }

    fn feed_silence(&mut self, frames: usize, output: &mut Vec<f32>) {
        for channel in &mut self.planar_in {
            channel.fill(0.0);
        }
        let mut remaining = frames;
        while remaining > 0 {
            let n = self.input_block.min(remaining);
            self.feed(n, output);
            remaining -= n;
        }
    }

    /// Pushes the first `n` frames of `planar_in` and drains the output.
    fn feed(&mut self, n: usize, output: &mut Vec<f32>) {
        let mut pending = n;
        while pending > 0 {
            let accepted = self.stretcher.put_input(&self.planar_in, pending);
            if accepted == 0 {
                self.drain(output);
                break;
            }
            if accepted < pending {
                // Move the unaccepted tail to the front for the retry
                for channel in &mut self.planar_in {
                    channel.copy_within(accepted..pending, 0);
                }
            }
            pending -= accepted;
            self.drain(output);
        }
    }

    fn drain(&mut self, output: &mut Vec<f32>) {
        let target = self.target_frames();
        loop {
            let available = self.stretcher.available_output();
            if available == 0 {
                break;
            }
            let n = available.min(self.max_output_block);
            self.stretcher.get_output(&mut self.planar_out, n);

            let skip = self.to_discard.min(n);
            self.to_discard -= skip;
            let keep = (n - skip).min(target.saturating_sub(self.output_frames) as usize);

            output.reserve(keep * self.channels);
            for i in skip..skip + keep {
                for channel in &self.planar_out {
                    output.push(channel[i]);
                }
            }
            self.output_frames += keep as u64;
        }
    }

    fn count_input(&mut self, frames: usize) {
        self.input_frames += frames as u64;
        self.segment_frames += frames as u64;
    }

    /// Changes the ratio for input processed from now on.
    ///
    /// A change that alters the window length rebuilds the stretcher, which
    /// drops audio still buffered inside it; the processor re-primes and the
    /// lost span is made up with silence at [`flush`](Self::flush).
    pub fn set_ratio(&mut self, ratio: f64) -> Result<(), StretchError> {
        let former_wlen = self.stretcher.window_size();
        self.stretcher.set_ratio(ratio)?;
        self.target_base += self.segment_frames as f64 * self.ratio;
        self.segment_frames = 0;
        self.ratio = ratio;

        self.input_block = input_block_size(self.max_output_block, ratio);
        for channel in &mut self.planar_in {
            channel.resize(self.input_block, 0.0);
        }
        if self.stretcher.window_size() != former_wlen {
            log::debug!("window size changed, re-priming stream");
            self.prime();
        }
        Ok(())
    }

    /// Returns to the freshly constructed state, keeping the current ratio.
    pub fn reset(&mut self) {
        self.stretcher.reset();
        self.target_base = 0.0;
        self.segment_frames = 0;
        self.input_frames = 0;
        self.output_frames = 0;
        self.prime();
    }

    /// Output length the stream is heading for, `ceil(input * ratio)`.
    pub fn target_frames(&self) -> u64 {
        (self.target_base + self.segment_frames as f64 * self.ratio).ceil() as u64
    }

    pub fn input_frames(&self) -> u64 {
        self.input_frames
    }

    pub fn output_frames(&self) -> u64 {
        self.output_frames
    }

    /// Input frames needed before the first output appears.
    pub fn latency_frames(&self) -> usize {
        self.stretcher.window_size() - self.stretcher.processing_latency()
    }

    pub fn stretcher(&self) -> &AudioTimeStretcher {
        &self.stretcher
    }
}

/// Input frames per stretcher call for a given output block size.
pub(crate) fn input_block_size(max_output_block: usize, ratio: f64) -> usize {
    ((max_output_block as f64 / ratio) as usize).max(1)
}
