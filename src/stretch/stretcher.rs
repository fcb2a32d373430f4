//! Streaming phase vocoder with transient-adaptive synthesis hop.
//!
//! Input is pushed in arbitrary blocks with [`AudioTimeStretcher::put_input`];
//! every time a full analysis window is buffered the stretcher analyses it,
//! resynthesises one frame and appends a hop of finished output to the
//! per-channel output ring buffers, from which [`AudioTimeStretcher::get_output`]
//! drains.
//!
//! ## Frame pipeline
//!
//! 1. Peek `wlen` samples, apply the analysis window, swap buffer halves so the
//!    frame centre sits at sample 0, forward FFT.
//! 2. With sharpening on, compare the channel-summed power spectrum with the
//!    previous frame; a broadband rise marks a transient.
//! 3. Pick the synthesis hop: `n1` across a transient, otherwise `n2` with
//!    long-run drift correction.
//! 4. Advance each bin's phase by the measured instantaneous frequency times
//!    the previous hop, lock side bins to their nearest peak, inverse FFT,
//!    unswap, window, overlap-add.
//! 5. Emit one hop, normalised by the accumulated window modulation.
//!
//! The frame after a transient keeps the analysis phases unchanged, which
//! re-anchors the resynthesis on the attack instead of smearing it.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::core::fft::{princarg, COMPLEX_ZERO};
use crate::core::ring_buffer::RingBuffer;
use crate::core::window::SampleWindow;
use crate::error::StretchError;
use crate::stretch::params::{validate_ratio, HopParameters, StretchParams, TransientTuning};
use crate::stretch::phase_lock::identity_phase_lock;
use crate::stretch::transient::TransientDetector;

const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

/// Frames processed at the nominal hop before drift correction kicks in.
const DRIFT_WARMUP_FRAMES: u64 = 50;

/// Fixed seed so identical input always renders identical output.
const HOP_DITHER_SEED: u64 = 0x5eed_0f_a0d10;

/// Running counters since the last parameter change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StretchStats {
    /// Analysis frames processed.
    pub frames: u64,
    /// Frames classified as transients.
    pub transient_frames: u64,
    /// Input samples per channel consumed (sum of analysis hops).
    pub input_samples: u64,
    /// Output samples per channel produced (sum of synthesis hops).
    pub output_samples: u64,
}

impl StretchStats {
    /// Achieved output/input ratio, or 0 before the first frame.
    pub fn achieved_ratio(&self) -> f64 {
        if self.input_samples == 0 {
            return 0.0;
        }
        self.output_samples as f64 / self.input_samples as f64
    }
}

/// Per-channel buffers and phase state.
struct ChannelState {
    prev_phase: Vec<f32>,
    prev_adjusted_phase: Vec<f32>,
    magnitude: Vec<f32>,
    peaks: Vec<usize>,
    time: Vec<f32>,
    freq: Vec<Complex<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    inbuf: RingBuffer<f32>,
    outbuf: RingBuffer<f32>,
    /// Overlap-add accumulator.
    mashbuf: Vec<f32>,
}

impl ChannelState {
    fn new(planner: &mut FftPlanner<f32>, wlen: usize, in_cap: usize, out_cap: usize) -> Self {
        let forward = planner.plan_fft_forward(wlen);
        let inverse = planner.plan_fft_inverse(wlen);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let bins = wlen / 2 + 1;
        Self {
            prev_phase: vec![0.0; bins],
            prev_adjusted_phase: vec![0.0; bins],
            magnitude: vec![0.0; bins],
            peaks: Vec::with_capacity(bins / 2),
            time: vec![0.0; wlen],
            freq: vec![COMPLEX_ZERO; wlen],
            forward,
            inverse,
            fft_scratch: vec![COMPLEX_ZERO; scratch_len],
            inbuf: RingBuffer::with_capacity(in_cap),
            outbuf: RingBuffer::with_capacity(out_cap),
            mashbuf: vec![0.0; wlen],
        }
    }

    /// Windows, folds and transforms the next `wlen` buffered input samples.
    fn analyse(&mut self, window: &SampleWindow) {
        let wlen = self.time.len();
        let got = self.inbuf.peek(&mut self.time);
        debug_assert_eq!(got, wlen);

        window.cut(&mut self.time);
        self.time.rotate_left(wlen / 2);

        for (c, &s) in self.freq.iter_mut().zip(self.time.iter()) {
            *c = Complex::new(s, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.freq, &mut self.fft_scratch);
    }

    /// Resynthesises the analysed frame and overlap-adds it into `mashbuf`.
    ///
    /// With `unchanged` the analysis spectrum is used as is; otherwise each
    /// bin's phase is advanced from its previous adjusted value by
    /// `last_step` samples at the measured instantaneous frequency, and
    /// then locked to the nearest spectral peak.
    fn synthesise(&mut self, window: &SampleWindow, n1: usize, last_step: usize, unchanged: bool) {
        let wlen = self.time.len();
        let bins = wlen / 2 + 1;
        let omega_per_bin = TWO_PI * n1 as f32 / wlen as f32;

        for bin in 0..bins {
            let c = self.freq[bin];
            let phase = princarg(c.arg());
            self.magnitude[bin] = c.norm();
            if unchanged {
                self.prev_adjusted_phase[bin] = phase;
            } else {
                let omega = omega_per_bin * bin as f32;
                let expected = self.prev_phase[bin] + omega;
                let error = princarg(phase - expected);
                let increment = (omega + error) / n1 as f32;
                self.prev_adjusted_phase[bin] =
                    princarg(self.prev_adjusted_phase[bin] + last_step as f32 * increment);
            }
            self.prev_phase[bin] = phase;
        }

        if !unchanged {
            identity_phase_lock(
                &self.magnitude,
                &self.prev_phase,
                &mut self.prev_adjusted_phase,
                &mut self.peaks,
            );
            for bin in 0..bins {
                self.freq[bin] =
                    Complex::from_polar(self.magnitude[bin], self.prev_adjusted_phase[bin]);
            }
        }
        for bin in 1..wlen - bins + 1 {
            self.freq[wlen - bin] = self.freq[bin].conj();
        }

        self.inverse
            .process_with_scratch(&mut self.freq, &mut self.fft_scratch);

        let norm = 1.0 / wlen as f32;
        for (t, c) in self.time.iter_mut().zip(self.freq.iter()) {
            *t = c.re * norm;
        }
        self.time.rotate_left(wlen / 2);
        window.cut(&mut self.time);

        for (acc, &t) in self.mashbuf.iter_mut().zip(self.time.iter()) {
            *acc += t;
        }
    }

    /// Writes `hop` finished samples to the output and shifts the accumulator.
    fn emit(&mut self, modulation: &[f32], hop: usize) {
        for (s, &m) in self.mashbuf[..hop].iter_mut().zip(modulation.iter()) {
            if m > 0.0 {
                *s /= m;
            }
        }
        self.outbuf.write(&self.mashbuf[..hop]);

        let wlen = self.mashbuf.len();
        self.mashbuf.copy_within(hop.., 0);
        self.mashbuf[wlen - hop..].fill(0.0);
    }
}

impl AsRef<[Complex<f32>]> for ChannelState {
    fn as_ref(&self) -> &[Complex<f32>] {
        &self.freq
    }
}

/// Streaming multi-channel phase-vocoder time stretcher.
///
/// Not internally synchronised: all methods take `&mut self`, so a stretcher
/// shared between threads must be wrapped by the caller. Channels are kept in
/// lockstep (same hops, one transient decision per frame).
pub struct AudioTimeStretcher {
    sample_rate: u32,
    channels: usize,
    max_output_block: usize,
    ratio: f64,
    sharpen: bool,
    tuning: TransientTuning,
    hops: HopParameters,

    planner: FftPlanner<f32>,
    analysis_window: SampleWindow,
    synthesis_window: SampleWindow,
    channel_state: Vec<ChannelState>,
    detector: TransientDetector,
    /// Synthesis window energy accumulated at each pending output position.
    modulation: Vec<f32>,

    prev_transient: bool,
    /// Hop used by the previous frame.
    prev_hop: usize,
    /// Adjusted phases currently equal the measured ones.
    in_phase: bool,
    stats: StretchStats,
    rng: StdRng,
}

impl AudioTimeStretcher {
    /// Creates a stretcher for the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StretchError::InvalidRatio`] or [`StretchError::InvalidFormat`]
    /// when [`StretchParams::validate`] rejects the parameters.
    pub fn new(params: &StretchParams) -> Result<Self, StretchError> {
        params.validate()?;
        let hops = HopParameters::calculate(
            params.stretch_ratio,
            params.sharpen,
            &params.transient_tuning,
        );
        let mut stretcher = Self {
            sample_rate: params.sample_rate,
            channels: params.channels as usize,
            max_output_block: params.max_output_block,
            ratio: params.stretch_ratio,
            sharpen: params.sharpen,
            tuning: params.transient_tuning,
            hops,
            planner: FftPlanner::new(),
            analysis_window: SampleWindow::new(hops.window_size),
            synthesis_window: SampleWindow::new(hops.window_size),
            channel_state: Vec::new(),
            detector: TransientDetector::new(&hops, &params.transient_tuning),
            modulation: Vec::new(),
            prev_transient: false,
            prev_hop: hops.output_increment,
            in_phase: true,
            stats: StretchStats::default(),
            rng: StdRng::seed_from_u64(HOP_DITHER_SEED),
        };
        stretcher.initialise();
        Ok(stretcher)
    }

    /// Allocates windows, per-channel state and ring buffers for the current
    /// hop parameters, discarding any previous state.
    fn initialise(&mut self) {
        let wlen = self.hops.window_size;
        log::debug!(
            "initialising stretcher: {} channels, wlen={} n1={} n2={} sharpening={}",
            self.channels,
            wlen,
            self.hops.input_increment,
            self.hops.output_increment,
            self.hops.sharpening
        );

        self.analysis_window = SampleWindow::new(wlen);
        self.synthesis_window = SampleWindow::new(wlen);
        self.detector = TransientDetector::new(&self.hops, &self.tuning);
        self.modulation = vec![0.0; wlen];

        let in_cap = self.input_buffer_size();
        let out_cap = self.output_buffer_size();
        let planner = &mut self.planner;
        self.channel_state = (0..self.channels)
            .map(|_| ChannelState::new(planner, wlen, in_cap, out_cap))
            .collect();

        self.prev_transient = false;
        self.prev_hop = self.hops.output_increment;
        self.in_phase = true;
        self.stats = StretchStats::default();
    }

    fn input_buffer_size(&self) -> usize {
        let wlen = self.hops.window_size;
        (self.max_output_block as f64 / self.ratio) as usize + wlen
    }

    fn output_buffer_size(&self) -> usize {
        (self.max_output_block + self.hops.window_size) * 2
    }

    /// Recomputes hop parameters after a ratio or sharpening change.
    ///
    /// Keeps streaming state when the window length is unchanged (only the
    /// input buffers are resized, unread content preserved); otherwise
    /// everything is rebuilt and buffered audio is dropped.
    fn reconfigure(&mut self) {
        let former_wlen = self.hops.window_size;
        self.hops = HopParameters::calculate(self.ratio, self.sharpen, &self.tuning);
        self.stats = StretchStats::default();

        if self.hops.window_size == former_wlen {
            let in_cap = self.input_buffer_size();
            for state in &mut self.channel_state {
                if state.inbuf.capacity() != in_cap {
                    let cap = in_cap.max(state.inbuf.read_space());
                    state.inbuf = state.inbuf.resized(cap);
                }
            }
            self.prev_hop = self.hops.output_increment;
            log::debug!(
                "stretcher retuned in place: n1={} n2={}",
                self.hops.input_increment,
                self.hops.output_increment
            );
        } else {
            self.initialise();
        }
    }

    /// Changes the stretch ratio.
    ///
    /// # Errors
    ///
    /// Returns [`StretchError::InvalidRatio`] for a ratio outside
    /// `MIN_RATIO..=MAX_RATIO`; the stretcher is left untouched.
    pub fn set_ratio(&mut self, ratio: f64) -> Result<(), StretchError> {
        validate_ratio(ratio)?;
        self.ratio = ratio;
        self.reconfigure();
        Ok(())
    }

    /// Enables or disables transient sharpening.
    pub fn set_sharpening(&mut self, sharpen: bool) {
        self.sharpen = sharpen;
        self.reconfigure();
    }

    /// Drops all buffered audio and phase state, keeping the parameters.
    pub fn reset(&mut self) {
        self.initialise();
    }

    /// Feeds `count` samples from each channel buffer.
    ///
    /// Returns the number of samples per channel accepted. This is less than
    /// `count` only when the output is not being drained and the input
    /// buffers fill up; the excess is dropped with a warning.
    pub fn put_input<S: AsRef<[f32]>>(&mut self, input: &[S], count: usize) -> usize {
        debug_assert!(input.len() >= self.channels);
        let mut consumed = 0;

        while consumed < count {
            // Frames left waiting for output space may free input space now
            self.process_ready_frames();
            let writable = self.channel_state[0]
                .inbuf
                .write_space()
                .min(count - consumed);
            if writable == 0 {
                log::warn!(
                    "stretcher input stalled: {} samples buffered, {} output pending, dropping {}",
                    self.channel_state[0].inbuf.read_space(),
                    self.available_output(),
                    count - consumed
                );
                break;
            }
            for (state, samples) in self.channel_state.iter_mut().zip(input.iter()) {
                state
                    .inbuf
                    .write(&samples.as_ref()[consumed..consumed + writable]);
            }
            consumed += writable;

            self.process_ready_frames();
        }
        consumed
    }

    fn process_ready_frames(&mut self) {
        let wlen = self.hops.window_size;
        let max_hop = self.hops.max_hop();
        while self.channel_state[0].inbuf.read_space() >= wlen
            && self.channel_state[0].outbuf.write_space() >= max_hop
        {
            self.process_frame();
        }
    }

    fn process_frame(&mut self) {
        let n1 = self.hops.input_increment;
        let wlen = self.hops.window_size;

        for state in &mut self.channel_state {
            state.analyse(&self.analysis_window);
        }

        let transient = self.hops.sharpening && self.detector.is_transient(&self.channel_state);
        let hop = self.next_hop(transient);

        let last_step = if self.prev_transient { n1 } else { self.prev_hop };
        let unchanged = last_step == n1 && (self.prev_transient || self.in_phase);
        for state in &mut self.channel_state {
            state.synthesise(&self.synthesis_window, n1, last_step, unchanged);
        }

        let area = self.analysis_window.area();
        for (i, m) in self.modulation.iter_mut().enumerate() {
            *m += self.synthesis_window.value(i) * area;
        }

        for state in &mut self.channel_state {
            state.inbuf.skip(n1);
            state.emit(&self.modulation, hop);
        }
        self.modulation.copy_within(hop.., 0);
        self.modulation[wlen - hop..].fill(0.0);

        self.prev_transient = transient;
        self.prev_hop = hop;
        self.in_phase = unchanged;
    }

    /// Chooses this frame's synthesis hop and updates the counters.
    fn next_hop(&mut self, transient: bool) -> usize {
        let n1 = self.hops.input_increment;
        let stats = &mut self.stats;
        stats.frames += 1;
        if transient {
            stats.transient_frames += 1;
        }

        let mut hop = if transient {
            n1
        } else {
            self.hops.output_increment
        };

        if !transient
            && stats.frames > DRIFT_WARMUP_FRAMES
            && stats.transient_frames < stats.frames
        {
            // Spread the output the transients did not take over the
            // remaining frames, dithering the fractional part.
            let ideal_total = (stats.frames as f64 * n1 as f64 * self.ratio).round();
            let fixed = (stats.transient_frames * n1 as u64) as f64;
            let squashy_frames = (stats.frames - stats.transient_frames) as f64;
            let ideal = ((ideal_total - fixed) / squashy_frames).max(1.0);
            let whole = ideal.floor();
            hop = whole as usize;
            if self.rng.random_bool(ideal - whole) {
                hop += 1;
            }
        }

        let hop = hop.clamp(1, self.hops.max_hop());
        stats.input_samples += n1 as u64;
        stats.output_samples += hop as u64;
        hop
    }

    /// Samples per channel ready to read.
    #[inline]
    pub fn available_output(&self) -> usize {
        self.channel_state[0].outbuf.read_space()
    }

    /// Reads `count` samples into each channel buffer.
    ///
    /// If fewer are ready, the shortfall is zero-filled at the start of each
    /// buffer and everything that is ready fills the remainder.
    pub fn get_output<S: AsMut<[f32]>>(&mut self, output: &mut [S], count: usize) {
        debug_assert!(output.len() >= self.channels);
        let available = self.available_output();
        let pad = count.saturating_sub(available);
        for (state, out) in self.channel_state.iter_mut().zip(output.iter_mut()) {
            let out = &mut out.as_mut()[..count];
            out[..pad].fill(0.0);
            state.outbuf.read(&mut out[pad..]);
        }
    }

    /// Analysis hop `n1`.
    #[inline]
    pub fn input_increment(&self) -> usize {
        self.hops.input_increment
    }

    /// Nominal synthesis hop `n2`.
    #[inline]
    pub fn output_increment(&self) -> usize {
        self.hops.output_increment
    }

    /// FFT window length.
    #[inline]
    pub fn window_size(&self) -> usize {
        self.hops.window_size
    }

    /// Nominal ratio of the integer hops, `n2 / n1`.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.hops.nominal_ratio()
    }

    /// Ratio the stretcher was asked for; drift correction converges on it.
    #[inline]
    pub fn requested_ratio(&self) -> f64 {
        self.ratio
    }

    /// Whether sharpening was requested.
    #[inline]
    pub fn sharpening(&self) -> bool {
        self.sharpen
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Silence to prime with, and output to discard, so the first real
    /// sample lands at the centre of the first analysis window.
    #[inline]
    pub fn processing_latency(&self) -> usize {
        self.hops.window_size / 2
    }

    #[inline]
    pub fn stats(&self) -> StretchStats {
        self.stats
    }

    #[inline]
    pub fn last_frame_was_transient(&self) -> bool {
        self.prev_transient
    }
}
