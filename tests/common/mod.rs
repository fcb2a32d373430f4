#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::rc::Rc;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use phasestretch::io::{AudioFileManager, AudioSink, AudioSource, FileId, ProgressReporter};
use phasestretch::{AudioTimeStretcher, StretchError};

pub fn gen_sine<F>(freq_hz: f32, sr: u32, n: usize, amp_fn: F) -> Vec<f32>
where
    F: Fn(usize) -> f32,
{
    (0..n)
        .map(|i| {
            let phase = 2.0 * PI * freq_hz * i as f32 / sr as f32;
            amp_fn(i) * phase.sin()
        })
        .collect()
}

pub fn gen_impulse_train(period: usize, n: usize, amp: f32) -> Vec<f32> {
    let mut out = vec![0.0f32; n];
    if period == 0 {
        return out;
    }
    for i in (0..n).step_by(period) {
        out[i] = amp;
    }
    out
}

/// Quiet 220 Hz pad with a sharp click at each position.
pub fn gen_click_pad(sr: u32, n: usize, click_positions: &[usize]) -> Vec<f32> {
    let mut out = gen_sine(220.0, sr, n, |_| 0.16);
    for &p in click_positions {
        if p < n {
            out[p] += 1.0;
        }
        if p + 1 < n {
            out[p + 1] -= 0.7;
        }
    }
    out
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    let sum_sq: f64 = signal[start..end]
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    (sum_sq / (end - start) as f64).sqrt()
}

pub fn count_positive_zero_crossings(signal: &[f32], start: usize, end: usize) -> usize {
    let end = end.min(signal.len());
    if end < start + 2 {
        return 0;
    }
    signal[start..end]
        .windows(2)
        .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
        .count()
}

/// Frequency estimate from upward zero crossings over `[start, end)`.
pub fn zero_crossing_freq(signal: &[f32], sr: u32, start: usize, end: usize) -> f64 {
    let crossings = count_positive_zero_crossings(signal, start, end);
    crossings as f64 * sr as f64 / (end - start) as f64
}

/// Frequency of the strongest FFT bin of a Hann-windowed `size`-sample
/// segment starting at `start`.
pub fn dominant_freq(signal: &[f32], sr: u32, start: usize, size: usize) -> f64 {
    let mut buf: Vec<Complex<f32>> = signal[start..start + size]
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos());
            Complex::new(s * w, 0.0)
        })
        .collect();
    FftPlanner::<f32>::new()
        .plan_fft_forward(size)
        .process(&mut buf);

    let peak = buf[1..size / 2]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm_sqr().total_cmp(&b.1.norm_sqr()))
        .map(|(i, _)| i + 1)
        .unwrap_or(0);
    peak as f64 * sr as f64 / size as f64
}

/// Pushes planar input through a stretcher in fixed blocks, draining all
/// output after each block.
pub fn run_stretcher(ts: &mut AudioTimeStretcher, input: &[Vec<f32>], block: usize) -> Vec<Vec<f32>> {
    let len = input[0].len();
    let mut out = vec![Vec::new(); input.len()];
    let mut pos = 0;
    while pos < len {
        let n = block.min(len - pos);
        let blocks: Vec<&[f32]> = input.iter().map(|c| &c[pos..pos + n]).collect();
        ts.put_input(&blocks, n);
        let ready = ts.available_output();
        let mut chunk = vec![vec![0.0f32; ready]; input.len()];
        ts.get_output(&mut chunk, ready);
        for (o, c) in out.iter_mut().zip(chunk) {
            o.extend(c);
        }
        pos += n;
    }
    out
}

/// Audio held by [`MemoryFiles`].
#[derive(Debug, Clone, Default)]
pub struct StoredFile {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples.
    pub data: Vec<f32>,
    pub finalized: bool,
}

impl StoredFile {
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    pub fn channel(&self, ch: usize) -> Vec<f32> {
        self.data
            .iter()
            .skip(ch)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }
}

type Store = Rc<RefCell<HashMap<FileId, StoredFile>>>;

/// In-memory [`AudioFileManager`] with injectable failures.
#[derive(Default)]
pub struct MemoryFiles {
    store: Store,
    next_id: u64,
    pub fail_create: bool,
    /// Make sources fail after this many successful reads.
    pub fail_read_after: Option<usize>,
    pub discarded: Vec<FileId>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn add_planar(&mut self, channels: &[Vec<f32>], sample_rate: u32) -> FileId {
        let frames = channels[0].len();
        let mut data = Vec::with_capacity(frames * channels.len());
        for i in 0..frames {
            for ch in channels {
                data.push(ch[i]);
            }
        }
        self.insert(StoredFile {
            channels: channels.len() as u16,
            sample_rate,
            data,
            finalized: true,
        })
    }

    fn insert(&mut self, file: StoredFile) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.store.borrow_mut().insert(id, file);
        id
    }

    pub fn get(&self, id: FileId) -> Option<StoredFile> {
        self.store.borrow().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }
}

impl AudioFileManager for MemoryFiles {
    fn open_source(&mut self, id: FileId) -> Result<Box<dyn AudioSource>, StretchError> {
        let file = self.get(id).ok_or(StretchError::SourceNotFound(id))?;
        Ok(Box::new(MemorySource {
            file,
            pos: 0,
            reads_left: self.fail_read_after,
        }))
    }

    fn create_derived(
        &mut self,
        source: FileId,
        _prefix: &str,
        channels: u16,
        sample_rate: u32,
    ) -> Result<(FileId, Box<dyn AudioSink>), StretchError> {
        if self.fail_create {
            return Err(StretchError::Destination("disk full".to_string()));
        }
        if self.get(source).is_none() {
            return Err(StretchError::SourceNotFound(source));
        }
        let id = self.insert(StoredFile {
            channels,
            sample_rate,
            data: Vec::new(),
            finalized: false,
        });
        Ok((
            id,
            Box::new(MemorySink {
                store: Rc::clone(&self.store),
                id,
            }),
        ))
    }

    fn discard(&mut self, id: FileId) -> Result<(), StretchError> {
        self.store.borrow_mut().remove(&id);
        self.discarded.push(id);
        Ok(())
    }
}

pub struct MemorySource {
    file: StoredFile,
    pos: usize,
    reads_left: Option<usize>,
}

impl AudioSource for MemorySource {
    fn channels(&self) -> u16 {
        self.file.channels
    }

    fn sample_rate(&self) -> u32 {
        self.file.sample_rate
    }

    fn len_frames(&self) -> u64 {
        self.file.frames() as u64
    }

    fn read_frames(&mut self, out: &mut [Vec<f32>], max_frames: usize) -> Result<usize, StretchError> {
        if let Some(left) = self.reads_left.as_mut() {
            if *left == 0 {
                return Err(StretchError::DecodeFailed("corrupt packet".to_string()));
            }
            *left -= 1;
        }
        let channels = self.file.channels as usize;
        let n = max_frames.min(self.file.frames() - self.pos);
        for i in 0..n {
            for (ch, buf) in out.iter_mut().enumerate() {
                buf[i] = self.file.data[(self.pos + i) * channels + ch];
            }
        }
        self.pos += n;
        Ok(n)
    }
}

pub struct MemorySink {
    store: Store,
    id: FileId,
}

impl AudioSink for MemorySink {
    fn write_interleaved(&mut self, samples: &[f32]) -> Result<(), StretchError> {
        let mut store = self.store.borrow_mut();
        let file = store
            .get_mut(&self.id)
            .ok_or_else(|| StretchError::Destination("file vanished".to_string()))?;
        file.data.extend_from_slice(samples);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), StretchError> {
        if let Some(file) = self.store.borrow_mut().get_mut(&self.id) {
            file.finalized = true;
        }
        Ok(())
    }
}

/// Progress reporter that records what it sees and can cancel after a
/// number of progress updates.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub label: String,
    pub updates: Vec<u8>,
    pub events: usize,
    pub cancel_after: Option<usize>,
}

impl ProgressReporter for RecordingProgress {
    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn set_progress(&mut self, percent: u8) {
        self.updates.push(percent);
    }

    fn process_events(&mut self) {
        self.events += 1;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_after
            .is_some_and(|n| self.updates.len() > n)
    }
}
