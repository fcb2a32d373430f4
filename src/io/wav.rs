//! WAV files on disk, read and written with `hound`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::core::types::{AudioBuffer, Sample};
use crate::error::StretchError;
use crate::io::{AudioFileManager, AudioSink, AudioSource, FileId};

/// File registry backed by a directory.
///
/// Sources are registered by path; derived files are created in the
/// manager's directory as `<prefix>-<source stem>.wav`, with a numeric
/// suffix when that name is taken.
#[derive(Debug)]
pub struct WavFileManager {
    dir: PathBuf,
    files: HashMap<FileId, PathBuf>,
    next_id: u64,
}

impl WavFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers an existing file and returns its id.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(id, path.into());
        id
    }

    pub fn path(&self, id: FileId) -> Option<&Path> {
        self.files.get(&id).map(PathBuf::as_path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn derived_path(&self, source: &Path, prefix: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let mut candidate = self.dir.join(format!("{}-{}.wav", prefix, stem));
        let mut n = 2;
        while candidate.exists() || self.files.values().any(|p| p == &candidate) {
            candidate = self.dir.join(format!("{}-{}-{}.wav", prefix, stem, n));
            n += 1;
        }
        candidate
    }
}

impl AudioFileManager for WavFileManager {
    fn open_source(&mut self, id: FileId) -> Result<Box<dyn AudioSource>, StretchError> {
        let path = self.files.get(&id).ok_or(StretchError::SourceNotFound(id))?;
        let source = WavSource::open(path).map_err(|e| match e {
            StretchError::IoError(_) if !path.exists() => StretchError::SourceNotFound(id),
            other => other,
        })?;
        Ok(Box::new(source))
    }

    fn create_derived(
        &mut self,
        source: FileId,
        prefix: &str,
        channels: u16,
        sample_rate: u32,
    ) -> Result<(FileId, Box<dyn AudioSink>), StretchError> {
        let source_path = self
            .files
            .get(&source)
            .ok_or(StretchError::SourceNotFound(source))?;
        let path = self.derived_path(source_path, prefix);
        let sink = WavSink::create(&path, channels, sample_rate)
            .map_err(|e| StretchError::Destination(format!("{}: {}", path.display(), e)))?;
        let id = self.register(path);
        Ok((id, Box::new(sink)))
    }

    fn discard(&mut self, id: FileId) -> Result<(), StretchError> {
        if let Some(path) = self.files.remove(&id) {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("discarded {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Streaming WAV reader producing planar `f32` frames.
///
/// Integer PCM of any depth hound supports is scaled to `[-1.0, 1.0)`.
pub struct WavSource {
    reader: hound::WavReader<std::io::BufReader<File>>,
    spec: hound::WavSpec,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StretchError> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(StretchError::InvalidFormat("WAV has no channels".to_string()));
        }
        Ok(Self { reader, spec })
    }
}

impl AudioSource for WavSource {
    fn channels(&self) -> u16 {
        self.spec.channels
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn len_frames(&self) -> u64 {
        self.reader.duration() as u64
    }

    fn read_frames(
        &mut self,
        out: &mut [Vec<Sample>],
        max_frames: usize,
    ) -> Result<usize, StretchError> {
        debug_assert_eq!(out.len(), self.spec.channels as usize);
        match self.spec.sample_format {
            hound::SampleFormat::Float => {
                fill_planar(self.reader.samples::<f32>(), out, max_frames, |s| s)
            }
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (self.spec.bits_per_sample - 1)) as f32;
                fill_planar(self.reader.samples::<i32>(), out, max_frames, |s| {
                    s as f32 * scale
                })
            }
        }
    }
}

fn fill_planar<T, I, F>(
    mut samples: I,
    out: &mut [Vec<Sample>],
    max_frames: usize,
    convert: F,
) -> Result<usize, StretchError>
where
    I: Iterator<Item = Result<T, hound::Error>>,
    F: Fn(T) -> Sample,
{
    let mut frames = 0;
    while frames < max_frames {
        for (ch, channel) in out.iter_mut().enumerate() {
            match samples.next() {
                Some(sample) => {
                    let sample = sample.map_err(|e| StretchError::DecodeFailed(e.to_string()))?;
                    channel[frames] = convert(sample);
                }
                None if ch == 0 => return Ok(frames),
                None => {
                    return Err(StretchError::DecodeFailed(format!(
                        "truncated frame {} ({} of {} channels)",
                        frames,
                        ch,
                        out.len()
                    )))
                }
            }
        }
        frames += 1;
    }
    Ok(frames)
}

/// WAV writer storing 32-bit float samples.
pub struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl WavSink {
    pub fn create(
        path: impl AsRef<Path>,
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self, StretchError> {
        let writer = hound::WavWriter::create(path, float_spec(channels, sample_rate))?;
        Ok(Self { writer })
    }
}

impl AudioSink for WavSink {
    fn write_interleaved(&mut self, samples: &[Sample]) -> Result<(), StretchError> {
        for &s in samples {
            self.writer.write_sample(s)?;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), StretchError> {
        self.writer.finalize()?;
        Ok(())
    }
}

fn float_spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Reads a whole WAV file into an interleaved buffer.
pub fn read_wav_file(path: impl AsRef<Path>) -> Result<AudioBuffer, StretchError> {
    let mut source = WavSource::open(path)?;
    let channels = source.channels() as usize;
    let frames = source.len_frames() as usize;
    let mut planar = vec![vec![0.0; frames]; channels];
    let got = source.read_frames(&mut planar, frames)?;
    for channel in &mut planar {
        channel.truncate(got);
    }
    AudioBuffer::from_channels(&planar, source.sample_rate())
}

/// Writes an interleaved buffer as a 32-bit float WAV file.
pub fn write_wav_file_float(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<(), StretchError> {
    let mut sink = WavSink::create(path, buffer.channels, buffer.sample_rate)?;
    sink.write_interleaved(&buffer.data)?;
    Box::new(sink).finalize()
}
