use crate::core::types::Sample;
use crate::error::StretchError;
use crate::io::{AudioFileManager, AudioSink, AudioSource, FileId, ProgressReporter};
use crate::stream::processor::{input_block_size, StreamProcessor};
use crate::stretch::params::{validate_ratio, StretchParams, DEFAULT_MAX_OUTPUT_BLOCK};

/// Name prefix of stretched files.
pub const DEFAULT_PREFIX: &str = "stretch";

/// Stretches whole audio files held by an [`AudioFileManager`].
///
/// ```no_run
/// use phasestretch::io::wav::WavFileManager;
/// use phasestretch::io::LogProgress;
/// use phasestretch::FileTimeStretcher;
///
/// let mut files = WavFileManager::new("/tmp");
/// let source = files.register("/tmp/loop.wav");
/// let mut progress = LogProgress::new();
/// let stretched = FileTimeStretcher::new(&mut files)
///     .with_progress(&mut progress)
///     .stretch_file(source, 1.25)?;
/// println!("wrote {}", files.path(stretched).unwrap().display());
/// # Ok::<(), phasestretch::StretchError>(())
/// ```
pub struct FileTimeStretcher<'a> {
    manager: &'a mut dyn AudioFileManager,
    progress: Option<&'a mut dyn ProgressReporter>,
    sharpen: bool,
    output_block: usize,
    prefix: String,
}

impl<'a> FileTimeStretcher<'a> {
    pub fn new(manager: &'a mut dyn AudioFileManager) -> Self {
        Self {
            manager,
            progress: None,
            sharpen: true,
            output_block: DEFAULT_MAX_OUTPUT_BLOCK,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Reports progress to, and takes cancellation from, `progress`.
    pub fn with_progress(mut self, progress: &'a mut dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_sharpening(mut self, sharpen: bool) -> Self {
        self.sharpen = sharpen;
        self
    }

    /// Output frames rendered per block (default 1024).
    pub fn with_output_block(mut self, frames: usize) -> Self {
        self.output_block = frames;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Stretches `source` by `ratio` into a new derived file and returns its id.
    ///
    /// The new file has the source's channel count and sample rate, holds
    /// 32-bit float samples and is exactly `ceil(frames * ratio)` frames long.
    /// If anything fails after the destination was created, including
    /// cancellation, the destination is discarded.
    pub fn stretch_file(&mut self, source: FileId, ratio: f64) -> Result<FileId, StretchError> {
        validate_ratio(ratio)?;
        let mut input = self.manager.open_source(source)?;
        let channels = input.channels();
        let sample_rate = input.sample_rate();

        let params = StretchParams::new(ratio)
            .with_channels(channels)
            .with_sample_rate(sample_rate)
            .with_sharpening(self.sharpen)
            .with_max_output_block(self.output_block);
        let mut processor = StreamProcessor::new(params)?;

        let (dest, sink) = self
            .manager
            .create_derived(source, &self.prefix, channels, sample_rate)
            .map_err(|e| match e {
                StretchError::Destination(_) => e,
                other => StretchError::Destination(other.to_string()),
            })?;

        log::info!(
            "stretching file {} by {:.4} into {} ({} frames, {} ch, {} Hz)",
            source,
            ratio,
            dest,
            input.len_frames(),
            channels,
            sample_rate
        );

        match self.render(input.as_mut(), sink, &mut processor, ratio) {
            Ok(written) => {
                log::info!("stretched file {} -> {}: {} frames", source, dest, written);
                Ok(dest)
            }
            Err(e) => {
                if e == StretchError::Cancelled {
                    log::info!("stretch of file {} cancelled", source);
                }
                if let Err(discard_err) = self.manager.discard(dest) {
                    log::warn!("could not discard {}: {}", dest, discard_err);
                }
                Err(e)
            }
        }
    }

    /// Streams the whole source through `processor` into `sink`.
    /// Returns the number of frames written.
    fn render(
        &mut self,
        source: &mut dyn AudioSource,
        mut sink: Box<dyn AudioSink>,
        processor: &mut StreamProcessor,
        ratio: f64,
    ) -> Result<u64, StretchError> {
        let channels = source.channels() as usize;
        let total = source.len_frames();
        let block = input_block_size(self.output_block, ratio);
        let mut planar: Vec<Vec<Sample>> = vec![vec![0.0; block]; channels];
        let mut interleaved = Vec::with_capacity(self.output_block * channels * 2);
        let mut consumed = 0u64;

        if let Some(progress) = self.progress.as_deref_mut() {
            progress.set_label("Stretching audio");
            progress.set_progress(0);
        }

        loop {
            let got = source.read_frames(&mut planar, block).map_err(|e| {
                log::error!("reading source failed after {} frames: {}", consumed, e);
                e
            })?;
            if got == 0 {
                break;
            }
            interleaved.clear();
            processor.process_planar(&planar, got, &mut interleaved);
            sink.write_interleaved(&interleaved)?;
            consumed += got as u64;

            self.report(consumed, total)?;
        }

        let tail = processor.flush();
        sink.write_interleaved(&tail)?;
        sink.finalize()?;

        if let Some(progress) = self.progress.as_deref_mut() {
            progress.set_progress(100);
        }
        Ok(processor.output_frames())
    }

    fn report(&mut self, consumed: u64, total: u64) -> Result<(), StretchError> {
        let Some(progress) = self.progress.as_deref_mut() else {
            return Ok(());
        };
        let percent = if total == 0 {
            100
        } else {
            (consumed * 100 / total).min(100) as u8
        };
        progress.set_progress(percent);
        progress.process_events();
        if progress.is_cancelled() {
            return Err(StretchError::Cancelled);
        }
        Ok(())
    }
}
