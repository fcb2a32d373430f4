//! Collaborator interfaces used by the file driver.
//!
//! The stretcher itself knows nothing about files. The driver in
//! [`crate::stream::file_stretcher`] reaches audio only through these traits,
//! so a host application can plug in its own file registry, decoders and
//! progress UI. [`wav`] provides a directory-backed implementation.

pub mod wav;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::types::Sample;
use crate::error::StretchError;

/// Opaque identifier of an audio file known to an [`AudioFileManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of audio files: opens sources and creates derived destinations.
pub trait AudioFileManager {
    /// Opens a registered file for reading.
    ///
    /// Implementations return [`StretchError::SourceNotFound`] for an unknown id.
    fn open_source(&mut self, id: FileId) -> Result<Box<dyn AudioSource>, StretchError>;

    /// Creates a new file derived from `source`, named with `prefix`, and
    /// returns its id with a sink that writes 32-bit float samples.
    fn create_derived(
        &mut self,
        source: FileId,
        prefix: &str,
        channels: u16,
        sample_rate: u32,
    ) -> Result<(FileId, Box<dyn AudioSink>), StretchError>;

    /// Removes a file created by [`create_derived`](Self::create_derived).
    fn discard(&mut self, id: FileId) -> Result<(), StretchError>;
}

/// Sequential reader of planar audio frames.
pub trait AudioSource {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Total length in frames.
    fn len_frames(&self) -> u64;

    /// Reads up to `max_frames` frames into `out` (one buffer per channel,
    /// each at least `max_frames` long). Returns the frames read; 0 at the end.
    fn read_frames(
        &mut self,
        out: &mut [Vec<Sample>],
        max_frames: usize,
    ) -> Result<usize, StretchError>;
}

/// Writer of interleaved audio frames.
pub trait AudioSink {
    fn write_interleaved(&mut self, samples: &[Sample]) -> Result<(), StretchError>;

    /// Completes the file. A sink dropped without finalising leaves an
    /// incomplete file that should be discarded.
    fn finalize(self: Box<Self>) -> Result<(), StretchError>;
}

/// Receives progress updates from long-running operations.
pub trait ProgressReporter {
    fn set_label(&mut self, label: &str);

    /// Percent complete, `0..=100`.
    fn set_progress(&mut self, percent: u8);

    /// Gives an interactive host a chance to handle pending events.
    fn process_events(&mut self) {}

    fn is_cancelled(&self) -> bool;
}

/// Cloneable cancellation handle shared between a worker and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Reporter that logs progress at 10% steps and honours a [`CancelFlag`].
#[derive(Debug, Default)]
pub struct LogProgress {
    label: String,
    last_logged: Option<u8>,
    cancel: CancelFlag,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Last progress value that was logged.
    pub fn last_logged(&self) -> Option<u8> {
        self.last_logged
    }
}

impl ProgressReporter for LogProgress {
    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
        log::info!("{}", self.label);
    }

    fn set_progress(&mut self, percent: u8) {
        let step = percent / 10 * 10;
        if self.last_logged.is_some_and(|last| last >= step) {
            return;
        }
        self.last_logged = Some(step);
        log::info!("{}: {}%", self.label, step);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
