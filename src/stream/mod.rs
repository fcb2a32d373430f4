//! Streaming front ends: chunked processing and the whole-file driver.

pub mod file_stretcher;
pub mod processor;

pub use file_stretcher::FileTimeStretcher;
pub use processor::StreamProcessor;
