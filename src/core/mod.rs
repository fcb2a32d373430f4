//! Core types, ring buffers, window functions and phase helpers.

pub mod fft;
pub mod ring_buffer;
pub mod types;
pub mod window;

pub use ring_buffer::RingBuffer;
pub use types::*;
pub use window::SampleWindow;
