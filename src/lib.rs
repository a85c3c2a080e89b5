//! Audio re-packetizer
//!
//! Accepts audio frames of arbitrary, varying sample counts and re-emits the
//! same sample data as frames of a fixed sample count, with presentation
//! timestamps and durations recomputed from the number of samples emitted.
//!
//! ```no_run
//! use asamplepack::{AudioFrame, FrameQueue, PackConfig, SamplePacker};
//!
//! # fn main() -> asamplepack::Result<()> {
//! let mut packer = SamplePacker::new(PackConfig::default())?;
//! let mut upstream = FrameQueue::new();
//! let mut downstream: Vec<AudioFrame> = Vec::new();
//! packer.request_frame(&mut upstream, &mut downstream)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod config_file;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod pack;
pub mod pcm;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use config::{PackConfig, DEFAULT_SAMPLES};
#[cfg(feature = "ffmpeg")]
pub use error::FfmpegError;
pub use error::{PackError, Result};
pub use frame::{AudioFormat, AudioFrame, ChannelLayout, Rational, SampleFormat};
pub use pack::{PackState, PackStats, PackStatus, SampleFifo, SamplePacker, TimestampTracker};
pub use pipeline::{FrameQueue, FrameSink, FrameSource, Pull};
