//! Pipeline boundary
//!
//! The packer sits between an upstream node that supplies frames and a
//! downstream node that accepts them. Neither is owned by the packer; both
//! are reached through the traits below. Backpressure is expressed only by
//! `Pull::NotReady`, never by blocking.

use std::collections::VecDeque;

use crate::error::Result;
use crate::frame::AudioFrame;

/// Answer of an upstream node to a pull request
#[derive(Debug)]
pub enum Pull {
    /// The next chunk of input
    Frame(AudioFrame),
    /// Nothing available right now; ask again later
    NotReady,
    /// Upstream is exhausted
    EndOfStream,
}

/// Upstream side of the packer
pub trait FrameSource {
    /// Request the next input frame.
    fn pull_frame(&mut self) -> Result<Pull>;
}

/// Downstream side of the packer
pub trait FrameSink {
    /// Accept one output frame.
    fn on_frame_available(&mut self, frame: AudioFrame) -> Result<()>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn pull_frame(&mut self) -> Result<Pull> {
        (**self).pull_frame()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn on_frame_available(&mut self, frame: AudioFrame) -> Result<()> {
        (**self).on_frame_available(frame)
    }
}

impl FrameSink for Vec<AudioFrame> {
    fn on_frame_available(&mut self, frame: AudioFrame) -> Result<()> {
        self.push(frame);
        Ok(())
    }
}

/// In-memory upstream: frames are pushed by a producer and pulled by the packer.
///
/// Answers `NotReady` while empty and open, `EndOfStream` once empty and closed.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<AudioFrame>,
    closed: bool,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: AudioFrame) {
        self.frames.push_back(frame);
    }

    /// No more frames will be pushed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<AudioFrame> for FrameQueue {
    /// A closed queue holding every frame of the iterator.
    fn from_iter<I: IntoIterator<Item = AudioFrame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
            closed: true,
        }
    }
}

impl FrameSource for FrameQueue {
    fn pull_frame(&mut self) -> Result<Pull> {
        Ok(match self.frames.pop_front() {
            Some(frame) => Pull::Frame(frame),
            None if self.closed => Pull::EndOfStream,
            None => Pull::NotReady,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioFormat, ChannelLayout, SampleFormat};

    #[test]
    fn test_queue_not_ready_until_closed() {
        let format = AudioFormat::new(SampleFormat::S16, ChannelLayout::MONO, 8000);
        let mut queue = FrameQueue::new();
        assert!(matches!(queue.pull_frame().unwrap(), Pull::NotReady));

        queue.push(AudioFrame::silence(format, 4, Some(0)));
        assert!(matches!(queue.pull_frame().unwrap(), Pull::Frame(f) if f.samples == 4));
        assert!(matches!(queue.pull_frame().unwrap(), Pull::NotReady));

        queue.close();
        assert!(matches!(queue.pull_frame().unwrap(), Pull::EndOfStream));
    }

    #[test]
    fn test_collected_queue_is_closed() {
        let mut queue: FrameQueue = std::iter::empty().collect();
        assert!(matches!(queue.pull_frame().unwrap(), Pull::EndOfStream));
    }
}
