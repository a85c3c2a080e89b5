//! Raw PCM input and output
//!
//! `RawPcmSource` reads interleaved PCM from any reader in chunks whose
//! sizes cycle through a configured pattern, which makes it easy to feed the
//! packer irregular input. `RawPcmSink` writes emitted frames back out as
//! interleaved PCM.

use std::io::{ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};

use crate::error::{PackError, Result};
use crate::frame::{AudioFormat, AudioFrame, Rational};
use crate::pipeline::{FrameSink, FrameSource, Pull};

/// Upstream reading interleaved PCM from a reader
pub struct RawPcmSource<R> {
    reader: R,
    format: AudioFormat,
    chunk_samples: Vec<usize>,
    next_chunk: usize,
    next_pts: i64,
    done: bool,
}

impl<R: Read> RawPcmSource<R> {
    /// `chunk_samples` is cycled; every entry must be positive.
    pub fn new(reader: R, format: AudioFormat, chunk_samples: Vec<usize>) -> Result<Self> {
        if format.sample_format.is_planar() {
            return Err(PackError::Config(format!(
                "raw input must be interleaved, {} is planar",
                format.sample_format
            )));
        }
        if chunk_samples.is_empty() || chunk_samples.contains(&0) {
            return Err(PackError::Config(
                "read sizes must be a non-empty list of positive sample counts".to_string(),
            ));
        }
        Ok(Self {
            reader,
            format,
            chunk_samples,
            next_chunk: 0,
            next_pts: 0,
            done: false,
        })
    }

    /// PTS of the first frame, in 1/sample_rate units.
    pub fn with_start_pts(mut self, pts: i64) -> Self {
        self.next_pts = pts;
        self
    }

    // Fill `buf` as far as the reader allows; returns bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for RawPcmSource<R> {
    fn pull_frame(&mut self) -> Result<Pull> {
        if self.done {
            return Ok(Pull::EndOfStream);
        }

        let samples = self.chunk_samples[self.next_chunk];
        self.next_chunk = (self.next_chunk + 1) % self.chunk_samples.len();

        let block = self.format.block_size();
        let mut buf = BytesMut::zeroed(samples * block);
        let filled = self.read_full(&mut buf)?;
        if filled < buf.len() {
            self.done = true;
            if filled % block != 0 {
                tracing::warn!(
                    trailing_bytes = filled % block,
                    "raw input ends inside a sample, trailing bytes ignored"
                );
            }
        }

        let whole = filled / block;
        if whole == 0 {
            return Ok(Pull::EndOfStream);
        }
        buf.truncate(whole * block);

        let mut frame = AudioFrame::new(self.format, vec![buf.freeze()], whole, Some(self.next_pts))?;
        frame.time_base = i32::try_from(self.format.sample_rate)
            .ok()
            .map(|rate| Rational::new(1, rate));
        self.next_pts += whole as i64;
        Ok(Pull::Frame(frame))
    }
}

/// Downstream writing frames as interleaved PCM
pub struct RawPcmSink<W> {
    writer: W,
    frames: u64,
}

impl<W: Write> RawPcmSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, frames: 0 }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for RawPcmSink<W> {
    fn on_frame_available(&mut self, frame: AudioFrame) -> Result<()> {
        if frame.format.sample_format.is_planar() {
            self.writer.write_all(&interleave(&frame))?;
        } else {
            self.writer.write_all(frame.plane_data(0))?;
        }
        self.frames += 1;
        tracing::trace!(
            pts = ?frame.pts,
            duration = ?frame.duration,
            samples = frame.samples,
            "raw sink: frame written"
        );
        Ok(())
    }
}

/// Interleave the planes of a planar frame into packed sample order.
pub fn interleave(frame: &AudioFrame) -> Bytes {
    let width = frame.format.sample_format.bytes_per_sample();
    let mut out = BytesMut::with_capacity(frame.samples * width * frame.planes.len());
    for sample in 0..frame.samples {
        let range = sample * width..(sample + 1) * width;
        for plane in &frame.planes {
            out.extend_from_slice(&plane[range.clone()]);
        }
    }
    out.freeze()
}
