//! Sample FIFO
//!
//! Byte-exact first-in-first-out store for multi-channel sample data. Each
//! plane of the stream format gets its own queue, so packed and planar data
//! keep their layout untouched: bytes appended are the bytes consumed.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{PackError, Result};
use crate::frame::{AudioFormat, AudioFrame};

/// Per-plane byte queues holding samples that have not been emitted yet
#[derive(Debug)]
pub struct SampleFifo {
    format: AudioFormat,
    planes: Vec<VecDeque<u8>>,
    /// Bytes per sample in each plane
    block_size: usize,
    samples: usize,
}

impl SampleFifo {
    /// Allocate a FIFO for `format` with room for `capacity_hint` samples.
    ///
    /// The hint only sizes the initial allocation; the FIFO grows as needed.
    pub fn new(format: AudioFormat, capacity_hint: usize) -> Result<Self> {
        let block_size = format.block_size();
        if block_size == 0 {
            return Err(PackError::InvalidFrame(format!(
                "cannot buffer samples of {}",
                format
            )));
        }

        let mut planes = Vec::with_capacity(format.planes());
        for _ in 0..format.planes() {
            let mut plane = VecDeque::new();
            reserve(&mut plane, capacity_hint * block_size)?;
            planes.push(plane);
        }

        Ok(Self {
            format,
            planes,
            block_size,
            samples: 0,
        })
    }

    /// Copy all samples of `frame` to the tail of the FIFO.
    pub fn append(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.format.planes() != self.planes.len()
            || frame.format.block_size() != self.block_size
        {
            return Err(PackError::FormatMismatch {
                expected: self.format,
                actual: frame.format,
            });
        }
        if frame.planes.len() != self.planes.len() {
            return Err(PackError::InvalidFrame(format!(
                "expected {} planes, got {}",
                self.planes.len(),
                frame.planes.len()
            )));
        }

        let bytes = frame.samples * self.block_size;
        for (index, src) in frame.planes.iter().enumerate() {
            if src.len() < bytes {
                return Err(PackError::InvalidFrame(format!(
                    "plane {} holds {} bytes, {} samples need {}",
                    index,
                    src.len(),
                    frame.samples,
                    bytes
                )));
            }
        }

        // Reserve everything first so a failed allocation leaves planes in step
        let capacity = self.capacity_samples();
        for plane in &mut self.planes {
            reserve(plane, bytes)?;
        }
        if self.capacity_samples() > capacity {
            tracing::debug!(
                from = capacity,
                to = self.capacity_samples(),
                buffered = self.samples + frame.samples,
                "sample fifo: grew"
            );
        }
        for (plane, src) in self.planes.iter_mut().zip(&frame.planes) {
            plane.extend(&src[..bytes]);
        }
        self.samples += frame.samples;

        debug_assert!(self
            .planes
            .iter()
            .all(|p| p.len() == self.samples * self.block_size));
        Ok(())
    }

    /// Number of samples (per channel) currently buffered.
    pub fn available_samples(&self) -> usize {
        self.samples
    }

    /// Copy the first `n` samples, one `Bytes` per plane, leaving them buffered.
    pub fn peek(&self, n: usize) -> Result<Vec<Bytes>> {
        self.check_available(n)?;
        let bytes = n * self.block_size;
        Ok(self
            .planes
            .iter()
            .map(|plane| Bytes::from(plane.range(..bytes).copied().collect::<Vec<u8>>()))
            .collect())
    }

    /// Drop the first `n` samples.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.check_available(n)?;
        let bytes = n * self.block_size;
        for plane in &mut self.planes {
            plane.drain(..bytes);
        }
        self.samples -= n;
        Ok(())
    }

    /// Remove exactly `n` samples from the head of the FIFO, one `Bytes` per plane.
    pub fn consume(&mut self, n: usize) -> Result<Vec<Bytes>> {
        let out = self.peek(n)?;
        self.skip(n)?;
        Ok(out)
    }

    fn check_available(&self, n: usize) -> Result<()> {
        if n > self.samples {
            return Err(PackError::InsufficientData {
                requested: n,
                available: self.samples,
            });
        }
        Ok(())
    }

    /// Drop everything buffered; returns the number of samples dropped.
    pub fn clear(&mut self) -> usize {
        for plane in &mut self.planes {
            plane.clear();
        }
        std::mem::take(&mut self.samples)
    }

    /// Samples that fit without reallocating.
    pub fn capacity_samples(&self) -> usize {
        self.planes
            .iter()
            .map(|p| p.capacity() / self.block_size)
            .min()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }
}

fn reserve(plane: &mut VecDeque<u8>, additional: usize) -> Result<()> {
    plane
        .try_reserve(additional)
        .map_err(|_| PackError::Allocation {
            requested: additional,
        })
}
