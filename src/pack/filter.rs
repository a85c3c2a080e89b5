//! Sample packer control loop
//!
//! Every frame delivered by upstream is appended to the FIFO; while the FIFO
//! holds at least `samples` samples, exactly that many are sliced off,
//! stamped and forwarded downstream. Bursty input that covers several output
//! frames is emitted in full before control returns. At end of stream the
//! partial remainder is dropped: output frames are never short and never
//! padded.

use serde::Serialize;

use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::frame::{AudioFormat, AudioFrame, Rational};
use crate::pipeline::{FrameSink, FrameSource, Pull};

use super::fifo::SampleFifo;
use super::timestamp::TimestampTracker;

/// The FIFO is pre-sized to this many output frames
const FIFO_FRAMES_HINT: usize = 4;

/// Consecutive not-ready answers tolerated by [`SamplePacker::run_to_end`]
const MAX_NOT_READY: usize = 64;

/// Where the packer stands between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackState {
    /// Fewer than `samples` samples buffered
    AwaitingInput,
    /// A full output frame is buffered and being emitted
    ReadyToEmit,
    /// Upstream is exhausted; the remainder is being flushed
    Draining,
    /// End of stream reached; no further output
    Terminated,
}

/// Outcome of one [`SamplePacker::request_frame`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStatus {
    /// This many frames were forwarded downstream
    Emitted(usize),
    /// Upstream has nothing yet; retry later
    NotReady,
    /// No more output will be produced
    EndOfStream,
}

/// Counters over the lifetime of one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PackStats {
    pub input_frames: u64,
    pub input_samples: u64,
    pub output_frames: u64,
    pub output_samples: u64,
    /// Samples left over at end of stream that did not fill an output frame
    pub discarded_samples: u64,
}

impl PackStats {
    /// Samples accepted but not yet emitted or discarded.
    pub fn pending_samples(&self) -> u64 {
        self.input_samples - self.output_samples - self.discarded_samples
    }
}

/// State resolved from the first input frame
#[derive(Debug)]
struct StreamState {
    format: AudioFormat,
    fifo: SampleFifo,
    timestamps: TimestampTracker,
}

impl StreamState {
    fn open(config: &PackConfig, first: &AudioFrame) -> Result<Self> {
        let format = first.format;
        let time_base = match config.time_base {
            Some(tb) => tb,
            None => {
                let rate = i32::try_from(format.sample_rate).map_err(|_| {
                    PackError::Config(format!("sample rate {} out of range", format.sample_rate))
                })?;
                Rational::new(1, rate)
            }
        };

        let mut timestamps = TimestampTracker::new(time_base, format.sample_rate)?;
        let origin = first.pts.unwrap_or_else(|| {
            tracing::warn!("first frame has no pts, output timestamps start at 0");
            0
        });
        timestamps.on_first_frame(origin);

        let fifo = SampleFifo::new(format, FIFO_FRAMES_HINT * config.samples)?;

        tracing::debug!(
            format = %format,
            time_base = %time_base,
            origin,
            samples = config.samples,
            "sample packer: stream format captured from first frame"
        );

        Ok(Self {
            format,
            fifo,
            timestamps,
        })
    }

    /// Build the next output frame, if enough samples are buffered.
    ///
    /// Nothing is removed from the FIFO and the timestamp tracker does not
    /// move until [`StreamState::commit_frame`] runs, so a frame the sink
    /// refused is still buffered for the next attempt.
    fn peek_frame(&self, samples: usize) -> Result<Option<AudioFrame>> {
        if self.fifo.available_samples() < samples {
            return Ok(None);
        }

        let pts = self.timestamps.compute_output_timestamp()?;
        let duration = self.timestamps.compute_duration(samples)?;
        let planes = self.fifo.peek(samples)?;
        debug_assert_eq!(planes.len(), self.format.planes());

        tracing::trace!(
            pts,
            duration,
            buffered = self.fifo.available_samples() - samples,
            "sample packer: emitting frame"
        );

        Ok(Some(AudioFrame {
            planes,
            samples,
            format: self.format,
            pts: Some(pts),
            duration: Some(duration),
            time_base: Some(self.timestamps.time_base()),
        }))
    }

    /// The sink accepted the frame built by `peek_frame`.
    fn commit_frame(&mut self, samples: usize) -> Result<()> {
        self.fifo.skip(samples)?;
        self.timestamps.advance(samples);
        Ok(())
    }
}

/// Forward every full frame in the FIFO to `sink`; returns the number forwarded.
fn emit_full_frames<S>(
    stream: &mut StreamState,
    samples: usize,
    state: &mut PackState,
    stats: &mut PackStats,
    sink: &mut S,
) -> Result<usize>
where
    S: FrameSink + ?Sized,
{
    let mut emitted = 0;
    while let Some(out) = stream.peek_frame(samples)? {
        if *state != PackState::Draining {
            *state = PackState::ReadyToEmit;
        }
        sink.on_frame_available(out)?;
        stream.commit_frame(samples)?;
        stats.output_frames += 1;
        stats.output_samples += samples as u64;
        emitted += 1;
    }
    Ok(emitted)
}

/// Repackages audio frames of arbitrary size into frames of a fixed size
#[derive(Debug)]
pub struct SamplePacker {
    config: PackConfig,
    stream: Option<StreamState>,
    state: PackState,
    stats: PackStats,
}

impl SamplePacker {
    /// Create a packer; invalid configuration is rejected here, before any frame.
    pub fn new(config: PackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stream: None,
            state: PackState::AwaitingInput,
            stats: PackStats::default(),
        })
    }

    /// Upstream delivered a frame. Returns the number of frames forwarded downstream.
    pub fn filter_frame<S>(&mut self, frame: AudioFrame, sink: &mut S) -> Result<usize>
    where
        S: FrameSink + ?Sized,
    {
        if self.state == PackState::Terminated {
            tracing::warn!(
                samples = frame.samples,
                "sample packer: frame after end of stream dropped"
            );
            self.stats.input_frames += 1;
            self.stats.input_samples += frame.samples as u64;
            self.stats.discarded_samples += frame.samples as u64;
            return Ok(0);
        }

        if self.config.bypass {
            if self.stats.input_frames == 0 {
                tracing::debug!("sample packer: bypass enabled, forwarding frames unchanged");
            }
            let samples = frame.samples as u64;
            self.stats.input_frames += 1;
            self.stats.input_samples += samples;
            sink.on_frame_available(frame)?;
            self.stats.output_frames += 1;
            self.stats.output_samples += samples;
            return Ok(1);
        }

        let stream = match self.stream {
            Some(ref mut stream) => {
                if frame.format != stream.format {
                    return Err(PackError::FormatMismatch {
                        expected: stream.format,
                        actual: frame.format,
                    });
                }
                stream
            }
            None => self.stream.insert(StreamState::open(&self.config, &frame)?),
        };

        stream.fifo.append(&frame)?;
        self.stats.input_frames += 1;
        self.stats.input_samples += frame.samples as u64;

        let emitted = emit_full_frames(
            stream,
            self.config.samples,
            &mut self.state,
            &mut self.stats,
            sink,
        )?;
        self.state = PackState::AwaitingInput;

        Ok(emitted)
    }

    /// Downstream asks for output.
    ///
    /// Pulls from upstream until at least one frame was emitted, upstream is
    /// not ready, or upstream ended. Never blocks.
    pub fn request_frame<U, S>(&mut self, source: &mut U, sink: &mut S) -> Result<PackStatus>
    where
        U: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        if self.state == PackState::Terminated {
            return Ok(PackStatus::EndOfStream);
        }

        loop {
            match source.pull_frame()? {
                Pull::Frame(frame) => {
                    let emitted = self.filter_frame(frame, sink)?;
                    if emitted > 0 {
                        return Ok(PackStatus::Emitted(emitted));
                    }
                }
                Pull::NotReady => return Ok(PackStatus::NotReady),
                Pull::EndOfStream => {
                    return Ok(match self.finish(sink)? {
                        0 => PackStatus::EndOfStream,
                        emitted => PackStatus::Emitted(emitted),
                    });
                }
            }
        }
    }

    /// Upstream is exhausted: emit the full frames still buffered, drop the
    /// partial remainder and terminate.
    ///
    /// Returns the number of frames emitted while draining. If the sink fails
    /// the packer stays `Draining` with the unsent frames buffered, and
    /// `finish` can be called again. Once terminated it is a no-op.
    pub fn finish<S>(&mut self, sink: &mut S) -> Result<usize>
    where
        S: FrameSink + ?Sized,
    {
        if self.state == PackState::Terminated {
            return Ok(0);
        }
        self.state = PackState::Draining;

        let mut emitted = 0;
        let mut discarded = 0;
        if let Some(stream) = self.stream.as_mut() {
            emitted = emit_full_frames(
                stream,
                self.config.samples,
                &mut self.state,
                &mut self.stats,
                sink,
            )?;
            discarded = stream.fifo.clear();
        }
        if discarded > 0 {
            tracing::warn!(
                discarded,
                samples = self.config.samples,
                "sample packer: end of stream with partial frame, remainder dropped"
            );
        }
        self.stats.discarded_samples += discarded as u64;

        tracing::debug!(
            input_frames = self.stats.input_frames,
            output_frames = self.stats.output_frames,
            discarded,
            "sample packer: stream terminated"
        );
        self.state = PackState::Terminated;
        Ok(emitted)
    }

    /// Drive the packer until upstream ends.
    ///
    /// For upstream nodes that only rarely answer not-ready; gives up with
    /// [`PackError::UpstreamStalled`] after a run of not-ready answers.
    pub fn run_to_end<U, S>(&mut self, source: &mut U, sink: &mut S) -> Result<PackStats>
    where
        U: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut not_ready = 0;
        loop {
            match self.request_frame(source, sink)? {
                PackStatus::Emitted(_) => not_ready = 0,
                PackStatus::NotReady => {
                    not_ready += 1;
                    if not_ready >= MAX_NOT_READY {
                        return Err(PackError::UpstreamStalled(not_ready));
                    }
                }
                PackStatus::EndOfStream => return Ok(self.stats),
            }
        }
    }

    /// Samples buffered and waiting for the next emission.
    pub fn available_samples(&self) -> usize {
        self.stream
            .as_ref()
            .map(|stream| stream.fifo.available_samples())
            .unwrap_or(0)
    }

    /// Format captured from the first frame, once one arrived.
    pub fn format(&self) -> Option<&AudioFormat> {
        self.stream.as_ref().map(|stream| &stream.format)
    }

    pub fn state(&self) -> PackState {
        self.state
    }

    pub fn stats(&self) -> PackStats {
        self.stats
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ChannelLayout, SampleFormat};
    use crate::pipeline::FrameQueue;

    fn mono_u8() -> AudioFormat {
        AudioFormat::new(SampleFormat::U8, ChannelLayout::MONO, 8000)
    }

    fn frame(data: &[u8], pts: i64) -> AudioFrame {
        AudioFrame::from_interleaved(mono_u8(), bytes::Bytes::copy_from_slice(data), Some(pts))
            .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = PackConfig::new(4, Some(Rational::new(0, 1)));
        assert!(matches!(
            SamplePacker::new(config),
            Err(PackError::Config(_))
        ));
    }

    #[test]
    fn test_below_target_emits_nothing() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        assert_eq!(packer.filter_frame(frame(&[1, 2, 3], 0), &mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(packer.available_samples(), 3);
        assert_eq!(packer.state(), PackState::AwaitingInput);
    }

    #[test]
    fn test_burst_emits_every_full_frame() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        let data: Vec<u8> = (0..10).collect();
        assert_eq!(packer.filter_frame(frame(&data, 100), &mut out).unwrap(), 2);
        assert_eq!(out[0].pts, Some(100));
        assert_eq!(out[1].pts, Some(104));
        assert_eq!(&out[1].planes[0][..], &[4, 5, 6, 7]);
        assert_eq!(packer.available_samples(), 2);
    }

    #[test]
    fn test_format_mismatch_rejected() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        packer.filter_frame(frame(&[1], 0), &mut out).unwrap();

        let stereo = AudioFormat::new(SampleFormat::U8, ChannelLayout::STEREO, 8000);
        let err = packer
            .filter_frame(AudioFrame::silence(stereo, 4, Some(1)), &mut out)
            .unwrap_err();
        assert!(matches!(err, PackError::FormatMismatch { .. }));
        // The rejected frame left the buffer untouched
        assert_eq!(packer.available_samples(), 1);
    }

    #[test]
    fn test_sample_rate_change_is_a_mismatch() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        packer.filter_frame(frame(&[1], 0), &mut out).unwrap();
        let resampled = AudioFormat::new(SampleFormat::U8, ChannelLayout::MONO, 16000);
        assert!(packer
            .filter_frame(AudioFrame::silence(resampled, 1, None), &mut out)
            .is_err());
    }

    #[test]
    fn test_bypass_forwards_unchanged() {
        let config = PackConfig {
            bypass: true,
            ..PackConfig::new(4, None)
        };
        let mut packer = SamplePacker::new(config).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        let input = frame(&[1, 2, 3], 42);
        packer.filter_frame(input.clone(), &mut out).unwrap();
        assert_eq!(out, vec![input]);
        assert_eq!(packer.available_samples(), 0);
        assert!(packer.format().is_none());
    }

    #[test]
    fn test_request_frame_not_ready_then_emits() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut queue = FrameQueue::new();
        let mut out: Vec<AudioFrame> = Vec::new();

        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::NotReady
        );

        queue.push(frame(&[1, 2], 0));
        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::NotReady
        );

        queue.push(frame(&[3, 4, 5], 2));
        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::Emitted(1)
        );
        assert_eq!(&out[0].planes[0][..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_end_of_stream_drops_remainder() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut queue: FrameQueue = vec![frame(&[1, 2, 3, 4, 5, 6], 0)].into_iter().collect();
        let mut out: Vec<AudioFrame> = Vec::new();

        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::Emitted(1)
        );
        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::EndOfStream
        );
        assert_eq!(packer.state(), PackState::Terminated);
        assert_eq!(out.len(), 1);

        let stats = packer.stats();
        assert_eq!(stats.discarded_samples, 2);
        assert_eq!(stats.pending_samples(), 0);

        // Terminated packers do not touch upstream again
        queue.push(frame(&[7, 8, 9, 10], 6));
        assert_eq!(
            packer.request_frame(&mut queue, &mut out).unwrap(),
            PackStatus::EndOfStream
        );
        assert_eq!(queue.len(), 1);
    }

    /// Sink that refuses the first `failures` frames, then collects.
    struct FlakySink {
        failures: usize,
        frames: Vec<AudioFrame>,
    }

    impl FrameSink for FlakySink {
        fn on_frame_available(&mut self, frame: AudioFrame) -> Result<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(PackError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "downstream closed",
                )));
            }
            self.frames.push(frame);
            Ok(())
        }
    }

    #[test]
    fn test_refused_frame_stays_buffered() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut sink = FlakySink {
            failures: 1,
            frames: Vec::new(),
        };

        let err = packer
            .filter_frame(frame(&[1, 2, 3, 4, 5, 6, 7, 8], 100), &mut sink)
            .unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
        assert_eq!(packer.available_samples(), 8);
        let stats = packer.stats();
        assert_eq!(stats.input_samples, 8);
        assert_eq!(stats.output_frames, 0);
        assert_eq!(stats.output_samples, 0);
        assert_eq!(stats.pending_samples(), 8);

        // Draining delivers the buffered full frames, nothing is discarded
        assert_eq!(packer.finish(&mut sink).unwrap(), 2);
        assert_eq!(packer.state(), PackState::Terminated);
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(&sink.frames[0].planes[0][..], &[1, 2, 3, 4]);
        assert_eq!(&sink.frames[1].planes[0][..], &[5, 6, 7, 8]);
        assert_eq!(sink.frames[0].pts, Some(100));
        assert_eq!(sink.frames[1].pts, Some(104));

        let stats = packer.stats();
        assert_eq!(stats.output_frames, 2);
        assert_eq!(stats.output_samples, 8);
        assert_eq!(stats.discarded_samples, 0);
        assert_eq!(stats.pending_samples(), 0);
    }

    #[test]
    fn test_finish_retries_after_sink_error() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        packer.filter_frame(frame(&[1, 2, 3], 0), &mut out).unwrap();

        let mut sink = FlakySink {
            failures: 2,
            frames: Vec::new(),
        };
        assert!(packer.filter_frame(frame(&[4, 5, 6], 3), &mut sink).is_err());
        assert_eq!(packer.available_samples(), 6);

        assert!(packer.finish(&mut sink).is_err());
        assert_eq!(packer.state(), PackState::Draining);
        assert_eq!(packer.available_samples(), 6);

        assert_eq!(packer.finish(&mut sink).unwrap(), 1);
        assert_eq!(&sink.frames[0].planes[0][..], &[1, 2, 3, 4]);
        assert_eq!(sink.frames[0].pts, Some(0));
        let stats = packer.stats();
        assert_eq!(stats.output_samples, 4);
        assert_eq!(stats.discarded_samples, 2);
        assert_eq!(stats.pending_samples(), 0);

        // Terminated: a second finish emits nothing
        assert_eq!(packer.finish(&mut sink).unwrap(), 0);
    }

    #[test]
    fn test_bypass_counts_only_delivered_frames() {
        let config = PackConfig {
            bypass: true,
            ..PackConfig::new(4, None)
        };
        let mut packer = SamplePacker::new(config).unwrap();
        let mut sink = FlakySink {
            failures: 1,
            frames: Vec::new(),
        };
        assert!(packer.filter_frame(frame(&[1, 2, 3], 0), &mut sink).is_err());
        packer.filter_frame(frame(&[4, 5], 3), &mut sink).unwrap();

        let stats = packer.stats();
        assert_eq!(stats.input_frames, 2);
        assert_eq!(stats.output_frames, 1);
        assert_eq!(stats.output_samples, 2);
    }

    #[test]
    fn test_run_to_end_gives_up_on_stalled_upstream() {
        let mut packer = SamplePacker::new(PackConfig::new(4, None)).unwrap();
        let mut queue = FrameQueue::new();
        let mut out: Vec<AudioFrame> = Vec::new();
        let err = packer.run_to_end(&mut queue, &mut out).unwrap_err();
        assert!(matches!(err, PackError::UpstreamStalled(_)));
    }

    #[test]
    fn test_missing_origin_pts_starts_at_zero() {
        let mut packer = SamplePacker::new(PackConfig::new(2, None)).unwrap();
        let mut out: Vec<AudioFrame> = Vec::new();
        let input = AudioFrame::from_interleaved(mono_u8(), bytes::Bytes::from_static(&[1, 2]), None)
            .unwrap();
        packer.filter_frame(input, &mut out).unwrap();
        assert_eq!(out[0].pts, Some(0));
        assert_eq!(out[0].duration, Some(2));
        assert_eq!(out[0].time_base, Some(Rational::new(1, 8000)));
    }
}
