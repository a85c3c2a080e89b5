//! Decoder-backed upstream
//!
//! Opens a media file, decodes its best audio stream and hands out the
//! decoded PCM frames one pull at a time.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, PackError, Result};
use crate::frame::Rational;
use crate::pipeline::{FrameSource, Pull};

use super::convert::from_ffmpeg;

/// Upstream that decodes audio from a media file
pub struct DecoderSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
    time_base: Rational,
    eof_sent: bool,
    finished: bool,
}

impl DecoderSource {
    /// Open `path` and a decoder for its best audio stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input = ffmpeg::format::input(path).map_err(|e| {
            FfmpegError::OpenInput(format!("failed to open {:?}: {}", path, e))
        })?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .ok_or_else(|| FfmpegError::NoAudioStream(format!("{:?}", path)))?;
        let stream_index = stream.index();
        let tb = stream.time_base();
        let time_base = Rational::new(tb.numerator(), tb.denominator());

        let context = ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "failed to create codec context for stream {}: {}",
                stream_index, e
            ))
        })?;
        let decoder = context.decoder().audio().map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        tracing::debug!(
            stream_index,
            time_base = %time_base,
            sample_rate = decoder.rate(),
            "decoder source: opened {:?}",
            path
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            eof_sent: false,
            finished: false,
        })
    }

    /// Time base of the decoded stream's timestamps.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn receive_frame(&mut self) -> Result<Option<ffmpeg::frame::Audio>> {
        let mut frame = ffmpeg::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => Err(PackError::Ffmpeg(FfmpegError::ReadFrame(format!(
                "receive_frame error on stream {}: {}",
                self.stream_index, e
            )))),
        }
    }

    /// Feed the decoder one packet of our stream, or EOF once the file is exhausted.
    fn feed(&mut self) -> Result<()> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() != self.stream_index => continue,
                Ok(()) => {
                    return match self.decoder.send_packet(&packet) {
                        Ok(()) => Ok(()),
                        // Pre-roll packets after a seek; skip and keep going
                        Err(ffmpeg::Error::InvalidData) => {
                            tracing::debug!(
                                stream_index = self.stream_index,
                                "decoder source: skipping invalid packet"
                            );
                            Ok(())
                        }
                        Err(e) => Err(PackError::Ffmpeg(FfmpegError::DecodePacket(format!(
                            "send_packet error on stream {}: {}",
                            self.stream_index, e
                        )))),
                    };
                }
                Err(ffmpeg::Error::Eof) => {
                    self.eof_sent = true;
                    return match self.decoder.send_eof() {
                        Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
                        Err(e) => Err(PackError::Ffmpeg(FfmpegError::DecodePacket(format!(
                            "send_eof error on stream {}: {}",
                            self.stream_index, e
                        )))),
                    };
                }
                Err(e) => {
                    return Err(PackError::Ffmpeg(FfmpegError::ReadFrame(format!(
                        "read error: {}",
                        e
                    ))))
                }
            }
        }
    }
}

impl FrameSource for DecoderSource {
    fn pull_frame(&mut self) -> Result<Pull> {
        while !self.finished {
            if let Some(frame) = self.receive_frame()? {
                return Ok(Pull::Frame(from_ffmpeg(&frame, Some(self.time_base))?));
            }
            if self.finished {
                break;
            }
            if self.eof_sent {
                // Drained decoder answering EAGAIN after EOF
                self.finished = true;
                break;
            }
            self.feed()?;
        }
        Ok(Pull::EndOfStream)
    }
}
