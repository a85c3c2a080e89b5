//! In-memory audio frame model
//!
//! Frames cross the pipeline boundary as plain Rust values: a format
//! descriptor, one or more byte planes, a sample count and timing metadata.
//! Plane data is held in `bytes::Bytes` so cloning a frame (e.g. in bypass
//! mode or when a sink keeps a copy) never copies sample data.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// Audio sample formats, packed (interleaved) and planar
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    #[serde(rename = "flt")]
    F32,
    #[serde(rename = "dbl")]
    F64,
    U8P,
    S16P,
    S32P,
    #[serde(rename = "fltp")]
    F32P,
    #[serde(rename = "dblp")]
    F64P,
}

impl SampleFormat {
    /// Size of a single sample of a single channel, in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8P => 1,
            Self::S16 | Self::S16P => 2,
            Self::S32 | Self::S32P | Self::F32 | Self::F32P => 4,
            Self::F64 | Self::F64P => 8,
        }
    }

    /// Returns true if every channel lives in its own plane.
    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8P | Self::S16P | Self::S32P | Self::F32P | Self::F64P
        )
    }

    /// Short name, as used by FFmpeg (`s16`, `fltp`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::U8P => "u8p",
            Self::S16P => "s16p",
            Self::S32P => "s32p",
            Self::F32P => "fltp",
            Self::F64P => "dblp",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.to_ascii_lowercase().as_str() {
            "u8" => Self::U8,
            "s16" => Self::S16,
            "s32" => Self::S32,
            "flt" | "f32" => Self::F32,
            "dbl" | "f64" => Self::F64,
            "u8p" => Self::U8P,
            "s16p" => Self::S16P,
            "s32p" => Self::S32P,
            "fltp" | "f32p" => Self::F32P,
            "dblp" | "f64p" => Self::F64P,
            other => {
                return Err(PackError::Config(format!(
                    "unknown sample format '{}'",
                    other
                )))
            }
        };
        Ok(format)
    }
}

/// Audio channel layout: a channel count plus an optional speaker mask.
///
/// A mask of 0 means the order is unspecified and only the count is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelLayout {
    channels: u16,
    mask: u64,
}

impl ChannelLayout {
    pub const MONO: Self = Self::with_mask(1, 0x4);
    pub const STEREO: Self = Self::with_mask(2, 0x3);
    pub const SURROUND_5_1: Self = Self::with_mask(6, 0x60f);
    pub const SURROUND_7_1: Self = Self::with_mask(8, 0x63f);

    pub const fn with_mask(channels: u16, mask: u64) -> Self {
        Self { channels, mask }
    }

    /// Layout with a known channel count but no speaker assignment.
    pub const fn unspecified(channels: u16) -> Self {
        Self { channels, mask: 0 }
    }

    /// The default layout for a channel count, falling back to unspecified.
    pub const fn default_for(channels: u16) -> Self {
        match channels {
            1 => Self::MONO,
            2 => Self::STEREO,
            6 => Self::SURROUND_5_1,
            8 => Self::SURROUND_7_1,
            n => Self::unspecified(n),
        }
    }

    pub const fn channels(self) -> u16 {
        self.channels
    }

    pub const fn mask(self) -> u64 {
        self.mask
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MONO => f.write_str("mono"),
            Self::STEREO => f.write_str("stereo"),
            Self::SURROUND_5_1 => f.write_str("5.1"),
            Self::SURROUND_7_1 => f.write_str("7.1"),
            _ if self.mask == 0 => write!(f, "{} channels", self.channels),
            _ => write!(f, "{} channels (0x{:x})", self.channels, self.mask),
        }
    }
}

/// A rational number, used for time bases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Both components strictly positive; the only shape usable as a time base.
    pub const fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = PackError;

    /// Parses `"1/48000"` or `"1:48000"`.
    fn from_str(s: &str) -> Result<Self> {
        let (num, den) = s
            .split_once('/')
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| PackError::Config(format!("invalid rational '{}'", s)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| PackError::Config(format!("invalid rational '{}': {}", s, e)))
        };
        Ok(Self::new(parse(num)?, parse(den)?))
    }
}

/// Format descriptor of an audio stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub layout: ChannelLayout,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub const fn new(sample_format: SampleFormat, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            sample_format,
            layout,
            sample_rate,
        }
    }

    pub const fn channels(&self) -> u16 {
        self.layout.channels()
    }

    /// Number of data planes a frame of this format carries.
    pub const fn planes(&self) -> usize {
        if self.sample_format.is_planar() {
            self.layout.channels() as usize
        } else {
            1
        }
    }

    /// Bytes occupied by one sample in one plane.
    pub const fn block_size(&self) -> usize {
        if self.sample_format.is_planar() {
            self.sample_format.bytes_per_sample()
        } else {
            self.sample_format.bytes_per_sample() * self.layout.channels() as usize
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}Hz",
            self.sample_format, self.layout, self.sample_rate
        )
    }
}

/// A chunk of audio samples with its format and timing
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// One plane for packed formats, one per channel for planar formats
    pub planes: Vec<Bytes>,
    /// Number of samples per channel
    pub samples: usize,
    pub format: AudioFormat,
    /// Presentation timestamp in `time_base` units
    pub pts: Option<i64>,
    /// Duration in `time_base` units
    pub duration: Option<i64>,
    pub time_base: Option<Rational>,
}

impl AudioFrame {
    /// Create a frame, checking that the planes hold `samples` samples of `format`.
    pub fn new(
        format: AudioFormat,
        planes: Vec<Bytes>,
        samples: usize,
        pts: Option<i64>,
    ) -> Result<Self> {
        if format.channels() == 0 {
            return Err(PackError::InvalidFrame("frame has zero channels".into()));
        }
        if planes.len() != format.planes() {
            return Err(PackError::InvalidFrame(format!(
                "expected {} planes for {}, got {}",
                format.planes(),
                format,
                planes.len()
            )));
        }
        let plane_bytes = samples * format.block_size();
        if let Some(short) = planes.iter().position(|p| p.len() < plane_bytes) {
            return Err(PackError::InvalidFrame(format!(
                "plane {} holds {} bytes, {} samples need {}",
                short,
                planes[short].len(),
                samples,
                plane_bytes
            )));
        }
        Ok(Self {
            planes,
            samples,
            format,
            pts,
            duration: None,
            time_base: None,
        })
    }

    /// Create a packed frame from interleaved bytes; the sample count is derived from the length.
    pub fn from_interleaved(format: AudioFormat, data: Bytes, pts: Option<i64>) -> Result<Self> {
        if format.sample_format.is_planar() {
            return Err(PackError::InvalidFrame(format!(
                "{} is planar, interleaved data needs a packed format",
                format.sample_format
            )));
        }
        let block = format.block_size();
        if block == 0 || data.len() % block != 0 {
            return Err(PackError::InvalidFrame(format!(
                "{} bytes is not a whole number of {}-byte samples",
                data.len(),
                block
            )));
        }
        let samples = data.len() / block;
        Self::new(format, vec![data], samples, pts)
    }

    /// A zero-filled frame. Used to generate input data; the packer never pads.
    pub fn silence(format: AudioFormat, samples: usize, pts: Option<i64>) -> Self {
        let plane = Bytes::from(vec![0u8; samples * format.block_size()]);
        Self {
            planes: vec![plane; format.planes()],
            samples,
            format,
            pts,
            duration: None,
            time_base: None,
        }
    }

    /// Bytes of one plane that belong to this frame's samples.
    pub fn plane_data(&self, index: usize) -> &[u8] {
        let len = self.samples * self.format.block_size();
        self.planes
            .get(index)
            .map(|p| &p[..len.min(p.len())])
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_packed_vs_planar() {
        let packed = AudioFormat::new(SampleFormat::S16, ChannelLayout::STEREO, 48000);
        let planar = AudioFormat::new(SampleFormat::F32P, ChannelLayout::SURROUND_5_1, 48000);
        assert_eq!(packed.planes(), 1);
        assert_eq!(packed.block_size(), 4);
        assert_eq!(planar.planes(), 6);
        assert_eq!(planar.block_size(), 4);
    }

    #[test]
    fn test_sample_format_from_str() {
        assert_eq!("fltp".parse::<SampleFormat>().unwrap(), SampleFormat::F32P);
        assert_eq!("S16".parse::<SampleFormat>().unwrap(), SampleFormat::S16);
        assert!("s24".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn test_rational_from_str() {
        assert_eq!("1/48000".parse::<Rational>().unwrap(), Rational::new(1, 48000));
        assert_eq!("1:90000".parse::<Rational>().unwrap(), Rational::new(1, 90000));
        assert!("48000".parse::<Rational>().is_err());
        assert!(!Rational::new(0, 1).is_valid());
        assert!(!Rational::new(1, -1).is_valid());
    }

    #[test]
    fn test_layout_equality_includes_mask() {
        assert_ne!(ChannelLayout::STEREO, ChannelLayout::unspecified(2));
        assert_eq!(ChannelLayout::default_for(2), ChannelLayout::STEREO);
        assert_eq!(ChannelLayout::default_for(3).channels(), 3);
    }

    #[test]
    fn test_frame_rejects_short_plane() {
        let format = AudioFormat::new(SampleFormat::S16P, ChannelLayout::STEREO, 48000);
        let planes = vec![Bytes::from(vec![0u8; 8]), Bytes::from(vec![0u8; 6])];
        let err = AudioFrame::new(format, planes, 4, None).unwrap_err();
        assert!(matches!(err, PackError::InvalidFrame(_)));
    }

    #[test]
    fn test_from_interleaved_derives_sample_count() {
        let format = AudioFormat::new(SampleFormat::S16, ChannelLayout::STEREO, 48000);
        let frame = AudioFrame::from_interleaved(format, Bytes::from(vec![1u8; 20]), Some(7)).unwrap();
        assert_eq!(frame.samples, 5);
        assert_eq!(frame.pts, Some(7));
        assert!(AudioFrame::from_interleaved(format, Bytes::from(vec![1u8; 6]), None).is_err());
    }
}
