//! Test fixtures
//!
//! Generates input frames whose bytes encode their position in the stream,
//! so any loss, duplication or reordering shows up in a byte comparison.

use bytes::Bytes;

use crate::frame::{AudioFormat, AudioFrame, ChannelLayout, SampleFormat};

pub fn stereo_s16_48k() -> AudioFormat {
    AudioFormat::new(SampleFormat::S16, ChannelLayout::STEREO, 48000)
}

pub fn stereo_fltp_48k() -> AudioFormat {
    AudioFormat::new(SampleFormat::F32P, ChannelLayout::STEREO, 48000)
}

/// Byte `i` of plane `plane` for the sample at absolute position `sample`.
fn pattern(plane: usize, sample: usize, byte: usize) -> u8 {
    (sample.wrapping_mul(31) ^ plane.wrapping_mul(101) ^ byte.wrapping_mul(7)) as u8
}

/// One frame of `samples` samples starting at absolute sample `start`.
pub fn patterned_frame(format: AudioFormat, start: usize, samples: usize, pts: i64) -> AudioFrame {
    let block = format.block_size();
    let planes = (0..format.planes())
        .map(|plane| {
            let data: Vec<u8> = (start..start + samples)
                .flat_map(|s| (0..block).map(move |b| pattern(plane, s, b)))
                .collect();
            Bytes::from(data)
        })
        .collect();
    AudioFrame::new(format, planes, samples, Some(pts)).unwrap()
}

/// Consecutive frames with the given sizes; PTS counts samples from `origin`.
pub fn chunked_stream(format: AudioFormat, sizes: &[usize], origin: i64) -> Vec<AudioFrame> {
    let mut start = 0;
    sizes
        .iter()
        .map(|&size| {
            let frame = patterned_frame(format, start, size, origin + start as i64);
            start += size;
            frame
        })
        .collect()
}

/// Concatenate the bytes of every frame, plane by plane.
pub fn concat_planes(frames: &[AudioFrame]) -> Vec<Vec<u8>> {
    let planes = frames.first().map(|f| f.format.planes()).unwrap_or(0);
    (0..planes)
        .map(|plane| {
            frames
                .iter()
                .flat_map(|f| f.plane_data(plane).iter().copied())
                .collect()
        })
        .collect()
}
