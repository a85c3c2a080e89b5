//! Conversion between FFmpeg audio frames and [`AudioFrame`]

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout as FfmpegChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

use crate::error::{FfmpegError, PackError, Result};
use crate::frame::{AudioFormat, AudioFrame, ChannelLayout, Rational, SampleFormat};

/// Map an FFmpeg sample format onto ours.
pub fn sample_format_from_ffmpeg(sample: Sample) -> Result<SampleFormat> {
    let format = match sample {
        Sample::U8(Type::Packed) => SampleFormat::U8,
        Sample::I16(Type::Packed) => SampleFormat::S16,
        Sample::I32(Type::Packed) => SampleFormat::S32,
        Sample::F32(Type::Packed) => SampleFormat::F32,
        Sample::F64(Type::Packed) => SampleFormat::F64,
        Sample::U8(Type::Planar) => SampleFormat::U8P,
        Sample::I16(Type::Planar) => SampleFormat::S16P,
        Sample::I32(Type::Planar) => SampleFormat::S32P,
        Sample::F32(Type::Planar) => SampleFormat::F32P,
        Sample::F64(Type::Planar) => SampleFormat::F64P,
        other => {
            return Err(PackError::Ffmpeg(FfmpegError::UnsupportedFormat(format!(
                "{:?}",
                other
            ))))
        }
    };
    Ok(format)
}

/// Map our sample format onto FFmpeg's.
pub fn sample_format_to_ffmpeg(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::U8 => Sample::U8(Type::Packed),
        SampleFormat::S16 => Sample::I16(Type::Packed),
        SampleFormat::S32 => Sample::I32(Type::Packed),
        SampleFormat::F32 => Sample::F32(Type::Packed),
        SampleFormat::F64 => Sample::F64(Type::Packed),
        SampleFormat::U8P => Sample::U8(Type::Planar),
        SampleFormat::S16P => Sample::I16(Type::Planar),
        SampleFormat::S32P => Sample::I32(Type::Planar),
        SampleFormat::F32P => Sample::F32(Type::Planar),
        SampleFormat::F64P => Sample::F64(Type::Planar),
    }
}

fn layout_to_ffmpeg(layout: ChannelLayout) -> FfmpegChannelLayout {
    if layout.mask() == 0 {
        FfmpegChannelLayout::default(layout.channels() as i32)
    } else {
        FfmpegChannelLayout::from_bits_truncate(layout.mask())
    }
}

/// Copy a decoded FFmpeg frame into an [`AudioFrame`].
pub fn from_ffmpeg(frame: &ffmpeg::frame::Audio, time_base: Option<Rational>) -> Result<AudioFrame> {
    let sample_format = sample_format_from_ffmpeg(frame.format())?;
    let channels = frame.channels() as u16;
    let mask = frame.channel_layout().bits();
    let layout = if mask == 0 {
        ChannelLayout::unspecified(channels)
    } else {
        ChannelLayout::with_mask(channels, mask)
    };
    let format = AudioFormat::new(sample_format, layout, frame.rate());

    let len = frame.samples() * format.block_size();
    let planes = (0..format.planes())
        .map(|index| {
            plane(frame, index, len).map(Bytes::copy_from_slice).ok_or_else(|| {
                PackError::Ffmpeg(FfmpegError::ReadFrame(format!(
                    "frame is missing data plane {}",
                    index
                )))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = AudioFrame::new(format, planes, frame.samples(), frame.pts())?;
    out.time_base = time_base;
    Ok(out)
}

/// Copy an [`AudioFrame`] into a newly allocated FFmpeg frame.
pub fn to_ffmpeg(frame: &AudioFrame) -> Result<ffmpeg::frame::Audio> {
    let mut out = ffmpeg::frame::Audio::new(
        sample_format_to_ffmpeg(frame.format.sample_format),
        frame.samples,
        layout_to_ffmpeg(frame.format.layout),
    );
    out.set_rate(frame.format.sample_rate);
    out.set_pts(frame.pts);

    let len = frame.samples * frame.format.block_size();
    for index in 0..frame.format.planes() {
        let dst = plane_mut(&mut out, index, len).ok_or_else(|| {
            PackError::Ffmpeg(FfmpegError::ReadFrame(format!(
                "allocated frame is missing data plane {}",
                index
            )))
        })?;
        dst.copy_from_slice(frame.plane_data(index));
    }
    Ok(out)
}

// `Audio::data(index)` stops counting planes when `linesize[1] == 0`, which
// FFmpeg leaves unset for planar audio; read `extended_data` directly.
fn plane(frame: &ffmpeg::frame::Audio, index: usize, len: usize) -> Option<&[u8]> {
    // SAFETY: `as_ptr` is valid for the lifetime of `frame`; `extended_data`
    // holds one pointer per plane, each at least `linesize[0]` bytes long.
    unsafe {
        let f = frame.as_ptr();
        if index >= frame.planes() || len > (*f).linesize[0] as usize {
            return None;
        }
        let ptrs = (*f).extended_data;
        if ptrs.is_null() || (*ptrs.add(index)).is_null() {
            return None;
        }
        Some(std::slice::from_raw_parts(*ptrs.add(index), len))
    }
}

fn plane_mut(frame: &mut ffmpeg::frame::Audio, index: usize, len: usize) -> Option<&mut [u8]> {
    let planes = frame.planes();
    // SAFETY: as for `plane`, with exclusive access through `&mut frame`.
    unsafe {
        let f = frame.as_mut_ptr();
        if index >= planes || len > (*f).linesize[0] as usize {
            return None;
        }
        let ptrs = (*f).extended_data;
        if ptrs.is_null() || (*ptrs.add(index)).is_null() {
            return None;
        }
        Some(std::slice::from_raw_parts_mut(*ptrs.add(index), len))
    }
}
