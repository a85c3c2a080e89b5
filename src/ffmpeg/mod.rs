//! FFmpeg bridge (feature `ffmpeg`)
//!
//! - FFmpeg initialization and log routing into `tracing`
//! - Conversion between FFmpeg audio frames and [`AudioFrame`](crate::frame::AudioFrame)
//! - A decoder-backed [`FrameSource`](crate::pipeline::FrameSource)

pub mod convert;
pub mod decoder;

pub use convert::{from_ffmpeg, to_ffmpeg};
pub use decoder::DecoderSource;
pub use ffmpeg_next as ffmpeg;

/// Initialize FFmpeg library
///
/// This should be called once at application startup.
/// Returns an error if FFmpeg fails to initialize.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Route FFmpeg's own log output through `tracing`.
///
/// Must be called after `init()` and before any other thread touches FFmpeg,
/// because the log callback is global state.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are called once
    // at startup after `ffmpeg::init()`, before any decoding starts.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages emitted for every seek or pre-roll that carry no information
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Get FFmpeg version information
pub fn version_info() -> String {
    // Return a simple version string since the API changed in FFmpeg 8.0
    "FFmpeg 8.0+".to_string()
}
