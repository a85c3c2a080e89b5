//! Output timestamp tracking
//!
//! Output PTS are derived from the number of samples emitted so far, never
//! copied from input frames: input and output frame boundaries do not line
//! up, and counting samples keeps output timestamps gap-free.

use crate::error::{PackError, Result};
use crate::frame::Rational;

/// Converts emitted sample counts into time-base units
#[derive(Debug, Clone)]
pub struct TimestampTracker {
    time_base: Rational,
    sample_rate: u32,
    origin: Option<i64>,
    emitted_samples: u64,
}

impl TimestampTracker {
    /// Both `time_base` components and `sample_rate` must be nonzero.
    pub fn new(time_base: Rational, sample_rate: u32) -> Result<Self> {
        if !time_base.is_valid() {
            return Err(PackError::Config(format!(
                "time base {} must have positive numerator and denominator",
                time_base
            )));
        }
        if sample_rate == 0 {
            return Err(PackError::Config("sample rate must be nonzero".into()));
        }
        Ok(Self {
            time_base,
            sample_rate,
            origin: None,
            emitted_samples: 0,
        })
    }

    /// Record the origin timestamp. Only the first call has any effect.
    pub fn on_first_frame(&mut self, observed_pts: i64) {
        if self.origin.is_none() {
            self.origin = Some(observed_pts);
        }
    }

    /// PTS of the next frame to be emitted.
    pub fn compute_output_timestamp(&self) -> Result<i64> {
        let offset = self.samples_to_ticks(self.emitted_samples)?;
        self.origin
            .unwrap_or(0)
            .checked_add(offset)
            .ok_or_else(|| {
                PackError::InvalidTimestamp(format!(
                    "origin {:?} + {} overflows",
                    self.origin, offset
                ))
            })
    }

    /// Length of `sample_count` samples in time-base units.
    pub fn compute_duration(&self, sample_count: usize) -> Result<i64> {
        self.samples_to_ticks(sample_count as u64)
    }

    /// Account for an emission. Call after the emission's timestamp was computed.
    pub fn advance(&mut self, sample_count: usize) {
        self.emitted_samples += sample_count as u64;
    }

    pub fn emitted_samples(&self) -> u64 {
        self.emitted_samples
    }

    pub fn origin(&self) -> Option<i64> {
        self.origin
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    // samples * den / (num * rate), widened so large counts cannot overflow midway
    fn samples_to_ticks(&self, samples: u64) -> Result<i64> {
        let ticks = samples as i128 * self.time_base.den as i128
            / (self.time_base.num as i128 * self.sample_rate as i128);
        i64::try_from(ticks).map_err(|_| {
            PackError::InvalidTimestamp(format!(
                "{} samples at {}Hz do not fit time base {}",
                samples, self.sample_rate, self.time_base
            ))
        })
    }
}
