//! Packer configuration

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};
use crate::frame::Rational;

/// Default samples per output frame: 40 ms at 44.1 kHz, one PAL video frame
pub const DEFAULT_SAMPLES: usize = 1764;

/// Configuration of one packer instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Number of samples in every emitted frame
    pub samples: usize,

    /// Time base of output timestamps; `None` uses 1/sample_rate of the stream
    pub time_base: Option<Rational>,

    /// Forward input frames unchanged
    pub bypass: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            time_base: None,
            bypass: false,
        }
    }
}

impl PackConfig {
    pub fn new(samples: usize, time_base: Option<Rational>) -> Self {
        Self {
            samples,
            time_base,
            ..Default::default()
        }
    }

    /// Reject values that would make the packer unusable or divide by zero.
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(PackError::Config(
                "samples per frame must be positive".to_string(),
            ));
        }
        if i32::try_from(self.samples).is_err() {
            return Err(PackError::Config(format!(
                "samples per frame {} exceeds {}",
                self.samples,
                i32::MAX
            )));
        }
        if let Some(tb) = self.time_base {
            if !tb.is_valid() {
                return Err(PackError::Config(format!(
                    "time base {} must have positive numerator and denominator",
                    tb
                )));
            }
        }
        Ok(())
    }
}
