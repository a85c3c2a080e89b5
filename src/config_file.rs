//! Configuration file support
//!
//! Loads the command-line tool's configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{PackConfig, DEFAULT_SAMPLES};
use crate::error::{PackError, Result};
use crate::frame::{AudioFormat, ChannelLayout, Rational, SampleFormat};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Packer settings
    pub filter: FilterSettings,
    /// Input settings
    pub input: InputSettings,
    /// Output settings
    pub output: OutputSettings,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Samples per output frame
    pub samples: usize,
    /// Output time base, e.g. "1/48000"
    pub time_base: Option<String>,
    /// Forward input frames unchanged
    pub bypass: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Input file path, "-" for stdin
    pub path: String,
    /// "raw" (interleaved PCM) or "media" (decoded with FFmpeg)
    pub kind: Option<String>,
    /// Sample format of raw input (s16, flt, ...)
    pub sample_format: String,
    /// Channel count of raw input
    pub channels: u16,
    /// Sample rate of raw input
    pub sample_rate: u32,
    /// Sizes of the chunks raw input is read in, cycled
    pub read_samples: Option<Vec<usize>>,
    /// PTS of the first input frame
    pub start_pts: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Output file path, "-" for stdout
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| PackError::ConfigFile(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PackError::ConfigFile(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            filter: FilterSettings {
                samples: DEFAULT_SAMPLES,
                time_base: None,
                bypass: Some(false),
            },
            input: InputSettings {
                path: "-".to_string(),
                kind: Some("raw".to_string()),
                sample_format: "s16".to_string(),
                channels: 2,
                sample_rate: 44100,
                read_samples: Some(vec![1024]),
                start_pts: Some(0),
            },
            output: OutputSettings {
                path: "-".to_string(),
            },
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to PackConfig
    pub fn into_pack_config(&self) -> Result<PackConfig> {
        let time_base = self
            .filter
            .time_base
            .as_deref()
            .map(str::parse::<Rational>)
            .transpose()?;
        let config = PackConfig {
            samples: self.filter.samples,
            time_base,
            bypass: self.filter.bypass.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Format of raw input data
    pub fn input_format(&self) -> Result<AudioFormat> {
        let sample_format: SampleFormat = self.input.sample_format.parse()?;
        if self.input.channels == 0 || self.input.sample_rate == 0 {
            return Err(PackError::Config(
                "input channels and sample rate must be nonzero".to_string(),
            ));
        }
        Ok(AudioFormat::new(
            sample_format,
            ChannelLayout::default_for(self.input.channels),
            self.input.sample_rate,
        ))
    }

    /// Input is a media file to be decoded rather than raw PCM
    pub fn is_media_input(&self) -> bool {
        self.input.kind.as_deref() == Some("media")
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
