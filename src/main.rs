//! asamplepack
//!
//! Reads audio, repackages it into fixed-size frames and writes the result
//! as raw interleaved PCM. Prints a JSON summary of the run on stdout, or on
//! stderr when the samples themselves go to stdout (`[output] path = "-"`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use asamplepack::config_file::{ConfigFile, LoggingSettings};
use asamplepack::pcm::{RawPcmSink, RawPcmSource};
use asamplepack::{FrameSource, PackError, Result, SamplePacker};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "asamplepack";

fn main() {
    if let Err(e) = run() {
        tracing::error!("{}", e);
        eprintln!("{}: {}", APP_NAME, e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Load configuration before logging so the file can pick the log format
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let loaded = if std::path::Path::new(&config_path).exists() {
        Some(ConfigFile::from_file(&config_path))
    } else {
        None
    };
    let logging = match &loaded {
        Some(Ok(cf)) => cf.logging.clone(),
        _ => None,
    };
    init_logging(logging.as_ref());

    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    let config = match loaded {
        Some(Ok(cf)) => cf,
        Some(Err(e)) => {
            tracing::warn!(
                "Failed to load config file {}: {}. Using defaults.",
                config_path,
                e
            );
            ConfigFile::default_config()
        }
        None => ConfigFile::default_config(),
    };
    tracing::info!("Configuration loaded: {:?}", config);

    let mut pack_config = config.into_pack_config()?;
    let mut source = open_source(&config, &mut pack_config)?;
    let mut packer = SamplePacker::new(pack_config)?;

    let writer: Box<dyn Write> = if config.output.path == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(File::create(&config.output.path)?)
    };
    let mut sink = RawPcmSink::new(BufWriter::new(writer));

    let stats = packer.run_to_end(source.as_mut(), &mut sink)?;
    sink.flush()?;

    tracing::info!(
        output_frames = stats.output_frames,
        discarded_samples = stats.discarded_samples,
        "{} done",
        APP_NAME
    );

    let summary = serde_json::to_string_pretty(&stats)
        .map_err(|e| PackError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    if config.output.path == "-" {
        eprintln!("{}", summary);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

/// Open the configured upstream.
///
/// Decoded media carries timestamps in the container's time base; unless a
/// time base was configured, output timestamps use the same one.
#[cfg_attr(not(feature = "ffmpeg"), allow(unused_variables))]
fn open_source(
    config: &ConfigFile,
    pack_config: &mut asamplepack::PackConfig,
) -> Result<Box<dyn FrameSource>> {
    if config.is_media_input() {
        #[cfg(feature = "ffmpeg")]
        {
            asamplepack::ffmpeg::init()?;
            asamplepack::ffmpeg::install_log_filter();
            tracing::info!("FFmpeg version: {}", asamplepack::ffmpeg::version_info());

            let source = asamplepack::ffmpeg::DecoderSource::open(&config.input.path)?;
            pack_config.time_base.get_or_insert(source.time_base());
            return Ok(Box::new(source));
        }
        #[cfg(not(feature = "ffmpeg"))]
        return Err(PackError::Config(
            "media input requires the `ffmpeg` feature".to_string(),
        ));
    }

    let reader: Box<dyn Read> = if config.input.path == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(&config.input.path)?)
    };
    let chunks = config
        .input
        .read_samples
        .clone()
        .unwrap_or_else(|| vec![1024]);
    let source = RawPcmSource::new(BufReader::new(reader), config.input_format()?, chunks)?
        .with_start_pts(config.input.start_pts.unwrap_or(0));
    Ok(Box::new(source))
}

/// Initialize logging with tracing
fn init_logging(settings: Option<&LoggingSettings>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        settings
            .map(|s| format!("{}={}", APP_NAME, s.level))
            .unwrap_or_else(|| format!("{}=info", APP_NAME))
            .into()
    });

    let json = settings.and_then(|s| s.format.as_deref()) == Some("json");
    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}
