//! Contains [Args], which are parsed command-line flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use media::convert::ColorRange;
use media::frame::Dimensions;

/// Parsed command line arguments.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    about = "Plays frames from a source through the frame store and saves the last one displayed."
)]
pub struct Args {
    /// Where frames come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Pattern)]
    pub source: SourceKind,

    /// The file to read for the `image` and `video` sources.
    #[arg(long, required_if_eq_any([("source", "image"), ("source", "video")]))]
    pub input: Option<PathBuf>,

    /// The size of the test pattern.
    #[arg(long, default_value = "640x480")]
    pub size: Dimensions,

    /// Produce at most this many frames per second (overrides the settings
    /// file). Without a rate the source's own is used, if it has one.
    #[arg(long)]
    pub fps: Option<f64>,

    /// Stop after this many frames have been published (0 runs until the
    /// source ends or a stop signal is received).
    #[arg(long, default_value_t = 30)]
    pub frames: u64,

    /// Where to save the last displayed frame (as a PNG).
    #[arg(long, default_value = "frame.png")]
    pub output: PathBuf,

    /// Play frames without saving anything.
    #[arg(long, conflicts_with = "output")]
    pub dry_run: bool,

    /// A JSON settings file, created with defaults if it doesn't exist.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Force the YCbCr range used for conversion (overrides the settings file
    /// and the source).
    #[arg(long, value_enum)]
    pub color_range: Option<ColorRangeArg>,

    /// A JSON file of detections to draw over frames.
    #[arg(long)]
    pub detections: Option<PathBuf>,

    /// A text file with one detection class label per line.
    #[arg(long, requires = "detections")]
    pub class_names: Option<PathBuf>,

    #[cfg(debug_assertions)]
    /// Disable debug logging. This option only exists if `debug_assertions` are
    /// enabled.
    #[arg(long)]
    pub no_debug_logging: bool,

    #[cfg(debug_assertions)]
    /// Enable debug error log panics. This option only exists if
    /// `debug_assertions` are enabled.
    #[arg(long, conflicts_with = "no_debug_logging")]
    pub debug_error_log_panics: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self::parse()
    }
}

/// Where frames come from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Synthetic colour bars (decode path).
    Pattern,
    /// A still image repeated forever (capture path).
    Image,
    /// A video file (decode path, needs the `ffmpeg` feature).
    Video,
}

/// The YCbCr range used for conversion.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRangeArg {
    Full,
    Limited,
}

impl From<ColorRangeArg> for ColorRange {
    fn from(arg: ColorRangeArg) -> Self {
        match arg {
            ColorRangeArg::Full => ColorRange::Full,
            ColorRangeArg::Limited => ColorRange::Limited,
        }
    }
}
