//! Contains [ViewerError], everything that can stop the viewer.

use std::io;

use thiserror::Error;

use media::frame::GeometryError;
use media::providers::ProviderError;
use util::saved_file::SavedFileError;

use crate::sink::SinkError;

/// Indicates that the viewer couldn't start or finish.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Failed to open the source: {0}")]
    Source(#[from] ProviderError),
    #[error("Can't make a test pattern that size: {0}")]
    PatternSize(#[source] GeometryError),
    #[error("The `image` and `video` sources need an `--input` file.")]
    MissingInput,
    #[error("The `video` source needs the viewer to be built with the `ffmpeg` feature.")]
    VideoUnsupported,
    #[error("Failed to read the settings file: {0}")]
    Settings(#[source] SavedFileError),
    #[error("Failed to read the detections file: {0}")]
    Detections(#[source] SavedFileError),
    #[error("Failed to read the class names file: {0}")]
    ClassNames(#[source] io::Error),
    #[error("Failed to enable stop signal polling: {0}")]
    StopSignals(#[source] io::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
}
