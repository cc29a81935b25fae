//! Contains [RenderSink], where displayed frames end up, and its
//! implementations.

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use media::frame::{GeometryError, PixelFormat};
use media::frame_store::FrameHandle;

/// Whatever displays frames read from the
/// [FrameStore](media::frame_store::FrameStore).
pub trait RenderSink {
    /// Display `frame`. Pixels have to be copied out before returning; the
    /// handle shouldn't be kept.
    fn present(&mut self, frame: &FrameHandle) -> Result<(), SinkError>;

    /// Nothing has been published yet. This is never an error.
    fn unavailable(&mut self);

    /// Called once when the viewer shuts down.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Indicates that a sink couldn't display or save a frame.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Only RGB frames can be displayed (got {0:?}).")]
    NotRgb(PixelFormat),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("No frame was ever displayed, so nothing was saved.")]
    NothingPresented,
    #[error("Failed to save the frame: {0}")]
    Image(#[from] image::ImageError),
}

/// A [RenderSink] that keeps a copy of the last frame it was given and saves
/// it as an image when it's [finished](RenderSink::finish).
#[derive(Debug)]
pub struct ImageFileSink {
    path: PathBuf,
    last: Option<RgbImage>,
    last_frame_number: Option<u64>,
}

impl ImageFileSink {
    /// The format is picked from `path`'s extension.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            last: None,
            last_frame_number: None,
        }
    }

    pub fn last_frame_number(&self) -> Option<u64> {
        self.last_frame_number
    }
}

impl RenderSink for ImageFileSink {
    fn present(&mut self, frame: &FrameHandle) -> Result<(), SinkError> {
        if frame.format() != PixelFormat::InterleavedRgb8 {
            return Err(SinkError::NotRgb(frame.format()));
        }

        // Reuse the last copy's memory when the size hasn't changed.
        let (width, height) = (frame.width() as u32, frame.height() as u32);
        let mut image = match self.last.take() {
            Some(image) if image.dimensions() == (width, height) => image,
            _ => RgbImage::new(width, height),
        };

        frame.copy_rows_into(&mut image, frame.width() * 3)?;

        self.last = Some(image);
        self.last_frame_number = Some(frame.frame_number());
        Ok(())
    }

    fn unavailable(&mut self) {}

    fn finish(&mut self) -> Result<(), SinkError> {
        let Some(image) = self.last.as_ref() else {
            return Err(SinkError::NothingPresented);
        };

        util::debug_log_info!("Saving the last frame to `{}`.", self.path.display());
        image.save(&self.path)?;
        Ok(())
    }
}

/// A [RenderSink] that only counts what it's given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullSink {
    pub presented: u64,
    pub unavailable: u64,
    pub last_frame_number: Option<u64>,
}

impl RenderSink for NullSink {
    fn present(&mut self, frame: &FrameHandle) -> Result<(), SinkError> {
        self.presented += 1;
        self.last_frame_number = Some(frame.frame_number());
        Ok(())
    }

    fn unavailable(&mut self) {
        self.unavailable += 1;
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
