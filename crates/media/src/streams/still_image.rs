//! The module contains [StillImage], a
//! [CaptureProvider](crate::providers::CaptureProvider) that produces the same
//! image over and over again.

use std::path::Path;

use image::{ImageError, RgbImage};

use crate::frame::{Dimensions, Frame, FrameMeta, GeometryError, PixelFormat};
use crate::providers::{CaptureProvider, ProviderError};

/// A [CaptureProvider] that repeats a single image forever, counting frame
/// numbers up like a camera would.
#[derive(Debug, Clone)]
pub struct StillImage {
    frame: Frame,
    fps: f64,
    next_frame_number: u64,
}

impl StillImage {
    /// Load an image from a file. Any format the [image] crate can read with
    /// its default formats enabled works.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        util::debug_log_info!("Loading still image `{}`.", path.display());

        let image = image::open(path).map_err(image_error)?;
        Self::from_rgb(&image.into_rgb8())
    }

    /// Use an already loaded image.
    pub fn from_rgb(image: &RgbImage) -> Result<Self, ProviderError> {
        let dimensions = Dimensions::new(image.width() as usize, image.height() as usize)
            .ok_or("The image has no pixels.")?;

        let format = PixelFormat::InterleavedRgb8;
        format
            .row_stride(dimensions.width())
            .and_then(|stride| format.buffer_len(stride, dimensions.height()))
            .ok_or(GeometryError::TooLarge)?;

        let frame = Frame::rgb_from_fn(dimensions, FrameMeta::default(), |row, col| {
            image.get_pixel(col as u32, row as u32).0
        });

        Ok(Self {
            frame,
            fps: 0.0,
            next_frame_number: 0,
        })
    }

    /// The rate reported in every frame's [FrameMeta::fps].
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        self.frame.dimensions()
    }
}

impl CaptureProvider for StillImage {
    fn capture(&mut self) -> Result<Frame, ProviderError> {
        let meta = FrameMeta::new(self.next_frame_number, self.fps);
        self.next_frame_number += 1;
        Ok(self.frame.clone().with_meta(meta))
    }
}

fn image_error(err: ImageError) -> ProviderError {
    match err {
        ImageError::IoError(err) => ProviderError::Io(err),
        err => ProviderError::Decode(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn repeats_with_increasing_frame_numbers() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8, y as u8, 200]));
        let mut still = StillImage::from_rgb(&image).unwrap().with_fps(10.0);

        let first = still.capture().unwrap();
        let second = still.capture().unwrap();

        assert_eq!(first.frame_number(), 0);
        assert_eq!(second.frame_number(), 1);
        assert_eq!(second.fps(), 10.0);
        assert_eq!(first.pixels(), second.pixels());

        assert_eq!(first.format(), PixelFormat::InterleavedRgb8);
        assert_eq!(first.stride(), 16);
        assert_eq!(first.pixel(2, 4), Some([4, 2, 200]));
    }

    #[test]
    fn reads_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbImage::from_pixel(4, 2, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut still = StillImage::open(&path).unwrap();
        assert_eq!(still.dimensions(), (4, 2).into());
        assert_eq!(still.capture().unwrap().pixel(1, 3), Some([10, 20, 30]));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StillImage::open(dir.path().join("missing.png")),
            Err(ProviderError::Io(_))
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(
            StillImage::open(&path),
            Err(ProviderError::Decode(_))
        ));
    }
}
