//! This module declares the [Frame] type, the unit handed from a producer
//! (decoder or camera) to whoever displays it, along with the metadata that
//! travels with it.
//!
//! A [Frame] is validated when it's built and immutable in shape afterwards:
//! its [Dimensions], stride, and [PixelFormat] can never disagree with the
//! length of its pixel buffer.

mod dimensions;

use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convert::{PlanarImage, PlaneRef};

pub use dimensions::*;

/// How the bytes of a [Frame] are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// A full resolution luma (Y) plane followed by two chroma planes (Cb then
    /// Cr) subsampled by 2 in both directions. The chroma planes use half the
    /// luma stride and have `ceil(height / 2)` rows.
    PlanarYuv420,
    /// Three 8-bit channels (red, green, blue) packed per pixel, row-major.
    InterleavedRgb8,
}

impl PixelFormat {
    /// The number of bytes one pixel takes up in a row. For
    /// [PixelFormat::PlanarYuv420] this is the luma plane's.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::PlanarYuv420 => 1,
            Self::InterleavedRgb8 => 3,
        }
    }

    /// The number of visible bytes in a row `width` pixels wide, or [None] if
    /// it would overflow.
    pub const fn row_len(self, width: usize) -> Option<usize> {
        width.checked_mul(self.bytes_per_pixel())
    }

    /// The smallest valid stride for a row `width` pixels wide:
    /// `width * bytes_per_pixel` rounded up to a multiple of 4. [None] is
    /// returned if it would overflow.
    ///
    /// ```
    /// use media::frame::PixelFormat;
    ///
    /// assert_eq!(PixelFormat::InterleavedRgb8.row_stride(5), Some(16));
    /// assert_eq!(PixelFormat::InterleavedRgb8.row_stride(4), Some(12));
    /// assert_eq!(PixelFormat::PlanarYuv420.row_stride(6), Some(8));
    /// assert_eq!(PixelFormat::InterleavedRgb8.row_stride(usize::MAX / 2), None);
    /// ```
    pub const fn row_stride(self, width: usize) -> Option<usize> {
        match self.row_len(width) {
            Some(len) => len.checked_next_multiple_of(STRIDE_ALIGNMENT),
            None => None,
        }
    }

    /// The exact buffer length a frame of this format needs, or [None] if it
    /// would overflow.
    pub const fn buffer_len(self, stride: usize, height: usize) -> Option<usize> {
        let Some(main) = stride.checked_mul(height) else {
            return None;
        };

        match self {
            Self::InterleavedRgb8 => Some(main),
            Self::PlanarYuv420 => {
                let Some(chroma) = (stride / 2).checked_mul(height.div_ceil(2)) else {
                    return None;
                };
                match chroma.checked_mul(2) {
                    Some(chroma) => main.checked_add(chroma),
                    None => None,
                }
            }
        }
    }
}

/// Every [Frame] stride is a multiple of this many bytes.
pub const STRIDE_ALIGNMENT: usize = 4;

/// The outcome of the decode step that produced a [Frame].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecodeStatus {
    #[default]
    Success,
    EndOfStream,
    IoError,
    DecodeFailure,
}

/// Information about a [Frame] assigned by whatever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameMeta {
    /// Sequence number assigned by the producer. It only ever increases for
    /// a given producer.
    pub frame_number: u64,
    /// The producer's sampling rate. Informational only.
    pub fps: f64,
    pub decode_status: DecodeStatus,
}

impl FrameMeta {
    /// Metadata for a successfully decoded frame.
    pub const fn new(frame_number: u64, fps: f64) -> Self {
        Self {
            frame_number,
            fps,
            decode_status: DecodeStatus::Success,
        }
    }
}

/// Everything needed to build a [Frame] with [Frame::new].
#[derive(Clone, PartialEq)]
pub struct FrameParts {
    pub dimensions: Dimensions,
    pub stride: usize,
    pub format: PixelFormat,
    pub meta: FrameMeta,
    pub pixels: Box<[u8]>,
}

/// A single image plus its metadata. See the [module docs](self).
#[derive(Clone, PartialEq)]
pub struct Frame {
    dimensions: Dimensions,
    stride: usize,
    format: PixelFormat,
    meta: FrameMeta,
    pixels: Box<[u8]>,
}

impl Frame {
    /// Builds a frame, checking that the stride and buffer length fit the
    /// dimensions and format.
    pub fn new(parts: FrameParts) -> Result<Self, GeometryError> {
        let FrameParts {
            dimensions,
            stride,
            format,
            meta,
            pixels,
        } = parts;

        if !stride.is_multiple_of(STRIDE_ALIGNMENT) {
            return Err(GeometryError::UnalignedStride { stride });
        }

        let min = format
            .row_len(dimensions.width())
            .ok_or(GeometryError::TooLarge)?;
        if stride < min {
            return Err(GeometryError::StrideTooSmall { stride, min });
        }

        let expected = format
            .buffer_len(stride, dimensions.height())
            .ok_or(GeometryError::TooLarge)?;
        if pixels.len() != expected {
            return Err(GeometryError::WrongBufferLen {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            dimensions,
            stride,
            format,
            meta,
            pixels,
        })
    }

    /// Creates an RGB frame where every pixel is `rgb`.
    pub fn rgb_from_fill(dimensions: Dimensions, rgb: [u8; 3], meta: FrameMeta) -> Self {
        Self::rgb_from_fn(dimensions, meta, |_, _| rgb)
    }

    /// Creates an RGB frame where every pixel is the result of `f`, which is
    /// passed the pixel's row and column. Stride padding is zeroed.
    ///
    /// # Panics
    ///
    /// Like [vec!], this panics if the frame's size in bytes doesn't fit in a
    /// `usize`. Use [Frame::new] for sizes that aren't known to be sane.
    pub fn rgb_from_fn<F>(dimensions: Dimensions, meta: FrameMeta, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> [u8; 3],
    {
        let format = PixelFormat::InterleavedRgb8;
        let (stride, len) = format
            .row_stride(dimensions.width())
            .and_then(|stride| Some((stride, format.buffer_len(stride, dimensions.height())?)))
            .expect("The frame is too large to address.");
        let mut pixels = vec![0; len].into_boxed_slice();

        for (row, row_bytes) in pixels.chunks_exact_mut(stride).enumerate() {
            let visible = &mut row_bytes[..dimensions.width() * 3];
            for (col, pixel) in visible.chunks_exact_mut(3).enumerate() {
                pixel.copy_from_slice(&f(row, col));
            }
        }

        Self {
            dimensions,
            stride,
            format,
            meta,
            pixels,
        }
    }

    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub const fn width(&self) -> usize {
        self.dimensions.width()
    }

    pub const fn height(&self) -> usize {
        self.dimensions.height()
    }

    /// Bytes between the starts of consecutive rows (of the luma plane for
    /// [PixelFormat::PlanarYuv420]).
    pub const fn stride(&self) -> usize {
        self.stride
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    pub const fn meta(&self) -> FrameMeta {
        self.meta
    }

    pub const fn frame_number(&self) -> u64 {
        self.meta.frame_number
    }

    pub const fn fps(&self) -> f64 {
        self.meta.fps
    }

    pub const fn decode_status(&self) -> DecodeStatus {
        self.meta.decode_status
    }

    /// The whole pixel buffer, padding included.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The whole pixel buffer, padding included. The buffer's length can't
    /// change, so the frame stays valid.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Hands the pixel buffer back, consuming the frame.
    pub fn into_pixels(self) -> Box<[u8]> {
        self.pixels
    }

    /// Hands every part back, consuming the frame.
    pub fn into_parts(self) -> FrameParts {
        FrameParts {
            dimensions: self.dimensions,
            stride: self.stride,
            format: self.format,
            meta: self.meta,
            pixels: self.pixels,
        }
    }

    /// The same frame with different metadata.
    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = meta;
        self
    }

    /// The number of visible bytes in each row. Never more than
    /// [Self::stride].
    pub const fn row_len(&self) -> usize {
        // Checked against the stride when the frame was built.
        self.width() * self.format.bytes_per_pixel()
    }

    /// An iterator over the visible bytes of each row (stride padding is cut
    /// off). For [PixelFormat::PlanarYuv420] these are the luma rows.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        let visible = self.row_len();
        self.pixels
            .chunks_exact(self.stride)
            .take(self.height())
            .map(move |row| &row[..visible])
    }

    /// The RGB value at `row` and `col`, or [None] if out of bounds or the
    /// frame isn't [PixelFormat::InterleavedRgb8].
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        if self.format != PixelFormat::InterleavedRgb8
            || row >= self.height()
            || col >= self.width()
        {
            return None;
        }

        let start = row * self.stride + col * 3;
        let bytes = &self.pixels[start..start + 3];
        Some([bytes[0], bytes[1], bytes[2]])
    }

    /// A view of the three planes if this is a [PixelFormat::PlanarYuv420]
    /// frame.
    pub fn as_planar(&self) -> Option<PlanarImage<'_>> {
        if self.format != PixelFormat::PlanarYuv420 {
            return None;
        }

        let luma_len = self.stride * self.height();
        let chroma_stride = self.stride / 2;
        let chroma_len = chroma_stride * self.height().div_ceil(2);

        let (luma, chroma) = self.pixels.split_at(luma_len);
        let (cb, cr) = chroma.split_at(chroma_len);

        // The layout was validated in `Self::new`, so this can't fail.
        PlanarImage::new(
            self.dimensions,
            PlaneRef::new(luma, self.stride),
            PlaneRef::new(cb, chroma_stride),
            PlaneRef::new(cr, chroma_stride),
        )
        .ok()
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("dimensions", &self.dimensions)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("meta", &self.meta)
            .field("pixels", &format_args!("[u8; {}]", self.pixels.len()))
            .finish()
    }
}

/// One of the three planes of a planar YUV image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Luma,
    Cb,
    Cr,
}

impl Display for Plane {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Plane::Luma => "luma (Y)",
            Plane::Cb => "chroma (Cb/U)",
            Plane::Cr => "chroma (Cr/V)",
        })
    }
}

/// Indicates that a width, height, stride, or buffer length don't fit
/// together. Frames with bad geometry are rejected instead of processed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("The stride ({stride} bytes) must be a multiple of {STRIDE_ALIGNMENT}.")]
    UnalignedStride { stride: usize },
    #[error("The stride ({stride} bytes) is smaller than a row ({min} bytes).")]
    StrideTooSmall { stride: usize, min: usize },
    #[error("The pixel buffer should be {expected} bytes long but is {actual} bytes long.")]
    WrongBufferLen { expected: usize, actual: usize },
    #[error("The {plane} plane needs at least {expected} bytes but only has {actual}.")]
    PlaneTooShort {
        plane: Plane,
        expected: usize,
        actual: usize,
    },
    #[error("The {plane} plane's stride ({stride} bytes) is smaller than a row ({min} bytes).")]
    PlaneStrideTooSmall {
        plane: Plane,
        stride: usize,
        min: usize,
    },
    #[error("The frame is too large to address.")]
    TooLarge,
}
