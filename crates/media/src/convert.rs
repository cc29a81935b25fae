//! Pixel format conversion from planar YUV 4:2:0 to interleaved 8-bit RGB.
//!
//! Conversion works on 2x2 blocks of luma samples that share one Cb and one
//! Cr sample. Only the even-sized region of the image is converted; a
//! trailing odd row or column is left black in the output.
//!
//! The math is fixed-point: every coefficient of the ITU-R BT.601 YCbCr to
//! RGB matrix is scaled by 2^16, multiplied in integer space, and shifted back
//! down. Every channel is clamped to `[0, 255]` before it's stored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Dimensions, Frame, FrameMeta, FrameParts, GeometryError, PixelFormat, Plane};

/// The number of fractional bits in the fixed-point coefficients.
pub const FIXED_POINT_BITS: u32 = 16;

const fn fixed(coefficient: f64) -> i32 {
    (coefficient * (1 << FIXED_POINT_BITS) as f64) as i32
}

// Full swing (JPEG) BT.601.
const K1: i32 = fixed(1.402);
const K2: i32 = fixed(0.714);
const K3: i32 = fixed(0.334);
const K4: i32 = fixed(1.772);

// Studio swing BT.601 (luma in [16, 235], chroma in [16, 240]).
const LIMITED_LUMA: i32 = fixed(1.164);
const LIMITED_K1: i32 = fixed(1.596);
const LIMITED_K2: i32 = fixed(0.813);
const LIMITED_K3: i32 = fixed(0.391);
const LIMITED_K4: i32 = fixed(2.018);
const LIMITED_LUMA_OFFSET: i32 = 16;
const ROUNDING: i32 = 1 << (FIXED_POINT_BITS - 1);

/// Which YCbCr value range the input uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRange {
    /// Luma and chroma use all of `[0, 255]` (JPEG style). Each chroma term
    /// is shifted down on its own, so results are floored per term.
    #[default]
    Full,
    /// Luma uses `[16, 235]` and chroma `[16, 240]` (broadcast/H.264 style).
    /// Luma is expanded to full swing and the sum is rounded once.
    Limited,
}

impl ColorRange {
    /// The chroma contribution to each of R, G, and B, shared by the four luma
    /// samples of a 2x2 block.
    #[inline(always)]
    fn chroma_terms(self, cb: u8, cr: u8) -> [i32; 3] {
        let uf = i32::from(cb) - 128;
        let vf = i32::from(cr) - 128;

        match self {
            Self::Full => [
                (K1 * vf) >> FIXED_POINT_BITS,
                -((K2 * vf) >> FIXED_POINT_BITS) - ((K3 * uf) >> FIXED_POINT_BITS),
                (K4 * uf) >> FIXED_POINT_BITS,
            ],
            Self::Limited => [
                LIMITED_K1 * vf,
                -LIMITED_K2 * vf - LIMITED_K3 * uf,
                LIMITED_K4 * uf,
            ],
        }
    }

    #[inline(always)]
    fn to_rgb(self, luma: u8, chroma: [i32; 3]) -> [u8; 3] {
        match self {
            Self::Full => {
                let y = i32::from(luma);
                chroma.map(|c| saturate(y + c))
            }
            Self::Limited => {
                let y = (i32::from(luma) - LIMITED_LUMA_OFFSET) * LIMITED_LUMA + ROUNDING;
                chroma.map(|c| saturate((y + c) >> FIXED_POINT_BITS))
            }
        }
    }
}

#[inline(always)]
fn saturate(channel: i32) -> u8 {
    channel.clamp(0, 255) as u8
}

/// A borrowed plane of 8-bit samples with its own row stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> PlaneRef<'a> {
    pub const fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Checks that `rows` rows of `row_len` samples can be read.
    fn check(&self, plane: Plane, row_len: usize, rows: usize) -> Result<(), GeometryError> {
        if rows == 0 || row_len == 0 {
            return Ok(());
        }

        if self.stride < row_len {
            return Err(GeometryError::PlaneStrideTooSmall {
                plane,
                stride: self.stride,
                min: row_len,
            });
        }

        let expected = (rows - 1)
            .checked_mul(self.stride)
            .and_then(|len| len.checked_add(row_len))
            .ok_or(GeometryError::TooLarge)?;

        if self.data.len() < expected {
            return Err(GeometryError::PlaneTooShort {
                plane,
                expected,
                actual: self.data.len(),
            });
        }

        Ok(())
    }

    fn row(&self, row: usize, len: usize) -> &'a [u8] {
        &self.data[row * self.stride..][..len]
    }
}

/// A borrowed planar YUV 4:2:0 image: a full resolution luma plane and two
/// chroma planes at half resolution, each with an independent stride.
///
/// Construction checks that every plane is long enough for the region the
/// converter reads, so converting can never read out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanarImage<'a> {
    dimensions: Dimensions,
    luma: PlaneRef<'a>,
    cb: PlaneRef<'a>,
    cr: PlaneRef<'a>,
}

impl<'a> PlanarImage<'a> {
    pub fn new(
        dimensions: Dimensions,
        luma: PlaneRef<'a>,
        cb: PlaneRef<'a>,
        cr: PlaneRef<'a>,
    ) -> Result<Self, GeometryError> {
        let (width, height) = dimensions.even_floor();

        luma.check(Plane::Luma, width, height)?;
        cb.check(Plane::Cb, width / 2, height / 2)?;
        cr.check(Plane::Cr, width / 2, height / 2)?;

        Ok(Self {
            dimensions,
            luma,
            cb,
            cr,
        })
    }

    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub const fn luma(&self) -> PlaneRef<'a> {
        self.luma
    }

    pub const fn cb(&self) -> PlaneRef<'a> {
        self.cb
    }

    pub const fn cr(&self) -> PlaneRef<'a> {
        self.cr
    }
}

/// Indicates that a conversion couldn't be done. Neither case is fatal: the
/// caller should drop the frame and try again with the next one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertError {
    #[error("Could not allocate {bytes} bytes for the converted frame.")]
    AllocationFailure { bytes: usize },
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
}

/// Converts `image` into a newly allocated interleaved RGB buffer of
/// `output_stride * height` bytes, handing ownership to the caller.
///
/// `output_stride` is in bytes and must be at least `width * 3`. Bytes that
/// aren't written (stride padding, an odd trailing row or column) are `0`.
///
/// ```
/// use media::convert::{self, ColorRange, PlanarImage, PlaneRef};
///
/// let (y, u, v) = ([128u8; 4], [128u8; 1], [128u8; 1]);
/// let image = PlanarImage::new(
///     (2, 2).into(),
///     PlaneRef::new(&y, 2),
///     PlaneRef::new(&u, 1),
///     PlaneRef::new(&v, 1),
/// )
/// .unwrap();
///
/// let rgb = convert::yuv420_to_rgb(&image, ColorRange::Full, 8).unwrap();
/// assert_eq!(rgb.len(), 16);
/// assert_eq!(&rgb[..6], &[128; 6]);
/// ```
pub fn yuv420_to_rgb(
    image: &PlanarImage<'_>,
    range: ColorRange,
    output_stride: usize,
) -> Result<Box<[u8]>, ConvertError> {
    let dimensions = image.dimensions();

    let min = PixelFormat::InterleavedRgb8
        .row_len(dimensions.width())
        .ok_or(GeometryError::TooLarge)?;
    if output_stride < min {
        return Err(GeometryError::StrideTooSmall {
            stride: output_stride,
            min,
        }
        .into());
    }

    let len = output_stride
        .checked_mul(dimensions.height())
        .ok_or(GeometryError::TooLarge)?;

    let mut rgb = allocate_zeroed(len)?;
    convert_into(image, range, &mut rgb, output_stride);
    Ok(rgb)
}

/// Converts `image` into a validated [PixelFormat::InterleavedRgb8] [Frame]
/// with the smallest aligned stride.
pub fn convert_to_frame(
    image: &PlanarImage<'_>,
    range: ColorRange,
    meta: FrameMeta,
) -> Result<Frame, ConvertError> {
    let dimensions = image.dimensions();
    let stride = PixelFormat::InterleavedRgb8
        .row_stride(dimensions.width())
        .ok_or(GeometryError::TooLarge)?;
    let pixels = yuv420_to_rgb(image, range, stride)?;

    Frame::new(FrameParts {
        dimensions,
        stride,
        format: PixelFormat::InterleavedRgb8,
        meta,
        pixels,
    })
    .map_err(Into::into)
}

/// Makes sure a frame is displayable, converting it if it's planar. RGB frames
/// are returned untouched.
pub fn into_displayable(frame: Frame, range: ColorRange) -> Result<Frame, ConvertError> {
    match frame.as_planar() {
        Some(planar) => convert_to_frame(&planar, range, frame.meta()),
        None => Ok(frame),
    }
}

fn allocate_zeroed(len: usize) -> Result<Box<[u8]>, ConvertError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| ConvertError::AllocationFailure { bytes: len })?;
    buffer.resize(len, 0);
    Ok(buffer.into_boxed_slice())
}

/// The conversion itself. `out` must hold `output_stride * height` bytes and
/// `image` must have been validated (which [PlanarImage::new] guarantees).
fn convert_into(image: &PlanarImage<'_>, range: ColorRange, out: &mut [u8], output_stride: usize) {
    let (width, height) = image.dimensions().even_floor();
    if width == 0 || height == 0 {
        return;
    }

    let (luma, cb, cr) = (image.luma(), image.cb(), image.cr());

    for (pair, out_rows) in out
        .chunks_exact_mut(output_stride * 2)
        .take(height / 2)
        .enumerate()
    {
        let y = pair * 2;
        let luma_top = luma.row(y, width);
        let luma_bottom = luma.row(y + 1, width);
        let cb_row = cb.row(pair, width / 2);
        let cr_row = cr.row(pair, width / 2);

        let (out_top, out_bottom) = out_rows.split_at_mut(output_stride);
        let out_top = out_top[..width * 3].chunks_exact_mut(6);
        let out_bottom = out_bottom[..width * 3].chunks_exact_mut(6);

        let blocks = luma_top
            .chunks_exact(2)
            .zip(luma_bottom.chunks_exact(2))
            .zip(cb_row.iter().zip(cr_row))
            .zip(out_top.zip(out_bottom));

        for (((top, bottom), (&u, &v)), (out_top, out_bottom)) in blocks {
            let chroma = range.chroma_terms(u, v);

            out_top[..3].copy_from_slice(&range.to_rgb(top[0], chroma));
            out_top[3..].copy_from_slice(&range.to_rgb(top[1], chroma));
            out_bottom[..3].copy_from_slice(&range.to_rgb(bottom[0], chroma));
            out_bottom[3..].copy_from_slice(&range.to_rgb(bottom[1], chroma));
        }
    }
}
