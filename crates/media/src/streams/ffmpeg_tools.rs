//! This module contains some useful tools for
//! [DecodeProvider](crate::providers::DecodeProvider)s based on FFmpeg.

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

use ctor::ctor;

use ffmpeg::format::Pixel as FFmpegPixelFormat;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg::software::scaling::Context as FFmpegScalingContext;
use ffmpeg::software::scaling::flag::Flags as FFmpegScalingFlags;
use ffmpeg::util::color::Range as FFmpegColorRange;
use ffmpeg_next as ffmpeg;

use crate::convert::{ColorRange, PlanarImage, PlaneRef};
use crate::frame::{Dimensions, GeometryError};
use crate::providers::IntoDecodeError;

/// Whether frames in `format` can be handed to the converter as they are.
fn is_planar_420(format: FFmpegPixelFormat) -> bool {
    matches!(
        format,
        FFmpegPixelFormat::YUV420P | FFmpegPixelFormat::YUVJ420P
    )
}

/// Used to normalize [FFmpegVideoFrame]s ([ffmpeg::frame::Video]) to planar
/// YUV 4:2:0. Frames that already are pass through untouched.
pub struct FrameNormalizer(Option<(FFmpegScalingContext, FFmpegVideoFrame)>);

impl FrameNormalizer {
    /// Create a new normalizer for frames of `format` and `dimensions`.
    pub fn new(format: FFmpegPixelFormat, dimensions: Dimensions) -> Result<Self, H264Error> {
        if is_planar_420(format) {
            return Ok(Self(None));
        }

        let (width, height) = side_lengths(dimensions)?;

        let scaler = FFmpegScalingContext::get(
            // Src. format:
            format,
            width,
            height,
            // Dest. format:
            FFmpegPixelFormat::YUV420P,
            width,
            height,
            // Extra options (we don't need any special behavior).
            FFmpegScalingFlags::empty(),
        )
        .map_err(|_| H264Error::ScalerCreateFailure)?;

        Ok(Self(Some((scaler, FFmpegVideoFrame::empty()))))
    }

    /// Normalizes `decoded` if it has to be, returning whichever frame holds
    /// the planar result.
    pub fn normalize<'a>(
        &'a mut self,
        decoded: &'a FFmpegVideoFrame,
    ) -> Result<&'a FFmpegVideoFrame, H264Error> {
        match self.0.as_mut() {
            None => Ok(decoded),
            Some((scaler, normalized)) => {
                scaler
                    .run(decoded, normalized)
                    .map_err(|_| H264Error::ScaleFailure)?;
                Ok(normalized)
            }
        }
    }
}

/// SAFETY: The [ffmpeg::software::scaling::Context] type (aliased
/// [FFmpegScalingContext] here) which we're storing in our [FrameNormalizer]
/// struct *is* safe to send between threads. It just isn't marked [Send] by
/// the FFmpeg bindings.
unsafe impl Send for FrameNormalizer {}

/// Borrows the three planes of a planar YUV 4:2:0 `frame`.
pub fn planar_image(
    frame: &FFmpegVideoFrame,
    dimensions: Dimensions,
) -> Result<PlanarImage<'_>, GeometryError> {
    PlanarImage::new(
        dimensions,
        PlaneRef::new(frame.data(0), frame.stride(0)),
        PlaneRef::new(frame.data(1), frame.stride(1)),
        PlaneRef::new(frame.data(2), frame.stride(2)),
    )
}

/// The [ColorRange] of a decoded frame. Anything not explicitly full range is
/// treated as limited, which is what H.264 streams use unless told otherwise.
pub fn color_range(frame: &FFmpegVideoFrame) -> ColorRange {
    if frame.color_range() == FFmpegColorRange::JPEG
        || frame.format() == FFmpegPixelFormat::YUVJ420P
    {
        ColorRange::Full
    } else {
        ColorRange::Limited
    }
}

/// The dimensions of a decoded frame.
pub fn frame_dimensions(frame: &FFmpegVideoFrame) -> Result<Dimensions, H264Error> {
    Dimensions::new(frame.width() as usize, frame.height() as usize)
        .ok_or(H264Error::ZeroLengthSide(frame.width(), frame.height()))
}

fn side_lengths(dimensions: Dimensions) -> Result<(u32, u32), H264Error> {
    let width = u32::try_from(dimensions.width()).map_err(|_| H264Error::TooLarge(dimensions))?;
    let height =
        u32::try_from(dimensions.height()).map_err(|_| H264Error::TooLarge(dimensions))?;
    Ok((width, height))
}

/// Indicates that something went wrong decoding a video file.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum H264Error {
    #[error(
        "The video stream shouldn't have dimensions with a 0-length side \
        ({0}x{1} has no area)."
    )]
    ZeroLengthSide(u32, u32),
    #[error("The video stream's dimensions ({0}) are too large.")]
    TooLarge(Dimensions),
    #[error(
        "The video stream's frame dimensions cannot change \
        (Expected {expected} but got {actual})."
    )]
    DimensionsChanged {
        expected: Dimensions,
        actual: Dimensions,
    },
    #[error("Failed to get an input's context.")]
    NoInputContext,
    #[error("Failed to find an ideal video stream.")]
    NoBestVideoStream,
    #[error("Failed to create a decoder.")]
    DecoderCreateFailure,
    #[error("Failed to create a frame scaler.")]
    ScalerCreateFailure,
    #[error("Failed to scale (reformat) a frame.")]
    ScaleFailure,
    #[error(transparent)]
    BadPlanes(#[from] GeometryError),
}

impl IntoDecodeError for H264Error {}

impl IntoDecodeError for ffmpeg::Error {}

/// Initializes FFmpeg. This happens when the [crate] is loaded.
///
/// You should never actually call this function.
#[ctor]
fn ffmpeg_init() {
    #[cfg(debug_assertions)]
    {
        static ALREADY_INIT: AtomicBool = AtomicBool::new(false);
        assert!(
            !ALREADY_INIT.swap(true, Ordering::SeqCst),
            "Tried to initialize FFmpeg twice. \
            THIS WOULD NOT HAVE BEEN CAUGHT IN A RELEASE BUILD."
        );
    }

    ffmpeg::init().expect("FFmpeg shouldn't fail to initialize.");
}
