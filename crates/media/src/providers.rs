//! The traits implemented by whatever produces [Frame]s (decoders and
//! cameras) or looks at them (detectors). The built-in implementations live
//! in [crate::streams].

use std::error::Error;
use std::io;

use crate::convert::{ColorRange, PlanarImage};
use crate::frame::{DecodeStatus, Frame, FrameMeta, GeometryError};
use crate::overlay::RawDetection;

/// Something that decodes frames into planar YUV 4:2:0 (e.g. a video file).
/// Its output still has to go through [crate::convert] before it can be
/// displayed.
pub trait DecodeProvider: Send {
    /// Try to get the next frame.
    ///
    /// [Decoded::Pending] means nothing is ready yet and the caller should
    /// poll again later. [ProviderError::EndOfStream] means nothing will be
    /// ready until after [DecodeProvider::start_over] is called.
    ///
    /// The returned planes borrow from the provider, so they have to be
    /// converted (or copied) before polling again.
    fn poll_frame(&mut self) -> Result<Decoded<'_>, ProviderError>;

    /// The intended playback rate, if the provider knows it. This may only
    /// become known after a few frames have been decoded.
    fn fps(&self) -> Option<f64> {
        None
    }

    /// Start over from the beginning. Live sources can do nothing.
    fn start_over(&mut self) -> Result<(), ProviderError>;
}

/// What [DecodeProvider::poll_frame] produced.
#[derive(Debug)]
pub enum Decoded<'a> {
    Frame {
        image: PlanarImage<'a>,
        meta: FrameMeta,
        range: ColorRange,
    },
    Pending,
}

/// Something that produces frames that are already interleaved RGB (e.g. a
/// camera). Its frames skip the converter.
pub trait CaptureProvider: Send {
    /// Capture the next frame. The frame must be
    /// [PixelFormat::InterleavedRgb8](crate::frame::PixelFormat::InterleavedRgb8).
    fn capture(&mut self) -> Result<Frame, ProviderError>;
}

/// Something that finds objects in frames.
pub trait DetectionProvider: Send {
    /// The detections found in `frame`, in normalized coordinates. The
    /// confidence threshold is applied by the caller.
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection>;
}

impl<T: DecodeProvider + ?Sized> DecodeProvider for Box<T> {
    fn poll_frame(&mut self) -> Result<Decoded<'_>, ProviderError> {
        (**self).poll_frame()
    }

    fn fps(&self) -> Option<f64> {
        (**self).fps()
    }

    fn start_over(&mut self) -> Result<(), ProviderError> {
        (**self).start_over()
    }
}

impl<T: CaptureProvider + ?Sized> CaptureProvider for Box<T> {
    fn capture(&mut self) -> Result<Frame, ProviderError> {
        (**self).capture()
    }
}

impl<T: DetectionProvider + ?Sized> DetectionProvider for Box<T> {
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection> {
        (**self).detect(frame)
    }
}

/// Indicates that a provider couldn't produce a frame.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("The stream ended.")]
    EndOfStream,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Decode(Box<dyn Error + Send + Sync>),
}

impl ProviderError {
    /// The [DecodeStatus] this error is reported as.
    pub fn decode_status(&self) -> DecodeStatus {
        match self {
            Self::EndOfStream => DecodeStatus::EndOfStream,
            Self::Io(_) => DecodeStatus::IoError,
            Self::Decode(_) => DecodeStatus::DecodeFailure,
        }
    }
}

/// Implementing this trait allows an error type to be converted to a
/// [ProviderError::Decode] variant automatically (using the `?` operator).
pub(crate) trait IntoDecodeError: Error + Send + Sync {}

impl<E: IntoDecodeError + 'static> From<E> for ProviderError {
    fn from(err: E) -> Self {
        ProviderError::Decode(Box::from(err))
    }
}

impl IntoDecodeError for GeometryError {}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{0}")]
struct StaticStrError(&'static str);

impl From<&'static str> for ProviderError {
    fn from(str: &'static str) -> Self {
        ProviderError::Decode(Box::from(StaticStrError(str)))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
struct OwnedStringError(String);

impl From<String> for ProviderError {
    fn from(str: String) -> Self {
        ProviderError::Decode(Box::from(OwnedStringError(str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            ProviderError::EndOfStream.decode_status(),
            DecodeStatus::EndOfStream
        );
        assert_eq!(
            ProviderError::from(io::Error::other("gone")).decode_status(),
            DecodeStatus::IoError
        );
        assert_eq!(
            ProviderError::from("bad packet").decode_status(),
            DecodeStatus::DecodeFailure
        );
    }

    #[test]
    fn messages_pass_through() {
        assert_eq!(
            ProviderError::from(format!("frame {} is corrupt", 3)).to_string(),
            "frame 3 is corrupt"
        );
    }
}
