//! The built-in [DecodeProvider](crate::providers::DecodeProvider)s and
//! [CaptureProvider](crate::providers::CaptureProvider)s.

#[cfg(feature = "ffmpeg")]
mod ffmpeg_tools;
#[cfg(feature = "ffmpeg")]
mod h264;
mod still_image;
mod test_pattern;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_tools::H264Error;
#[cfg(feature = "ffmpeg")]
pub use h264::*;
pub use still_image::*;
pub use test_pattern::*;
