//! The module contains [H264File], a
//! [DecodeProvider](crate::providers::DecodeProvider) that decodes a video
//! file (H.264 or anything else FFmpeg reads) to planar YUV 4:2:0.

use std::path::Path;

use ffmpeg::codec::Context as FFmpegCodecContext;
use ffmpeg::codec::decoder::Video as FFmpegVideoDecoder;
use ffmpeg::format::context::Input as FFmpegInputFormatContext;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg::media::Type as FFmpegMediaType;
use ffmpeg_next as ffmpeg;

use super::ffmpeg_tools::{self, FrameNormalizer, H264Error};
use crate::frame::{Dimensions, FrameMeta};
use crate::providers::{DecodeProvider, Decoded, ProviderError};

/// A [DecodeProvider] that decodes a video file with FFmpeg.
pub struct H264File {
    input_context: FFmpegInputFormatContext,
    decoder: FFmpegVideoDecoder,
    normalizer: FrameNormalizer,
    decoded: FFmpegVideoFrame,
    video_stream_index: usize,
    dimensions: Dimensions,
    fps: Option<f64>,
    next_frame_number: u64,
    stream_over: bool,
}

impl H264File {
    /// Open a video file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, H264Error> {
        Self::open_impl(path.as_ref())
    }

    fn open_impl(path: &Path) -> Result<Self, H264Error> {
        util::debug_log_info!("Opening video file `{}`.", path.display());

        // Only the container's metadata is read here, none of the actual
        // video data.
        let input_context = ffmpeg::format::input(path).map_err(|_| H264Error::NoInputContext)?;

        let video_stream = input_context
            .streams()
            .best(FFmpegMediaType::Video)
            .ok_or(H264Error::NoBestVideoStream)?;

        // Packets from every other stream get skipped.
        let video_stream_index = video_stream.index();

        let decoder_context = FFmpegCodecContext::from_parameters(video_stream.parameters())
            .map_err(|_| H264Error::DecoderCreateFailure)?;

        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|_| H264Error::DecoderCreateFailure)?;

        let dimensions = Dimensions::new(decoder.width() as usize, decoder.height() as usize)
            .ok_or(H264Error::ZeroLengthSide(decoder.width(), decoder.height()))?;

        // Some containers don't know their rate up front. The caller can
        // learn it from `DecodeProvider::fps` after a few frames.
        let fps = f64::from(video_stream.avg_frame_rate());
        let fps = (fps.is_normal() && fps > 0.0).then_some(fps);

        let normalizer = FrameNormalizer::new(decoder.format(), dimensions)?;

        Ok(Self {
            input_context,
            decoder,
            normalizer,
            decoded: FFmpegVideoFrame::empty(),
            video_stream_index,
            dimensions,
            fps,
            next_frame_number: 0,
            stream_over: false,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Try to pull a frame out of the decoder. This only works once packets
    /// have been sent to it. Real decoding errors are returned.
    fn receive(&mut self) -> Result<bool, ProviderError> {
        received(self.decoder.receive_frame(&mut self.decoded)).map_err(Into::into)
    }

    /// Send the next packet from our video stream to the decoder, or tell the
    /// decoder no more are coming.
    fn send_next_packet(&mut self) -> Result<(), ProviderError> {
        // The `packets` iterator mutates our `input_context`, not its own
        // state, so it can be re-created every time.
        let mut packets = self.input_context.packets();

        loop {
            let Some((stream, packet)) = packets.next() else {
                self.decoder.send_eof()?;
                self.stream_over = true;
                return Ok(());
            };

            if stream.index() == self.video_stream_index {
                self.decoder.send_packet(&packet)?;
                return Ok(());
            }
        }
    }
}

impl DecodeProvider for H264File {
    fn poll_frame(&mut self) -> Result<Decoded<'_>, ProviderError> {
        if !self.receive()? {
            if self.stream_over {
                return Err(ProviderError::EndOfStream);
            }

            self.send_next_packet()?;

            // Decoders often need several packets before the first frame.
            if !self.receive()? {
                return Ok(Decoded::Pending);
            }
        }

        let actual = ffmpeg_tools::frame_dimensions(&self.decoded)?;
        if actual != self.dimensions {
            return Err(H264Error::DimensionsChanged {
                expected: self.dimensions,
                actual,
            }
            .into());
        }

        let frame_number = self.next_frame_number;
        self.next_frame_number += 1;

        let range = ffmpeg_tools::color_range(&self.decoded);
        let meta = FrameMeta::new(frame_number, self.fps.unwrap_or(0.0));

        let normalized = self.normalizer.normalize(&self.decoded)?;
        let image = ffmpeg_tools::planar_image(normalized, self.dimensions)
            .map_err(H264Error::from)?;

        Ok(Decoded::Frame { image, meta, range })
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn start_over(&mut self) -> Result<(), ProviderError> {
        self.input_context.seek(0, ..)?;
        self.decoder.flush();
        self.stream_over = false;
        self.next_frame_number = 0;

        Ok(())
    }
}

/// Whether `result` (from receiving a frame) produced a frame. A decoder that
/// wants more packets (`EAGAIN`) or has been drained (`Eof`) isn't an error.
fn received(result: Result<(), ffmpeg::Error>) -> Result<bool, ffmpeg::Error> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg::Error::Eof) => Ok(false),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(false),
        Err(e) => Err(e),
    }
}
