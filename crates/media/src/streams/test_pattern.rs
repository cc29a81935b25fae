//! Contains [TestPattern], a synthetic [DecodeProvider] that needs no files.

use crate::convert::{ColorRange, PlanarImage, PlaneRef};
use crate::frame::{Dimensions, FrameMeta, GeometryError, PixelFormat};
use crate::providers::{DecodeProvider, Decoded, ProviderError};

/// The bars, left to right, as RGB.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// How far the stripe moves each frame, in pixels.
const STRIPE_STEP: usize = 4;

/// How wide the stripe is, in pixels.
const STRIPE_WIDTH: usize = 8;

/// A [DecodeProvider] that produces full range planar YUV 4:2:0 colour bars
/// with a vertical stripe that moves a few pixels each frame (so it's obvious
/// when frames stop updating).
///
/// ```
/// use media::providers::{DecodeProvider, Decoded, ProviderError};
/// use media::streams::TestPattern;
///
/// let mut pattern = TestPattern::new((64, 48).into()).unwrap().with_frame_limit(1);
/// assert!(matches!(pattern.poll_frame(), Ok(Decoded::Frame { .. })));
/// assert!(matches!(pattern.poll_frame(), Err(ProviderError::EndOfStream)));
/// ```
#[derive(Debug, Clone)]
pub struct TestPattern {
    dimensions: Dimensions,
    fps: Option<f64>,
    frame_limit: Option<u64>,
    next_frame_number: u64,
    luma_stride: usize,
    chroma_stride: usize,
    /// The bars without the stripe.
    background: Box<[u8]>,
    luma: Box<[u8]>,
    cb: Box<[u8]>,
    cr: Box<[u8]>,
}

impl TestPattern {
    /// Fails with [GeometryError::TooLarge] if a pattern this big couldn't
    /// be addressed.
    pub fn new(dimensions: Dimensions) -> Result<Self, GeometryError> {
        let format = PixelFormat::PlanarYuv420;
        let luma_stride = format
            .row_stride(dimensions.width())
            .filter(|_| dimensions.width().checked_mul(BARS.len()).is_some())
            .ok_or(GeometryError::TooLarge)?;
        format
            .buffer_len(luma_stride, dimensions.height())
            .ok_or(GeometryError::TooLarge)?;

        let chroma_stride = luma_stride / 2;
        let chroma_rows = dimensions.chroma_420().height();

        let mut background = vec![0; luma_stride * dimensions.height()].into_boxed_slice();
        let mut cb = vec![128; chroma_stride * chroma_rows].into_boxed_slice();
        let mut cr = vec![128; chroma_stride * chroma_rows].into_boxed_slice();

        let bar = |col: usize| BARS[col * BARS.len() / dimensions.width()];

        for row in background.chunks_exact_mut(luma_stride) {
            for (col, y) in row[..dimensions.width()].iter_mut().enumerate() {
                *y = rgb_to_ycbcr(bar(col))[0];
            }
        }

        let chroma_width = dimensions.chroma_420().width();
        for (cb_row, cr_row) in cb
            .chunks_exact_mut(chroma_stride)
            .zip(cr.chunks_exact_mut(chroma_stride))
        {
            for col in 0..chroma_width {
                let [_, u, v] = rgb_to_ycbcr(bar(col * 2));
                cb_row[col] = u;
                cr_row[col] = v;
            }
        }

        Ok(Self {
            dimensions,
            fps: None,
            frame_limit: None,
            next_frame_number: 0,
            luma_stride,
            chroma_stride,
            luma: background.clone(),
            background,
            cb,
            cr,
        })
    }

    /// Report `fps` as the intended playback rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    /// End the stream after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The column the stripe starts at in frame `frame_number`.
    pub fn stripe_column(&self, frame_number: u64) -> usize {
        let width = self.dimensions.width() as u64;
        ((frame_number * STRIPE_STEP as u64) % width) as usize
    }

    fn draw_stripe(&mut self, frame_number: u64) {
        self.luma.copy_from_slice(&self.background);

        let width = self.dimensions.width();
        let start = self.stripe_column(frame_number);
        let end = (start + STRIPE_WIDTH).min(width);

        for row in self.luma.chunks_exact_mut(self.luma_stride) {
            for y in &mut row[start..end] {
                *y = 255 - *y;
            }
        }
    }
}

impl DecodeProvider for TestPattern {
    fn poll_frame(&mut self) -> Result<Decoded<'_>, ProviderError> {
        if self
            .frame_limit
            .is_some_and(|limit| self.next_frame_number >= limit)
        {
            return Err(ProviderError::EndOfStream);
        }

        let frame_number = self.next_frame_number;
        self.next_frame_number += 1;
        self.draw_stripe(frame_number);

        let image = PlanarImage::new(
            self.dimensions,
            PlaneRef::new(&self.luma, self.luma_stride),
            PlaneRef::new(&self.cb, self.chroma_stride),
            PlaneRef::new(&self.cr, self.chroma_stride),
        )
        .map_err(|e| ProviderError::Decode(Box::new(e)))?;

        Ok(Decoded::Frame {
            image,
            meta: FrameMeta::new(frame_number, self.fps.unwrap_or(0.0)),
            range: ColorRange::Full,
        })
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn start_over(&mut self) -> Result<(), ProviderError> {
        self.next_frame_number = 0;
        Ok(())
    }
}

/// Full range BT.601 RGB to YCbCr, rounded to the nearest value.
fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;

    [y, cb, cr].map(|c| c.round().clamp(0.0, 255.0) as u8)
}
