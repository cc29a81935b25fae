//! Object detection overlays: turning a detector's normalized output into
//! pixel boxes and drawing those boxes onto RGB frames before they're
//! published.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::frame::{Dimensions, Frame, PixelFormat};

/// Detections at or below this confidence are dropped by default.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// The default box colour (white).
pub const DEFAULT_BOX_COLOR: [u8; 3] = [255, 255, 255];

/// The default box outline thickness, in pixels.
pub const DEFAULT_BOX_THICKNESS: u32 = 2;

/// A detection as a detector reports it, with corners in normalized `[0, 1]`
/// image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// 1-based index into the detector's [ClassNames].
    pub class_id: u32,
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// An axis-aligned box in pixels. `x` and `y` are the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A detection in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// This detection's label, if `names` has one for its class.
    pub fn label<'a>(&self, names: &'a ClassNames) -> Option<&'a str> {
        names.get(self.class_id)
    }
}

/// Keeps the detections whose confidence is strictly above `threshold` and
/// converts them to pixel boxes for an image of size `dimensions`.
///
/// Coordinates are truncated toward zero, and the width and height are
/// measured from the truncated corner.
///
/// ```
/// use media::overlay::{self, BoundingBox, RawDetection};
///
/// let raw = RawDetection {
///     class_id: 1,
///     confidence: 0.9,
///     x_min: 0.25,
///     y_min: 0.5,
///     x_max: 0.75,
///     y_max: 1.0,
/// };
///
/// let found = overlay::to_pixel_detections(&[raw], (200, 100).into(), 0.4);
/// assert_eq!(
///     found[0].bbox,
///     BoundingBox { x: 50, y: 50, width: 100, height: 50 }
/// );
/// ```
pub fn to_pixel_detections(
    raw: &[RawDetection],
    dimensions: Dimensions,
    threshold: f32,
) -> Vec<Detection> {
    let cols = dimensions.width() as f32;
    let rows = dimensions.height() as f32;

    raw.iter()
        .filter(|d| d.confidence > threshold)
        .map(|d| {
            let x = (d.x_min * cols) as i32;
            let y = (d.y_min * rows) as i32;
            let width = (d.x_max * cols - x as f32) as i32;
            let height = (d.y_max * rows - y as f32) as i32;

            Detection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: BoundingBox {
                    x,
                    y,
                    width,
                    height,
                },
            }
        })
        .collect()
}

/// Indicates that boxes couldn't be drawn on a frame.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayError {
    #[error("Boxes can only be drawn on RGB frames (got {0:?}).")]
    NotRgb(PixelFormat),
}

/// Draws the outline of every detection's box onto `frame`, clipped to the
/// frame.
///
/// The outline grows inward from the box's edges, so a box's outer size is
/// its pixel size whatever the `thickness`. Strokes centred on the edge (as
/// OpenCV's `rectangle` draws them) would reach `thickness / 2` pixels
/// outside the box instead.
pub fn draw_boxes(
    frame: &mut Frame,
    detections: &[Detection],
    color: [u8; 3],
    thickness: u32,
) -> Result<(), OverlayError> {
    if frame.format() != PixelFormat::InterleavedRgb8 {
        return Err(OverlayError::NotRgb(frame.format()));
    }

    let thickness = i64::from(thickness.max(1));
    let (width, height, stride) = (frame.width() as i64, frame.height() as i64, frame.stride());
    let pixels = frame.pixels_mut();

    for detection in detections {
        let BoundingBox {
            x,
            y,
            width: w,
            height: h,
        } = detection.bbox;

        let (left, top) = (i64::from(x), i64::from(y));
        let (right, bottom) = (left + i64::from(w), top + i64::from(h));
        if right < left || bottom < top {
            continue;
        }

        let on_outline = |row: i64, col: i64| {
            row - top < thickness
                || bottom - row < thickness
                || col - left < thickness
                || right - col < thickness
        };

        for row in top.max(0)..=bottom.min(height - 1) {
            for col in left.max(0)..=right.min(width - 1) {
                if on_outline(row, col) {
                    let start = row as usize * stride + col as usize * 3;
                    pixels[start..start + 3].copy_from_slice(&color);
                }
            }
        }
    }

    Ok(())
}

/// Class labels, one per line, indexed by the 1-based class IDs detectors
/// report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    /// Read labels from a text file with one label per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Parse labels from text with one label per line. Trailing whitespace is
    /// trimmed.
    pub fn parse(text: &str) -> Self {
        Self(text.lines().map(|line| line.trim_end().to_owned()).collect())
    }

    /// The label for `class_id`. IDs start at 1, so `0` never has a label.
    pub fn get(&self, class_id: u32) -> Option<&str> {
        let index = usize::try_from(class_id.checked_sub(1)?).ok()?;
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameMeta;

    fn raw(confidence: f32, corners: [f32; 4]) -> RawDetection {
        let [x_min, y_min, x_max, y_max] = corners;
        RawDetection {
            class_id: 2,
            confidence,
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    fn black(width: usize, height: usize) -> Frame {
        Frame::rgb_from_fill((width, height).into(), [0, 0, 0], FrameMeta::default())
    }

    #[test]
    fn threshold_is_strict() {
        let detections = [
            raw(0.4, [0.0, 0.0, 1.0, 1.0]),
            raw(0.41, [0.0, 0.0, 1.0, 1.0]),
            raw(0.1, [0.0, 0.0, 1.0, 1.0]),
        ];
        let found = to_pixel_detections(&detections, (10, 10).into(), DEFAULT_CONFIDENCE_THRESHOLD);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence, 0.41);
        assert_eq!(
            found[0].bbox,
            BoundingBox {
                x: 0,
                y: 0,
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn coordinates_truncate() {
        let found = to_pixel_detections(&[raw(0.9, [0.119, 0.5, 0.5, 0.99])], (100, 10).into(), 0.4);
        assert_eq!(
            found[0].bbox,
            BoundingBox {
                x: 11,
                y: 5,
                width: 39,
                height: 4
            }
        );
    }

    #[test]
    fn outlines_are_drawn_inside_the_box() {
        let mut frame = black(10, 10);
        let detection = Detection {
            class_id: 1,
            confidence: 1.0,
            bbox: BoundingBox {
                x: 2,
                y: 2,
                width: 5,
                height: 5,
            },
        };

        draw_boxes(&mut frame, &[detection], [255, 0, 0], 2).unwrap();

        assert_eq!(frame.pixel(2, 2), Some([255, 0, 0]));
        assert_eq!(frame.pixel(3, 3), Some([255, 0, 0]));
        assert_eq!(frame.pixel(7, 7), Some([255, 0, 0]));
        assert_eq!(frame.pixel(6, 4), Some([255, 0, 0]));
        assert_eq!(frame.pixel(4, 4), Some([0, 0, 0]));
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 0]));
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(frame.pixel(8, 8), Some([0, 0, 0]));
    }

    #[test]
    fn thick_outlines_keep_the_outer_size() {
        let mut frame = black(12, 12);
        let detection = Detection {
            class_id: 1,
            confidence: 1.0,
            bbox: BoundingBox {
                x: 3,
                y: 3,
                width: 6,
                height: 6,
            },
        };

        draw_boxes(&mut frame, &[detection], [0, 255, 0], 4).unwrap();

        for i in 3..=9 {
            assert_eq!(frame.pixel(3, i), Some([0, 255, 0]));
            assert_eq!(frame.pixel(9, i), Some([0, 255, 0]));
            assert_eq!(frame.pixel(2, i), Some([0, 0, 0]));
            assert_eq!(frame.pixel(10, i), Some([0, 0, 0]));
            assert_eq!(frame.pixel(i, 2), Some([0, 0, 0]));
            assert_eq!(frame.pixel(i, 10), Some([0, 0, 0]));
        }
    }

    #[test]
    fn boxes_are_clipped() {
        let mut frame = black(6, 4);
        let detection = Detection {
            class_id: 1,
            confidence: 1.0,
            bbox: BoundingBox {
                x: -3,
                y: 2,
                width: 100,
                height: 100,
            },
        };

        draw_boxes(&mut frame, &[detection], DEFAULT_BOX_COLOR, 1).unwrap();

        // Only the top edge is on screen.
        assert_eq!(frame.pixel(2, 0), Some([255, 255, 255]));
        assert_eq!(frame.pixel(2, 5), Some([255, 255, 255]));
        assert_eq!(frame.pixel(3, 3), Some([0, 0, 0]));
        assert_eq!(frame.pixel(1, 3), Some([0, 0, 0]));

        // Padding bytes past the visible row are never touched.
        assert!(frame.pixels()[18..20].iter().all(|&b| b == 0));
    }

    #[test]
    fn planar_frames_are_rejected() {
        use crate::frame::FrameParts;

        let mut frame = Frame::new(FrameParts {
            dimensions: (4, 2).into(),
            stride: 4,
            format: PixelFormat::PlanarYuv420,
            meta: FrameMeta::default(),
            pixels: vec![0; 12].into_boxed_slice(),
        })
        .unwrap();

        assert_eq!(
            draw_boxes(&mut frame, &[], DEFAULT_BOX_COLOR, 2),
            Err(OverlayError::NotRgb(PixelFormat::PlanarYuv420))
        );
    }

    #[test]
    fn class_ids_are_one_based() {
        let names = ClassNames::parse("background\nperson  \nbicycle\n");
        assert_eq!(names.len(), 3);
        assert_eq!(names.get(0), None);
        assert_eq!(names.get(2), Some("person"));
        assert_eq!(names.get(4), None);

        let detection = to_pixel_detections(&[raw(0.5, [0.0; 4])], (4, 4).into(), 0.4)[0];
        assert_eq!(detection.label(&names), Some("person"));
    }

    #[test]
    fn class_names_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        std::fs::write(&path, "cat\ndog").unwrap();

        let names = ClassNames::load(&path).unwrap();
        assert_eq!(names.get(1), Some("cat"));
        assert_eq!(names.get(2), Some("dog"));
        assert!(ClassNames::load(dir.path().join("missing.txt")).is_err());
    }
}
