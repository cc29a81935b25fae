//! Display geometry: fitting frames into a region of the screen and
//! projecting world positions onto a frame with a pinhole camera model.

use crate::frame::Dimensions;

/// Where a letterboxed image goes inside a content region.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    /// The top-left corner (the region's top-left corner).
    pub origin: [f32; 2],
    /// The width and height the image is drawn at.
    pub size: [f32; 2],
}

/// Scales an image of `image` dimensions to fill as much of the region from
/// `region_min` to `region_max` as it can without changing its aspect ratio.
///
/// ```
/// use media::geometry::{self, Placement};
///
/// let placement = geometry::fit_to_region([0.0, 0.0], [800.0, 400.0], (400, 400).into());
/// assert_eq!(
///     placement,
///     Placement { origin: [0.0, 0.0], size: [400.0, 400.0] }
/// );
/// ```
pub fn fit_to_region(region_min: [f32; 2], region_max: [f32; 2], image: Dimensions) -> Placement {
    let width = region_max[0] - region_min[0];
    let height = region_max[1] - region_min[1];

    if !(width > 0.0 && height > 0.0) {
        return Placement {
            origin: region_min,
            size: [0.0, 0.0],
        };
    }

    let region_aspect_ratio = width / height;
    let image_aspect_ratio = image.aspect_ratio_f32();

    let size = if region_aspect_ratio > image_aspect_ratio {
        [image_aspect_ratio * height, height]
    } else {
        [width, width / image_aspect_ratio]
    };

    Placement {
        origin: region_min,
        size,
    }
}

/// A row-major 3x3 matrix.
pub type Matrix3 = [[f32; 3]; 3];

fn mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn apply(m: &Matrix3, v: [f32; 3]) -> [f32; 3] {
    m.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
}

/// A pinhole camera for projecting world positions (in meters) to pixel
/// coordinates.
///
/// The world point is rotated by `yaw * pitch * roll`, translated by
/// [Self::position_m], and projected with the intrinsic matrix built from the
/// focal length, pixel size, skew, and principal point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub focal_length_m: f32,
    pub pixel_size_m: f32,
    pub roll_rad: f32,
    pub pitch_rad: f32,
    pub yaw_rad: f32,
    /// How far the image axes are from perpendicular, in degrees.
    pub skew_deg: f32,
    pub principal_point_px: [f32; 2],
    pub position_m: [f32; 3],
}

/// Roughly a 100 degree field of view, centred on the origin.
impl Default for CameraModel {
    fn default() -> Self {
        Self {
            focal_length_m: 0.00629,
            pixel_size_m: 0.0000042,
            roll_rad: 0.0,
            pitch_rad: 0.0,
            yaw_rad: 0.0,
            skew_deg: 0.0,
            principal_point_px: [0.0, 0.0],
            position_m: [0.0, 0.0, 0.0],
        }
    }
}

impl CameraModel {
    /// The focal length in pixels (the same along both axes).
    pub fn focal_length_px(&self) -> f32 {
        self.focal_length_m / self.pixel_size_m
    }

    /// The rotation from world to camera axes.
    pub fn rotation(&self) -> Matrix3 {
        let (sin_r, cos_r) = self.roll_rad.sin_cos();
        let (sin_p, cos_p) = self.pitch_rad.sin_cos();
        let (sin_y, cos_y) = self.yaw_rad.sin_cos();

        let roll = [[1.0, 0.0, 0.0], [0.0, cos_r, sin_r], [0.0, -sin_r, cos_r]];
        let pitch = [[cos_p, 0.0, -sin_p], [0.0, 1.0, 0.0], [sin_p, 0.0, cos_p]];
        let yaw = [[cos_y, sin_y, 0.0], [-sin_y, cos_y, 0.0], [0.0, 0.0, 1.0]];

        mul(&mul(&yaw, &pitch), &roll)
    }

    /// The intrinsic (camera) matrix.
    pub fn intrinsics(&self) -> Matrix3 {
        let f = self.focal_length_px();
        let shear = f * self.skew_deg.to_radians().tan();
        let [cx, cy] = self.principal_point_px;

        [[f, shear, cx], [0.0, f, cy], [0.0, 0.0, 1.0]]
    }

    /// Projects `point_m` to pixel coordinates. Returns [None] if the point
    /// lands at depth `0` (there's no finite projection).
    ///
    /// ```
    /// use media::geometry::CameraModel;
    ///
    /// let camera = CameraModel {
    ///     principal_point_px: [320.0, 240.0],
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(camera.world_to_pixel([0.0, 0.0, 10.0]), Some([320.0, 240.0]));
    /// assert_eq!(camera.world_to_pixel([1.0, 1.0, 0.0]), None);
    /// ```
    pub fn world_to_pixel(&self, point_m: [f32; 3]) -> Option<[f32; 2]> {
        let rotated = apply(&self.rotation(), point_m);
        let [tx, ty, tz] = self.position_m;
        let camera = [rotated[0] + tx, rotated[1] + ty, rotated[2] + tz];

        let [u, v, w] = apply(&self.intrinsics(), camera);
        if w == 0.0 {
            return None;
        }

        Some([u / w, v / w])
    }
}

/// Reorders world axes (x forward, y left, z up) into camera axes: `(y, z, x)`.
pub fn world_to_camera([x, y, z]: [f32; 3]) -> [f32; 3] {
    [y, z, x]
}
