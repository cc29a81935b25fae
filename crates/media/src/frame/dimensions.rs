//! Declares the [Dimensions] type, a type that [super::Frame] depends on.

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroUsize;
use std::str::FromStr;

use thiserror::Error;

/// A width and a height, both guaranteed to be non-zero.
///
/// # Example
///
/// [From<(usize, usize)>] is implemented for [Dimensions]. If either side is
/// `0`, the thread will panic. [Into::into] should really only be used if
/// you're providing the side lengths as literals (e.g. `(1920, 1080).into()`).
///
/// ```
/// use media::frame::Dimensions;
///
/// let d: Dimensions = (1920, 1080).into();
/// assert_eq!(d.width(), 1920);
/// assert_eq!(d.height(), 1080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: NonZeroUsize,
    height: NonZeroUsize,
}

impl Dimensions {
    /// Construct from a width and a height.
    ///
    /// This function will return [None] if the width or height are 0. Also see
    /// [Self::from_non_zero].
    pub const fn new(width: usize, height: usize) -> Option<Self> {
        let Some(width) = NonZeroUsize::new(width) else {
            return None;
        };
        let Some(height) = NonZeroUsize::new(height) else {
            return None;
        };

        Some(Self::from_non_zero(width, height))
    }

    /// Construct from a non-zero width and a height.
    pub const fn from_non_zero(width: NonZeroUsize, height: NonZeroUsize) -> Self {
        Self { width, height }
    }

    /// The dimensions' width. This will never be `0`.
    pub const fn width(&self) -> usize {
        self.width.get()
    }

    /// The dimensions' height. This will never be `0`.
    pub const fn height(&self) -> usize {
        self.height.get()
    }

    /// The area a rectangle would have with the dimensions' width and height.
    pub const fn area(&self) -> usize {
        self.width.get() * self.height.get()
    }

    /// The width and height rounded down to the nearest even number. This is
    /// the region a 4:2:0 conversion actually covers (it works on 2x2 blocks),
    /// so either side can be `0`.
    ///
    /// ```
    /// use media::frame::Dimensions;
    ///
    /// let d: Dimensions = (641, 480).into();
    /// assert_eq!(d.even_floor(), (640, 480));
    /// ```
    pub const fn even_floor(&self) -> (usize, usize) {
        (self.width.get() & !1, self.height.get() & !1)
    }

    /// The dimensions of a chroma plane subsampled by 2 in both directions
    /// (rounding up, so an odd trailing column/row still gets a sample).
    ///
    /// ```
    /// use media::frame::Dimensions;
    ///
    /// let d: Dimensions = (5, 3).into();
    /// assert_eq!(d.chroma_420(), (3, 2).into());
    /// ```
    pub const fn chroma_420(&self) -> Self {
        // Both sides are at least 1, so the halves rounded up are too.
        match Self::new(self.width.get().div_ceil(2), self.height.get().div_ceil(2)) {
            Some(chroma) => chroma,
            None => unreachable!(),
        }
    }

    /// Find the aspect ratio of these dimensions.
    ///
    /// ```
    /// use media::frame::Dimensions;
    ///
    /// let d: Dimensions = (1920, 1080).into();
    /// assert_eq!(d.aspect_ratio(), (16, 9).into());
    /// ```
    pub const fn aspect_ratio(&self) -> Self {
        let gcd = greatest_common_divisor(self.width.get(), self.height.get());

        // The sides are non-zero and `gcd` divides both of them, so neither
        // quotient can be `0`.
        match Self::new(self.width.get() / gcd, self.height.get() / gcd) {
            Some(ratio) => ratio,
            None => unreachable!(),
        }
    }

    /// The width divided by the height as a floating point number.
    pub fn aspect_ratio_f32(&self) -> f32 {
        self.width.get() as f32 / self.height.get() as f32
    }
}

/// Ordering depends on [area](Self::area).
impl Ord for Dimensions {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.area().cmp(&other.area())
    }
}

/// Ordering depends on [area](Self::area).
impl PartialOrd for Dimensions {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// When displayed, [Dimensions] will look like `WxH` (e.g. `1920x1080`).
impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses the `WxH` format that [Display] produces.
///
/// ```
/// use media::frame::Dimensions;
///
/// let d: Dimensions = "640x480".parse().unwrap();
/// assert_eq!(d, (640, 480).into());
/// assert!("640x0".parse::<Dimensions>().is_err());
/// ```
impl FromStr for Dimensions {
    type Err = ParseDimensionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseDimensionsError(s.to_owned()))?;

        let parse = |side: &str| side.trim().parse::<usize>().ok();

        parse(width)
            .zip(parse(height))
            .and_then(|(width, height)| Self::new(width, height))
            .ok_or_else(|| ParseDimensionsError(s.to_owned()))
    }
}

/// Indicates that a string wasn't in the `WxH` format (with non-zero sides).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Expected dimensions like `640x480` but got `{0}`.")]
pub struct ParseDimensionsError(pub String);

/// If either side is `0`, the thread will panic. [Into::into] should really
/// only be used if you're providing the side lengths as literals (e.g.
/// `(1920, 1080).into()`).
impl From<(usize, usize)> for Dimensions {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::new(dimensions.0, dimensions.1).expect("Both sides must be non-zero.")
    }
}

impl From<Dimensions> for (usize, usize) {
    fn from(dimensions: Dimensions) -> Self {
        (dimensions.width(), dimensions.height())
    }
}

const fn greatest_common_divisor(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (b, a) = (a % b, b)
    }
    a
}
