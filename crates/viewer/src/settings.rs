//! Contains [ViewerSettings], the settings kept in a JSON file between runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use media::convert::ColorRange;
use media::overlay::DEFAULT_CONFIDENCE_THRESHOLD;
use util::saved_file::{SavedFile, SavedFileError};

use crate::args::Args;

/// Settings for a [VideoVisualization](crate::visualization::VideoVisualization).
/// Missing fields take their default values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ViewerSettings {
    /// Whether frames are shown at all.
    pub display_camera: bool,
    /// Forces a YCbCr range for conversion. [None] uses whatever the source
    /// reports.
    pub color_range: Option<ColorRange>,
    /// The maximum rate frames are produced at. `0` uses the source's own
    /// rate (or produces as fast as possible if it has none).
    pub fps: f64,
    /// Detections at or below this confidence aren't drawn.
    pub detection_threshold: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            display_camera: true,
            color_range: None,
            fps: 0.0,
            detection_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl ViewerSettings {
    /// Reads the settings at `path`, writing the defaults there first if the
    /// file doesn't exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SavedFileError> {
        let path = path.as_ref();
        let (settings, created) = Self::read_from_path_or_default(path)?;

        if created {
            util::debug_log_info!("Created default settings at `{}`.", path.display());
        }

        Ok(settings)
    }

    /// Command line flags win over the settings file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(fps) = args.fps {
            self.fps = fps;
        }
        if let Some(range) = args.color_range {
            self.color_range = Some(range.into());
        }
    }
}
