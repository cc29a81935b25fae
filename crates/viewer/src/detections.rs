//! Contains [JsonDetections], a [DetectionProvider] that replays detections
//! computed ahead of time.

use std::path::Path;

use serde::{Deserialize, Serialize};

use media::frame::Frame;
use media::overlay::RawDetection;
use media::providers::DetectionProvider;
use util::saved_file::{SavedFile, SavedFileError};

/// One entry of a detections file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScheduledDetection {
    /// The frame number this detection belongs to. Detections without one
    /// show up on every frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    #[serde(flatten)]
    pub detection: RawDetection,
}

/// A [DetectionProvider] backed by a JSON file (an array of
/// [ScheduledDetection]s), e.g.
///
/// ```json
/// [
///   { "frame": 3, "class_id": 1, "confidence": 0.9,
///     "x_min": 0.1, "y_min": 0.1, "x_max": 0.4, "y_max": 0.5 }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonDetections(Vec<ScheduledDetection>);

impl JsonDetections {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SavedFileError> {
        Vec::<ScheduledDetection>::read_from_path(path).map(Self)
    }

    #[cfg(test)]
    pub fn new(detections: Vec<ScheduledDetection>) -> Self {
        Self(detections)
    }
}

impl DetectionProvider for JsonDetections {
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection> {
        let frame_number = frame.frame_number();
        self.0
            .iter()
            .filter(|d| d.frame.is_none_or(|n| n == frame_number))
            .map(|d| d.detection)
            .collect()
    }
}
