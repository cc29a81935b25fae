//! Contains the [Visualization] lifecycle and [VideoVisualization], which
//! moves frames from a source through the
//! [FrameStore](media::frame_store::FrameStore) to a [RenderSink].

use std::sync::Arc;
use std::time::Instant;

use media::convert::{self, ColorRange};
use media::frame::{DecodeStatus, Frame};
use media::frame_store::{CurrentFrame, FrameStore};
use media::overlay::{self, ClassNames, DEFAULT_BOX_COLOR, DEFAULT_BOX_THICKNESS};
use media::pacing::FramePacer;
use media::providers::{
    CaptureProvider, DecodeProvider, Decoded, DetectionProvider, ProviderError,
};

use crate::errors::ViewerError;
use crate::settings::ViewerSettings;
use crate::sink::RenderSink;

/// The hooks a host calls over a visualization's life. A host calls
/// [on_load_settings](Self::on_load_settings) and [on_init](Self::on_init)
/// once, then [on_pre_frame](Self::on_pre_frame) and
/// [on_local_frame](Self::on_local_frame) once per tick, then
/// [on_cleanup](Self::on_cleanup) once.
pub trait Visualization {
    fn on_init(&mut self) -> Result<(), ViewerError>;

    fn on_cleanup(&mut self) -> Result<(), ViewerError>;

    /// The producer step: maybe get a new frame and publish it.
    fn on_pre_frame(&mut self, now: Instant) -> TickOutcome;

    /// The consumer step: display the current frame. Returns whether a frame
    /// was displayed.
    fn on_local_frame(&mut self) -> bool;

    fn on_load_settings(&mut self, settings: ViewerSettings);
}

/// What happened during [Visualization::on_pre_frame].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was published.
    Published {
        frame_number: u64,
        /// The frame number of the frame it replaced.
        replaced: Option<u64>,
    },
    /// It's too soon for another frame.
    Paced,
    /// The source had nothing ready.
    Pending,
    /// A frame was produced but couldn't be converted. The next tick tries
    /// again with the next frame.
    Skipped,
    /// The source reported a problem (or the end of the stream). Nothing is
    /// retried on the caller's behalf.
    Status(DecodeStatus),
}

/// Where frames come from.
pub enum Source {
    /// Planar YUV frames that get converted before publishing.
    Decode(Box<dyn DecodeProvider>),
    /// Frames that are already RGB.
    Capture(Box<dyn CaptureProvider>),
}

impl Source {
    fn fps(&self) -> Option<f64> {
        match self {
            Self::Decode(provider) => provider.fps(),
            Self::Capture(_) => None,
        }
    }
}

/// Draws a detector's boxes onto frames before they're published.
pub struct Detector {
    pub provider: Box<dyn DetectionProvider>,
    pub class_names: ClassNames,
}

/// Plays a [Source] into a shared [FrameStore] and displays whatever the
/// store holds through a [RenderSink].
pub struct VideoVisualization<S> {
    store: Arc<FrameStore>,
    source: Source,
    detector: Option<Detector>,
    pacer: FramePacer,
    sink: S,
    settings: ViewerSettings,
}

impl<S: RenderSink> VideoVisualization<S> {
    pub fn new(store: Arc<FrameStore>, source: Source, sink: S) -> Self {
        Self {
            store,
            source,
            detector: None,
            pacer: FramePacer::unpaced(),
            sink,
            settings: ViewerSettings::default(),
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// A rate from the settings wins over the source's own.
    fn make_pacer(&self) -> FramePacer {
        if self.settings.fps > 0.0 {
            return FramePacer::new(self.settings.fps);
        }

        self.source
            .fps()
            .map_or_else(FramePacer::unpaced, FramePacer::new)
    }

    /// Gets a displayable frame from the source.
    fn produce(&mut self) -> Result<Frame, TickOutcome> {
        let forced_range = self.settings.color_range;

        match &mut self.source {
            Source::Decode(provider) => match provider.poll_frame() {
                Ok(Decoded::Pending) => Err(TickOutcome::Pending),
                Ok(Decoded::Frame { image, meta, range }) => {
                    convert::convert_to_frame(&image, forced_range.unwrap_or(range), meta)
                        .map_err(|e| {
                            util::debug_log_warning!(
                                "Skipping frame {}: {e}",
                                meta.frame_number
                            );
                            TickOutcome::Skipped
                        })
                }
                Err(e) => Err(report_provider_error(&e)),
            },
            Source::Capture(provider) => match provider.capture() {
                Ok(frame) => {
                    let range = forced_range.unwrap_or(ColorRange::Full);
                    convert::into_displayable(frame, range).map_err(|e| {
                        util::debug_log_warning!("Skipping captured frame: {e}");
                        TickOutcome::Skipped
                    })
                }
                Err(e) => Err(report_provider_error(&e)),
            },
        }
    }

    fn draw_detections(&mut self, frame: &mut Frame) {
        let Some(detector) = self.detector.as_mut() else {
            return;
        };

        let raw = detector.provider.detect(frame);
        let detections = overlay::to_pixel_detections(
            &raw,
            frame.dimensions(),
            self.settings.detection_threshold,
        );

        for detection in &detections {
            util::debug_log_info!(
                "Frame {}: {} ({:.2}) at {:?}",
                frame.frame_number(),
                detection.label(&detector.class_names).unwrap_or("unknown"),
                detection.confidence,
                detection.bbox,
            );
        }

        if let Err(e) = overlay::draw_boxes(
            frame,
            &detections,
            DEFAULT_BOX_COLOR,
            DEFAULT_BOX_THICKNESS,
        ) {
            util::debug_log_error!("Failed to draw detections: {e}");
        }
    }
}

fn report_provider_error(e: &ProviderError) -> TickOutcome {
    let status = e.decode_status();
    if status == DecodeStatus::EndOfStream {
        util::debug_log_info!("The source ended.");
    } else {
        util::debug_log_warning!("The source failed to produce a frame: {e}");
    }
    TickOutcome::Status(status)
}

impl<S: RenderSink> Visualization for VideoVisualization<S> {
    fn on_init(&mut self) -> Result<(), ViewerError> {
        self.pacer = self.make_pacer();
        util::debug_log_info!(
            "Visualization started (frame interval: {:?}).",
            self.pacer.interval()
        );
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<(), ViewerError> {
        self.store.clear();
        self.sink.finish()?;
        Ok(())
    }

    fn on_pre_frame(&mut self, now: Instant) -> TickOutcome {
        if !self.pacer.ready(now) {
            return TickOutcome::Paced;
        }

        let mut frame = match self.produce() {
            Ok(frame) => frame,
            Err(outcome) => return outcome,
        };

        self.draw_detections(&mut frame);

        if self.settings.fps <= 0.0 && self.pacer.adopt_fps(frame.fps()) {
            util::debug_log_info!("Adopted the source's rate of {} fps.", frame.fps());
        }
        self.pacer.mark(now);

        let frame_number = frame.frame_number();
        let replaced = self.store.publish(frame);
        TickOutcome::Published {
            frame_number,
            replaced,
        }
    }

    fn on_local_frame(&mut self) -> bool {
        if !self.settings.display_camera {
            return false;
        }

        match self.store.current_frame() {
            CurrentFrame::Available(frame) => match self.sink.present(&frame) {
                Ok(()) => true,
                Err(e) => {
                    util::debug_log_error!("Failed to display frame: {e}");
                    false
                }
            },
            CurrentFrame::Unavailable => {
                self.sink.unavailable();
                false
            }
        }
    }

    fn on_load_settings(&mut self, settings: ViewerSettings) {
        self.settings = settings;
        self.pacer = self.make_pacer();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use media::convert::{PlanarImage, PlaneRef};
    use media::frame::{Dimensions, FrameMeta, FrameParts, PixelFormat};
    use media::frame_store::FrameHandle;
    use media::overlay::RawDetection;
    use media::streams::TestPattern;
    use mockall::{mock, predicate};

    use super::*;
    use crate::detections::{JsonDetections, ScheduledDetection};
    use crate::sink::{NullSink, SinkError};

    mock! {
        Camera {}
        impl CaptureProvider for Camera {
            fn capture(&mut self) -> Result<Frame, ProviderError>;
        }
    }

    mock! {
        Sink {}
        impl RenderSink for Sink {
            fn present(&mut self, frame: &FrameHandle) -> Result<(), SinkError>;
            fn unavailable(&mut self);
            fn finish(&mut self) -> Result<(), SinkError>;
        }
    }

    enum Step {
        Solid { dimensions: Dimensions, y: u8 },
        Pending,
        IoError,
    }

    /// A decoder that plays back a fixed list of steps, then ends.
    struct ScriptedDecoder {
        steps: VecDeque<Step>,
        luma: Vec<u8>,
        chroma: Vec<u8>,
        next_frame_number: u64,
    }

    impl ScriptedDecoder {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                luma: Vec::new(),
                chroma: Vec::new(),
                next_frame_number: 0,
            }
        }
    }

    impl DecodeProvider for ScriptedDecoder {
        fn poll_frame(&mut self) -> Result<Decoded<'_>, ProviderError> {
            let (dimensions, y) = match self.steps.pop_front() {
                None => return Err(ProviderError::EndOfStream),
                Some(Step::Pending) => return Ok(Decoded::Pending),
                Some(Step::IoError) => return Err(io::Error::other("unplugged").into()),
                Some(Step::Solid { dimensions, y }) => (dimensions, y),
            };

            // Only the region the converter reads is allocated.
            let (width, height) = dimensions.even_floor();
            self.luma = vec![y; width * height];
            self.chroma = vec![128; (width / 2) * (height / 2)];

            let meta = FrameMeta::new(self.next_frame_number, 0.0);
            self.next_frame_number += 1;

            let image = PlanarImage::new(
                dimensions,
                PlaneRef::new(&self.luma, width),
                PlaneRef::new(&self.chroma, width / 2),
                PlaneRef::new(&self.chroma, width / 2),
            )
            .map_err(|e| ProviderError::Decode(Box::new(e)))?;

            Ok(Decoded::Frame {
                image,
                meta,
                range: ColorRange::Full,
            })
        }

        fn start_over(&mut self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn pattern_visualization<S: RenderSink>(
        pattern: TestPattern,
        sink: S,
    ) -> VideoVisualization<S> {
        let mut visualization = VideoVisualization::new(
            Arc::new(FrameStore::new()),
            Source::Decode(Box::new(pattern)),
            sink,
        );
        visualization.on_init().unwrap();
        visualization
    }

    fn scripted_visualization(steps: Vec<Step>) -> VideoVisualization<NullSink> {
        let mut visualization = VideoVisualization::new(
            Arc::new(FrameStore::new()),
            Source::Decode(Box::new(ScriptedDecoder::new(steps))),
            NullSink::default(),
        );
        visualization.on_init().unwrap();
        visualization
    }

    fn current_pixel(visualization: &VideoVisualization<impl RenderSink>) -> [u8; 3] {
        visualization
            .store()
            .with_current_frame(|frame| frame.pixel(0, 0).unwrap())
            .unwrap()
    }

    #[test]
    fn frames_flow_from_source_to_sink() {
        let mut visualization =
            pattern_visualization(TestPattern::new((32, 16).into()).unwrap(), NullSink::default());
        let now = Instant::now();

        assert_eq!(
            visualization.on_pre_frame(now),
            TickOutcome::Published {
                frame_number: 0,
                replaced: None
            }
        );
        assert!(visualization.on_local_frame());

        assert_eq!(
            visualization.on_pre_frame(now),
            TickOutcome::Published {
                frame_number: 1,
                replaced: Some(0)
            }
        );
        assert!(visualization.on_local_frame());

        let sink = visualization.sink();
        assert_eq!(sink.presented, 2);
        assert_eq!(sink.last_frame_number, Some(1));

        let format = visualization
            .store()
            .with_current_frame(Frame::format)
            .unwrap();
        assert_eq!(format, PixelFormat::InterleavedRgb8);
    }

    #[test]
    fn nothing_published_is_unavailable() {
        let mut sink = MockSink::new();
        sink.expect_unavailable().times(1).return_const(());
        sink.expect_present().never();

        let mut visualization = pattern_visualization(TestPattern::new((8, 8).into()).unwrap(), sink);
        assert!(!visualization.on_local_frame());
    }

    #[test]
    fn the_store_is_shared() {
        let store = Arc::new(FrameStore::new());
        let mut visualization = VideoVisualization::new(
            Arc::clone(&store),
            Source::Decode(Box::new(TestPattern::new((8, 8).into()).unwrap())),
            NullSink::default(),
        );
        visualization.on_init().unwrap();

        visualization.on_pre_frame(Instant::now());
        assert_eq!(store.publish_count(), 1);
        assert!(store.current_frame().is_available());
    }

    #[test]
    fn settings_rate_paces_the_source() {
        let mut visualization =
            pattern_visualization(TestPattern::new((8, 8).into()).unwrap(), NullSink::default());
        visualization.on_load_settings(ViewerSettings {
            fps: 10.0,
            ..Default::default()
        });

        let start = Instant::now();
        assert!(matches!(
            visualization.on_pre_frame(start),
            TickOutcome::Published { .. }
        ));
        assert_eq!(
            visualization.on_pre_frame(start + Duration::from_millis(50)),
            TickOutcome::Paced
        );
        assert!(matches!(
            visualization.on_pre_frame(start + Duration::from_millis(100)),
            TickOutcome::Published { frame_number: 1, .. }
        ));
    }

    #[test]
    fn source_rate_is_used_without_a_setting() {
        let mut visualization = pattern_visualization(
            TestPattern::new((8, 8).into()).unwrap().with_fps(20.0),
            NullSink::default(),
        );

        let start = Instant::now();
        visualization.on_pre_frame(start);
        assert_eq!(
            visualization.on_pre_frame(start + Duration::from_millis(10)),
            TickOutcome::Paced
        );
    }

    #[test]
    fn end_of_stream_keeps_the_last_frame() {
        let mut visualization = pattern_visualization(
            TestPattern::new((8, 8).into()).unwrap().with_frame_limit(1),
            NullSink::default(),
        );
        let now = Instant::now();

        visualization.on_pre_frame(now);
        assert_eq!(
            visualization.on_pre_frame(now),
            TickOutcome::Status(DecodeStatus::EndOfStream)
        );

        assert!(visualization.on_local_frame());
        assert_eq!(visualization.sink().last_frame_number, Some(0));
    }

    #[test]
    fn pending_and_failures_publish_nothing() {
        let mut visualization = scripted_visualization(vec![
            Step::Pending,
            Step::IoError,
            Step::Solid {
                dimensions: (4, 4).into(),
                y: 90,
            },
        ]);
        let now = Instant::now();

        assert_eq!(visualization.on_pre_frame(now), TickOutcome::Pending);
        assert_eq!(
            visualization.on_pre_frame(now),
            TickOutcome::Status(DecodeStatus::IoError)
        );
        assert_eq!(visualization.store().publish_count(), 0);

        assert!(matches!(
            visualization.on_pre_frame(now),
            TickOutcome::Published { frame_number: 0, .. }
        ));
        assert_eq!(current_pixel(&visualization), [90, 90, 90]);
    }

    #[test]
    fn allocation_failure_skips_the_frame() {
        let mut visualization = scripted_visualization(vec![
            Step::Solid {
                dimensions: (4, 4).into(),
                y: 10,
            },
            Step::Solid {
                dimensions: Dimensions::new(1, usize::MAX / 4).unwrap(),
                y: 0,
            },
            Step::Solid {
                dimensions: (4, 4).into(),
                y: 20,
            },
        ]);
        let now = Instant::now();

        visualization.on_pre_frame(now);
        assert_eq!(visualization.on_pre_frame(now), TickOutcome::Skipped);
        assert_eq!(current_pixel(&visualization), [10, 10, 10]);

        assert!(matches!(
            visualization.on_pre_frame(now),
            TickOutcome::Published { frame_number: 2, replaced: Some(0) }
        ));
        assert_eq!(current_pixel(&visualization), [20, 20, 20]);
    }

    #[test]
    fn forced_color_range_wins() {
        let steps = || {
            vec![Step::Solid {
                dimensions: (2, 2).into(),
                y: 235,
            }]
        };

        let mut full = scripted_visualization(steps());
        full.on_pre_frame(Instant::now());
        assert_eq!(current_pixel(&full), [235, 235, 235]);

        let mut limited = scripted_visualization(steps());
        limited.on_load_settings(ViewerSettings {
            color_range: Some(ColorRange::Limited),
            ..Default::default()
        });
        limited.on_pre_frame(Instant::now());
        assert_eq!(current_pixel(&limited), [255, 255, 255]);
    }

    #[test]
    fn captured_frames_skip_conversion() {
        let mut camera = MockCamera::new();
        let mut frame_number = 0;
        camera.expect_capture().times(2).returning(move || {
            frame_number += 1;
            Ok(Frame::rgb_from_fill(
                (3, 3).into(),
                [1, 2, 3],
                FrameMeta::new(frame_number, 0.0),
            ))
        });

        let mut visualization = VideoVisualization::new(
            Arc::new(FrameStore::new()),
            Source::Capture(Box::new(camera)),
            NullSink::default(),
        );
        visualization.on_init().unwrap();

        let now = Instant::now();
        visualization.on_pre_frame(now);
        assert_eq!(
            visualization.on_pre_frame(now),
            TickOutcome::Published {
                frame_number: 2,
                replaced: Some(1)
            }
        );
        assert_eq!(current_pixel(&visualization), [1, 2, 3]);
    }

    #[test]
    fn planar_captures_are_converted() {
        let mut camera = MockCamera::new();
        camera.expect_capture().times(1).returning(|| {
            let mut pixels = vec![60u8; 4 * 2];
            pixels.extend([128u8; 4]);
            Ok(Frame::new(FrameParts {
                dimensions: (4, 2).into(),
                stride: 4,
                format: PixelFormat::PlanarYuv420,
                meta: FrameMeta::new(5, 0.0),
                pixels: pixels.into_boxed_slice(),
            })
            .unwrap())
        });

        let mut visualization = VideoVisualization::new(
            Arc::new(FrameStore::new()),
            Source::Capture(Box::new(camera)),
            NullSink::default(),
        );
        visualization.on_init().unwrap();
        visualization.on_pre_frame(Instant::now());

        assert_eq!(current_pixel(&visualization), [60, 60, 60]);
    }

    #[test]
    fn camera_failures_are_reported() {
        let mut camera = MockCamera::new();
        camera
            .expect_capture()
            .returning(|| Err(io::Error::other("no camera").into()));

        let mut visualization = VideoVisualization::new(
            Arc::new(FrameStore::new()),
            Source::Capture(Box::new(camera)),
            NullSink::default(),
        );
        visualization.on_init().unwrap();

        assert_eq!(
            visualization.on_pre_frame(Instant::now()),
            TickOutcome::Status(DecodeStatus::IoError)
        );
        assert!(!visualization.on_local_frame());
        assert_eq!(visualization.sink().unavailable, 1);
    }

    #[test]
    fn detections_are_drawn_before_publishing() {
        let detections = JsonDetections::new(vec![
            ScheduledDetection {
                frame: Some(0),
                detection: RawDetection {
                    class_id: 1,
                    confidence: 0.9,
                    x_min: 0.0,
                    y_min: 0.0,
                    x_max: 0.5,
                    y_max: 0.5,
                },
            },
            ScheduledDetection {
                frame: None,
                detection: RawDetection {
                    class_id: 1,
                    confidence: 0.2,
                    x_min: 0.5,
                    y_min: 0.5,
                    x_max: 1.0,
                    y_max: 1.0,
                },
            },
        ]);

        let mut visualization = scripted_visualization(vec![Step::Solid {
            dimensions: (8, 8).into(),
            y: 0,
        }])
        .with_detector(Detector {
            provider: Box::new(detections),
            class_names: ClassNames::parse("thing"),
        });

        visualization.on_pre_frame(Instant::now());

        let (corner, inside, low_confidence) = visualization
            .store()
            .with_current_frame(|frame| {
                (
                    frame.pixel(0, 0).unwrap(),
                    frame.pixel(2, 2).unwrap(),
                    frame.pixel(7, 7).unwrap(),
                )
            })
            .unwrap();

        assert_eq!(corner, DEFAULT_BOX_COLOR);
        assert_eq!(inside, [0, 0, 0]);
        assert_eq!(low_confidence, [0, 0, 0]);
    }

    #[test]
    fn hidden_camera_displays_nothing() {
        let mut sink = MockSink::new();
        sink.expect_present().never();
        sink.expect_unavailable().never();

        let mut visualization = pattern_visualization(TestPattern::new((8, 8).into()).unwrap(), sink);
        visualization.on_load_settings(ViewerSettings {
            display_camera: false,
            ..Default::default()
        });

        visualization.on_pre_frame(Instant::now());
        assert!(!visualization.on_local_frame());
    }

    #[test]
    fn cleanup_releases_the_frame_and_finishes() {
        let mut sink = MockSink::new();
        sink.expect_present()
            .with(predicate::function(|frame: &FrameHandle| frame.frame_number() == 0))
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_finish().times(1).returning(|| Ok(()));

        let mut visualization = pattern_visualization(TestPattern::new((8, 8).into()).unwrap(), sink);
        visualization.on_pre_frame(Instant::now());
        assert!(visualization.on_local_frame());

        visualization.on_cleanup().unwrap();
        assert!(visualization.store().is_empty());
    }

    #[test]
    fn sink_errors_surface_on_cleanup() {
        let mut sink = MockSink::new();
        sink.expect_finish()
            .returning(|| Err(SinkError::NothingPresented));

        let mut visualization = pattern_visualization(TestPattern::new((8, 8).into()).unwrap(), sink);
        assert!(matches!(
            visualization.on_cleanup(),
            Err(ViewerError::Sink(SinkError::NothingPresented))
        ));
    }
}
