mod args;
mod detections;
mod errors;
mod settings;
mod sink;
mod visualization;

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use media::frame::DecodeStatus;
use media::frame_store::FrameStore;
use media::overlay::ClassNames;
use media::streams::{StillImage, TestPattern};
use util::stop_signals;

use args::{Args, SourceKind};
use detections::JsonDetections;
use errors::ViewerError;
use settings::ViewerSettings;
use sink::{ImageFileSink, NullSink, RenderSink};
use visualization::{Detector, Source, TickOutcome, VideoVisualization, Visualization};

/// How long to wait before ticking again when there was nothing to do.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Give up after this many failed frames in a row.
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

fn main() -> ExitCode {
    let args = Args::default();

    #[cfg(debug_assertions)]
    {
        use util::debug_log;
        if args.no_debug_logging {
            debug_log::disable();
        } else if args.debug_error_log_panics {
            debug_log::panic_on_errors::enable();
        }
    }

    match run(&args) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            util::debug_log_error!("The viewer failed: {e}");
            util::eprintln_and_exit!("{e}");
        }
    }
}

/// What a run did.
struct Summary {
    published: u64,
    last_frame_number: Option<u64>,
    /// Where the last frame was saved (`None` for dry runs).
    output: Option<String>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Published {} frame(s)", self.published)?;
        match (self.last_frame_number, &self.output) {
            (Some(n), Some(output)) => write!(f, ", saved frame {n} to `{output}`."),
            (Some(n), None) => write!(f, ", the last one displayed was frame {n}."),
            (None, _) => write!(f, "."),
        }
    }
}

fn run(args: &Args) -> Result<Summary, ViewerError> {
    stop_signals::polling::enable().map_err(ViewerError::StopSignals)?;

    let mut settings = match &args.settings {
        Some(path) => ViewerSettings::load(path).map_err(ViewerError::Settings)?,
        None => ViewerSettings::default(),
    };
    settings.apply_args(args);

    let summary = if args.dry_run {
        let (published, sink) = drive(args, settings, NullSink::default())?;
        Summary {
            published,
            last_frame_number: sink.last_frame_number,
            output: None,
        }
    } else {
        let (published, sink) = drive(args, settings, ImageFileSink::new(&args.output))?;
        Summary {
            published,
            last_frame_number: sink.last_frame_number(),
            output: Some(args.output.display().to_string()),
        }
    };

    stop_signals::polling::disable();
    Ok(summary)
}

/// Runs the whole lifecycle of a [VideoVisualization] displaying into `sink`.
/// Returns the number of frames published and the sink.
fn drive<S: RenderSink>(
    args: &Args,
    settings: ViewerSettings,
    sink: S,
) -> Result<(u64, S), ViewerError> {
    let store = Arc::new(FrameStore::new());
    let mut visualization = VideoVisualization::new(store, open_source(args)?, sink);

    if let Some(detector) = open_detector(args)? {
        visualization = visualization.with_detector(detector);
    }

    visualization.on_load_settings(settings);
    visualization.on_init()?;

    play(&mut visualization, args.frames);
    let published = visualization.store().publish_count();

    visualization.on_cleanup()?;
    Ok((published, visualization.into_sink()))
}

/// Ticks until `frames` frames have been published (if `frames` isn't `0`),
/// the source ends, the source keeps failing, or a stop signal arrives.
fn play(visualization: &mut impl Visualization, frames: u64) {
    let mut published = 0;
    let mut failures = 0;

    while !stop_signals::polling::poll() {
        let outcome = visualization.on_pre_frame(Instant::now());
        visualization.on_local_frame();

        match outcome {
            TickOutcome::Published { .. } => {
                published += 1;
                failures = 0;
                if frames != 0 && published >= frames {
                    break;
                }
            }
            TickOutcome::Status(DecodeStatus::EndOfStream) => break,
            TickOutcome::Status(_) | TickOutcome::Skipped => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    util::debug_log_error!("Giving up after {failures} failed frames in a row.");
                    break;
                }
            }
            TickOutcome::Paced | TickOutcome::Pending => thread::sleep(IDLE_SLEEP),
        }
    }

    if stop_signals::polling::consume() {
        util::debug_log_info!("Stopping early (received a stop signal).");
    }
}

fn open_source(args: &Args) -> Result<Source, ViewerError> {
    let input = || args.input.as_ref().ok_or(ViewerError::MissingInput);

    Ok(match args.source {
        SourceKind::Pattern => Source::Decode(Box::new(
            TestPattern::new(args.size).map_err(ViewerError::PatternSize)?,
        )),
        SourceKind::Image => Source::Capture(Box::new(StillImage::open(input()?)?)),
        SourceKind::Video => open_video(input()?)?,
    })
}

#[cfg(feature = "ffmpeg")]
fn open_video(path: &std::path::Path) -> Result<Source, ViewerError> {
    let video = media::streams::H264File::open(path)
        .map_err(|e| media::providers::ProviderError::Decode(Box::new(e)))?;
    Ok(Source::Decode(Box::new(video)))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_video(_path: &std::path::Path) -> Result<Source, ViewerError> {
    Err(ViewerError::VideoUnsupported)
}

fn open_detector(args: &Args) -> Result<Option<Detector>, ViewerError> {
    let Some(path) = &args.detections else {
        return Ok(None);
    };

    let provider = JsonDetections::load(path).map_err(ViewerError::Detections)?;
    let class_names = match &args.class_names {
        Some(path) => ClassNames::load(path).map_err(ViewerError::ClassNames)?,
        None => ClassNames::default(),
    };

    Ok(Some(Detector {
        provider: Box::new(provider),
        class_names,
    }))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use media::frame::GeometryError;

    use super::*;

    #[test]
    fn pattern_run_saves_a_frame() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");
        let args = Args::try_parse_from([
            "viewer",
            "--frames",
            "3",
            "--size",
            "16x8",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();

        let summary = run(&args).unwrap();
        assert_eq!(summary.published, 3);
        assert_eq!(summary.last_frame_number, Some(2));

        let saved = image::open(&output).unwrap();
        assert_eq!((saved.width(), saved.height()), (16, 8));
    }

    #[test]
    fn still_image_run_with_detections() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        let detections = dir.path().join("detections.json");

        image::RgbImage::new(10, 10).save(&input).unwrap();
        std::fs::write(
            &detections,
            r#"[{ "class_id": 1, "confidence": 0.8,
                  "x_min": 0.0, "y_min": 0.0, "x_max": 0.5, "y_max": 0.5 }]"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "viewer",
            "--source",
            "image",
            "--input",
            input.to_str().unwrap(),
            "--detections",
            detections.to_str().unwrap(),
            "--frames",
            "1",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();

        run(&args).unwrap();

        let saved = image::open(&output).unwrap().into_rgb8();
        assert_eq!(saved.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(saved.get_pixel(9, 9).0, [0, 0, 0]);
    }

    #[test]
    fn dry_runs_save_nothing() {
        let args = Args::try_parse_from([
            "viewer", "--dry-run", "--frames", "2", "--size", "8x8",
        ])
        .unwrap();

        let summary = run(&args).unwrap();
        assert_eq!(summary.published, 2);
        assert_eq!(summary.last_frame_number, Some(1));
        assert_eq!(summary.output, None);
    }

    #[test]
    fn huge_patterns_fail_to_open() {
        let size = format!("{}x2", usize::MAX / 2);
        let args = Args::try_parse_from(["viewer", "--size", size.as_str()]).unwrap();
        assert!(matches!(
            open_source(&args),
            Err(ViewerError::PatternSize(GeometryError::TooLarge))
        ));
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn video_needs_ffmpeg() {
        let args =
            Args::try_parse_from(["viewer", "--source", "video", "--input", "a.mp4"]).unwrap();
        assert!(matches!(
            open_source(&args),
            Err(ViewerError::VideoUnsupported)
        ));
    }

    #[test]
    fn missing_images_fail_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "viewer",
            "--source",
            "image",
            "--input",
            dir.path().join("nope.png").to_str().unwrap(),
        ])
        .unwrap();

        assert!(matches!(open_source(&args), Err(ViewerError::Source(_))));
    }
}
