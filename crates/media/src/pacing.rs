//! Contains [FramePacer], the elapsed-time gate applied before asking a
//! producer for its next frame.

use std::time::{Duration, Instant};

/// Decides whether enough time has passed to produce another frame.
///
/// A pacer without an interval is always ready. Deadlines are scheduled one
/// interval after the previous deadline (not after the time a frame was
/// actually produced) so the average rate doesn't drift, but a producer that
/// falls more than a frame behind skips ahead instead of bursting to catch
/// up.
///
/// ```
/// use std::time::{Duration, Instant};
/// use media::pacing::FramePacer;
///
/// let start = Instant::now();
/// let mut pacer = FramePacer::new(10.0);
/// assert!(pacer.ready(start));
///
/// pacer.mark(start);
/// assert!(!pacer.ready(start + Duration::from_millis(50)));
/// assert!(pacer.ready(start + Duration::from_millis(100)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePacer {
    interval: Option<Duration>,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    /// A pacer for `fps` frames per second. If `fps` isn't normal and
    /// positive the pacer is [unpaced](Self::unpaced).
    pub fn new(fps: f64) -> Self {
        Self {
            interval: frame_interval(fps),
            next_deadline: None,
        }
    }

    /// A pacer that's always ready.
    pub const fn unpaced() -> Self {
        Self {
            interval: None,
            next_deadline: None,
        }
    }

    /// The time between two frames, or [None] if unpaced.
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether another frame should be produced at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_deadline.is_none_or(|deadline| now >= deadline)
    }

    /// Record that a frame was produced at `now`.
    pub fn mark(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };

        let next = match self.next_deadline {
            Some(deadline) if now < deadline + interval => deadline + interval,
            _ => now + interval,
        };
        self.next_deadline = Some(next);
    }

    /// Take on the rate `fps` if this pacer doesn't have one yet (e.g. a
    /// stream whose rate is only known after decoding starts). Returns
    /// whether the rate was adopted.
    pub fn adopt_fps(&mut self, fps: f64) -> bool {
        if self.interval.is_some() {
            return false;
        }

        self.interval = frame_interval(fps);
        self.interval.is_some()
    }

    /// Forget the current deadline so the next frame is produced right away.
    pub fn reset(&mut self) {
        self.next_deadline = None;
    }
}

/// The amount of time between two frames at `fps` frames per second. [None]
/// is returned if `fps` is not normal and positive non-zero.
pub fn frame_interval(fps: f64) -> Option<Duration> {
    if !fps.is_normal() || fps <= 0.0 {
        None
    } else {
        Some(Duration::from_secs(1).div_f64(fps))
    }
}
