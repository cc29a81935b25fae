//! A single-slot, latest-wins hand-off of [Frame]s from a producer to a
//! consumer. See [FrameStore].

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::frame::{Frame, GeometryError};

/// Holds the most recently published [Frame], if there is one.
///
/// There's no queue: publishing replaces whatever was there, so a consumer
/// that reads slower than the producer publishes simply misses frames.
///
/// The lock is only ever held long enough to swap or clone a reference
/// counted handle, never while pixels are converted or copied. Published
/// frames are immutable, so a reader holding a [FrameHandle] can never
/// observe a half-written frame, and a frame's buffer is freed exactly once,
/// when the last handle to it is dropped.
///
/// ```
/// use media::frame::{Frame, FrameMeta};
/// use media::frame_store::{CurrentFrame, FrameStore};
///
/// let store = FrameStore::new();
/// assert!(matches!(store.current_frame(), CurrentFrame::Unavailable));
///
/// let frame = Frame::rgb_from_fill((4, 4).into(), [9, 9, 9], FrameMeta::new(1, 30.0));
/// assert_eq!(store.publish(frame), None);
///
/// let CurrentFrame::Available(current) = store.current_frame() else {
///     unreachable!();
/// };
/// assert_eq!(current.frame_number(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FrameStore {
    current: Mutex<Option<FrameHandle>>,
    publish_count: AtomicU64,
}

impl FrameStore {
    /// Creates an empty store (nothing has been published).
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(None),
            publish_count: AtomicU64::new(0),
        }
    }

    /// Installs `frame` as the current frame, returning the frame number of
    /// the frame it replaced (if any).
    ///
    /// Concurrent calls are serialized; whichever call takes the lock last
    /// wins.
    pub fn publish(&self, frame: Frame) -> Option<u64> {
        let handle = FrameHandle(Arc::new(frame));

        let previous = {
            let mut current = self.lock();
            self.publish_count.fetch_add(1, Ordering::Relaxed);
            current.replace(handle)
        };

        // The old handle is dropped here, outside of the lock. If a reader
        // still holds it the buffer lives on until they're done.
        previous.map(|previous| previous.frame_number())
    }

    /// A handle to the current frame, or [CurrentFrame::Unavailable] if
    /// nothing has been published (or the store was [cleared](Self::clear)).
    pub fn current_frame(&self) -> CurrentFrame {
        match self.lock().as_ref() {
            Some(handle) => CurrentFrame::Available(handle.clone()),
            None => CurrentFrame::Unavailable,
        }
    }

    /// Runs `f` on the current frame, returning its result, or returns [None]
    /// if no frame is available.
    ///
    /// The store's lock is *not* held while `f` runs, so `f` is free to do
    /// slow things (like copying pixels out).
    pub fn with_current_frame<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Frame) -> R,
    {
        match self.current_frame() {
            CurrentFrame::Available(handle) => Some(f(&handle)),
            CurrentFrame::Unavailable => None,
        }
    }

    /// The number of times [Self::publish] has been called.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }

    /// Whether there is no current frame.
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Releases the current frame, returning the store to its empty state.
    pub fn clear(&self) {
        let previous = self.lock().take();
        drop(previous);
    }

    /// Locks the slot. A panic while the lock was held can't have left the
    /// slot half-updated (it's a single handle), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Option<FrameHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What [FrameStore::current_frame] returns.
#[derive(Debug, Clone)]
pub enum CurrentFrame {
    Available(FrameHandle),
    /// Nothing has been published yet. Not an error: display a placeholder
    /// (or the previous frame) and try again later.
    Unavailable,
}

impl CurrentFrame {
    pub fn available(self) -> Option<FrameHandle> {
        match self {
            Self::Available(handle) => Some(handle),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// A shared, read-only reference to a published [Frame]. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct FrameHandle(Arc<Frame>);

impl FrameHandle {
    /// Whether two handles refer to the same published frame.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copies the visible bytes of each row into `out`, whose rows start
    /// `out_stride` bytes apart (e.g. a texture upload buffer).
    pub fn copy_rows_into(&self, out: &mut [u8], out_stride: usize) -> Result<(), GeometryError> {
        let row_len = self.row_len();
        if out_stride < row_len {
            return Err(GeometryError::StrideTooSmall {
                stride: out_stride,
                min: row_len,
            });
        }

        let expected = out_stride
            .checked_mul(self.height() - 1)
            .and_then(|len| len.checked_add(row_len))
            .ok_or(GeometryError::TooLarge)?;
        if out.len() < expected {
            return Err(GeometryError::WrongBufferLen {
                expected,
                actual: out.len(),
            });
        }

        for (src, dst) in self.rows().zip(out.chunks_mut(out_stride)) {
            dst[..row_len].copy_from_slice(src);
        }

        Ok(())
    }
}

impl Deref for FrameHandle {
    type Target = Frame;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::frame::FrameMeta;

    fn solid(frame_number: u64) -> Frame {
        let value = (frame_number % 256) as u8;
        Frame::rgb_from_fill(
            (7, 5).into(),
            [value, value, value],
            FrameMeta::new(frame_number, 30.0),
        )
    }

    /// Every visible byte of a frame built by [solid] matches its number.
    fn is_consistent(frame: &Frame) -> bool {
        let value = (frame.frame_number() % 256) as u8;
        frame.rows().all(|row| row.iter().all(|&b| b == value))
    }

    #[test]
    fn empty_store_is_unavailable() {
        let store = FrameStore::new();
        assert!(!store.current_frame().is_available());
        assert!(store.is_empty());
        assert_eq!(store.with_current_frame(|f| f.frame_number()), None);
        assert_eq!(store.publish_count(), 0);
    }

    #[test]
    fn latest_publish_wins() {
        let store = FrameStore::new();
        assert_eq!(store.publish(solid(1)), None);
        assert_eq!(store.publish(solid(2)), Some(1));

        let current = store.current_frame().available().unwrap();
        assert_eq!(current.frame_number(), 2);
        assert!(is_consistent(&current));
        assert_eq!(store.publish_count(), 2);
    }

    #[test]
    fn replaced_frame_is_released_once_readers_are_done() {
        let store = FrameStore::new();
        store.publish(solid(1));

        let reader = store.current_frame().available().unwrap();
        assert_eq!(Arc::strong_count(&reader.0), 2);

        store.publish(solid(2));

        // The store let go of frame 1, but the reader can still use it.
        assert_eq!(Arc::strong_count(&reader.0), 1);
        assert_eq!(reader.frame_number(), 1);
        assert!(is_consistent(&reader));

        let weak = Arc::downgrade(&reader.0);
        drop(reader);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clear_releases_the_frame() {
        let store = FrameStore::new();
        store.publish(solid(4));

        let weak = Arc::downgrade(&store.current_frame().available().unwrap().0);
        store.clear();

        assert!(store.is_empty());
        assert!(weak.upgrade().is_none());
        assert!(!store.current_frame().is_available());
    }

    #[test]
    fn handles_to_the_same_publish_are_equal() {
        let store = FrameStore::new();
        store.publish(solid(1));
        let a = store.current_frame().available().unwrap();
        let b = store.current_frame().available().unwrap();
        assert!(a.ptr_eq(&b));

        store.publish(solid(1));
        let c = store.current_frame().available().unwrap();
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn concurrent_publishes_leave_one_whole_frame() {
        let store = FrameStore::new();

        thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for j in 0..50 {
                        store.publish(solid(i * 1000 + j));
                    }
                });
            }

            let store = &store;
            s.spawn(move || {
                for _ in 0..200 {
                    if let Some(consistent) = store.with_current_frame(is_consistent) {
                        assert!(consistent);
                    }
                }
            });
        });

        assert_eq!(store.publish_count(), 400);
        let current = store.current_frame().available().unwrap();
        assert!(is_consistent(&current));
        assert_eq!(current.frame_number() % 1000, 49);
    }

    #[test]
    fn rows_are_copied_with_the_requested_stride() {
        let store = FrameStore::new();
        store.publish(Frame::rgb_from_fn((2, 2).into(), FrameMeta::default(), |r, c| {
            [r as u8, c as u8, 7]
        }));
        let handle = store.current_frame().available().unwrap();

        let mut out = vec![0xff; 16];
        handle.copy_rows_into(&mut out, 8).unwrap();
        assert_eq!(
            out,
            [0, 0, 7, 0, 1, 7, 0xff, 0xff, 1, 0, 7, 1, 1, 7, 0xff, 0xff]
        );

        assert_eq!(
            handle.copy_rows_into(&mut out, 5),
            Err(GeometryError::StrideTooSmall { stride: 5, min: 6 })
        );
        assert_eq!(
            handle.copy_rows_into(&mut out[..13], 8),
            Err(GeometryError::WrongBufferLen {
                expected: 14,
                actual: 13
            })
        );
    }
}
