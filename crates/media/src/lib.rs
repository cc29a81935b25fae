//! This library contains all of the functionality for getting frames from a
//! producer (a decoder or a camera) to a consumer (whatever displays them).
//!
//! - [frame]: the [Frame](frame::Frame) type and its metadata.
//! - [convert]: planar YUV 4:2:0 to interleaved RGB conversion.
//! - [frame_store]: the latest-wins hand-off between producer and consumer.
//! - [providers] and [streams]: where frames come from.
//! - [pacing], [overlay], and [geometry]: the bits around the edges.

pub mod convert;
pub mod frame;
pub mod frame_store;
pub mod geometry;
pub mod overlay;
pub mod pacing;
pub mod providers;
pub mod streams;
