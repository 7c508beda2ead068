//! Video frames as handed over by the real-time transport.
//!
//! Frames are immutable and reference counted: the transport's delivery
//! thread and a renderer's presentation thread can both hold the same frame
//! while the renderer swaps its "current frame" slot. This crate also owns
//! the conversion from planar I420 into packed 32-bit layouts and the two
//! presentation targets (CPU pixel buffers and GPU surface descriptors).

pub mod buffer;
pub mod convert;
pub mod error;
pub mod frame;
pub mod surface;

pub use buffer::I420Buffer;
pub use convert::{convert_i420, PixelLayout, BYTES_PER_PIXEL};
pub use error::{FrameError, Result};
pub use frame::{NativeTexture, Rotation, SharedHandle, VideoFrame};
pub use surface::{GpuSurfaceDescriptor, PixelBuffer, SurfaceRelease};
