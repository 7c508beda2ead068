use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::{check_dimensions, I420Buffer};
use crate::convert::{convert_i420, PixelLayout};
use crate::error::{FrameError, Result};

/// Clockwise rotation the consumer must apply to present the frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<i32> for Rotation {
    type Error = String;

    fn try_from(degrees: i32) -> std::result::Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("unsupported rotation: {other}")),
        }
    }
}

/// Platform handle a compositor can open to share a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub u64);

/// A hardware-backed texture owned by the transport's decoder.
///
/// The reference the renderer hands to the presentation layer is an
/// `Arc<dyn NativeTexture>` clone; dropping it is the release.
pub trait NativeTexture: Send + Sync {
    /// Export the texture as a handle another device context can open.
    fn export_shared_handle(&self) -> Result<SharedHandle>;

    /// Packed layout of the texture's pixels.
    fn layout(&self) -> PixelLayout {
        PixelLayout::Bgra
    }
}

#[derive(Clone)]
enum FrameBuffer {
    I420(I420Buffer),
    Native(Arc<dyn NativeTexture>),
}

struct FrameInner {
    width: u32,
    height: u32,
    rotation: Rotation,
    timestamp_us: i64,
    buffer: FrameBuffer,
}

/// An immutable, reference-counted decoded video frame.
///
/// Cloning is a reference-count bump; the pixel data is never copied or
/// mutated after construction.
#[derive(Clone)]
pub struct VideoFrame {
    inner: Arc<FrameInner>,
}

impl VideoFrame {
    /// Wrap a CPU-side I420 image.
    pub fn from_i420(buffer: I420Buffer, rotation: Rotation, timestamp_us: i64) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                width: buffer.width(),
                height: buffer.height(),
                rotation,
                timestamp_us,
                buffer: FrameBuffer::I420(buffer),
            }),
        }
    }

    /// Wrap a hardware texture.
    pub fn from_native(
        texture: Arc<dyn NativeTexture>,
        width: u32,
        height: u32,
        rotation: Rotation,
        timestamp_us: i64,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            inner: Arc::new(FrameInner {
                width,
                height,
                rotation,
                timestamp_us,
                buffer: FrameBuffer::Native(texture),
            }),
        })
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn rotation(&self) -> Rotation {
        self.inner.rotation
    }

    pub fn timestamp_us(&self) -> i64 {
        self.inner.timestamp_us
    }

    /// The hardware texture, present only for hardware-backed frames.
    pub fn native_handle(&self) -> Option<&Arc<dyn NativeTexture>> {
        match &self.inner.buffer {
            FrameBuffer::Native(texture) => Some(texture),
            FrameBuffer::I420(_) => None,
        }
    }

    /// The CPU-side planes, absent for hardware-backed frames.
    pub fn i420(&self) -> Option<&I420Buffer> {
        match &self.inner.buffer {
            FrameBuffer::I420(buffer) => Some(buffer),
            FrameBuffer::Native(_) => None,
        }
    }

    /// Convert the frame's pixels into `dst` using `layout`.
    pub fn convert_to(&self, layout: PixelLayout, dst: &mut [u8], dst_stride: usize) -> Result<()> {
        match &self.inner.buffer {
            FrameBuffer::I420(buffer) => convert_i420(buffer, layout, dst, dst_stride),
            FrameBuffer::Native(_) => Err(FrameError::NoPixelData),
        }
    }

    /// True when both handles point at the same underlying frame.
    pub fn ptr_eq(&self, other: &VideoFrame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner.buffer {
            FrameBuffer::I420(_) => "i420",
            FrameBuffer::Native(_) => "native",
        };
        f.debug_struct("VideoFrame")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("rotation", &self.inner.rotation)
            .field("timestamp_us", &self.inner.timestamp_us)
            .field("buffer", &kind)
            .finish()
    }
}
