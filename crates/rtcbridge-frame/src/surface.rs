use std::fmt;
use std::sync::Arc;

use crate::convert::{PixelLayout, BYTES_PER_PIXEL};
use crate::error::{FrameError, Result};
use crate::frame::{NativeTexture, SharedHandle, VideoFrame};

/// CPU presentation buffer, reused across frames of the same size.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// An empty 0x0 buffer; it grows on the first `fill_from`.
    pub fn new(layout: PixelLayout) -> Self {
        Self {
            width: 0,
            height: 0,
            layout,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Bytes between rows.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Resize to `width x height`. Returns true when storage was reallocated.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        true
    }

    /// Convert `frame` into this buffer, resizing first when dimensions differ.
    pub fn fill_from(&mut self, frame: &VideoFrame) -> Result<()> {
        if frame.i420().is_none() {
            return Err(FrameError::NoPixelData);
        }
        if self.ensure_size(frame.width(), frame.height()) {
            tracing::trace!(
                width = frame.width(),
                height = frame.height(),
                "reallocated pixel buffer"
            );
        }
        let stride = self.stride();
        frame.convert_to(self.layout, &mut self.data, stride)
    }
}

/// Keeps a native texture alive until the presentation layer is done with it.
///
/// `release()` (or dropping the guard) gives the reference back exactly once.
pub struct SurfaceRelease {
    texture: Option<Arc<dyn NativeTexture>>,
}

impl SurfaceRelease {
    fn new(texture: Arc<dyn NativeTexture>) -> Self {
        Self {
            texture: Some(texture),
        }
    }

    /// Give the texture reference back.
    pub fn release(mut self) {
        self.texture.take();
    }

    pub fn is_released(&self) -> bool {
        self.texture.is_none()
    }
}

impl fmt::Debug for SurfaceRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRelease")
            .field("released", &self.is_released())
            .finish()
    }
}

/// GPU presentation target: a sharable handle to the frame's native texture.
#[derive(Debug)]
pub struct GpuSurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    pub handle: SharedHandle,
    pub layout: PixelLayout,
    pub release: SurfaceRelease,
}

impl GpuSurfaceDescriptor {
    /// Export `frame`'s native texture. The descriptor holds one reference to
    /// the texture until `release` is invoked.
    pub fn export(frame: &VideoFrame) -> Result<Self> {
        let texture = frame.native_handle().ok_or(FrameError::NoNativeHandle)?;
        let handle = texture.export_shared_handle()?;
        Ok(Self {
            width: frame.width(),
            height: frame.height(),
            handle,
            layout: texture.layout(),
            release: SurfaceRelease::new(Arc::clone(texture)),
        })
    }

    /// Signal that the presentation layer finished with the surface.
    pub fn release(self) {
        self.release.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::I420Buffer;
    use crate::frame::Rotation;

    struct Texture {
        fail: bool,
    }

    impl NativeTexture for Texture {
        fn export_shared_handle(&self) -> Result<SharedHandle> {
            if self.fail {
                Err(FrameError::ExportFailed("device removed".to_string()))
            } else {
                Ok(SharedHandle(42))
            }
        }
    }

    fn i420_frame(width: u32, height: u32) -> VideoFrame {
        let buf = I420Buffer::solid(width, height, 235, 128, 128).unwrap();
        VideoFrame::from_i420(buf, Rotation::Deg0, 0)
    }

    #[test]
    fn fill_reallocates_only_on_size_change() {
        let mut buffer = PixelBuffer::new(PixelLayout::Rgba);
        assert_eq!((buffer.width(), buffer.height()), (0, 0));

        buffer.fill_from(&i420_frame(4, 2)).unwrap();
        assert_eq!(buffer.as_bytes().len(), 32);
        let ptr = buffer.as_bytes().as_ptr();

        buffer.fill_from(&i420_frame(4, 2)).unwrap();
        assert_eq!(buffer.as_bytes().as_ptr(), ptr);

        assert!(buffer.ensure_size(2, 2));
        assert!(!buffer.ensure_size(2, 2));
        assert_eq!(buffer.stride(), 8);
    }

    #[test]
    fn fill_rejects_native_frames() {
        let texture: Arc<dyn NativeTexture> = Arc::new(Texture { fail: false });
        let frame = VideoFrame::from_native(texture, 2, 2, Rotation::Deg0, 0).unwrap();
        let mut buffer = PixelBuffer::new(PixelLayout::Bgra);
        assert!(matches!(
            buffer.fill_from(&frame),
            Err(FrameError::NoPixelData)
        ));
    }

    #[test]
    fn descriptor_holds_and_releases_texture_reference() {
        let texture: Arc<dyn NativeTexture> = Arc::new(Texture { fail: false });
        let frame = VideoFrame::from_native(Arc::clone(&texture), 16, 9, Rotation::Deg0, 0)
            .unwrap();
        let base = Arc::strong_count(&texture);

        let desc = GpuSurfaceDescriptor::export(&frame).unwrap();
        assert_eq!(desc.handle, SharedHandle(42));
        assert_eq!((desc.width, desc.height), (16, 9));
        assert_eq!(desc.layout, PixelLayout::Bgra);
        assert_eq!(Arc::strong_count(&texture), base + 1);

        desc.release();
        assert_eq!(Arc::strong_count(&texture), base);
    }

    #[test]
    fn export_failure_takes_no_reference() {
        let texture: Arc<dyn NativeTexture> = Arc::new(Texture { fail: true });
        let frame =
            VideoFrame::from_native(Arc::clone(&texture), 4, 4, Rotation::Deg0, 0).unwrap();
        let base = Arc::strong_count(&texture);
        assert!(matches!(
            GpuSurfaceDescriptor::export(&frame),
            Err(FrameError::ExportFailed(_))
        ));
        assert_eq!(Arc::strong_count(&texture), base);
    }

    #[test]
    fn export_requires_native_frame() {
        assert!(matches!(
            GpuSurfaceDescriptor::export(&i420_frame(2, 2)),
            Err(FrameError::NoNativeHandle)
        ));
    }
}
