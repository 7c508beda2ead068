/// Errors that can occur while building or converting frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Width or height is zero or too large to address.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A plane is shorter than its stride and height require.
    #[error("{plane} plane too small ({len} bytes, need {needed})")]
    InvalidPlane {
        plane: &'static str,
        len: usize,
        needed: usize,
    },

    /// The destination buffer cannot hold the converted image.
    #[error("destination too small ({len} bytes, need {needed})")]
    BufferTooSmall { len: usize, needed: usize },

    /// The frame only carries a native texture, no CPU-readable pixels.
    #[error("frame has no CPU pixel data")]
    NoPixelData,

    /// The frame is not backed by a native texture.
    #[error("frame has no native handle")]
    NoNativeHandle,

    /// Exporting the native texture as a sharable handle failed.
    #[error("native handle export failed: {0}")]
    ExportFailed(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
