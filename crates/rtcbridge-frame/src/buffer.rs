use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Largest accepted width or height. Keeps `width * height * 4` inside `usize`
/// on 32-bit targets.
pub const MAX_DIMENSION: u32 = 16_384;

/// Planar YUV 4:2:0 image with independent strides per plane.
///
/// Chroma planes cover `ceil(width / 2) x ceil(height / 2)` samples.
#[derive(Debug, Clone)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    y: Bytes,
    u: Bytes,
    v: Bytes,
    stride_y: usize,
    stride_u: usize,
    stride_v: usize,
}

impl I420Buffer {
    /// Create a buffer from tightly packed planes.
    pub fn new(
        width: u32,
        height: u32,
        y: impl Into<Bytes>,
        u: impl Into<Bytes>,
        v: impl Into<Bytes>,
    ) -> Result<Self> {
        let chroma_width = chroma_len(width);
        Self::with_strides(
            width,
            height,
            (y.into(), width as usize),
            (u.into(), chroma_width),
            (v.into(), chroma_width),
        )
    }

    /// Create a buffer from `(plane, stride)` pairs.
    pub fn with_strides(
        width: u32,
        height: u32,
        y: (Bytes, usize),
        u: (Bytes, usize),
        v: (Bytes, usize),
    ) -> Result<Self> {
        check_dimensions(width, height)?;

        let chroma_width = chroma_len(width);
        let chroma_height = chroma_len(height);
        check_plane("Y", &y.0, y.1, width as usize, height as usize)?;
        check_plane("U", &u.0, u.1, chroma_width, chroma_height)?;
        check_plane("V", &v.0, v.1, chroma_width, chroma_height)?;

        Ok(Self {
            width,
            height,
            y: y.0,
            u: u.0,
            v: v.0,
            stride_y: y.1,
            stride_u: u.1,
            stride_v: v.1,
        })
    }

    /// A single-colour image. Handy for synthetic sources.
    pub fn solid(width: u32, height: u32, y: u8, u: u8, v: u8) -> Result<Self> {
        check_dimensions(width, height)?;
        let luma = width as usize * height as usize;
        let chroma = chroma_len(width) * chroma_len(height);
        Self::new(
            width,
            height,
            vec![y; luma],
            vec![u; chroma],
            vec![v; chroma],
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn u(&self) -> &[u8] {
        &self.u
    }

    pub fn v(&self) -> &[u8] {
        &self.v
    }

    pub fn stride_y(&self) -> usize {
        self.stride_y
    }

    pub fn stride_u(&self) -> usize {
        self.stride_u
    }

    pub fn stride_v(&self) -> usize {
        self.stride_v
    }
}

pub(crate) fn chroma_len(luma: u32) -> usize {
    (luma as usize).div_ceil(2)
}

pub(crate) fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(FrameError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Bytes needed for `rows` rows of `row_len` bytes spaced `stride` apart.
///
/// The last row only needs `row_len` bytes, not a full stride. `None` when the
/// stride is shorter than a row or the span does not fit in `usize`.
pub(crate) fn plane_span(stride: usize, row_len: usize, rows: usize) -> Option<usize> {
    if stride < row_len {
        return None;
    }
    stride.checked_mul(rows.saturating_sub(1))?.checked_add(row_len)
}

fn check_plane(
    plane: &'static str,
    data: &[u8],
    stride: usize,
    row_len: usize,
    rows: usize,
) -> Result<()> {
    let needed = plane_span(stride, row_len, rows).unwrap_or(usize::MAX);
    if data.len() < needed {
        return Err(FrameError::InvalidPlane {
            plane,
            len: data.len(),
            needed,
        });
    }
    Ok(())
}
