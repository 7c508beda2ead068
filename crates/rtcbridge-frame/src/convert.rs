use serde::{Deserialize, Serialize};

use crate::buffer::{plane_span, I420Buffer};
use crate::error::{FrameError, Result};

/// Every packed layout uses 32 bits per pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Packed 32-bit pixel layouts, named by byte order in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// R, G, B, A. What most texture uploaders expect.
    #[default]
    Rgba,
    /// B, G, R, A. Native order of DXGI/Metal shared surfaces.
    Bgra,
    /// A, R, G, B.
    Argb,
    /// A, B, G, R.
    Abgr,
}

impl PixelLayout {
    /// Human-readable layout name.
    pub fn name(self) -> &'static str {
        match self {
            PixelLayout::Rgba => "rgba",
            PixelLayout::Bgra => "bgra",
            PixelLayout::Argb => "argb",
            PixelLayout::Abgr => "abgr",
        }
    }

    #[inline]
    fn write(self, dst: &mut [u8], r: u8, g: u8, b: u8) {
        let px = match self {
            PixelLayout::Rgba => [r, g, b, 0xff],
            PixelLayout::Bgra => [b, g, r, 0xff],
            PixelLayout::Argb => [0xff, r, g, b],
            PixelLayout::Abgr => [0xff, b, g, r],
        };
        dst.copy_from_slice(&px);
    }
}

impl std::str::FromStr for PixelLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba" => Ok(PixelLayout::Rgba),
            "bgra" => Ok(PixelLayout::Bgra),
            "argb" => Ok(PixelLayout::Argb),
            "abgr" => Ok(PixelLayout::Abgr),
            other => Err(format!("unknown pixel layout: {other}")),
        }
    }
}

/// Convert an I420 image into a packed layout.
///
/// `dst_stride` is the distance in bytes between destination rows and must be
/// at least `width * 4`. Uses BT.601 limited-range coefficients in fixed point.
pub fn convert_i420(
    src: &I420Buffer,
    layout: PixelLayout,
    dst: &mut [u8],
    dst_stride: usize,
) -> Result<()> {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let row_bytes = width * BYTES_PER_PIXEL;

    // Plane strides were span-checked at construction, so the row offsets
    // below stay in bounds.
    let needed = plane_span(dst_stride, row_bytes, height).unwrap_or(usize::MAX);
    if dst.len() < needed {
        return Err(FrameError::BufferTooSmall {
            len: dst.len(),
            needed,
        });
    }

    let (y_plane, u_plane, v_plane) = (src.y(), src.u(), src.v());
    for row in 0..height {
        let y_row = &y_plane[row * src.stride_y()..];
        let u_row = &u_plane[(row / 2) * src.stride_u()..];
        let v_row = &v_plane[(row / 2) * src.stride_v()..];
        let out = &mut dst[row * dst_stride..row * dst_stride + row_bytes];

        for (col, px) in out.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let (r, g, b) = yuv_to_rgb(y_row[col], u_row[col / 2], v_row[col / 2]);
            layout.write(px, r, g, b);
        }
    }
    Ok(())
}

#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = 298 * (i32::from(y) - 16);
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;

    let r = (c + 409 * e + 128) >> 8;
    let g = (c - 100 * d - 208 * e + 128) >> 8;
    let b = (c + 516 * d + 128) >> 8;
    (clamp(r), clamp(g), clamp(b))
}

#[inline]
fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}
