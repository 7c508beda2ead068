//! Video renderers.
//!
//! A [`FrameRenderer`] is a video sink bound to at most one track. Frames
//! arrive on transport threads, are announced through the renderer's event
//! channel and parked in a "current frame" slot. The presentation layer pulls
//! from that slot through the [`TextureSource`] the renderer registered with
//! the host's [`TextureRegistrar`], either as a converted [`PixelBuffer`] or
//! as an exported [`GpuSurfaceDescriptor`].
//!
//! [`RendererRegistry`] owns renderers by texture id and binds them to media
//! streams.
//!
//! [`PixelBuffer`]: rtcbridge_frame::PixelBuffer
//! [`GpuSurfaceDescriptor`]: rtcbridge_frame::GpuSurfaceDescriptor

pub mod config;
pub mod error;
pub mod registry;
pub mod renderer;
pub mod texture;

pub use config::{PresentationStrategy, RendererConfig};
pub use error::{RenderError, Result};
pub use registry::{CreatedRenderer, RendererRegistry};
pub use renderer::FrameRenderer;
pub use texture::{InMemoryTextureRegistrar, TextureRegistrar, TextureSource};
