use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtcbridge_frame::{GpuSurfaceDescriptor, PixelBuffer};

/// Pull-side interface the presentation layer calls for each displayed frame.
///
/// Both calls may run concurrently with frame delivery and must not block
/// for long. Absence is the normal "nothing to show" answer, never an error.
/// The requested size is a hint; buffers always carry the frame's own size.
pub trait TextureSource: Send + Sync {
    /// The current frame converted into the renderer's pixel layout.
    ///
    /// The previous buffer may be kept while the next one is pulled; storage
    /// is still reused between calls.
    fn copy_pixel_buffer(&self, width: usize, height: usize) -> Option<Arc<PixelBuffer>>;

    /// The current frame's native texture, exported for sharing.
    fn copy_gpu_surface(&self, width: usize, height: usize) -> Option<GpuSurfaceDescriptor>;
}

/// The host's texture presentation surface.
pub trait TextureRegistrar: Send + Sync {
    /// Register a source and return its texture id.
    fn register_texture(&self, source: Arc<dyn TextureSource>) -> i64;

    fn unregister_texture(&self, texture_id: i64);

    /// A new frame is ready to be pulled.
    fn mark_texture_frame_available(&self, texture_id: i64);
}

struct TextureSlot {
    source: Arc<dyn TextureSource>,
    frames_available: u64,
}

/// Registrar that keeps sources in a map and counts frame notifications.
///
/// Used by hosts that pull buffers themselves and by tests.
pub struct InMemoryTextureRegistrar {
    next_id: AtomicI64,
    textures: Mutex<HashMap<i64, TextureSlot>>,
}

impl InMemoryTextureRegistrar {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            textures: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self, texture_id: i64) -> Option<Arc<dyn TextureSource>> {
        self.lock()
            .get(&texture_id)
            .map(|slot| Arc::clone(&slot.source))
    }

    pub fn is_registered(&self, texture_id: i64) -> bool {
        self.lock().contains_key(&texture_id)
    }

    /// How many times `mark_texture_frame_available` was called for the id.
    pub fn frames_available(&self, texture_id: i64) -> u64 {
        self.lock()
            .get(&texture_id)
            .map_or(0, |slot| slot.frames_available)
    }

    pub fn texture_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, TextureSlot>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryTextureRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureRegistrar for InMemoryTextureRegistrar {
    fn register_texture(&self, source: Arc<dyn TextureSource>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            TextureSlot {
                source,
                frames_available: 0,
            },
        );
        tracing::debug!(texture_id = id, "texture registered");
        id
    }

    fn unregister_texture(&self, texture_id: i64) {
        if self.lock().remove(&texture_id).is_some() {
            tracing::debug!(texture_id, "texture unregistered");
        }
    }

    fn mark_texture_frame_available(&self, texture_id: i64) {
        match self.lock().get_mut(&texture_id) {
            Some(slot) => slot.frames_available += 1,
            None => tracing::trace!(texture_id, "frame available for unregistered texture"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl TextureSource for Blank {
        fn copy_pixel_buffer(&self, _width: usize, _height: usize) -> Option<Arc<PixelBuffer>> {
            None
        }

        fn copy_gpu_surface(&self, _width: usize, _height: usize) -> Option<GpuSurfaceDescriptor> {
            None
        }
    }

    #[test]
    fn ids_are_unique_and_counted() {
        let registrar = InMemoryTextureRegistrar::new();
        let a = registrar.register_texture(Arc::new(Blank));
        let b = registrar.register_texture(Arc::new(Blank));
        assert_ne!(a, b);

        registrar.mark_texture_frame_available(a);
        registrar.mark_texture_frame_available(a);
        assert_eq!(registrar.frames_available(a), 2);
        assert_eq!(registrar.frames_available(b), 0);
        assert_eq!(registrar.texture_ids(), vec![a, b]);
    }

    #[test]
    fn unregistered_textures_ignore_notifications() {
        let registrar = InMemoryTextureRegistrar::new();
        let id = registrar.register_texture(Arc::new(Blank));
        registrar.unregister_texture(id);
        registrar.mark_texture_frame_available(id);
        assert!(!registrar.is_registered(id));
        assert!(registrar.source(id).is_none());
        assert!(registrar.is_empty());
    }
}
