use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtcbridge_events::Messenger;
use rtcbridge_transport::StreamResolver;
use serde::Serialize;
use tracing::debug;

use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::renderer::FrameRenderer;
use crate::texture::TextureRegistrar;

/// Reply to a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRenderer {
    pub texture_id: i64,
}

/// Renderers by texture id.
///
/// The map lock is released before any renderer or transport call.
pub struct RendererRegistry {
    config: RendererConfig,
    registrar: Arc<dyn TextureRegistrar>,
    messenger: Arc<dyn Messenger>,
    streams: Arc<dyn StreamResolver>,
    renderers: Mutex<HashMap<i64, Arc<FrameRenderer>>>,
}

impl RendererRegistry {
    pub fn new(
        registrar: Arc<dyn TextureRegistrar>,
        messenger: Arc<dyn Messenger>,
        streams: Arc<dyn StreamResolver>,
    ) -> Self {
        Self::with_config(registrar, messenger, streams, RendererConfig::default())
    }

    pub fn with_config(
        registrar: Arc<dyn TextureRegistrar>,
        messenger: Arc<dyn Messenger>,
        streams: Arc<dyn StreamResolver>,
        config: RendererConfig,
    ) -> Self {
        Self {
            config,
            registrar,
            messenger,
            streams,
            renderers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn create_renderer(&self) -> CreatedRenderer {
        let renderer = FrameRenderer::create(
            Arc::clone(&self.registrar),
            Arc::clone(&self.messenger),
            &self.config,
        );
        let texture_id = renderer.texture_id();
        self.lock().insert(texture_id, renderer);
        CreatedRenderer { texture_id }
    }

    pub fn renderer(&self, texture_id: i64) -> Option<Arc<FrameRenderer>> {
        self.lock().get(&texture_id).cloned()
    }

    /// Bind the renderer to the first video track of stream `stream_id`
    /// within `owner_tag`.
    ///
    /// A missing stream, or one without video tracks, clears the renderer's
    /// track. An unknown texture id is ignored; returns whether a renderer
    /// was found.
    pub fn bind_stream(&self, texture_id: i64, stream_id: &str, owner_tag: &str) -> bool {
        let Some(renderer) = self.renderer(texture_id) else {
            debug!(texture_id, stream_id, "bind on unknown renderer ignored");
            return false;
        };

        let track = self
            .streams
            .media_stream(stream_id, owner_tag)
            .and_then(|stream| stream.video_tracks().into_iter().next());
        match track {
            Some(track) => {
                debug!(texture_id, stream_id, owner_tag, track_id = track.id(), "binding stream");
                renderer.set_track(Some(track));
                renderer.set_stream_id(Some(stream_id.to_string()));
            }
            None => {
                debug!(texture_id, stream_id, owner_tag, "stream has no video track; clearing");
                renderer.set_track(None);
            }
        }
        true
    }

    /// Unregister the renderer's texture and drop it.
    pub fn dispose_renderer(&self, texture_id: i64) -> Result<()> {
        let renderer = self
            .lock()
            .remove(&texture_id)
            .ok_or(RenderError::NotFound(texture_id))?;
        self.registrar.unregister_texture(texture_id);
        renderer.set_track(None);
        debug!(texture_id, "video renderer disposed");
        Ok(())
    }

    /// Clear the track of every renderer bound to `stream_id`. Returns how
    /// many renderers were detached.
    pub fn detach_stream(&self, stream_id: &str) -> usize {
        let bound: Vec<Arc<FrameRenderer>> = self
            .snapshot()
            .into_iter()
            .filter(|renderer| renderer.check_media_stream(stream_id))
            .collect();
        for renderer in &bound {
            renderer.set_track(None);
        }
        if !bound.is_empty() {
            debug!(stream_id, count = bound.len(), "detached renderers from stream");
        }
        bound.len()
    }

    /// Sorted texture ids.
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

    fn snapshot(&self) -> Vec<Arc<FrameRenderer>> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Arc<FrameRenderer>>> {
        self.renderers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("config", &self.config)
            .field("renderers", &self.texture_ids())
            .finish()
    }
}
