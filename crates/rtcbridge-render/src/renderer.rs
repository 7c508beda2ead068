use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rtcbridge_events::{texture_event_channel, BridgeEvent, EventChannel, Messenger};
use rtcbridge_frame::{FrameError, GpuSurfaceDescriptor, PixelBuffer, PixelLayout, Rotation, VideoFrame};
use rtcbridge_transport::{SinkRegistration, VideoSink, VideoTrack};
use tracing::{debug, trace, warn};

use crate::config::{PresentationStrategy, RendererConfig};
use crate::texture::{TextureRegistrar, TextureSource};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Binding {
    sink: Option<SinkRegistration>,
    stream_id: Option<String>,
}

/// What has been announced to the host since the current binding started.
struct Announced {
    first_frame_rendered: bool,
    rotation: Rotation,
    size: (u32, u32),
    hardware_accelerated: bool,
}

/// Current frame plus two pixel buffers. The presentation layer may keep the
/// buffer it was last handed while pulling the next one; conversion then goes
/// into the other buffer, so steady state allocates nothing.
struct RenderState {
    frame: Option<VideoFrame>,
    buffers: [Arc<PixelBuffer>; 2],
    front: usize,
}

impl RenderState {
    /// Index of a buffer nobody outside holds, preferring the last one handed
    /// out. Falls back to the other buffer when both are held.
    fn writable_slot(&self) -> usize {
        let back = 1 - self.front;
        if Arc::strong_count(&self.buffers[self.front]) == 1 {
            self.front
        } else {
            back
        }
    }
}

/// Sink registered on the bound track. Frames carry the binding generation
/// they were registered under so late deliveries from an old track are
/// ignored.
struct RendererSink {
    renderer: Weak<FrameRenderer>,
    generation: u64,
}

impl VideoSink for RendererSink {
    fn on_frame(&self, frame: &VideoFrame) {
        if let Some(renderer) = self.renderer.upgrade() {
            renderer.deliver(self.generation, frame);
        }
    }
}

/// What the registrar holds; does not keep the renderer alive.
struct TextureHandle(Weak<FrameRenderer>);

impl TextureSource for TextureHandle {
    fn copy_pixel_buffer(&self, width: usize, height: usize) -> Option<Arc<PixelBuffer>> {
        self.0.upgrade()?.copy_pixel_buffer(width, height)
    }

    fn copy_gpu_surface(&self, width: usize, height: usize) -> Option<GpuSurfaceDescriptor> {
        self.0.upgrade()?.copy_gpu_surface(width, height)
    }
}

/// A video sink presenting frames through one registered texture.
///
/// Three locks, never held together on the frame path: `binding` (control
/// thread only), `announced` (event bookkeeping) and `render` (current frame
/// and pixel buffers). Events are published with no lock held.
pub struct FrameRenderer {
    texture_id: i64,
    strategy: PresentationStrategy,
    events: EventChannel,
    registrar: Arc<dyn TextureRegistrar>,
    this: Weak<FrameRenderer>,
    generation: AtomicU64,
    binding: Mutex<Binding>,
    announced: Mutex<Announced>,
    render: Mutex<RenderState>,
}

impl FrameRenderer {
    /// Create a renderer and register its texture source with `registrar`.
    pub fn create(
        registrar: Arc<dyn TextureRegistrar>,
        messenger: Arc<dyn Messenger>,
        config: &RendererConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<FrameRenderer>| {
            let texture_id = registrar.register_texture(Arc::new(TextureHandle(this.clone())));
            let channel = texture_event_channel(&config.event_channel_prefix, texture_id);
            let layout = match config.strategy {
                PresentationStrategy::PixelBuffer(layout) => layout,
                PresentationStrategy::GpuSurface => PixelLayout::Bgra,
            };
            debug!(texture_id, strategy = %config.strategy, "video renderer created");
            Self {
                texture_id,
                strategy: config.strategy,
                events: EventChannel::new(messenger, channel),
                registrar,
                this: this.clone(),
                generation: AtomicU64::new(0),
                binding: Mutex::new(Binding::default()),
                announced: Mutex::new(Announced {
                    first_frame_rendered: false,
                    rotation: Rotation::Deg0,
                    size: (0, 0),
                    hardware_accelerated: false,
                }),
                render: Mutex::new(RenderState {
                    frame: None,
                    buffers: [
                        Arc::new(PixelBuffer::new(layout)),
                        Arc::new(PixelBuffer::new(layout)),
                    ],
                    front: 0,
                }),
            }
        })
    }

    pub fn texture_id(&self) -> i64 {
        self.texture_id
    }

    pub fn strategy(&self) -> PresentationStrategy {
        self.strategy
    }

    /// Name of the endpoint texture events are published on.
    pub fn event_channel(&self) -> &str {
        self.events.name()
    }

    /// Bind `track` as the only frame source, or unbind with `None`.
    ///
    /// Binding the track that is already bound does nothing. Otherwise the
    /// previous sink is removed before the new one is added, first-frame and
    /// size announcements start over, and unbinding clears the current frame.
    pub fn set_track(&self, track: Option<Arc<dyn VideoTrack>>) {
        let mut binding = lock(&self.binding);
        let unchanged = match (&binding.sink, &track) {
            (Some(current), Some(next)) => std::ptr::addr_eq(Arc::as_ptr(current.track()), Arc::as_ptr(next)),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(previous) = binding.sink.take() {
            debug!(texture_id = self.texture_id, track_id = previous.track().id(), "unbinding video track");
            drop(previous);
        }

        {
            let mut announced = lock(&self.announced);
            announced.first_frame_rendered = false;
            announced.size = (0, 0);
        }
        if track.is_none() {
            lock(&self.render).frame = None;
            binding.stream_id = None;
        }

        binding.sink = track.map(|track| {
            debug!(texture_id = self.texture_id, track_id = track.id(), generation, "binding video track");
            let sink = Arc::new(RendererSink {
                renderer: self.this.clone(),
                generation,
            });
            SinkRegistration::register(track, sink)
        });
    }

    /// Record which media stream the bound track came from.
    pub fn set_stream_id(&self, stream_id: Option<String>) {
        lock(&self.binding).stream_id = stream_id;
    }

    pub fn bound_stream_id(&self) -> Option<String> {
        lock(&self.binding).stream_id.clone()
    }

    pub fn track_id(&self) -> Option<String> {
        lock(&self.binding)
            .sink
            .as_ref()
            .map(|sink| sink.track().id().to_string())
    }

    pub fn has_track(&self) -> bool {
        lock(&self.binding).sink.is_some()
    }

    /// Whether the renderer is bound to stream `stream_id`. Empty ids never match.
    pub fn check_media_stream(&self, stream_id: &str) -> bool {
        !stream_id.is_empty() && self.bound_stream_id().as_deref() == Some(stream_id)
    }

    /// Whether the bound track is `track_id`. Empty ids never match.
    pub fn check_video_track(&self, track_id: &str) -> bool {
        !track_id.is_empty() && self.track_id().as_deref() == Some(track_id)
    }

    /// Feed a frame directly, as the currently bound sink would.
    pub fn on_frame(&self, frame: &VideoFrame) {
        self.deliver(self.generation.load(Ordering::Acquire), frame);
    }

    fn deliver(&self, generation: u64, frame: &VideoFrame) {
        let id = self.texture_id;
        let events = {
            let mut announced = lock(&self.announced);
            if generation != self.generation.load(Ordering::Acquire) {
                trace!(texture_id = id, generation, "dropping frame from previous binding");
                return;
            }
            let mut events = Vec::new();
            if !announced.first_frame_rendered {
                announced.first_frame_rendered = true;
                announced.hardware_accelerated = frame.native_handle().is_some();
                events.push(BridgeEvent::DidFirstFrameRendered { id });
            }
            if announced.rotation != frame.rotation() {
                announced.rotation = frame.rotation();
                events.push(BridgeEvent::DidTextureChangeRotation {
                    id,
                    rotation: frame.rotation(),
                });
            }
            let size = (frame.width(), frame.height());
            if announced.size != size {
                announced.size = size;
                events.push(BridgeEvent::DidTextureChangeVideoSize {
                    id,
                    width: size.0,
                    height: size.1,
                });
            }
            events
        };
        for event in events {
            self.events.publish(event);
        }

        {
            let mut render = lock(&self.render);
            if generation != self.generation.load(Ordering::Acquire) {
                return;
            }
            render.frame = Some(frame.clone());
        }
        trace!(texture_id = id, width = frame.width(), height = frame.height(), "frame available");
        self.registrar.mark_texture_frame_available(id);
    }

    /// The current frame converted into this renderer's pixel layout.
    ///
    /// `None` before the first frame, after the track was cleared, for a GPU
    /// surface renderer, or when the frame has no CPU pixel data.
    ///
    /// The caller may hold the returned buffer across the next call.
    pub fn copy_pixel_buffer(&self, _width: usize, _height: usize) -> Option<Arc<PixelBuffer>> {
        if !matches!(self.strategy, PresentationStrategy::PixelBuffer(_)) {
            return None;
        }
        let mut render = lock(&self.render);
        let frame = render.frame.clone()?;
        let slot = render.writable_slot();
        let buffer = &mut render.buffers[slot];
        if Arc::get_mut(buffer).is_none() {
            trace!(texture_id = self.texture_id, "both pixel buffers held; copying");
        }
        if let Err(err) = Arc::make_mut(buffer).fill_from(&frame) {
            debug!(texture_id = self.texture_id, error = %err, "frame cannot be converted");
            return None;
        }
        render.front = slot;
        Some(Arc::clone(&render.buffers[slot]))
    }

    /// The current frame's native texture exported as a shared handle.
    ///
    /// Export failures are logged and reported as absence; the presentation
    /// layer asks again on its next tick.
    pub fn copy_gpu_surface(&self, _width: usize, _height: usize) -> Option<GpuSurfaceDescriptor> {
        if self.strategy != PresentationStrategy::GpuSurface {
            return None;
        }
        let frame = lock(&self.render).frame.clone()?;
        match GpuSurfaceDescriptor::export(&frame) {
            Ok(descriptor) => Some(descriptor),
            Err(FrameError::NoNativeHandle) => {
                debug!(texture_id = self.texture_id, "frame has no native texture");
                None
            }
            Err(err) => {
                warn!(texture_id = self.texture_id, error = %err, "native texture export failed");
                None
            }
        }
    }

    /// The frame the presentation layer would see now.
    pub fn current_frame(&self) -> Option<VideoFrame> {
        lock(&self.render).frame.clone()
    }

    pub fn first_frame_rendered(&self) -> bool {
        lock(&self.announced).first_frame_rendered
    }

    /// Whether the first frame of the current binding was hardware backed.
    pub fn is_hardware_accelerated(&self) -> bool {
        lock(&self.announced).hardware_accelerated
    }

    pub fn rotation(&self) -> Rotation {
        lock(&self.announced).rotation
    }

    /// Last announced frame size; `(0, 0)` until a frame arrives.
    pub fn frame_size(&self) -> (u32, u32) {
        lock(&self.announced).size
    }
}

impl fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("texture_id", &self.texture_id)
            .field("strategy", &self.strategy)
            .field("event_channel", &self.events.name())
            .finish()
    }
}
