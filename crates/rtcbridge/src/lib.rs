//! Data channel and video frame delivery between a real-time transport and a
//! host application.
//!
//! # Crate Structure
//!
//! - [`frame`]: Immutable video frames, pixel layout conversion, presentation buffers
//! - [`transport`]: Transport traits and the in-process loopback transport
//! - [`events`]: Event records and the messenger that carries them to the host
//! - [`channel`]: Data channel registry and gateway
//! - [`render`]: Video renderers and their registry
//!
//! [`Bridge`] ties the gateway and the renderer registry together behind the
//! host's method-call surface.

mod bridge;
mod method;

pub use bridge::{Bridge, BridgeConfig};
pub use method::MethodError;

/// Re-export frame types.
pub mod frame {
    pub use rtcbridge_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use rtcbridge_transport::*;
}

/// Re-export event types.
pub mod events {
    pub use rtcbridge_events::*;
}

/// Re-export data channel types.
pub mod channel {
    pub use rtcbridge_channel::*;
}

/// Re-export renderer types.
pub mod render {
    pub use rtcbridge_render::*;
}
