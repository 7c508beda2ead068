//! Data channels addressed by correlation token.
//!
//! The gateway turns host requests (create, send, close) into transport calls
//! and keeps the [`ChannelRegistry`] as the single source of truth for which
//! channels are live. Each channel gets a [`ChannelObserver`] that republishes
//! transport callbacks as [`BridgeEvent`](rtcbridge_events::BridgeEvent)s on a
//! dedicated event channel.

pub mod config;
pub mod error;
pub mod gateway;
pub mod observer;
pub mod options;
pub mod registry;

pub use config::GatewayConfig;
pub use error::{ChannelError, Result};
pub use gateway::{CreatedChannel, DataChannelGateway, Payload};
pub use observer::ChannelObserver;
pub use options::ChannelOptions;
pub use registry::{ChannelEntry, ChannelInfo, ChannelRegistry};
