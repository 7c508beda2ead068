use std::fmt;
use std::str::FromStr;

use rtcbridge_frame::PixelLayout;
use serde::{Deserialize, Serialize};

/// How a renderer hands frames to the presentation layer. One strategy per
/// renderer; the other copy path always reports absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresentationStrategy {
    /// Convert into a CPU buffer with the given packed layout.
    PixelBuffer(PixelLayout),
    /// Export the frame's native texture as a shared handle.
    GpuSurface,
}

impl Default for PresentationStrategy {
    fn default() -> Self {
        PresentationStrategy::PixelBuffer(PixelLayout::Rgba)
    }
}

impl PresentationStrategy {
    pub fn name(self) -> &'static str {
        match self {
            PresentationStrategy::PixelBuffer(layout) => layout.name(),
            PresentationStrategy::GpuSurface => "gpu",
        }
    }
}

impl fmt::Display for PresentationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PresentationStrategy {
    type Err = String;

    /// `gpu`, or a pixel layout name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("gpu") {
            return Ok(PresentationStrategy::GpuSurface);
        }
        s.parse::<PixelLayout>()
            .map(PresentationStrategy::PixelBuffer)
            .map_err(|_| format!("unknown presentation strategy: {s}"))
    }
}

/// Renderer behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Prefix of every texture event endpoint name.
    pub event_channel_prefix: String,
    pub strategy: PresentationStrategy,
}

impl RendererConfig {
    pub fn with_event_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_channel_prefix = prefix.into();
        self
    }

    pub fn with_strategy(mut self, strategy: PresentationStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            event_channel_prefix: "RtcBridge".to_string(),
            strategy: PresentationStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_layouts_and_gpu() {
        assert_eq!(
            "bgra".parse::<PresentationStrategy>().unwrap(),
            PresentationStrategy::PixelBuffer(PixelLayout::Bgra)
        );
        assert_eq!(
            "GPU".parse::<PresentationStrategy>().unwrap(),
            PresentationStrategy::GpuSurface
        );
        assert!("yuv".parse::<PresentationStrategy>().is_err());
    }

    #[test]
    fn default_config_converts_to_rgba() {
        let config = RendererConfig::default();
        assert_eq!(config.event_channel_prefix, "RtcBridge");
        assert_eq!(
            config.strategy,
            PresentationStrategy::PixelBuffer(PixelLayout::Rgba)
        );
    }
}
