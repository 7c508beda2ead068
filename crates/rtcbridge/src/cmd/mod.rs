use clap::{Args, Subcommand};
use rtcbridge::render::PresentationStrategy;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod soak;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a loopback session and print every published event.
    Demo(DemoArgs),
    /// Create and tear down channels and renderers concurrently while frames flow.
    Soak(SoakArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Soak(args) => soak::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Frames to push through the renderer.
    #[arg(long, default_value = "3")]
    pub frames: u32,
    /// Frame width in pixels.
    #[arg(long, default_value = "64")]
    pub width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value = "48")]
    pub height: u32,
    /// Presentation strategy: rgba, bgra, argb, abgr or gpu.
    #[arg(long, default_value = "rgba")]
    pub strategy: PresentationStrategy,
    /// Text messages the remote peer sends (repeatable).
    #[arg(long, default_value = "hello")]
    pub message: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SoakArgs {
    /// Rounds to run. Default: until Ctrl-C.
    #[arg(long)]
    pub iterations: Option<u64>,
    /// Worker threads per round.
    #[arg(long, default_value = "4")]
    pub threads: usize,
    /// Frames the producer pushes per round.
    #[arg(long, default_value = "64")]
    pub frames: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
