use rtcbridge::BridgeConfig;
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_summary, OutputFormat};

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
    target: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    async_events: bool,
    event_channel_prefix: String,
    default_protocol: String,
    strategy: String,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("rtcbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let defaults = BridgeConfig::default();
    let info = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("RTCBRIDGE_BUILD_TARGET").unwrap_or("unknown"),
        rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        async_events: cfg!(feature = "async"),
        event_channel_prefix: defaults.gateway.event_channel_prefix,
        default_protocol: defaults.gateway.default_protocol,
        strategy: defaults.renderer.strategy.to_string(),
    };
    let rows = [
        ("version", info.version.to_string()),
        ("target", info.target.to_string()),
        ("rustc", info.rustc.to_string()),
        ("git_hash", info.git_hash.to_string()),
        ("async_events", info.async_events.to_string()),
        ("event_channel_prefix", info.event_channel_prefix.clone()),
        ("default_protocol", info.default_protocol.clone()),
        ("strategy", info.strategy.clone()),
    ];
    print_summary(&info, &rows, format);
    Ok(SUCCESS)
}
