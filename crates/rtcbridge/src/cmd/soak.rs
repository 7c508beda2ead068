use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rtcbridge::events::{BridgeEvent, Messenger};
use rtcbridge::frame::{I420Buffer, Rotation, VideoFrame};
use rtcbridge::render::InMemoryTextureRegistrar;
use rtcbridge::transport::loopback::{
    LoopbackConnection, LoopbackMediaStream, LoopbackVideoTrack, StreamTable,
};
use rtcbridge::transport::VideoTrack;
use rtcbridge::{Bridge, MethodError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cmd::SoakArgs;
use crate::exit::{CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_summary, OutputFormat};

const OWNER: &str = "soak";
const STREAM: &str = "soak-stream";

/// Counts events instead of keeping them; a soak can run for hours.
#[derive(Default)]
struct CountingMessenger {
    events: AtomicU64,
}

impl Messenger for CountingMessenger {
    fn deliver(&self, _channel: &str, _event: BridgeEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct Counters {
    channels: AtomicU64,
    renderers: AtomicU64,
    messages: AtomicU64,
    frames: AtomicU64,
    failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Serialize)]
struct SoakSummary {
    rounds: u64,
    channels: u64,
    renderers: u64,
    messages: u64,
    frames: u64,
    events: u64,
    failures: u64,
    elapsed_ms: u128,
}

pub fn run(args: SoakArgs, format: OutputFormat) -> CliResult<i32> {
    if args.threads == 0 {
        return Err(CliError::new(USAGE, "--threads must be at least 1"));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let messenger = Arc::new(CountingMessenger::default());
    let registrar = Arc::new(InMemoryTextureRegistrar::new());
    let streams = Arc::new(StreamTable::new());
    let bridge = Bridge::new(messenger.clone(), registrar.clone(), streams.clone());

    let track = Arc::new(LoopbackVideoTrack::new("soak-camera"));
    let tracks: Vec<Arc<dyn VideoTrack>> = vec![track.clone()];
    streams.insert(OWNER, Arc::new(LoopbackMediaStream::new(STREAM, tracks)));

    let buffer = I420Buffer::solid(32, 24, 128, 128, 128)
        .map_err(|err| CliError::new(INTERNAL, format!("frame setup failed: {err}")))?;
    let frame = VideoFrame::from_i420(buffer, Rotation::Deg0, 0);

    let counters = Counters::default();
    let started = Instant::now();
    let mut rounds = 0u64;

    while running.load(Ordering::SeqCst) && args.iterations.is_none_or(|limit| rounds < limit) {
        let connection_id = format!("soak-{rounds}");
        let (local, _remote) = LoopbackConnection::pair(connection_id.clone(), "soak-remote");
        bridge.add_connection(connection_id.clone(), local.clone());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..args.frames {
                    track.deliver(&frame);
                    bump(&counters.frames);
                }
            });
            for _ in 0..args.threads {
                scope.spawn(|| {
                    if let Err(err) = worker_round(&bridge, &connection_id, &local, &counters) {
                        warn!(code = %err.code, error = %err.message, "soak worker failed");
                        bump(&counters.failures);
                    }
                });
            }
        });

        match close_round(&bridge, &connection_id) {
            Ok(closed) => debug!(round = rounds, closed, "soak round finished"),
            Err(err) => {
                warn!(code = %err.code, error = %err.message, "peer connection close failed");
                bump(&counters.failures);
            }
        }
        rounds += 1;
    }

    let summary = SoakSummary {
        rounds,
        channels: counters.channels.load(Ordering::Relaxed),
        renderers: counters.renderers.load(Ordering::Relaxed),
        messages: counters.messages.load(Ordering::Relaxed),
        frames: counters.frames.load(Ordering::Relaxed),
        events: messenger.events.load(Ordering::Relaxed),
        failures: counters.failures.load(Ordering::Relaxed),
        elapsed_ms: started.elapsed().as_millis(),
    };
    let rows = [
        ("rounds", summary.rounds.to_string()),
        ("channels", summary.channels.to_string()),
        ("renderers", summary.renderers.to_string()),
        ("messages", summary.messages.to_string()),
        ("frames", summary.frames.to_string()),
        ("events", summary.events.to_string()),
        ("failures", summary.failures.to_string()),
        ("elapsed_ms", summary.elapsed_ms.to_string()),
    ];
    print_summary(&summary, &rows, format);

    let leaked_channels = bridge.channels().registry().len();
    let leaked_renderers = bridge.renderers().len();
    if leaked_channels > 0 || leaked_renderers > 0 || !registrar.is_empty() || track.sink_count() > 0 {
        return Err(CliError::new(
            FAILURE,
            format!(
                "soak leaked state: channels={leaked_channels} renderers={leaked_renderers} textures={} sinks={}",
                registrar.len(),
                track.sink_count()
            ),
        ));
    }

    Ok(if summary.failures == 0 { SUCCESS } else { FAILURE })
}

fn worker_round(
    bridge: &Bridge,
    connection_id: &str,
    local: &LoopbackConnection,
    counters: &Counters,
) -> Result<(), MethodError> {
    let created = bridge.handle(
        "createDataChannel",
        &json!({"peerConnectionId": connection_id, "label": "soak"}),
    )?;
    bump(&counters.channels);
    let token = created["correlationToken"].clone();
    local.open_all();

    bridge.handle(
        "dataChannelSend",
        &json!({"dataChannelId": token, "type": "text", "data": "ping"}),
    )?;
    bump(&counters.messages);

    let texture = bridge.handle("createVideoRenderer", &Value::Null)?;
    bump(&counters.renderers);
    let texture_id = texture["textureId"].clone();
    bridge.handle(
        "videoRendererSetSrcObject",
        &json!({"textureId": texture_id, "streamId": STREAM, "ownerTag": OWNER}),
    )?;
    if let Some(renderer) = texture_id
        .as_i64()
        .and_then(|id| bridge.renderers().renderer(id))
    {
        let _ = renderer.copy_pixel_buffer(0, 0);
    }

    bridge.handle("dataChannelClose", &json!({"dataChannelId": token}))?;
    bridge.handle("videoRendererDispose", &json!({"textureId": texture_id}))?;
    Ok(())
}

/// Tear down the round's connection. Returns how many channels the workers
/// left open.
fn close_round(bridge: &Bridge, connection_id: &str) -> Result<u64, MethodError> {
    let reply = bridge.handle(
        "peerConnectionClose",
        &json!({"peerConnectionId": connection_id}),
    )?;
    Ok(reply["closedChannels"].as_u64().unwrap_or_default())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
