use std::sync::Arc;

use rtcbridge::events::RecordingMessenger;
use rtcbridge::frame::{I420Buffer, Rotation, VideoFrame};
use rtcbridge::render::InMemoryTextureRegistrar;
use rtcbridge::transport::loopback::{
    LoopbackConnection, LoopbackMediaStream, LoopbackVideoTrack, StreamTable,
};
use rtcbridge::transport::{DataChannel, VideoTrack};
use rtcbridge::{Bridge, BridgeConfig};
use serde_json::{json, Value};
use tracing::info;

use crate::cmd::DemoArgs;
use crate::exit::{method_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_events, OutputFormat};

const CONNECTION: &str = "local";
const STREAM: &str = "demo-stream";

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let messenger = Arc::new(RecordingMessenger::new());
    let registrar = Arc::new(InMemoryTextureRegistrar::new());
    let streams = Arc::new(StreamTable::new());
    let bridge = Bridge::with_config(
        messenger.clone(),
        registrar.clone(),
        streams.clone(),
        BridgeConfig::default().with_strategy(args.strategy),
    );

    let (local, remote) = LoopbackConnection::pair(CONNECTION, "remote");
    bridge.add_connection(CONNECTION, local.clone());

    let created = call(
        &bridge,
        "createDataChannel",
        json!({
            "peerConnectionId": CONNECTION,
            "label": "demo",
            "dataChannelDict": {"ordered": true, "protocol": "sctp", "negotiated": false},
        }),
    )?;
    let token = created["correlationToken"].clone();
    local.open_all();

    let remote_channel = remote
        .take_incoming()
        .pop()
        .ok_or_else(|| CliError::new(INTERNAL, "remote peer saw no channel"))?;
    for message in &args.message {
        remote_channel
            .send(message.as_bytes(), false)
            .map_err(|err| CliError::new(TRANSPORT_ERROR, format!("remote send failed: {err}")))?;
    }
    remote_channel
        .send(&[0xde, 0xad, 0xbe, 0xef], true)
        .map_err(|err| CliError::new(TRANSPORT_ERROR, format!("remote send failed: {err}")))?;

    call(
        &bridge,
        "dataChannelSend",
        json!({"dataChannelId": token, "type": "text", "data": "hello from local"}),
    )?;
    call(
        &bridge,
        "dataChannelSend",
        json!({"dataChannelId": token, "type": "binary", "data": [1, 2, 3]}),
    )?;
    info!(sent = remote_channel.sent_messages().len(), "remote peer sent messages");

    let track = Arc::new(LoopbackVideoTrack::new("camera"));
    let tracks: Vec<Arc<dyn VideoTrack>> = vec![track.clone()];
    streams.insert(CONNECTION, Arc::new(LoopbackMediaStream::new(STREAM, tracks)));

    let texture = call(&bridge, "createVideoRenderer", Value::Null)?;
    let texture_id = texture["textureId"]
        .as_i64()
        .ok_or_else(|| CliError::new(INTERNAL, "renderer reply carried no texture id"))?;
    call(
        &bridge,
        "videoRendererSetSrcObject",
        json!({"textureId": texture_id, "streamId": STREAM, "ownerTag": CONNECTION}),
    )?;

    let mut presented = 0u32;
    for index in 0..args.frames {
        track.deliver(&demo_frame(&args, index)?);
        let Some(source) = registrar.source(texture_id) else {
            continue;
        };
        let (width, height) = (args.width as usize, args.height as usize);
        if source.copy_pixel_buffer(width, height).is_some()
            || source.copy_gpu_surface(width, height).is_some()
        {
            presented += 1;
        }
    }
    info!(presented, frames = args.frames, strategy = %args.strategy, "frames pulled");

    call(&bridge, "dataChannelClose", json!({"dataChannelId": token}))?;
    call(&bridge, "videoRendererDispose", json!({"textureId": texture_id}))?;

    print_events(&messenger.take(), format);
    Ok(SUCCESS)
}

fn call(bridge: &Bridge, method: &str, args: Value) -> CliResult<Value> {
    bridge
        .handle(method, &args)
        .map_err(|err| method_error(method, err))
}

/// Frames in the second half are twice as large; the last one is rotated.
fn demo_frame(args: &DemoArgs, index: u32) -> CliResult<VideoFrame> {
    let scale = if args.frames > 1 && index * 2 >= args.frames { 2 } else { 1 };
    let rotation = if args.frames > 2 && index + 1 == args.frames {
        Rotation::Deg90
    } else {
        Rotation::Deg0
    };
    let luma = 16 + ((index * 40) % 220) as u8;
    let buffer = I420Buffer::solid(args.width * scale, args.height * scale, luma, 128, 128)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid frame: {err}")))?;
    Ok(VideoFrame::from_i420(buffer, rotation, i64::from(index) * 33_333))
}
