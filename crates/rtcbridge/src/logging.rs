use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow `--log-level`. Everything else stays at `warn`.
const BRIDGE_TARGETS: &[&str] = &[
    "rtcbridge",
    "rtcbridge_frame",
    "rtcbridge_transport",
    "rtcbridge_events",
    "rtcbridge_channel",
    "rtcbridge_render",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Filter directives for `level`: bridge crates at `level`, the rest at
/// `warn` or lower. `extra` directives (from `--log-filter`) are appended
/// and win over the defaults for the targets they name.
pub fn directives(level: LogLevel, extra: Option<&str>) -> String {
    let level = level.as_filter();
    let base = level.min(LevelFilter::WARN);
    let mut directives = vec![base.to_string().to_lowercase()];
    directives.extend(
        BRIDGE_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.to_string().to_lowercase())),
    );
    if let Some(extra) = extra.map(str::trim).filter(|extra| !extra.is_empty()) {
        directives.push(extra.to_string());
    }
    directives.join(",")
}

/// Route `tracing` output to stderr so stdout carries only command output.
pub fn init_logging(format: LogFormat, level: LogLevel, extra: Option<&str>) {
    let filter = EnvFilter::try_new(directives(level, extra)).unwrap_or_else(|err| {
        eprintln!("warning: ignoring invalid --log-filter: {err}");
        EnvFilter::new(directives(level, None))
    });
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
