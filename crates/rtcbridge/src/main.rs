mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rtcbridge", version, about = "Data channel and video renderer bridge CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Extra tracing directives, e.g. `rtcbridge_render=trace`.
    #[arg(long, value_name = "DIRECTIVES", env = "RTCBRIDGE_LOG", global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.log_filter.as_deref());

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from([
            "rtcbridge",
            "demo",
            "--frames",
            "5",
            "--strategy",
            "bgra",
            "--message",
            "a",
            "--message",
            "b",
        ])
        .expect("demo args should parse");

        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.frames, 5);
        assert_eq!(args.message, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = Cli::try_parse_from(["rtcbridge", "demo", "--strategy", "yuv"])
            .expect_err("unknown strategy should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_soak_with_global_format() {
        let cli = Cli::try_parse_from(["rtcbridge", "soak", "--iterations", "3", "--format", "json"])
            .expect("soak args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Soak(_)));
    }

    #[test]
    fn parses_log_filter_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rtcbridge",
            "demo",
            "--log-filter",
            "rtcbridge_render=trace",
        ])
        .expect("log filter should parse");
        assert_eq!(cli.log_filter.as_deref(), Some("rtcbridge_render=trace"));
    }
}
