use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtcbridge::events::EventEnvelope;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line per event for json, one table for table, one line each for pretty.
pub fn print_events(events: &[EventEnvelope], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for envelope in events {
                println!(
                    "{}",
                    serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "EVENT", "FIELDS"]);
            for envelope in events {
                table.add_row(vec![
                    envelope.channel.clone(),
                    envelope.event.name().to_string(),
                    event_fields(envelope),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for envelope in events {
                println!(
                    "{} {} {}",
                    envelope.channel,
                    envelope.event.name(),
                    event_fields(envelope)
                );
            }
        }
    }
}

/// Print a flat summary record. `rows` are the same fields as label/value
/// pairs for the table and pretty formats.
pub fn print_summary<T: Serialize>(summary: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (label, value) in rows {
                table.add_row(vec![label.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (label, value) in rows {
                println!("{label}: {value}");
            }
        }
    }
}

/// The event's fields without its discriminator, as `key=value` pairs.
fn event_fields(envelope: &EventEnvelope) -> String {
    let Ok(Value::Object(mut map)) = envelope.event.to_value() else {
        return String::new();
    };
    map.remove("event");
    map.iter()
        .map(|(key, value)| format!("{key}={}", preview(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(text) => format!("{text:?}"),
        Value::Array(items) if items.len() > 16 => format!("<binary {} bytes>", items.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbridge::events::BridgeEvent;

    #[test]
    fn fields_skip_the_discriminator() {
        let envelope = EventEnvelope {
            channel: "RtcBridge/Texture1".to_string(),
            event: BridgeEvent::DidTextureChangeVideoSize {
                id: 1,
                width: 640,
                height: 480,
            },
        };
        assert_eq!(event_fields(&envelope), "height=480 id=1 width=640");
    }

    #[test]
    fn long_byte_arrays_are_summarised() {
        let bytes = Value::Array((0..32).map(Value::from).collect());
        assert_eq!(preview(&bytes), "<binary 32 bytes>");
        assert_eq!(preview(&Value::from("hi")), "\"hi\"");
    }
}
