//! Output formatting helpers for the CLI.

use std::io::{self, IsTerminal};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;

use backplane_core::storage::{Record, ID_FIELD};

const SUMMARY_WIDTH: usize = 60;

/// Print a JSON value, pretty-printed.
pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error (and optional hint) to stderr.
pub fn print_error(message: &str, hint: Option<&str>) {
    eprintln!("Error: {}", message);
    if let Some(hint) = hint {
        eprintln!("{}", hint);
    }
}

/// Record fields other than `id`, as compact JSON cut to `width` chars.
pub fn record_summary(record: &Record, width: usize) -> String {
    let rest: Record = record
        .iter()
        .filter(|(key, _)| key.as_str() != ID_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let text = Value::Object(rest).to_string();
    if text.chars().count() <= width {
        return text;
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Render records as a two-column table (id, fields).
pub fn records_table(records: &[Record]) -> String {
    let mut table = Table::new();
    if io::stdout().is_terminal() {
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    } else {
        table.load_preset(ASCII_MARKDOWN);
    }
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "FIELDS"]);
    for record in records {
        let id = record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string();
        table.add_row(vec![id, record_summary(record, SUMMARY_WIDTH)]);
    }
    table.to_string()
}
