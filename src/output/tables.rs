use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use crate::alerts::format_duration;
use crate::model::{BuildRecord, Status, Transition};

use super::styling::status_color;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn status_cell(status: &Status) -> Cell {
    let cell = Cell::new(status.as_str());
    match status_color(status) {
        Some(color) => cell.fg(color),
        None => cell,
    }
}

pub fn transitions_table(transitions: &[Transition]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Provider", "Pipeline", "Build", "Was", "Now", "Duration", "URL"]);

    for t in transitions {
        let was = t
            .status_old
            .as_ref()
            .map_or_else(|| Cell::new("new"), status_cell);
        table.add_row(vec![
            Cell::new(t.provider),
            Cell::new(&t.pipeline_name),
            Cell::new(&t.external_id),
            was,
            status_cell(&t.status_new),
            Cell::new(format_duration(t.duration_seconds)),
            Cell::new(t.web_url.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn builds_table(builds: &[BuildRecord]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Provider", "Pipeline", "Build", "Status", "Started", "Duration", "Source"]);

    for b in builds {
        let started = b
            .started_at
            .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());
        table.add_row(vec![
            Cell::new(b.provider),
            Cell::new(&b.pipeline_name),
            Cell::new(&b.external_id),
            status_cell(&b.status),
            Cell::new(started),
            Cell::new(format_duration(b.duration_seconds)),
            Cell::new(b.event_source.as_deref().unwrap_or("-")),
        ]);
    }
    table
}
