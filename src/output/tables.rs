use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::model::CipeStatus;
use crate::polling::PollingTier;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_status_cell(status: CipeStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        CipeStatus::Succeeded => cell.fg(TableColor::Green),
        CipeStatus::InProgress | CipeStatus::NotStarted => cell.fg(TableColor::Yellow),
        status if status.is_failed() => cell.fg(TableColor::Red),
        _ => cell,
    }
}

pub fn color_coded_tier_cell(tier: PollingTier, description: String) -> Cell {
    let cell = Cell::new(description);
    match tier {
        PollingTier::Sleep => cell.fg(TableColor::DarkGrey),
        PollingTier::Cold => cell.fg(TableColor::Cyan),
        PollingTier::Hot => cell.fg(TableColor::Yellow),
        PollingTier::AiFix => cell.fg(TableColor::Magenta),
    }
}
