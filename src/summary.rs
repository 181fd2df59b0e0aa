use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

use crate::app_state::AppState;
use crate::candles::Candle;
use crate::timeframe::Timeframe;

fn date_cell(candle: Option<&Candle>) -> Cell {
    match candle {
        Some(c) => Cell::new(c.time.format("%d-%m-%Y")),
        None => Cell::new("-").fg(Color::DarkGrey),
    }
}

/// One row per timeframe: bar count, covered dates and latest close.
pub fn load_summary(state: &AppState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Timeframe").add_attribute(Attribute::Bold),
            Cell::new("Bars")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("From").add_attribute(Attribute::Bold),
            Cell::new("To").add_attribute(Attribute::Bold),
            Cell::new("Last Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for tf in Timeframe::ALL {
        let series = state.series(tf);

        let bars_cell = if series.is_empty() {
            Cell::new(0).fg(Color::Red)
        } else {
            Cell::new(series.len())
        };

        let close_cell = match series.last() {
            Some(last) => Cell::new(format!("{:.2}", last.close)).fg(if last.is_bullish() {
                Color::Green
            } else {
                Color::Red
            }),
            None => Cell::new("-").fg(Color::DarkGrey),
        };

        table.add_row(vec![
            Cell::new(tf.label()).fg(Color::Cyan),
            bars_cell.set_alignment(CellAlignment::Right),
            date_cell(series.first()),
            date_cell(series.last()),
            close_cell.set_alignment(CellAlignment::Right),
        ]);
    }

    table
}
