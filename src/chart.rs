//! Text-mode candlestick widget.
//!
//! Each candle is one column of box-drawing glyphs. A row is split in three
//! bands (upper wick, body, lower wick) and quarter-row thresholds choose
//! between full and half glyphs, which roughly doubles vertical resolution.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Widget},
};

use crate::candles::{Candle, Series};

const VOID: char = ' ';
const BODY: char = '┃';
const HALF_BODY_BOTTOM: char = '╻';
const HALF_BODY_TOP: char = '╹';
const WICK: char = '│';
const WICK_TO_BODY_TOP: char = '╽';
const BODY_TO_WICK_BOTTOM: char = '╿';
const UPPER_HALF_WICK: char = '╷';
const LOWER_HALF_WICK: char = '╵';

const BULLISH: Color = Color::Rgb(52, 208, 88);
const BEARISH: Color = Color::Rgb(234, 74, 90);
const AXIS: Color = Color::Gray;

const Y_AXIS_WIDTH: u16 = 12;
const X_AXIS_HEIGHT: u16 = 1;
const LABEL_EVERY_ROWS: u16 = 4;
const DATE_LABEL_WIDTH: usize = 10;

pub struct CandleChart<'a> {
    series: &'a Series,
    block: Option<Block<'a>>,
}

impl<'a> CandleChart<'a> {
    pub fn new(series: &'a Series) -> Self {
        Self {
            series,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

/// Vertical scale for the visible candles, in fractional rows from the
/// bottom of the plot.
struct Scale {
    min: f64,
    max: f64,
    rows: u16,
}

impl Scale {
    fn fit(candles: &[Candle], rows: u16) -> Self {
        let max = candles.iter().fold(f64::NEG_INFINITY, |m, c| m.max(c.high));
        let min = candles.iter().fold(f64::INFINITY, |m, c| m.min(c.low));
        Self { min, max, rows }
    }

    fn height_of(&self, price: f64) -> f64 {
        if self.max <= self.min {
            return f64::from(self.rows) / 2.0;
        }
        (price - self.min) / (self.max - self.min) * f64::from(self.rows)
    }

    /// Price at the vertical middle of `row`.
    fn price_at(&self, row: u16) -> f64 {
        self.min + (f64::from(row) + 0.5) * (self.max - self.min) / f64::from(self.rows.max(1))
    }
}

fn glyph(candle: &Candle, scale: &Scale, row: u16) -> char {
    let y = f64::from(row);
    let high = scale.height_of(candle.high);
    let low = scale.height_of(candle.low);
    let top = scale.height_of(candle.open.max(candle.close));
    let bottom = scale.height_of(candle.open.min(candle.close));

    if high.ceil() >= y && y >= top.floor() {
        if top - y > 0.75 {
            BODY
        } else if top - y > 0.25 {
            if high - y > 0.75 { WICK_TO_BODY_TOP } else { HALF_BODY_BOTTOM }
        } else if high - y > 0.75 {
            WICK
        } else if high - y > 0.25 {
            UPPER_HALF_WICK
        } else {
            VOID
        }
    } else if top.floor() >= y && y >= bottom.ceil() {
        BODY
    } else if bottom.ceil() >= y && y >= low.floor() {
        if bottom - y < 0.25 {
            BODY
        } else if bottom - y < 0.75 {
            if low - y < 0.25 { BODY_TO_WICK_BOTTOM } else { HALF_BODY_TOP }
        } else if low - y < 0.25 {
            WICK
        } else if low - y < 0.75 {
            LOWER_HALF_WICK
        } else {
            VOID
        }
    } else {
        VOID
    }
}

impl Widget for CandleChart<'_> {
    fn render(mut self, area: Rect, buf: &mut Buffer) {
        let area = match self.block.take() {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };

        if area.width <= Y_AXIS_WIDTH || area.height <= X_AXIS_HEIGHT || self.series.is_empty() {
            return;
        }

        let rows = area.height - X_AXIS_HEIGHT;
        let plot_width = usize::from(area.width - Y_AXIS_WIDTH);
        let all = self.series.candles();
        // Leave a gap column between candles when everything fits.
        let step = if all.len() * 2 <= plot_width { 2 } else { 1 };
        let visible = &all[all.len().saturating_sub(plot_width / step)..];
        let scale = Scale::fit(visible, rows);
        let plot_x = area.x + Y_AXIS_WIDTH;

        // Row `r` covers heights [r, r + 1) from the bottom of the plot.
        for row in 0..rows {
            let y = area.y + rows - 1 - row;

            if row % LABEL_EVERY_ROWS == 0 || row == rows - 1 {
                let label = format!("{:>10.2} │", scale.price_at(row));
                buf.set_string(area.x, y, label, Style::default().fg(AXIS));
            } else {
                buf.set_string(area.x, y, format!("{:>10} │", ""), Style::default().fg(AXIS));
            }

            for (i, candle) in visible.iter().enumerate() {
                let ch = glyph(candle, &scale, row);
                if ch == VOID {
                    continue;
                }
                let color = if candle.is_bullish() { BULLISH } else { BEARISH };
                let x = plot_x + (i * step) as u16;
                buf.set_string(x, y, ch.to_string(), Style::default().fg(color));
            }
        }

        // Date labels under the candles they belong to, never overlapping.
        let axis_y = area.y + rows;
        let mut next_free = 0usize;
        for (i, candle) in visible.iter().enumerate() {
            let column = i * step;
            if column < next_free || column + DATE_LABEL_WIDTH > plot_width {
                continue;
            }
            let label = candle.time.format("%Y-%m-%d").to_string();
            buf.set_string(plot_x + column as u16, axis_y, label, Style::default().fg(AXIS));
            next_free = column + DATE_LABEL_WIDTH + 2;
        }
    }
}
