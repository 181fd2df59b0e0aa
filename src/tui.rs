use anyhow::Result;
use crossterm::{
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use std::io::{self, Stdout};
use tracing::{debug, warn};

use crate::candles::{Candle, Series};
use crate::chart::CandleChart;
use crate::render_loop::ChartRenderer;

const CONTROLS: &str = "← → change timeframe | Esc exit";

// --- Terminal lifecycle ---

/// Owns the terminal while the chart is on screen: raw mode, alternate
/// screen, and (when supported) key release reporting. Restored on drop.
pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    key_release: bool,
    showing_placeholder: bool,
    active: bool,
}

impl TerminalRenderer {
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        undo_on_err(execute!(stdout, EnterAlternateScreen), || {
            let _ = disable_raw_mode();
        })?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = undo_on_err(Terminal::new(backend), || {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = disable_raw_mode();
        })?;

        // From here on Drop puts the terminal back.
        let mut renderer = Self {
            terminal,
            key_release: false,
            showing_placeholder: false,
            active: true,
        };

        if supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                renderer.terminal.backend_mut(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            renderer.key_release = true;
        }
        renderer.terminal.hide_cursor()?;
        debug!(key_release = renderer.key_release, "terminal prepared");

        Ok(renderer)
    }

    /// Whether the terminal will deliver key release events.
    pub fn reports_key_release(&self) -> bool {
        self.key_release
    }

    /// Leave the alternate screen and give the terminal back. Idempotent.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        if self.key_release {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
        }
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Run `undo` if a setup step failed, passing the result through.
fn undo_on_err<T>(result: io::Result<T>, undo: impl FnOnce()) -> io::Result<T> {
    result.inspect_err(|_| undo())
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "failed to restore terminal");
        }
    }
}

impl ChartRenderer for TerminalRenderer {
    fn render(&mut self, series: &Series, title: &str) -> Result<()> {
        self.showing_placeholder = false;
        self.terminal.draw(|f| chart_ui(f, series, title))?;
        Ok(())
    }

    fn render_placeholder(&mut self, message: &str) -> Result<()> {
        if !self.showing_placeholder {
            self.terminal.clear()?;
            self.showing_placeholder = true;
        }
        self.terminal.draw(|f| placeholder_ui(f, message))?;
        Ok(())
    }
}

// --- Drawing ---

fn chart_ui(f: &mut Frame, series: &Series, title: &str) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // title + last bar
        Constraint::Min(0),    // chart
        Constraint::Length(1), // controls
    ])
    .split(f.size());

    let header = Paragraph::new(last_bar_line(series))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title_alignment(Alignment::Center)
                .title(Span::styled(
                    title.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
        );
    f.render_widget(header, chunks[0]);

    let range = match (series.first(), series.last()) {
        (Some(first), Some(last)) => format!(
            "{} → {}",
            first.time.format("%Y-%m-%d"),
            last.time.format("%Y-%m-%d")
        ),
        _ => String::new(),
    };
    f.render_widget(
        CandleChart::new(series).block(Block::default().borders(Borders::ALL).title(range)),
        chunks[1],
    );

    f.render_widget(
        Paragraph::new(CONTROLS)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn placeholder_ui(f: &mut Frame, message: &str) {
    let area = centered_rect(60, 20, f.size());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(message.to_string()),
            Line::from(Span::styled(CONTROLS, Style::default().fg(Color::DarkGray))),
        ])
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center),
        area,
    );
}

/// OHLCV of the most recent bar with its change against the previous close.
fn last_bar_line(series: &Series) -> Line<'static> {
    let candles = series.candles();
    let Some(last) = candles.last() else {
        return Line::default();
    };

    let mut spans = vec![Span::raw(format!(
        "O {:.2}  H {:.2}  L {:.2}  C {:.2}  V {}",
        last.open,
        last.high,
        last.low,
        last.close,
        format_volume(last.volume)
    ))];

    if let Some(pct) = change_pct(candles) {
        let color = if pct >= 0.0 { Color::Green } else { Color::Red };
        spans.push(Span::styled(
            format!("  ({:+.2}%)", pct),
            Style::default().fg(color),
        ));
    }

    Line::from(spans)
}

fn change_pct(candles: &[Candle]) -> Option<f64> {
    let [.., prev, last] = candles else {
        return None;
    };
    if prev.close == 0.0 {
        return None;
    }
    Some((last.close / prev.close - 1.0) * 100.0)
}

fn format_volume(volume: f64) -> String {
    match volume {
        v if v >= 1e9 => format!("{:.2}B", v / 1e9),
        v if v >= 1e6 => format!("{:.2}M", v / 1e6),
        v if v >= 1e3 => format!("{:.2}K", v / 1e3),
        v => format!("{:.0}", v),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
