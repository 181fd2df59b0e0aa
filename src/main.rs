mod aggregator;
mod app_state;
mod candles;
mod chart;
mod data_source;
mod input;
mod render_loop;
mod storage_utils;
mod summary;
mod timeframe;
mod tui;
mod yahoo;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::style::Stylize;
use regex::Regex;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::app_state::AppState;
use crate::input::{InputListener, KeyMap, TerminalKeys};
use crate::storage_utils::AppConfig;
use crate::tui::TerminalRenderer;
use crate::yahoo::YahooSource;

// How long the controls banner stays up before the chart takes the screen.
const CONTROLS_BANNER: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "kchart")]
#[command(about = "Candlestick chart of a stock's daily, weekly and monthly history")]
struct Cli {
    /// Stock ticker symbol (e.g., AAPL). Prompted for when omitted.
    ticker: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to a file: stdout belongs to the chart.
    let _log_guard = init_logging().unwrap_or_else(|e| {
        eprintln!("Warning: logging disabled: {:#}", e);
        None
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            warn!(error = %e, "exiting with error");
            eprintln!("{}", format!("Error: {}", e).red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ticker = match cli.ticker {
        Some(ticker) => ticker,
        None => prompt_ticker()?,
    };
    let ticker = validate_ticker(&ticker)?;

    let config = AppConfig::load_or_default(storage_utils::binary_relative("storage")).await;
    info!(%ticker, ?config, "starting");

    println!(
        "{}",
        format!("Fetching data for {}...", ticker.to_uppercase()).green().bold()
    );
    let source = YahooSource::new(config.source.base_url.clone(), config.source.timeout())?;
    let state = Arc::new(AppState::initialize(&ticker, &source, &config.history).await?);
    println!("{} Data loaded for {}.", "✓".green(), state.ticker().to_uppercase());

    println!("\n{}\n", summary::load_summary(&state));
    println!("Controls: ← → to change timeframe | Esc to exit.");
    tokio::time::sleep(CONTROLS_BANNER).await;

    let mut renderer = TerminalRenderer::enter()?;
    let keymap = KeyMap {
        escape_on_release: renderer.reports_key_release(),
    };
    let mut listener = InputListener::spawn(Arc::clone(&state), TerminalKeys, keymap)?;

    let outcome = render_loop::run(&state, &mut renderer, config.display.refresh_interval()).await;

    // Teardown runs on every exit path before the outcome is inspected.
    listener.stop();
    say_goodbye(|| renderer.restore());

    let reason = outcome?;
    info!(?reason, "exited");
    Ok(())
}

/// Give the terminal back and print the farewell. Failures here are logged
/// and never change the exit status.
fn say_goodbye(restore: impl FnOnce() -> Result<()>) {
    if let Err(e) = restore() {
        warn!(error = %e, "failed to restore terminal");
    }
    if let Err(e) = clearscreen::clear() {
        warn!(error = %e, "failed to clear screen");
    }
    println!("{}", "Goodbye!".cyan().bold());
}

fn prompt_ticker() -> Result<String> {
    print!("{}", "Enter a stock ticker (e.g., AAPL): ".bold());
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read ticker")?;
    Ok(line)
}

/// Trim and check a user-supplied symbol. Yahoo symbols use letters, digits
/// and `.`, `-`, `^`, `=` (e.g. `BRK-B`, `^GSPC`, `EURUSD=X`).
fn validate_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim();
    if ticker.is_empty() {
        bail!("Ticker symbol cannot be empty.");
    }

    let allowed = Regex::new(r"^[A-Za-z0-9.\-^=]{1,20}$")?;
    if !allowed.is_match(ticker) {
        bail!("'{}' is not a valid ticker symbol.", ticker);
    }

    Ok(ticker.to_string())
}

/// Daily-rotated log file in `logs/` next to the binary. Level comes from
/// `RUST_LOG`, defaulting to info for this crate.
fn init_logging() -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let exe_path = std::env::current_exe()?;
    let log_dir = exe_path
        .parent()
        .context("Could not find binary directory")?
        .join("logs");
    std::fs::create_dir_all(&log_dir).context("failed to create log directory")?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "kchart.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kchart=info".into()))
        .try_init()?;

    info!(log_dir = %log_dir.display(), "logging initialised");
    Ok(Some(guard))
}
