use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::candles::Series;

/// Draws the chart, or a placeholder when there is nothing to chart.
pub trait ChartRenderer {
    fn render(&mut self, series: &Series, title: &str) -> Result<()>;
    fn render_placeholder(&mut self, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The exit flag was set, by key or by the listener failing.
    Requested,
    /// SIGINT reached the process.
    Interrupted,
}

/// Redraw the selected timeframe every `refresh` until exit or SIGINT.
pub async fn run<R: ChartRenderer>(
    state: &AppState,
    renderer: &mut R,
    refresh: Duration,
) -> Result<ExitReason> {
    run_until(state, renderer, refresh, signal::ctrl_c()).await
}

/// Redraw the selected timeframe every `refresh` until exit.
///
/// Commands applied to `state` cut the wait short so key presses show up
/// without waiting out the full interval. When `interrupt` completes the exit
/// flag is set and the loop ends like any other exit request.
pub async fn run_until<R, F>(
    state: &AppState,
    renderer: &mut R,
    refresh: Duration,
    interrupt: F,
) -> Result<ExitReason>
where
    R: ChartRenderer,
    F: Future<Output = io::Result<()>>,
{
    tokio::pin!(interrupt);

    loop {
        if state.should_exit() {
            info!("exit requested");
            return Ok(ExitReason::Requested);
        }

        let timeframe = state.current_timeframe();
        let series = state.current_series();
        if series.is_empty() {
            renderer.render_placeholder(&format!("No data for timeframe {}", timeframe.id()))?;
        } else {
            renderer.render(series, &state.current_title())?;
        }

        tokio::select! {
            _ = tokio::time::sleep(refresh) => {}
            _ = state.changed() => debug!("state changed, redrawing"),
            result = &mut interrupt => {
                result?;
                info!("interrupted");
                state.request_exit();
                return Ok(ExitReason::Interrupted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::Command;
    use crate::candles::test_utils::{candle_on, date};
    use crate::timeframe::Timeframe;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum Frame {
        Chart { title: String, bars: usize },
        Placeholder(String),
    }

    /// Records frames and replays a script of commands, one per frame.
    struct RecordingRenderer {
        state: Arc<AppState>,
        script: Vec<Command>,
        frames: Vec<Frame>,
    }

    impl RecordingRenderer {
        fn new(state: Arc<AppState>, mut script: Vec<Command>) -> Self {
            script.reverse();
            Self {
                state,
                script,
                frames: Vec::new(),
            }
        }

        fn next_step(&mut self) {
            if let Some(command) = self.script.pop() {
                self.state.apply(command);
            }
        }
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&mut self, series: &Series, title: &str) -> Result<()> {
            self.frames.push(Frame::Chart {
                title: title.to_string(),
                bars: series.len(),
            });
            self.next_step();
            Ok(())
        }

        fn render_placeholder(&mut self, message: &str) -> Result<()> {
            self.frames.push(Frame::Placeholder(message.to_string()));
            self.next_step();
            Ok(())
        }
    }

    fn two_days() -> Series {
        Series::new(vec![
            candle_on(date(2024, 3, 4), 1.0, 2.0, 0.5, 1.5, 10.0),
            candle_on(date(2024, 3, 5), 1.5, 2.5, 1.0, 2.0, 12.0),
        ])
    }

    #[tokio::test]
    async fn renders_each_timeframe_until_exit() {
        let state = Arc::new(AppState::from_daily("aapl", two_days()));
        let mut renderer = RecordingRenderer::new(
            Arc::clone(&state),
            vec![Command::Advance, Command::Advance, Command::Exit],
        );

        let reason = run(&state, &mut renderer, Duration::from_secs(30)).await.unwrap();

        assert_eq!(reason, ExitReason::Requested);
        assert_eq!(
            renderer.frames,
            vec![
                Frame::Chart { title: "AAPL - Daily Chart".into(), bars: 2 },
                Frame::Chart { title: "AAPL - Weekly Chart".into(), bars: 1 },
                Frame::Chart { title: "AAPL - Monthly Chart".into(), bars: 1 },
            ]
        );
        assert_eq!(state.current_timeframe(), Timeframe::Monthly);
    }

    #[tokio::test]
    async fn empty_timeframe_shows_placeholder_and_keeps_running() {
        let state = Arc::new(AppState::from_daily("new", Series::empty()));
        let mut renderer = RecordingRenderer::new(Arc::clone(&state), vec![Command::Retreat, Command::Exit]);

        run(&state, &mut renderer, Duration::from_millis(10)).await.unwrap();

        assert_eq!(
            renderer.frames,
            vec![
                Frame::Placeholder("No data for timeframe 1d".into()),
                Frame::Placeholder("No data for timeframe 1mo".into()),
            ]
        );
    }

    #[tokio::test]
    async fn redraws_on_the_refresh_cadence_without_input() {
        let state = Arc::new(AppState::from_daily("aapl", two_days()));
        let mut renderer = RecordingRenderer::new(Arc::clone(&state), Vec::new());

        let stopper = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            stopper.request_exit();
        });

        run(&state, &mut renderer, Duration::from_millis(5)).await.unwrap();

        assert!(renderer.frames.len() > 1);
        assert!(renderer.frames.iter().all(|f| matches!(f, Frame::Chart { bars: 2, .. })));
    }

    #[tokio::test]
    async fn interrupt_ends_the_loop_and_sets_the_exit_flag() {
        let state = Arc::new(AppState::from_daily("aapl", two_days()));
        let mut renderer = RecordingRenderer::new(Arc::clone(&state), Vec::new());
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        };

        let reason = run_until(&state, &mut renderer, Duration::from_secs(30), interrupt)
            .await
            .unwrap();

        assert_eq!(reason, ExitReason::Interrupted);
        assert!(state.should_exit());
        assert_eq!(renderer.frames.len(), 1);
    }

    #[tokio::test]
    async fn failed_signal_handler_is_an_error() {
        let state = Arc::new(AppState::from_daily("aapl", two_days()));
        let mut renderer = RecordingRenderer::new(Arc::clone(&state), Vec::new());
        let interrupt = async { Err(io::Error::other("no signal handler")) };

        let result = run_until(&state, &mut renderer, Duration::from_secs(30), interrupt).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exits_immediately_when_flag_already_set() {
        let state = Arc::new(AppState::from_daily("aapl", two_days()));
        state.request_exit();
        let mut renderer = RecordingRenderer::new(Arc::clone(&state), Vec::new());

        let reason = run(&state, &mut renderer, Duration::from_secs(30)).await.unwrap();

        assert_eq!(reason, ExitReason::Requested);
        assert!(renderer.frames.is_empty());
    }
}
