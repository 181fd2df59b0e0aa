//! Keyboard listener thread.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, error, warn};

use crate::app_state::{AppState, Command};

// How long a single poll may block before the stop flag is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Source of key events for the listener thread.
pub trait KeySource: Send + 'static {
    /// Wait up to `timeout` for the next key event. Non-key events are
    /// swallowed and reported as `Ok(None)`.
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Reads keys from the controlling terminal via crossterm.
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(Some(key)),
            // Resizes are picked up by the next redraw.
            _ => Ok(None),
        }
    }
}

/// Fixed key bindings.
#[derive(Debug, Clone, Copy)]
pub struct KeyMap {
    /// Quit on Esc release rather than press. Only meaningful when the
    /// terminal reports release events.
    pub escape_on_release: bool,
}

impl KeyMap {
    pub fn command_for(&self, key: &KeyEvent) -> Option<Command> {
        let pressed = matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat);

        match key.code {
            KeyCode::Left if pressed => Some(Command::Retreat),
            KeyCode::Right if pressed => Some(Command::Advance),
            KeyCode::Esc => {
                let wanted = if self.escape_on_release {
                    KeyEventKind::Release
                } else {
                    KeyEventKind::Press
                };
                (key.kind == wanted).then_some(Command::Exit)
            }
            // Raw mode turns Ctrl+C into a key event instead of SIGINT.
            KeyCode::Char('c')
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.kind == KeyEventKind::Press =>
            {
                Some(Command::Exit)
            }
            _ => None,
        }
    }
}

/// Background thread turning key events into [`Command`]s on the shared
/// state. Stops by itself after an exit command; otherwise on
/// [`InputListener::stop`] or drop.
pub struct InputListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputListener {
    pub fn spawn<K: KeySource>(state: Arc<AppState>, keys: K, keymap: KeyMap) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("input-listener".into())
            .spawn(move || listen(&state, keys, keymap, &thread_stop))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to finish. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("input listener panicked");
            }
        }
    }
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen<K: KeySource>(state: &AppState, mut keys: K, keymap: KeyMap, stop: &AtomicBool) {
    debug!("input listener started");

    while !stop.load(Ordering::Relaxed) {
        match keys.next_key(POLL_INTERVAL) {
            Ok(Some(key)) => {
                let Some(command) = keymap.command_for(&key) else {
                    continue;
                };
                state.apply(command);
                if command == Command::Exit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "reading keyboard input failed");
                state.request_exit();
                break;
            }
        }
    }

    debug!("input listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::Series;
    use crate::timeframe::Timeframe;
    use std::collections::VecDeque;
    use std::time::Instant;

    struct ScriptedKeys(VecDeque<io::Result<KeyEvent>>);

    impl ScriptedKeys {
        fn new(keys: Vec<KeyEvent>) -> Self {
            Self(keys.into_iter().map(Ok).collect())
        }
    }

    impl KeySource for ScriptedKeys {
        fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
            match self.0.pop_front() {
                Some(next) => next.map(Some),
                None => {
                    thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(None)
                }
            }
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Release)
    }

    fn wait_for_exit(state: &AppState) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !state.should_exit() {
            assert!(Instant::now() < deadline, "listener never requested exit");
            thread::sleep(Duration::from_millis(1));
        }
    }

    const RELEASES: KeyMap = KeyMap {
        escape_on_release: true,
    };

    #[test]
    fn arrows_map_to_selector_moves() {
        assert_eq!(RELEASES.command_for(&press(KeyCode::Left)), Some(Command::Retreat));
        assert_eq!(RELEASES.command_for(&press(KeyCode::Right)), Some(Command::Advance));
        assert_eq!(RELEASES.command_for(&release(KeyCode::Right)), None);
        assert_eq!(RELEASES.command_for(&press(KeyCode::Up)), None);
        assert_eq!(RELEASES.command_for(&press(KeyCode::Char('q'))), None);
    }

    #[test]
    fn escape_quits_on_release_when_reported() {
        assert_eq!(RELEASES.command_for(&press(KeyCode::Esc)), None);
        assert_eq!(RELEASES.command_for(&release(KeyCode::Esc)), Some(Command::Exit));

        let presses = KeyMap {
            escape_on_release: false,
        };
        assert_eq!(presses.command_for(&press(KeyCode::Esc)), Some(Command::Exit));
    }

    #[test]
    fn ctrl_c_is_an_interrupt() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(RELEASES.command_for(&ctrl_c), Some(Command::Exit));
    }

    #[test]
    fn listener_applies_commands_until_escape() {
        let state = Arc::new(AppState::from_daily("aapl", Series::empty()));
        let keys = ScriptedKeys::new(vec![
            press(KeyCode::Right),
            press(KeyCode::Right),
            press(KeyCode::Left),
            press(KeyCode::Esc),
            release(KeyCode::Esc),
            press(KeyCode::Right),
        ]);

        let mut listener = InputListener::spawn(Arc::clone(&state), keys, RELEASES).unwrap();
        wait_for_exit(&state);
        listener.stop();

        // The Right press after Esc is never consumed.
        assert_eq!(state.current_timeframe(), Timeframe::Weekly);
        assert!(listener.handle.is_none());
    }

    #[test]
    fn read_errors_request_exit() {
        let state = Arc::new(AppState::from_daily("aapl", Series::empty()));
        let keys = ScriptedKeys(VecDeque::from([Err(io::Error::other("tty gone"))]));

        let listener = InputListener::spawn(Arc::clone(&state), keys, RELEASES).unwrap();
        wait_for_exit(&state);
        drop(listener);

        assert_eq!(state.current_timeframe(), Timeframe::Daily);
    }

    #[test]
    fn stop_joins_an_idle_listener() {
        let state = Arc::new(AppState::from_daily("aapl", Series::empty()));
        let mut listener = InputListener::spawn(Arc::clone(&state), ScriptedKeys::new(vec![]), RELEASES).unwrap();

        listener.stop();
        listener.stop();

        assert!(!state.should_exit());
        assert!(listener.handle.is_none());
    }
}
