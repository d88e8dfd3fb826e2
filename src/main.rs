pub mod config;
pub mod engine;
pub mod history;
pub mod runtime;
pub mod ui;
pub mod util;

use crate::{
    config::{Config, ConfigStore, FileConfigStore},
    engine::{Engine, EngineEvent},
    history::HistoryLog,
    runtime::{CrosstermInput, Runner, Step, SystemClock},
    ui::mode_glyph,
    util::format_clock,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
    },
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Instant,
};

const EXTEND_SECS: u64 = 5 * 60;

/// pomodoro interval timer for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal Pomodoro timer with configurable work/break durations, long-break cycles, and an optional focus statement prompt before each work session."
)]
pub struct Cli {
    /// length of a work session in minutes
    #[clap(short = 'w', long)]
    work_minutes: Option<u64>,

    /// length of a short break in minutes
    #[clap(short = 's', long)]
    short_break_minutes: Option<u64>,

    /// length of a long break in minutes
    #[clap(short = 'l', long)]
    long_break_minutes: Option<u64>,

    /// completed work sessions before a long break
    #[clap(short = 'c', long)]
    cycles: Option<u32>,

    /// skip the focus statement prompt before fresh work sessions
    #[clap(long)]
    no_focus_prompt: bool,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer CLI overrides on top of the stored configuration.
    fn apply_to(&self, mut cfg: Config) -> Config {
        if let Some(w) = self.work_minutes {
            cfg.work_minutes = w;
        }
        if let Some(s) = self.short_break_minutes {
            cfg.short_break_minutes = s;
        }
        if let Some(l) = self.long_break_minutes {
            cfg.long_break_minutes = l;
        }
        if let Some(c) = self.cycles {
            cfg.cycles_per_long_break = c;
        }
        if self.no_focus_prompt {
            cfg.focus_prompt = false;
        }
        cfg.sanitized()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Timer,
    FocusCapture { input: String },
}

#[derive(Debug)]
pub struct App {
    pub engine: Engine,
    pub state: AppState,
    pub history: HistoryLog,
    bell_pending: bool,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self::with_history(config, HistoryLog::new())
    }

    pub fn with_history(config: &Config, history: HistoryLog) -> Self {
        Self {
            engine: Engine::new(config.timer_config(), config.focus_prompt),
            state: AppState::Timer,
            history,
            bell_pending: false,
        }
    }

    /// Poll the countdown at `now` and absorb whatever it produced.
    pub fn on_tick(&mut self, now: Instant) {
        if self.engine.is_running() {
            let (_, events) = self.engine.poll(now);
            self.handle_engine_events(events);
        }
    }

    pub fn on_start_pause(&mut self, now: Instant) {
        if self.engine.is_running() {
            self.engine.pause(now);
        } else {
            let events = self.engine.request_start(now);
            self.handle_engine_events(events);
        }
    }

    pub fn on_reset(&mut self) {
        let events = self.engine.reset();
        self.handle_engine_events(events);
        self.state = AppState::Timer;
    }

    pub fn commit_focus(&mut self, now: Instant) {
        let AppState::FocusCapture { input } = &self.state else {
            return;
        };
        let statement = Some(input.clone()).filter(|s| !s.trim().is_empty());
        self.state = AppState::Timer;
        let events = self.engine.resolve_focus_capture(statement, now);
        self.handle_engine_events(events);
    }

    pub fn skip_focus(&mut self, now: Instant) {
        if matches!(self.state, AppState::FocusCapture { .. }) {
            let events = self.engine.resolve_focus_capture(None, now);
            self.state = AppState::Timer;
            self.handle_engine_events(events);
        }
    }

    /// True once per completed phase; consumed by the loop to ring the
    /// terminal bell.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell_pending)
    }

    fn handle_engine_events(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            match event {
                EngineEvent::FocusCaptureRequested => {
                    self.state = AppState::FocusCapture {
                        input: String::new(),
                    };
                }
                EngineEvent::PhaseComplete { previous, .. } => {
                    self.bell_pending = true;
                    let planned_minutes =
                        self.engine.config().duration_for(previous).as_secs() / 60;
                    let _ = self.history.record(
                        previous,
                        planned_minutes,
                        self.engine.completed_work_sessions(),
                    );
                }
                // Counter is rendered straight from engine state
                EngineEvent::CompletedCountChanged(_) => {}
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if cli.save_config {
        store.save(&config)?;
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config);
    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        SetTitle("")
    )?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermInput, SystemClock);

    terminal.draw(|f| ui(app, f))?;
    sync_terminal_title(app)?;

    loop {
        match runner.step(&mut app.engine) {
            Step::Key(key) => {
                if handle_key(app, key, Instant::now()) {
                    break;
                }
                terminal.draw(|f| ui(app, f))?;
                sync_terminal_title(app)?;
            }
            Step::Resize => {
                terminal.draw(|f| ui(app, f))?;
            }
            Step::Ticked(events) => {
                app.handle_engine_events(events);
                if app.take_bell() {
                    ring_bell()?;
                }
                terminal.draw(|f| ui(app, f))?;
                sync_terminal_title(app)?;
            }
            // Idle or paused: the display is frozen, nothing to redraw.
            Step::Idle => {}
        }
    }

    Ok(())
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent, now: Instant) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if matches!(app.state, AppState::FocusCapture { .. }) {
        match key.code {
            KeyCode::Enter => app.commit_focus(now),
            KeyCode::Esc => app.skip_focus(now),
            KeyCode::Backspace => {
                if let AppState::FocusCapture { input } = &mut app.state {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                if let AppState::FocusCapture { input } = &mut app.state {
                    input.push(c);
                }
            }
            _ => {}
        }
    } else {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Char(' ') => app.on_start_pause(now),
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') => app.on_reset(),
            KeyCode::Char('m') => app.engine.toggle_mode(),
            KeyCode::Char('e') => app.engine.extend_current_phase(EXTEND_SECS),
            _ => {}
        }
    }

    false
}

/// The original web version mirrored state into the tab title; the terminal
/// title plays the same role here.
fn terminal_title(app: &App) -> String {
    let clock = format_clock(app.engine.remaining_secs());
    if app.engine.is_running() {
        format!("{} {} - pomo", mode_glyph(app.engine.mode()), clock)
    } else {
        format!("⏸ {clock} - pomo")
    }
}

fn sync_terminal_title(app: &App) -> io::Result<()> {
    execute!(io::stdout(), SetTitle(terminal_title(app)))
}

fn ring_bell() -> io::Result<()> {
    execute!(io::stdout(), Print("\x07"))
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TimerMode;
    use std::time::Duration;

    fn minute_config() -> Config {
        Config {
            work_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 1,
            cycles_per_long_break: 2,
            focus_prompt: true,
        }
    }

    fn test_app(cfg: &Config) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryLog::with_path(dir.path().join("log.csv"));
        (App::with_history(cfg, history), dir)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["pomo"]);

        assert_eq!(cli.work_minutes, None);
        assert_eq!(cli.short_break_minutes, None);
        assert_eq!(cli.long_break_minutes, None);
        assert_eq!(cli.cycles, None);
        assert!(!cli.no_focus_prompt);
        assert!(!cli.save_config);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["pomo", "-w", "50", "-s", "10", "-l", "30", "-c", "3"]);
        assert_eq!(cli.work_minutes, Some(50));
        assert_eq!(cli.short_break_minutes, Some(10));
        assert_eq!(cli.long_break_minutes, Some(30));
        assert_eq!(cli.cycles, Some(3));
    }

    #[test]
    fn test_cli_long_flags() {
        let cli = Cli::parse_from([
            "pomo",
            "--work-minutes",
            "45",
            "--no-focus-prompt",
            "--save-config",
        ]);
        assert_eq!(cli.work_minutes, Some(45));
        assert!(cli.no_focus_prompt);
        assert!(cli.save_config);
    }

    #[test]
    fn test_cli_overrides_layer_on_stored_config() {
        let cli = Cli::parse_from(["pomo", "-w", "50", "--no-focus-prompt"]);
        let cfg = cli.apply_to(Config::default());
        assert_eq!(cfg.work_minutes, 50);
        assert_eq!(cfg.short_break_minutes, 5);
        assert!(!cfg.focus_prompt);
    }

    #[test]
    fn test_cli_zero_values_are_sanitized() {
        let cli = Cli::parse_from(["pomo", "-w", "0", "-c", "0"]);
        let cfg = cli.apply_to(Config::default());
        assert_eq!(cfg.work_minutes, 1);
        assert_eq!(cfg.cycles_per_long_break, 1);
    }

    #[test]
    fn test_app_starts_in_timer_state() {
        let (app, _dir) = test_app(&minute_config());
        assert_eq!(app.state, AppState::Timer);
        assert_eq!(app.engine.mode(), TimerMode::Work);
        assert!(!app.engine.is_running());
        assert_eq!(app.engine.remaining_secs(), 60);
    }

    #[test]
    fn test_space_opens_focus_capture_for_fresh_work_phase() {
        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();

        handle_key(&mut app, key(KeyCode::Char(' ')), now);
        assert_eq!(
            app.state,
            AppState::FocusCapture {
                input: String::new()
            }
        );
        assert!(!app.engine.is_running());
    }

    #[test]
    fn test_focus_capture_typing_and_commit() {
        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();
        handle_key(&mut app, key(KeyCode::Char(' ')), now);

        for c in "ship it".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)), now);
        }
        handle_key(&mut app, key(KeyCode::Backspace), now);
        handle_key(&mut app, key(KeyCode::Char('t')), now);
        handle_key(&mut app, key(KeyCode::Enter), now);

        assert_eq!(app.state, AppState::Timer);
        assert!(app.engine.is_running());
        assert_eq!(app.engine.focus_statement(), Some("ship it"));
        assert!(!app.engine.focus_was_skipped());
    }

    #[test]
    fn test_focus_capture_escape_skips() {
        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();
        handle_key(&mut app, key(KeyCode::Char(' ')), now);
        handle_key(&mut app, key(KeyCode::Esc), now);

        assert_eq!(app.state, AppState::Timer);
        assert!(app.engine.is_running());
        assert!(app.engine.focus_was_skipped());
    }

    #[test]
    fn test_no_focus_prompt_starts_immediately() {
        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let (mut app, _dir) = test_app(&cfg);
        handle_key(&mut app, key(KeyCode::Char(' ')), Instant::now());

        assert_eq!(app.state, AppState::Timer);
        assert!(app.engine.is_running());
    }

    #[test]
    fn test_space_toggles_pause_and_resume() {
        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let (mut app, _dir) = test_app(&cfg);
        let now = Instant::now();

        app.on_start_pause(now);
        assert!(app.engine.is_running());
        app.on_start_pause(now);
        assert!(!app.engine.is_running());
        app.on_start_pause(now);
        assert!(app.engine.is_running());
        assert_eq!(app.engine.remaining_secs(), 60);
    }

    #[test]
    fn test_completion_rings_bell_and_logs_history() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("log.csv");
        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let mut app = App::with_history(&cfg, HistoryLog::with_path(&log_path));

        let now = Instant::now();
        app.on_start_pause(now);
        app.on_tick(now + Duration::from_secs(61));

        assert!(app.take_bell());
        assert!(!app.take_bell()); // consumed
        assert_eq!(app.engine.mode(), TimerMode::ShortBreak);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains(",Work Time,1,1"));
    }

    #[test]
    fn test_reset_key_returns_to_timer_state_and_zeroes_count() {
        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();
        handle_key(&mut app, key(KeyCode::Char(' ')), now);
        handle_key(&mut app, key(KeyCode::Esc), now); // skip focus, running
        app.on_tick(now + Duration::from_secs(61));
        assert_eq!(app.engine.completed_work_sessions(), 1);

        handle_key(&mut app, key(KeyCode::Char('r')), now + Duration::from_secs(62));
        assert_eq!(app.state, AppState::Timer);
        assert_eq!(app.engine.completed_work_sessions(), 0);
        assert_eq!(app.engine.mode(), TimerMode::ShortBreak);
        assert!(!app.engine.is_running());
    }

    #[test]
    fn test_mode_toggle_key() {
        let (mut app, _dir) = test_app(&minute_config());
        handle_key(&mut app, key(KeyCode::Char('m')), Instant::now());
        assert_eq!(app.engine.mode(), TimerMode::ShortBreak);
        handle_key(&mut app, key(KeyCode::Char('m')), Instant::now());
        assert_eq!(app.engine.mode(), TimerMode::Work);
    }

    #[test]
    fn test_extend_key_only_while_running() {
        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let (mut app, _dir) = test_app(&cfg);
        let now = Instant::now();

        handle_key(&mut app, key(KeyCode::Char('e')), now);
        assert_eq!(app.engine.remaining_secs(), 60);

        app.on_start_pause(now);
        handle_key(&mut app, key(KeyCode::Char('e')), now);
        app.on_tick(now);
        assert_eq!(app.engine.remaining_secs(), 60 + EXTEND_SECS);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _dir) = test_app(&minute_config());
        assert!(handle_key(&mut app, key(KeyCode::Char('q')), Instant::now()));
        assert!(handle_key(&mut app, key(KeyCode::Esc), Instant::now()));
        assert!(handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Instant::now()
        ));
        assert!(!handle_key(&mut app, key(KeyCode::Char('x')), Instant::now()));
    }

    #[test]
    fn test_ctrl_c_quits_from_focus_capture() {
        let (mut app, _dir) = test_app(&minute_config());
        handle_key(&mut app, key(KeyCode::Char(' ')), Instant::now());
        assert!(handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Instant::now()
        ));
    }

    #[test]
    fn test_terminal_title_reflects_state() {
        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let (mut app, _dir) = test_app(&cfg);
        assert_eq!(terminal_title(&app), "⏸ 01:00 - pomo");

        app.on_start_pause(Instant::now());
        assert_eq!(terminal_title(&app), "🔴 01:00 - pomo");

        app.engine.toggle_mode();
        app.on_start_pause(Instant::now());
        assert_eq!(terminal_title(&app), "🟢 01:00 - pomo");
    }

    #[test]
    fn test_ui_renders_timer_state() {
        use ratatui::{backend::TestBackend, Terminal};

        let (mut app, _dir) = test_app(&minute_config());
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();

        terminal.draw(|f| ui(&mut app, f)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("Work Time"));
        assert!(content.contains("01:00"));
        assert!(content.contains("completed 0"));
        assert!(content.contains("press (space) to start"));
    }

    #[test]
    fn test_ui_renders_focus_capture_state() {
        use ratatui::{backend::TestBackend, Terminal};

        let (mut app, _dir) = test_app(&minute_config());
        handle_key(&mut app, key(KeyCode::Char(' ')), Instant::now());
        for c in "deep work".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)), Instant::now());
        }

        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| ui(&mut app, f)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("What will you focus on?"));
        assert!(content.contains("deep work"));
    }

    #[test]
    fn test_ui_renders_focus_statement_during_work_phase() {
        use ratatui::{backend::TestBackend, Terminal};

        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();
        handle_key(&mut app, key(KeyCode::Char(' ')), now);
        for c in "write tests".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)), now);
        }
        handle_key(&mut app, key(KeyCode::Enter), now);

        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| ui(&mut app, f)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("focus: write tests"));
    }

    #[test]
    fn test_ui_renders_paused_hint() {
        use ratatui::{backend::TestBackend, Terminal};

        let cfg = Config {
            focus_prompt: false,
            ..minute_config()
        };
        let (mut app, _dir) = test_app(&cfg);
        let now = Instant::now();
        app.on_start_pause(now);
        app.on_start_pause(now);

        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| ui(&mut app, f)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("paused"));
    }

    #[test]
    fn test_integration_full_cycle_through_app_layer() {
        let (mut app, _dir) = test_app(&minute_config());
        let now = Instant::now();

        handle_key(&mut app, key(KeyCode::Char(' ')), now);
        handle_key(&mut app, key(KeyCode::Esc), now);
        assert!(app.engine.is_running());

        // Work completes into a short break; break completes back into Work
        // with no focus gate on the auto-continue.
        app.on_tick(now + Duration::from_secs(61));
        assert_eq!(app.engine.mode(), TimerMode::ShortBreak);
        app.on_tick(now + Duration::from_secs(121));
        assert_eq!(app.engine.mode(), TimerMode::Work);
        assert_eq!(app.state, AppState::Timer);
        assert!(app.engine.is_running());

        // Second completed work session lands on the long break.
        app.on_tick(now + Duration::from_secs(181));
        assert_eq!(app.engine.mode(), TimerMode::LongBreak);
        assert_eq!(app.engine.completed_work_sessions(), 2);
    }
}
