use std::time::{Duration, Instant};

/// Timer phases. A full cycle is `cycles_per_long_break` completed Work
/// phases, after which the next break is a long one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TimerMode {
    #[strum(serialize = "Work Time")]
    Work,
    #[strum(serialize = "Short Break")]
    ShortBreak,
    #[strum(serialize = "Long Break")]
    LongBreak,
}

/// Durations and cycle length supplied by the caller. Re-read on every
/// fresh phase start; the engine never mutates it except through the
/// explicit setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub work_minutes: u64,
    pub short_break_minutes: u64,
    pub long_break_minutes: u64,
    pub cycles_per_long_break: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            cycles_per_long_break: 4,
        }
    }
}

impl TimerConfig {
    /// Non-positive durations or cycle counts are caller contract
    /// violations; they are clamped to 1 rather than rejected.
    pub fn clamped(self) -> Self {
        Self {
            work_minutes: self.work_minutes.max(1),
            short_break_minutes: self.short_break_minutes.max(1),
            long_break_minutes: self.long_break_minutes.max(1),
            cycles_per_long_break: self.cycles_per_long_break.max(1),
        }
    }

    pub fn duration_for(&self, mode: TimerMode) -> Duration {
        let minutes = match mode {
            TimerMode::Work => self.work_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Notifications produced by engine actions, consumed by the presentation
/// layer (bell, counters, the focus-capture prompt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    FocusCaptureRequested,
    PhaseComplete { previous: TimerMode, next: TimerMode },
    CompletedCountChanged(u32),
}

/// The timer state machine.
///
/// Remaining time is derived from wall-clock instants, never from a
/// decremented counter, so a delayed poll (background process, suspended
/// laptop) still computes the correct elapsed delta. The engine is passive:
/// the caller invokes [`Engine::poll`] at a short cadence while running and
/// passes an explicit `now`, which keeps every transition deterministic
/// under test.
#[derive(Debug)]
pub struct Engine {
    config: TimerConfig,
    mode: TimerMode,
    running: bool,
    completed_work_sessions: u32,
    /// Cached display value, refreshed on poll; always derivable from the
    /// timestamps below.
    remaining_secs: u64,
    target_duration: Duration,
    phase_started_at: Option<Instant>,
    pause_started_at: Option<Instant>,
    accumulated_pause: Duration,
    pending_focus_capture: bool,
    focus_statement: Option<String>,
    focus_was_skipped: bool,
    focus_prompt_enabled: bool,
}

impl Engine {
    pub fn new(config: TimerConfig, focus_prompt_enabled: bool) -> Self {
        let config = config.clamped();
        let target_duration = config.duration_for(TimerMode::Work);
        Self {
            config,
            mode: TimerMode::Work,
            running: false,
            completed_work_sessions: 0,
            remaining_secs: target_duration.as_secs(),
            target_duration,
            phase_started_at: None,
            pause_started_at: None,
            accumulated_pause: Duration::ZERO,
            pending_focus_capture: false,
            focus_statement: None,
            focus_was_skipped: false,
            focus_prompt_enabled,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn pending_focus_capture(&self) -> bool {
        self.pending_focus_capture
    }

    pub fn focus_statement(&self) -> Option<&str> {
        self.focus_statement.as_deref()
    }

    pub fn focus_was_skipped(&self) -> bool {
        self.focus_was_skipped
    }

    /// True once the current phase instance has begun counting down
    /// (running or paused mid-phase).
    pub fn phase_in_flight(&self) -> bool {
        self.phase_started_at.is_some()
    }

    /// Fraction of the current phase elapsed, for progress gauges.
    pub fn progress(&self) -> f64 {
        let total = self.target_duration.as_secs();
        if total == 0 {
            return 1.0;
        }
        1.0 - (self.remaining_secs.min(total) as f64 / total as f64)
    }

    /// Request the countdown to begin. No-op while already running. A fresh
    /// Work phase is gated behind focus capture (when enabled): the clock
    /// does not start until [`Engine::resolve_focus_capture`] is called.
    pub fn request_start(&mut self, now: Instant) -> Vec<EngineEvent> {
        if self.running || self.pending_focus_capture {
            return vec![];
        }

        if self.focus_prompt_enabled
            && self.mode == TimerMode::Work
            && self.phase_started_at.is_none()
        {
            self.pending_focus_capture = true;
            return vec![EngineEvent::FocusCaptureRequested];
        }

        self.begin_running(now);
        vec![]
    }

    /// Commit or skip the focus statement and start the gated Work phase.
    /// Valid only while a focus capture is pending.
    pub fn resolve_focus_capture(
        &mut self,
        statement: Option<String>,
        now: Instant,
    ) -> Vec<EngineEvent> {
        if !self.pending_focus_capture {
            return vec![];
        }

        let statement = statement.filter(|s| !s.trim().is_empty());
        self.focus_was_skipped = statement.is_none();
        self.focus_statement = statement;
        self.pending_focus_capture = false;
        self.begin_running(now);
        vec![]
    }

    /// Freeze the countdown. Remaining time holds at its last computed
    /// value until resumed.
    pub fn pause(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        self.remaining_secs = self.derive_remaining(now);
        self.running = false;
        self.pause_started_at = Some(now);
    }

    /// Refresh the remaining time and advance through any phase boundaries
    /// `now` has crossed. Each boundary crossed emits one `PhaseComplete`
    /// and auto-continues into the next phase, so a poll delayed across
    /// several phases cascades through them one at a time and always
    /// returns a consistent value for the phase `now` actually falls in.
    pub fn poll(&mut self, now: Instant) -> (u64, Vec<EngineEvent>) {
        if !self.running {
            return (self.remaining_secs, vec![]);
        }

        let mut events = vec![];
        while let Some(started_at) = self.phase_started_at {
            // A target too large to place on the instant timeline can never
            // expire.
            let phase_end = self
                .accumulated_pause
                .checked_add(self.target_duration)
                .and_then(|total| started_at.checked_add(total));
            let Some(phase_end) = phase_end else {
                break;
            };
            if now < phase_end {
                break;
            }
            self.complete_phase(phase_end, &mut events);
        }

        self.remaining_secs = self.derive_remaining(now);
        (self.remaining_secs, events)
    }

    /// Stop the clock, reload the current mode's duration from
    /// configuration, and zero the completed-session count. The mode is
    /// preserved; reset never returns to Work on its own.
    pub fn reset(&mut self) -> Vec<EngineEvent> {
        let count_changed = self.completed_work_sessions != 0;
        self.clear_phase_instance();
        self.completed_work_sessions = 0;
        self.target_duration = self.config.duration_for(self.mode);
        self.remaining_secs = self.target_duration.as_secs();
        if count_changed {
            vec![EngineEvent::CompletedCountChanged(0)]
        } else {
            vec![]
        }
    }

    /// Manual override between Work and ShortBreak (a LongBreak toggles
    /// back to Work). Implicitly pauses and discards the in-flight phase
    /// instance; the completed-session count is untouched.
    pub fn toggle_mode(&mut self) {
        self.clear_phase_instance();
        self.mode = match self.mode {
            TimerMode::Work => TimerMode::ShortBreak,
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Work,
        };
        self.target_duration = self.config.duration_for(self.mode);
        self.remaining_secs = self.target_duration.as_secs();
    }

    /// Stretch the running phase by `extra_secs`. No-op while paused or
    /// idle; timestamps and pause accounting are untouched.
    pub fn extend_current_phase(&mut self, extra_secs: u64) {
        if !self.running {
            return;
        }
        self.target_duration = self
            .target_duration
            .saturating_add(Duration::from_secs(extra_secs));
    }

    /// Duration changes apply to the live target only when the matching
    /// mode is current, idle, and has no phase instance in flight;
    /// otherwise the new value takes effect on the next fresh start.
    pub fn set_work_minutes(&mut self, minutes: u64) {
        self.config.work_minutes = minutes.max(1);
        self.refresh_idle_target(TimerMode::Work);
    }

    pub fn set_short_break_minutes(&mut self, minutes: u64) {
        self.config.short_break_minutes = minutes.max(1);
        self.refresh_idle_target(TimerMode::ShortBreak);
    }

    pub fn set_long_break_minutes(&mut self, minutes: u64) {
        self.config.long_break_minutes = minutes.max(1);
        self.refresh_idle_target(TimerMode::LongBreak);
    }

    pub fn set_cycles_per_long_break(&mut self, cycles: u32) {
        self.config.cycles_per_long_break = cycles.max(1);
    }

    fn refresh_idle_target(&mut self, mode: TimerMode) {
        if self.mode == mode && !self.running && self.phase_started_at.is_none() {
            self.target_duration = self.config.duration_for(self.mode);
            self.remaining_secs = self.target_duration.as_secs();
        }
    }

    /// Fresh start or resume, shared by `request_start` and
    /// `resolve_focus_capture`.
    fn begin_running(&mut self, now: Instant) {
        if self.phase_started_at.is_none() {
            self.target_duration = self.config.duration_for(self.mode);
            self.phase_started_at = Some(now);
            self.accumulated_pause = Duration::ZERO;
        } else if let Some(paused_at) = self.pause_started_at.take() {
            self.accumulated_pause += now.saturating_duration_since(paused_at);
        }
        self.running = true;
        self.remaining_secs = self.derive_remaining(now);
    }

    /// One natural expiry at `phase_end`: count it, pick the next mode, and
    /// restart the clock anchored at the boundary so cascaded completions
    /// keep correct partial elapsed time.
    fn complete_phase(&mut self, phase_end: Instant, events: &mut Vec<EngineEvent>) {
        let previous = self.mode;

        self.mode = match previous {
            TimerMode::Work => {
                self.completed_work_sessions += 1;
                if self.completed_work_sessions % self.config.cycles_per_long_break == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            // Auto-continue back into Work bypasses the focus gate; only a
            // user-initiated fresh start prompts.
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Work,
        };

        events.push(EngineEvent::PhaseComplete {
            previous,
            next: self.mode,
        });
        if previous == TimerMode::Work {
            events.push(EngineEvent::CompletedCountChanged(
                self.completed_work_sessions,
            ));
        }

        self.target_duration = self.config.duration_for(self.mode);
        self.phase_started_at = Some(phase_end);
        self.pause_started_at = None;
        self.accumulated_pause = Duration::ZERO;
        self.running = true;
    }

    fn clear_phase_instance(&mut self) {
        self.running = false;
        self.phase_started_at = None;
        self.pause_started_at = None;
        self.accumulated_pause = Duration::ZERO;
        self.pending_focus_capture = false;
    }

    /// `ceil(max(0, target - (reference - start - paused)) / 1s)`, where the
    /// reference instant is the pause start while frozen.
    fn derive_remaining(&self, now: Instant) -> u64 {
        let Some(started_at) = self.phase_started_at else {
            return self.target_duration.as_secs();
        };
        let reference = self.pause_started_at.unwrap_or(now);
        let elapsed = reference
            .saturating_duration_since(started_at)
            .saturating_sub(self.accumulated_pause);
        // Millisecond math stays in u128: a saturated target exceeds u64
        // milliseconds even though its second count fits.
        let remaining_ms = self.target_duration.saturating_sub(elapsed).as_millis();
        remaining_ms.div_ceil(1000).min(u64::MAX as u128) as u64
    }
}
