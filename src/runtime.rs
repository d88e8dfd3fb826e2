use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::engine::{Engine, EngineEvent};

/// How often the engine is polled while a phase is counting down. Derived
/// remaining time tolerates late ticks, so this only bounds display lag.
pub const TICK_RATE_MS: u64 = 100;

/// Terminal input, decoupled from the tick cadence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Resize,
}

/// Outcome of one pass through the event loop.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Key(KeyEvent),
    Resize,
    /// A tick elapsed and the engine was polled; carries the poll's events.
    Ticked(Vec<EngineEvent>),
    /// A tick elapsed but nothing is counting down; no redraw needed.
    Idle,
}

/// Source of terminal input. The timeout doubles as the tick interval: a
/// `None` return means a full tick elapsed with no input.
pub trait InputSource {
    fn next_event(&self, timeout: Duration) -> Option<InputEvent>;
}

/// Time source, injectable so loop tests never sleep.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests. Shared behind `Rc` so the test can
/// keep advancing it after handing it to a [`Runner`].
#[derive(Debug)]
pub struct TestClock {
    now: Cell<Instant>,
}

impl TestClock {
    pub fn new(origin: Instant) -> Self {
        Self {
            now: Cell::new(origin),
        }
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for Rc<TestClock> {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Production input source; blocks on the crossterm event queue for up to
/// the tick interval. Mouse and focus events are swallowed.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn next_event(&self, timeout: Duration) -> Option<InputEvent> {
        if !event::poll(timeout).unwrap_or(false) {
            return None;
        }
        match event::read() {
            Ok(CtEvent::Key(key)) => Some(InputEvent::Key(key)),
            Ok(CtEvent::Resize(_, _)) => Some(InputEvent::Resize),
            _ => None,
        }
    }
}

/// Scripted input source for tests; yields queued events, then times out.
#[derive(Debug, Default)]
pub struct QueuedInput {
    queue: RefCell<VecDeque<InputEvent>>,
}

impl QueuedInput {
    pub fn new<I: IntoIterator<Item = InputEvent>>(events: I) -> Self {
        Self {
            queue: RefCell::new(events.into_iter().collect()),
        }
    }

    pub fn push(&self, event: InputEvent) {
        self.queue.borrow_mut().push_back(event);
    }
}

impl InputSource for QueuedInput {
    fn next_event(&self, _timeout: Duration) -> Option<InputEvent> {
        self.queue.borrow_mut().pop_front()
    }
}

/// Drives the loop one step at a time: deliver pending input, otherwise
/// treat the expired timeout as a tick and poll the engine with the clock's
/// current instant. Ticks are swallowed while nothing is counting down, so
/// an idle or paused timer costs no redraws. The engine itself stays
/// passive and only ever sees explicit instants.
pub struct Runner<S: InputSource, C: Clock> {
    input: S,
    clock: C,
    tick_interval: Duration,
}

impl<S: InputSource, C: Clock> Runner<S, C> {
    pub fn new(input: S, clock: C) -> Self {
        Self {
            input,
            clock,
            tick_interval: Duration::from_millis(TICK_RATE_MS),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn step(&self, engine: &mut Engine) -> Step {
        match self.input.next_event(self.tick_interval) {
            Some(InputEvent::Key(key)) => Step::Key(key),
            Some(InputEvent::Resize) => Step::Resize,
            None => {
                if !engine.is_running() {
                    return Step::Idle;
                }
                let (_, events) = engine.poll(self.clock.now());
                Step::Ticked(events)
            }
        }
    }
}
