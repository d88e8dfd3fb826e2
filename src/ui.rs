use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::engine::TimerMode;
use crate::util::format_clock;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;

pub fn mode_color(mode: TimerMode) -> Color {
    match mode {
        TimerMode::Work => Color::Red,
        TimerMode::ShortBreak => Color::Green,
        TimerMode::LongBreak => Color::Blue,
    }
}

pub fn mode_glyph(mode: TimerMode) -> &'static str {
    match mode {
        TimerMode::Work => "🔴",
        TimerMode::ShortBreak => "🟢",
        TimerMode::LongBreak => "🔵",
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.state {
            AppState::Timer => render_timer(self, area, buf),
            AppState::FocusCapture { input } => render_focus_capture(input, area, buf),
        }
    }
}

fn render_timer(app: &App, area: Rect, buf: &mut Buffer) {
    let engine = &app.engine;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1), // mode
                Constraint::Length(2), // clock
                Constraint::Length(1), // progress
                Constraint::Length(2), // counters
                Constraint::Length(1), // focus statement
                Constraint::Length(1), // state hint
                Constraint::Min(0),
                Constraint::Length(1), // help footer
            ]
            .as_ref(),
        )
        .split(area);

    let mode_style = Style::default()
        .patch(bold_style)
        .fg(mode_color(engine.mode()));
    Paragraph::new(Span::styled(engine.mode().to_string(), mode_style))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format_clock(engine.remaining_secs()),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    if engine.phase_in_flight() {
        let gauge_width = chunks[3].width.min(40);
        let gauge_area = Rect {
            x: chunks[3].x + (chunks[3].width.saturating_sub(gauge_width)) / 2,
            width: gauge_width,
            ..chunks[3]
        };
        Gauge::default()
            .gauge_style(Style::default().fg(mode_color(engine.mode())))
            .ratio(engine.progress().clamp(0.0, 1.0))
            .label("")
            .render(gauge_area, buf);
    }

    let counter = format!(
        "completed {} / cycle of {}",
        engine.completed_work_sessions(),
        engine.config().cycles_per_long_break
    );
    Paragraph::new(Span::styled(counter, dim_style))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    if engine.mode() == TimerMode::Work {
        if let Some(statement) = engine.focus_statement() {
            let max_width = chunks[5].width.saturating_sub(8) as usize;
            let shown = truncate_to_width(statement, max_width);
            Paragraph::new(Span::styled(
                format!("focus: {shown}"),
                Style::default().add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
        }
    }

    let hint = if engine.is_running() {
        ""
    } else if engine.phase_in_flight() {
        "paused"
    } else {
        "press (space) to start"
    };
    Paragraph::new(Span::styled(
        hint,
        Style::default().fg(Color::Yellow).patch(bold_style),
    ))
    .alignment(Alignment::Center)
    .render(chunks[6], buf);

    Paragraph::new(Span::styled(
        "(space) start/pause  (e) +5 min  (m) switch mode  (r) reset  (q) quit",
        dim_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[8], buf);
}

/// Truncate to a display-cell budget, appending an ellipsis when cut. Wide
/// characters count by column width, not by char, so CJK and emoji input
/// never overruns the line.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let budget = max_width - 1; // one cell reserved for the ellipsis
    let mut shown = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        shown.push(ch);
    }
    shown.push('…');
    shown
}

fn render_focus_capture(input: &str, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1), // question
                Constraint::Length(1),
                Constraint::Length(2), // input line
                Constraint::Length(1), // hint
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    Paragraph::new(Span::styled(
        "What will you focus on?",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Line::from(vec![
        Span::raw(input),
        Span::styled("█", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: false })
    .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(enter) start working  (esc) skip",
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);
}
