use chrono::prelude::*;
use directories::ProjectDirs;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::engine::TimerMode;

/// Append-only log of completed phases, one CSV line each. Failures are
/// best-effort: the caller drops the result rather than interrupting a
/// running timer.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "pomo") {
            pd.config_dir().join("log.csv")
        } else {
            PathBuf::from("pomo_log.csv")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn record(
        &self,
        mode: TimerMode,
        planned_minutes: u64,
        completed_work_sessions: u32,
    ) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();

        let mut log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(log_file, "date,mode,planned_mins,completed_work_sessions")?;
        }

        writeln!(
            log_file,
            "{},{},{},{}",
            Local::now().format("%c"),
            mode,
            planned_minutes,
            completed_work_sessions,
        )?;

        Ok(())
    }
}
