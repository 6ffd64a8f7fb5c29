//! Periodic auto-flush of dirty sessions.
//!
//! Runs off clock checks from the caller's loop: on each UTC minute boundary
//! that matches the configured frequency, every dirty session is flushed once.
//! A failed flush is logged and reported; in-memory state is kept either way.

use std::time::Instant;

use chrono::{DateTime, Timelike, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::game::errors::GameResult;
use crate::game::session::{FlushReport, SessionManager};

/// How often dirty sessions are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AutosaveFrequency {
    #[serde(rename = "disabled")]
    Disabled,
    #[serde(rename = "1min")]
    EveryMinute,
    #[serde(rename = "5min")]
    #[default]
    Every5Minutes,
    #[serde(rename = "15min")]
    Every15Minutes,
    #[serde(rename = "30min")]
    Every30Minutes,
    #[serde(rename = "hourly")]
    Hourly,
}

impl AutosaveFrequency {
    pub fn minutes(&self) -> u32 {
        match self {
            AutosaveFrequency::Disabled => 0,
            AutosaveFrequency::EveryMinute => 1,
            AutosaveFrequency::Every5Minutes => 5,
            AutosaveFrequency::Every15Minutes => 15,
            AutosaveFrequency::Every30Minutes => 30,
            AutosaveFrequency::Hourly => 60,
        }
    }
}

/// `[autosave]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: AutosaveFrequency,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: AutosaveFrequency::Every5Minutes,
        }
    }
}

pub struct AutosaveScheduler {
    config: AutosaveConfig,
    last_flush_time: Option<Instant>,
    last_boundary_minute: Option<i64>,
}

impl AutosaveScheduler {
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            last_flush_time: None,
            last_boundary_minute: None,
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    pub fn last_flush_time(&self) -> Option<Instant> {
        self.last_flush_time
    }

    /// Call periodically from the service loop.
    pub fn check_and_flush(&mut self, sessions: &SessionManager) -> GameResult<Option<FlushReport>> {
        self.check_and_flush_at(sessions, Utc::now())
    }

    /// Returns `Some(report)` when a flush ran at `now`, `None` when nothing was due.
    pub fn check_and_flush_at(
        &mut self,
        sessions: &SessionManager,
        now: DateTime<Utc>,
    ) -> GameResult<Option<FlushReport>> {
        if !self.config.enabled || !self.should_flush_now(&now) {
            return Ok(None);
        }

        let boundary_minute = now.timestamp() / 60;
        if self.last_boundary_minute == Some(boundary_minute) {
            debug!("Autosave already ran in this minute boundary, skipping");
            return Ok(None);
        }
        self.last_boundary_minute = Some(boundary_minute);

        let report = sessions.flush_dirty()?;
        self.last_flush_time = Some(Instant::now());
        if report.failed.is_empty() {
            if report.flushed > 0 {
                info!("Autosave flushed {} session(s)", report.flushed);
            }
        } else {
            warn!(
                "Autosave flushed {} session(s), {} failed",
                report.flushed,
                report.failed.len()
            );
        }
        Ok(Some(report))
    }

    fn should_flush_now(&self, now: &DateTime<Utc>) -> bool {
        match self.config.frequency.minutes() {
            0 => false,
            60 => now.minute() == 0,
            step => now.minute() % step == 0,
        }
    }
}
