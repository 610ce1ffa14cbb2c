#![allow(dead_code)]

use bracket_random::prelude::RandomNumberGenerator;
use chrono::{DateTime, Local};

use crate::{
    config::DelayWindow,
    data::{LineTemplate, builtin_terminal_script},
};

pub const PLACEHOLDER: &str = "UNKNOWN";

/// External readings taken once when the Terminal stage starts.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentSnapshot {
    pub platform: Option<String>,
    pub battery: Option<u8>,
    pub gps_lock: [f64; 2],
    pub captured_at: DateTime<Local>,
}

impl EnvironmentSnapshot {
    fn render(&self, template: &LineTemplate) -> String {
        match template {
            LineTemplate::Fixed(text) => (*text).to_string(),
            LineTemplate::Platform => format!(
                "DETECTED PLATFORM: {}",
                self.platform.as_deref().unwrap_or(PLACEHOLDER).to_uppercase()
            ),
            LineTemplate::Battery => match self.battery {
                Some(level) => format!("BATTERY STATUS: {level}%"),
                None => format!("BATTERY STATUS: {PLACEHOLDER}%"),
            },
            LineTemplate::GpsLock => format!(
                "GPS LOCKED: [{:.4}, {:.4}]",
                self.gps_lock[0], self.gps_lock[1]
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub typing: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogStep {
    /// A line is on screen and typing; call `advance` after `delay_ms`.
    Reveal { delay_ms: u64 },
    Complete,
}

/// Line-by-line reveal with randomized cadence. One instance runs once; a
/// fresh Terminal entry builds a fresh log.
#[derive(Clone, Debug)]
pub struct SequencedLog {
    script: Vec<String>,
    revealed: Vec<LogLine>,
    window: DelayWindow,
    started: bool,
    completed: bool,
}

impl SequencedLog {
    pub fn new(snapshot: &EnvironmentSnapshot, window: DelayWindow) -> Self {
        let script = builtin_terminal_script()
            .iter()
            .map(|template| snapshot.render(template))
            .collect();
        Self::from_lines(script, window)
    }

    pub fn from_lines(script: Vec<String>, window: DelayWindow) -> Self {
        Self {
            script,
            revealed: Vec::new(),
            window,
            started: false,
            completed: false,
        }
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.revealed
    }

    pub fn total(&self) -> usize {
        self.script.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Reveals the first line. `None` if this log already started.
    pub fn begin(&mut self, rng: &mut RandomNumberGenerator) -> Option<LogStep> {
        if self.started {
            return None;
        }
        self.started = true;
        Some(self.reveal_next(rng))
    }

    /// The typing line settles and the next one appears. Yields `Complete`
    /// exactly once, then `None` forever.
    pub fn advance(&mut self, rng: &mut RandomNumberGenerator) -> Option<LogStep> {
        if !self.started || self.completed {
            return None;
        }
        if let Some(last) = self.revealed.last_mut() {
            last.typing = false;
        }
        Some(self.reveal_next(rng))
    }

    fn reveal_next(&mut self, rng: &mut RandomNumberGenerator) -> LogStep {
        let Some(text) = self.script.get(self.revealed.len()) else {
            self.completed = true;
            return LogStep::Complete;
        };
        self.revealed.push(LogLine {
            text: format!("> {text}"),
            typing: true,
        });
        LogStep::Reveal {
            delay_ms: self.draw_delay(rng),
        }
    }

    fn draw_delay(&self, rng: &mut RandomNumberGenerator) -> u64 {
        let DelayWindow { min_ms, max_ms } = self.window;
        if max_ms <= min_ms {
            return min_ms;
        }
        rng.range(min_ms, max_ms)
    }
}
