#![allow(dead_code)]

use std::{fs, path::Path};

use thiserror::Error;
use tracing::warn;

use crate::session::Session;

pub const SCRIPT_ENV_VAR: &str = "DAHLIA_SCRIPT";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptAction {
    Type(String),
    Submit,
    Backspace,
    Wait(u64),
    Hold,
    Release,
    Worship,
    Fix { lat: f64, lon: f64 },
}

/// A replayable list of session inputs. `wait` lines pause the replay for
/// that many milliseconds of session time.
pub struct ScriptedInput {
    actions: Vec<ScriptAction>,
    cursor: usize,
    resume_at: Option<u64>,
}

impl ScriptedInput {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut actions = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue; // Skip empty lines and comments
            }
            actions.push(parse_line(trimmed).map_err(|message| ScriptError::Parse {
                line: idx + 1,
                message,
            })?);
        }
        Ok(Self {
            actions,
            cursor: 0,
            resume_at: None,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.actions.len() && self.resume_at.is_none()
    }

    pub fn next_action(&mut self) -> Option<ScriptAction> {
        let action = self.actions.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(action)
    }

    /// Applies every action due at the session's current time, stopping at
    /// the next `wait`. Call once per frame.
    pub fn poll(&mut self, session: &mut Session) {
        let now = session.now();
        if let Some(resume_at) = self.resume_at {
            if now < resume_at {
                return;
            }
            self.resume_at = None;
        }
        while let Some(action) = self.next_action() {
            if let ScriptAction::Wait(ms) = action {
                self.resume_at = Some(now.saturating_add(ms));
                return;
            }
            apply(session, action);
        }
    }

    /// Replays the whole script, advancing session time through every wait.
    pub fn run(&mut self, session: &mut Session) {
        while let Some(action) = self.next_action() {
            match action {
                ScriptAction::Wait(ms) => session.advance_by(ms),
                other => apply(session, other),
            }
        }
    }
}

fn apply(session: &mut Session, action: ScriptAction) {
    match action {
        ScriptAction::Type(text) => {
            for ch in text.chars() {
                session.input_char(ch);
            }
        }
        ScriptAction::Submit => session.submit(),
        ScriptAction::Backspace => session.backspace(),
        ScriptAction::Hold => session.set_presence(true),
        ScriptAction::Release => session.set_presence(false),
        ScriptAction::Worship => {
            let target = session.pending_items().next().map(|item| item.id);
            match target {
                Some(id) => {
                    session.worship(id);
                }
                None => warn!("script worship with nothing pending"),
            }
        }
        ScriptAction::Fix { lat, lon } => session.position_fix(lat, lon),
        ScriptAction::Wait(_) => {}
    }
}

fn parse_line(line: &str) -> Result<ScriptAction, String> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command.to_ascii_lowercase().as_str() {
        "type" if !rest.is_empty() => Ok(ScriptAction::Type(rest.to_string())),
        "type" => Err("type needs text".to_string()),
        "submit" | "enter" => Ok(ScriptAction::Submit),
        "back" => Ok(ScriptAction::Backspace),
        "wait" => rest
            .parse::<u64>()
            .map(ScriptAction::Wait)
            .map_err(|err| format!("bad wait duration '{rest}': {err}")),
        "hold" => Ok(ScriptAction::Hold),
        "release" => Ok(ScriptAction::Release),
        "worship" => Ok(ScriptAction::Worship),
        "fix" => {
            let mut parts = rest.split_whitespace().map(str::parse::<f64>);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon)), None) => Ok(ScriptAction::Fix { lat, lon }),
                _ => Err(format!("fix needs '<lat> <lon>', got '{rest}'")),
            }
        }
        other => Err(format!("unknown command '{other}'")),
    }
}
