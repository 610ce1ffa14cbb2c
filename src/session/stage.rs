#![allow(dead_code)]

use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Boot,
    Terminal,
    Gate,
    Engagement,
    Lockout,
}

pub const STAGES: [Stage; 5] = [
    Stage::Boot,
    Stage::Terminal,
    Stage::Gate,
    Stage::Engagement,
    Stage::Lockout,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Boot => "Boot",
            Stage::Terminal => "Terminal",
            Stage::Gate => "Gate",
            Stage::Engagement => "Engagement",
            Stage::Lockout => "Lockout",
        }
    }

    /// The only stages reachable from `self` in one step. Lockout→Terminal is
    /// the reset edge; everything else moves forward.
    pub const fn successors(self) -> &'static [Stage] {
        match self {
            Stage::Boot => &[Stage::Terminal],
            Stage::Terminal => &[Stage::Gate],
            Stage::Gate => &[Stage::Engagement],
            Stage::Engagement => &[Stage::Lockout],
            Stage::Lockout => &[Stage::Terminal],
        }
    }

    pub fn can_advance_to(self, next: Stage) -> bool {
        self.successors().contains(&next)
    }

    pub fn accepts_text(self) -> bool {
        matches!(self, Stage::Gate | Stage::Lockout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionRejected {
    #[error("session already started in {0:?}")]
    AlreadyStarted(Stage),
    #[error("session has not started")]
    NotStarted,
    #[error("{to:?} is not a successor of {from:?}")]
    Illegal { from: Stage, to: Stage },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub at: u64,
    pub from: Option<Stage>,
    pub to: Stage,
}

#[derive(Clone, Debug, Default)]
pub struct StageMachine {
    current: Option<Stage>,
    history: Vec<Transition>,
}

impl StageMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    pub fn is(&self, stage: Stage) -> bool {
        self.current == Some(stage)
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    pub fn start(&mut self, at: u64) -> Result<Stage, TransitionRejected> {
        if let Some(stage) = self.current {
            return Err(TransitionRejected::AlreadyStarted(stage));
        }
        self.current = Some(Stage::Boot);
        self.history.push(Transition {
            at,
            from: None,
            to: Stage::Boot,
        });
        Ok(Stage::Boot)
    }

    /// Moves to `next` and returns the stage that was left. A rejected request
    /// leaves the machine untouched.
    pub fn advance(&mut self, next: Stage, at: u64) -> Result<Stage, TransitionRejected> {
        let from = self.current.ok_or(TransitionRejected::NotStarted)?;
        if !from.can_advance_to(next) {
            return Err(TransitionRejected::Illegal { from, to: next });
        }
        self.current = Some(next);
        self.history.push(Transition {
            at,
            from: Some(from),
            to: next,
        });
        Ok(from)
    }
}
