//! The decaying/recovering resource behind the Engagement stage.
//!
//! Two alternative models share one contract: a spam counter racing toward a
//! ceiling, or a survival meter held up by sustained presence. A session runs
//! exactly one of them, picked by configuration.

#![allow(dead_code)]

use crate::config::{ResourceMode, SpamCountConfig, SurvivalConfig};

pub const LEVEL_MIN: f32 = 0.0;
pub const LEVEL_MAX: f32 = 100.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlarmLevel {
    Calm,
    Sustained,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpamCounter {
    count: u32,
    ceiling: u32,
    failure_penalty: u32,
}

impl SpamCounter {
    pub fn new(ceiling: u32, failure_penalty: u32) -> Self {
        Self {
            count: 0,
            ceiling,
            failure_penalty,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn record_spawn(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn apply_penalty(&mut self) -> u32 {
        self.count = self.count.saturating_add(self.failure_penalty);
        self.count
    }

    pub fn ceiling_reached(&self) -> bool {
        self.count >= self.ceiling
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Wallet-style balance. Only ever goes down until the session resets.
#[derive(Clone, Debug, PartialEq)]
pub struct Wallet {
    start: f32,
    balance: f32,
}

impl Wallet {
    pub fn new(start: f32) -> Self {
        let start = start.max(0.0);
        Self {
            start,
            balance: start,
        }
    }

    pub fn balance(&self) -> f32 {
        self.balance
    }

    pub fn spend(&mut self, amount: f32) -> f32 {
        if amount > 0.0 {
            self.balance = (self.balance - amount).max(0.0);
        }
        self.balance
    }

    pub fn is_exhausted(&self) -> bool {
        self.balance <= 0.0
    }

    pub fn reset(&mut self) {
        self.balance = self.start;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SurvivalMeter {
    level: f32,
    presence: bool,
    wallet: Wallet,
    settings: SurvivalConfig,
}

impl SurvivalMeter {
    pub fn new(settings: SurvivalConfig) -> Self {
        Self {
            level: LEVEL_MAX,
            presence: false,
            wallet: Wallet::new(settings.wallet_start),
            settings,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn presence(&self) -> bool {
        self.presence
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn settings(&self) -> &SurvivalConfig {
        &self.settings
    }

    pub fn set_presence(&mut self, held: bool) {
        self.presence = held;
    }

    /// One frame of recovery or decay, then the wallet drain.
    pub fn tick(&mut self) -> f32 {
        let delta = if self.presence {
            self.settings.recovery_rate
        } else {
            -self.settings.decay_rate
        };
        self.level = clamp_level(self.level + delta);
        self.wallet.spend(self.settings.wallet_drain_per_tick);
        self.level
    }

    pub fn apply_penalty(&mut self) -> f32 {
        self.level = clamp_level(self.level - self.settings.failure_drain);
        self.wallet.spend(self.settings.wallet_failure_cost);
        self.level
    }

    pub fn intensity(&self) -> f32 {
        (LEVEL_MAX - self.level) / LEVEL_MAX
    }

    pub fn alarm(&self) -> AlarmLevel {
        if self.level < self.settings.alarm_threshold {
            AlarmLevel::Sustained
        } else {
            AlarmLevel::Calm
        }
    }

    /// Spawn period sliding from the slow baseline to the fast floor as
    /// intensity rises.
    pub fn cadence_ms(&self) -> u64 {
        let slow = self.settings.slow_period_ms as f32;
        let fast = self.settings.fast_period_ms as f32;
        let period = slow + (fast - slow) * self.intensity();
        period.round().max(1.0) as u64
    }

    pub fn reset(&mut self) {
        self.level = LEVEL_MAX;
        self.presence = false;
        self.wallet.reset();
    }
}

fn clamp_level(value: f32) -> f32 {
    if value.is_nan() {
        return LEVEL_MIN;
    }
    value.clamp(LEVEL_MIN, LEVEL_MAX)
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResourceModel {
    SpamCount(SpamCounter),
    Survival(SurvivalMeter),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSnapshot {
    pub count: Option<(u32, u32)>,
    pub level: Option<f32>,
    pub wallet: Option<f32>,
    pub intensity: f32,
    pub alarm: AlarmLevel,
}

impl ResourceModel {
    pub fn from_mode(mode: &ResourceMode) -> Self {
        match mode {
            ResourceMode::SpamCount(SpamCountConfig {
                ceiling,
                failure_penalty,
            }) => ResourceModel::SpamCount(SpamCounter::new(*ceiling, *failure_penalty)),
            ResourceMode::Survival(settings) => {
                ResourceModel::Survival(SurvivalMeter::new(settings.clone()))
            }
        }
    }

    pub fn apply_penalty(&mut self) {
        match self {
            ResourceModel::SpamCount(counter) => {
                counter.apply_penalty();
            }
            ResourceModel::Survival(meter) => {
                meter.apply_penalty();
            }
        }
    }

    /// Spam model: share of the ceiling used up. Survival: the meter's own
    /// intensity.
    pub fn intensity(&self) -> f32 {
        match self {
            ResourceModel::SpamCount(counter) => {
                if counter.ceiling == 0 {
                    1.0
                } else {
                    (counter.count as f32 / counter.ceiling as f32).min(1.0)
                }
            }
            ResourceModel::Survival(meter) => meter.intensity(),
        }
    }

    pub fn alarm(&self) -> AlarmLevel {
        match self {
            ResourceModel::SpamCount(_) => AlarmLevel::Calm,
            ResourceModel::Survival(meter) => meter.alarm(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            ResourceModel::SpamCount(counter) => counter.reset(),
            ResourceModel::Survival(meter) => meter.reset(),
        }
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        let (count, level, wallet) = match self {
            ResourceModel::SpamCount(counter) => {
                (Some((counter.count, counter.ceiling)), None, None)
            }
            ResourceModel::Survival(meter) => {
                (None, Some(meter.level), Some(meter.wallet.balance()))
            }
        };
        ResourceSnapshot {
            count,
            level,
            wallet,
            intensity: self.intensity(),
            alarm: self.alarm(),
        }
    }
}
