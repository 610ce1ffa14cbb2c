//! The session context: one owned object that walks the stages and runs the
//! timed subsystems each stage owns.
//!
//! Everything is single threaded. Input handlers and fired timers each run to
//! completion, and every stage exit cancels the timers the exited stage
//! scheduled, so nothing from a stale stage can touch the current one.

#![allow(dead_code)]

pub mod resource;
pub mod sequenced_log;
pub mod spawner;
pub mod stage;
pub mod timer;

use bracket_random::prelude::RandomNumberGenerator;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, Fired, TimerId},
    config::{Config, ResourceMode},
    data::catalog::Catalog,
    signals::{PositionAnchor, SignalError, SignalStatus, Signals},
};

use self::{
    resource::{AlarmLevel, ResourceModel, ResourceSnapshot},
    sequenced_log::{EnvironmentSnapshot, LogLine, LogStep, SequencedLog},
    spawner::{ItemId, SpawnSettings, SpawnedItem, Spawner, TickResult},
    stage::{Stage, StageMachine, TransitionRejected},
    timer::Outcome,
};

pub const REJECT_PULSE: [u32; 1] = [200];
pub const FAILURE_PULSE: [u32; 3] = [100, 50, 100];
pub const FAILURE_FLASH_MS: u64 = 100;
pub const LOCKOUT_PLAYBACK_RATE: f32 = 0.8;
pub const BASELINE_PLAYBACK_RATE: f32 = 1.0;
pub const ALARM_PULSE: [u32; 3] = [300, 100, 300];
pub const ALARM_REPEAT_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    BootComplete,
    RevealLine,
    SpawnTick,
    ResourceTick,
    ItemExpiry(ItemId),
    ItemRetire(ItemId),
}

pub type SessionClock = Clock<Stage, Task>;

/// Requests for the presentation layer, drained once per frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Cue {
    Flash { duration_ms: u64 },
    PlaybackRate(f32),
    Alarm(AlarmLevel),
    Blind,
    Displaced,
}

struct Engagement {
    spawner: Spawner,
    resource: ResourceModel,
    resource_tick: Option<TimerId>,
    alarm: AlarmLevel,
    alarm_pulsed_at: Option<u64>,
}

pub struct Session {
    config: Config,
    catalog: Catalog,
    signals: Box<dyn Signals>,
    machine: StageMachine,
    clock: SessionClock,
    rng: RandomNumberGenerator,
    log: Option<SequencedLog>,
    snapshot: Option<EnvironmentSnapshot>,
    engagement: Option<Engagement>,
    input: String,
    gate_error: bool,
    lockout_error: bool,
    anchor: PositionAnchor,
    cues: Vec<Cue>,
    status: Vec<SignalStatus>,
    resets: u32,
}

impl Session {
    pub fn new(config: Config, catalog: Catalog, signals: Box<dyn Signals>) -> Self {
        let rng = match config.seed {
            Some(seed) => RandomNumberGenerator::seeded(seed),
            None => RandomNumberGenerator::new(),
        };
        let anchor = PositionAnchor::new(config.displacement_epsilon);
        Self {
            config,
            catalog,
            signals,
            machine: StageMachine::new(),
            clock: SessionClock::new(),
            rng,
            log: None,
            snapshot: None,
            engagement: None,
            input: String::new(),
            gate_error: false,
            lockout_error: false,
            anchor,
            cues: Vec::new(),
            status: Vec::new(),
            resets: 0,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.machine.current()
    }

    pub fn machine(&self) -> &StageMachine {
        &self.machine
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lines(&self) -> &[LogLine] {
        self.log.as_ref().map(SequencedLog::lines).unwrap_or(&[])
    }

    pub fn environment(&self) -> Option<&EnvironmentSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn items(&self) -> impl Iterator<Item = &SpawnedItem> {
        self.engagement
            .iter()
            .flat_map(|engagement| engagement.spawner.items())
    }

    pub fn pending_items(&self) -> impl Iterator<Item = &SpawnedItem> {
        self.engagement
            .iter()
            .flat_map(|engagement| engagement.spawner.pending())
    }

    /// Live resource readings, or the zeroed model when no Engagement is
    /// running.
    pub fn resource(&self) -> ResourceSnapshot {
        match &self.engagement {
            Some(engagement) => engagement.resource.snapshot(),
            None => ResourceModel::from_mode(&self.config.resource).snapshot(),
        }
    }

    pub fn failures(&self) -> u32 {
        self.engagement
            .as_ref()
            .map_or(0, |engagement| engagement.spawner.failures())
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn gate_error(&self) -> bool {
        self.gate_error
    }

    pub fn lockout_error(&self) -> bool {
        self.lockout_error
    }

    pub fn status(&self) -> &[SignalStatus] {
        &self.status
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn drain_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    pub fn start(&mut self) -> Result<(), TransitionRejected> {
        self.machine.start(self.clock.now())?;
        info!(stage = Stage::Boot.as_str(), "session_started");
        self.probe_signals();
        self.clock
            .schedule_once(Stage::Boot, self.config.boot_ms, Task::BootComplete);
        Ok(())
    }

    pub fn advance_by(&mut self, elapsed_ms: u64) {
        let until = self.clock.now().saturating_add(elapsed_ms);
        self.advance_to(until);
    }

    pub fn advance_to(&mut self, until: u64) {
        while let Some(fired) = self.clock.pop_due(until) {
            self.dispatch(fired);
        }
        self.clock.settle(until);
    }

    fn dispatch(&mut self, fired: Fired<Stage, Task>) {
        if !self.machine.is(fired.scope) {
            debug!(task = ?fired.task, scope = fired.scope.as_str(), "stale_timer_dropped");
            return;
        }
        match fired.task {
            Task::BootComplete => self.enter(Stage::Terminal),
            Task::RevealLine => self.reveal_next(),
            Task::SpawnTick => self.spawn_tick(),
            Task::ResourceTick => self.resource_tick(),
            Task::ItemExpiry(id) => self.expire_item(id),
            Task::ItemRetire(id) => {
                if let Some(engagement) = self.engagement.as_mut() {
                    engagement.spawner.retire(id, &mut self.clock);
                }
            }
        }
    }

    fn enter(&mut self, next: Stage) {
        let now = self.clock.now();
        let previous = match self.machine.advance(next, now) {
            Ok(previous) => previous,
            Err(err) => {
                warn!(%err, "transition_rejected");
                return;
            }
        };
        let cancelled = self.clock.cancel_scope(previous);
        self.leave(previous);
        info!(
            from = previous.as_str(),
            to = next.as_str(),
            at = now,
            cancelled,
            "stage_entered"
        );
        match next {
            Stage::Boot => {}
            Stage::Terminal => self.enter_terminal(),
            Stage::Gate => {
                self.input.clear();
                self.gate_error = false;
            }
            Stage::Engagement => self.enter_engagement(),
            Stage::Lockout => self.enter_lockout(),
        }
    }

    fn leave(&mut self, previous: Stage) {
        match previous {
            Stage::Engagement => {
                if let Some(engagement) = self.engagement.as_mut() {
                    let destroyed = engagement.spawner.shutdown(&mut self.clock);
                    if let Some(tick) = engagement.resource_tick.take() {
                        self.clock.cancel(tick);
                    }
                    debug!(destroyed, "engagement_stopped");
                }
            }
            Stage::Lockout => {
                if let Some(mut engagement) = self.engagement.take() {
                    engagement.resource.reset();
                }
                self.input.clear();
                self.lockout_error = false;
            }
            Stage::Boot | Stage::Terminal | Stage::Gate => {}
        }
    }

    fn probe_signals(&mut self) {
        if let Err(err) = self.signals.platform() {
            self.degrade("platform", &err);
        }
        if let Err(err) = self.signals.battery_level() {
            self.degrade("battery", &err);
        }
    }

    /// Keeps at most one status per signal, the latest reading.
    fn degrade(&mut self, signal: &'static str, err: &SignalError) {
        warn!(signal, %err, "signal_degraded");
        self.status.retain(|status| status.signal != signal);
        self.status.push(SignalStatus::from_error(signal, err));
    }

    fn recover(&mut self, signal: &'static str) {
        self.status.retain(|status| status.signal != signal);
    }

    fn capture_environment(&mut self) -> EnvironmentSnapshot {
        let platform = match self.signals.platform() {
            Ok(platform) => {
                self.recover("platform");
                Some(platform)
            }
            Err(err) => {
                self.degrade("platform", &err);
                None
            }
        };
        let battery = match self.signals.battery_level() {
            Ok(level) => {
                self.recover("battery");
                Some(level)
            }
            Err(err) => {
                self.degrade("battery", &err);
                None
            }
        };
        EnvironmentSnapshot {
            platform,
            battery,
            gps_lock: self.config.gps_lock,
            captured_at: Local::now(),
        }
    }

    fn enter_terminal(&mut self) {
        let snapshot = self.capture_environment();
        let mut log = SequencedLog::new(&snapshot, self.config.reveal_delay);
        let step = log.begin(&mut self.rng);
        self.snapshot = Some(snapshot);
        self.log = Some(log);
        self.follow_log(step);
    }

    fn reveal_next(&mut self) {
        let step = self.log.as_mut().and_then(|log| log.advance(&mut self.rng));
        self.follow_log(step);
    }

    fn follow_log(&mut self, step: Option<LogStep>) {
        match step {
            Some(LogStep::Reveal { delay_ms }) => {
                self.clock
                    .schedule_once(Stage::Terminal, delay_ms, Task::RevealLine);
            }
            Some(LogStep::Complete) => self.enter(Stage::Gate),
            None => {}
        }
    }

    fn enter_engagement(&mut self) {
        match self.signals.open_camera() {
            Ok(_) => self.recover("camera"),
            Err(err) => {
                self.degrade("camera", &err);
                self.cues.push(Cue::Blind);
            }
        }
        let settings = SpawnSettings::from_config(&self.config);
        let mut spawner = Spawner::new(settings, self.catalog.clone(), self.rng.rand::<u64>());
        let resource = ResourceModel::from_mode(&self.config.resource);
        let (period, resource_tick) = match &self.config.resource {
            ResourceMode::SpamCount(_) => (self.config.spawn_interval_ms, None),
            ResourceMode::Survival(survival) => (
                survival.slow_period_ms,
                Some(self.clock.schedule_every(
                    Stage::Engagement,
                    survival.frame_ms,
                    survival.frame_ms,
                    Task::ResourceTick,
                )),
            ),
        };
        spawner.begin(&mut self.clock, period);
        self.engagement = Some(Engagement {
            spawner,
            resource,
            resource_tick,
            alarm: AlarmLevel::Calm,
            alarm_pulsed_at: None,
        });
    }

    fn enter_lockout(&mut self) {
        self.input.clear();
        self.lockout_error = false;
        self.cues.push(Cue::PlaybackRate(LOCKOUT_PLAYBACK_RATE));
    }

    fn spawn_tick(&mut self) {
        let Some(engagement) = self.engagement.as_mut() else {
            return;
        };
        match engagement
            .spawner
            .tick(&mut engagement.resource, &mut self.clock)
        {
            TickResult::CeilingReached => self.enter(Stage::Lockout),
            TickResult::Spawned(_) | TickResult::Stopped => {}
        }
    }

    fn resource_tick(&mut self) {
        let Some(engagement) = self.engagement.as_mut() else {
            return;
        };
        let ResourceModel::Survival(meter) = &mut engagement.resource else {
            return;
        };
        meter.tick();
        let alarm = meter.alarm();
        if alarm != engagement.alarm {
            engagement.alarm = alarm;
            info!(level = meter.level(), alarm = ?alarm, "alarm_changed");
            self.cues.push(Cue::Alarm(alarm));
        }
        let now = self.clock.now();
        match alarm {
            AlarmLevel::Sustained => {
                let due = engagement
                    .alarm_pulsed_at
                    .is_none_or(|last| now.saturating_sub(last) >= ALARM_REPEAT_MS);
                if due {
                    engagement.alarm_pulsed_at = Some(now);
                    self.signals.vibrate(&ALARM_PULSE);
                }
            }
            AlarmLevel::Calm => engagement.alarm_pulsed_at = None,
        }
        self.check_wallet();
    }

    fn expire_item(&mut self, id: ItemId) {
        let Some(engagement) = self.engagement.as_mut() else {
            return;
        };
        if let Some(failure) = engagement.spawner.expire(id, &mut engagement.resource) {
            debug!(item = failure.item.0, label = %failure.label, "failure_penalty");
            self.cues.push(Cue::Flash {
                duration_ms: FAILURE_FLASH_MS,
            });
            self.signals.vibrate(&FAILURE_PULSE);
            self.check_wallet();
        }
    }

    /// Survival Engagement ends when the wallet runs dry.
    fn check_wallet(&mut self) {
        let exhausted = matches!(
            self.engagement.as_ref().map(|engagement| &engagement.resource),
            Some(ResourceModel::Survival(meter)) if meter.wallet().is_exhausted()
        );
        if exhausted && self.machine.is(Stage::Engagement) {
            info!("wallet_exhausted");
            self.enter(Stage::Lockout);
        }
    }

    pub fn set_presence(&mut self, held: bool) {
        if let Some(engagement) = self.engagement.as_mut() {
            if let ResourceModel::Survival(meter) = &mut engagement.resource {
                meter.set_presence(held);
            }
        }
    }

    pub fn worship(&mut self, id: ItemId) -> Option<Outcome> {
        if !self.machine.is(Stage::Engagement) {
            return None;
        }
        let engagement = self.engagement.as_mut()?;
        engagement.spawner.worship(id, &mut self.clock)
    }

    pub fn position_fix(&mut self, lat: f64, lon: f64) {
        if self.anchor.observe(lat, lon) {
            warn!(lat, lon, "position_displaced");
            self.cues.push(Cue::Displaced);
        }
    }

    pub fn input_char(&mut self, ch: char) {
        if !self.accepts_text() {
            return;
        }
        self.input.push(ch);
        self.after_edit();
    }

    pub fn backspace(&mut self) {
        if !self.accepts_text() {
            return;
        }
        self.input.pop();
        self.after_edit();
    }

    /// A finalized entry. Matching text has already moved the stage on, so
    /// reaching the mismatch branch always means a wrong credential.
    pub fn submit(&mut self) {
        let Some(stage) = self.stage().filter(|stage| stage.accepts_text()) else {
            return;
        };
        if self.evaluate_input() {
            return;
        }
        match stage {
            Stage::Gate => self.gate_error = true,
            _ => self.lockout_error = true,
        }
        info!(stage = stage.as_str(), "credential_rejected");
        self.input.clear();
        self.signals.vibrate(&REJECT_PULSE);
    }

    /// Lockout→Terminal. Only a matching release credential opens this edge.
    pub fn reset(&mut self, credential: &str) -> bool {
        if !self.machine.is(Stage::Lockout)
            || !credential_matches(credential, &self.config.release_credential)
        {
            return false;
        }
        self.resets += 1;
        self.cues.push(Cue::PlaybackRate(BASELINE_PLAYBACK_RATE));
        self.enter(Stage::Terminal);
        info!(resets = self.resets, "session_reset");
        true
    }

    fn accepts_text(&self) -> bool {
        self.stage().is_some_and(Stage::accepts_text)
    }

    fn after_edit(&mut self) {
        self.gate_error = false;
        self.lockout_error = false;
        self.evaluate_input();
    }

    fn evaluate_input(&mut self) -> bool {
        match self.stage() {
            Some(Stage::Gate) if credential_matches(&self.input, &self.config.gate_credential) => {
                self.input.clear();
                self.enter(Stage::Engagement);
                true
            }
            Some(Stage::Lockout) => {
                let entered = self.input.clone();
                self.reset(&entered)
            }
            _ => false,
        }
    }
}

pub fn credential_matches(entered: &str, credential: &str) -> bool {
    entered.to_uppercase() == credential.to_uppercase()
}
