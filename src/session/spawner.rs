#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;
use tracing::{debug, info};

use crate::{
    clock::TimerId,
    config::{Config, SpawnWeights},
    data::catalog::Catalog,
};

use super::{
    SessionClock, Task,
    resource::ResourceModel,
    stage::Stage,
    timer::{ItemTimer, Outcome},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Word,
    Image,
    Video,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Word => "word",
            ItemKind::Image => "image",
            ItemKind::Video => "video",
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, ItemKind::Word)
    }
}

/// Position as percentages of the stage area plus a tilt in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x_pct: f32,
    pub y_pct: f32,
    pub rotation_deg: f32,
}

impl Placement {
    pub fn to_cell(&self, width: i32, height: i32) -> Point {
        let x = (self.x_pct / 100.0 * width as f32).round() as i32;
        let y = (self.y_pct / 100.0 * height as f32).round() as i32;
        Point::new(x.clamp(0, (width - 1).max(0)), y.clamp(0, (height - 1).max(0)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpawnedItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub label: String,
    pub placement: Placement,
    pub created_at: u64,
    pub outcome: Outcome,
    pub accent: bool,
    pub scale: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickResult {
    Spawned(ItemId),
    CeilingReached,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub item: ItemId,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpawnSettings {
    pub weights: SpawnWeights,
    pub interval_ms: u64,
    pub worship_timeout_ms: u64,
    pub item_lifetime_ms: Option<u64>,
}

impl SpawnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weights: config.weights,
            interval_ms: config.spawn_interval_ms,
            worship_timeout_ms: config.worship_timeout_ms,
            item_lifetime_ms: config.item_lifetime_ms,
        }
    }
}

pub struct Spawner {
    settings: SpawnSettings,
    catalog: Catalog,
    rng: RandomNumberGenerator,
    items: BTreeMap<ItemId, SpawnedItem>,
    timers: HashMap<ItemId, ItemTimer>,
    retirements: HashMap<ItemId, TimerId>,
    next_id: u64,
    tick: Option<TimerId>,
    spawned: u32,
    failures: u32,
}

impl Spawner {
    pub fn new(settings: SpawnSettings, catalog: Catalog, seed: u64) -> Self {
        Self {
            settings,
            catalog,
            rng: RandomNumberGenerator::seeded(seed),
            items: BTreeMap::new(),
            timers: HashMap::new(),
            retirements: HashMap::new(),
            next_id: 1,
            tick: None,
            spawned: 0,
            failures: 0,
        }
    }

    /// Arms the recurring spawn tick; the first one fires immediately.
    pub fn begin(&mut self, clock: &mut SessionClock, period: u64) {
        if self.tick.is_some() {
            return;
        }
        self.tick = Some(clock.schedule_every(Stage::Engagement, 0, period, Task::SpawnTick));
    }

    pub fn is_running(&self) -> bool {
        self.tick.is_some()
    }

    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn items(&self) -> impl Iterator<Item = &SpawnedItem> {
        self.items.values()
    }

    pub fn item(&self, id: ItemId) -> Option<&SpawnedItem> {
        self.items.get(&id)
    }

    pub fn timer(&self, id: ItemId) -> Option<&ItemTimer> {
        self.timers.get(&id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &SpawnedItem> {
        self.items
            .values()
            .filter(|item| item.kind.is_media() && item.outcome == Outcome::Pending)
    }

    pub fn tick(&mut self, resource: &mut ResourceModel, clock: &mut SessionClock) -> TickResult {
        let Some(tick) = self.tick else {
            return TickResult::Stopped;
        };
        match resource {
            ResourceModel::SpamCount(counter) => {
                let count = counter.record_spawn();
                if counter.ceiling_reached() {
                    self.halt(clock);
                    info!(count, ceiling = counter.ceiling(), "spam_ceiling_reached");
                    return TickResult::CeilingReached;
                }
            }
            ResourceModel::Survival(meter) => {
                let cadence = meter.cadence_ms();
                clock.set_period(tick, cadence);
                clock.reschedule(tick, cadence);
            }
        }
        TickResult::Spawned(self.spawn(clock))
    }

    pub fn choose_kind(&mut self) -> ItemKind {
        let weights = self.settings.weights;
        let Some(total) = weights
            .total()
            .and_then(|total| i32::try_from(total).ok())
            .filter(|total| *total > 0)
        else {
            return ItemKind::Word;
        };
        let roll = self.rng.range(0, total) as u32;
        let kind = if roll < weights.word {
            ItemKind::Word
        } else if roll < weights.word + weights.image {
            ItemKind::Image
        } else {
            ItemKind::Video
        };
        match kind {
            ItemKind::Image if self.catalog.media.images.is_empty() => ItemKind::Word,
            ItemKind::Video if self.catalog.media.videos.is_empty() => ItemKind::Word,
            other => other,
        }
    }

    fn spawn(&mut self, clock: &mut SessionClock) -> ItemId {
        let kind = self.choose_kind();
        let id = ItemId(self.next_id);
        self.next_id += 1;

        let pool = match kind {
            ItemKind::Word => &self.catalog.words,
            ItemKind::Image => &self.catalog.media.images,
            ItemKind::Video => &self.catalog.media.videos,
        };
        let label = self
            .rng
            .random_slice_entry(pool)
            .cloned()
            .unwrap_or_default();
        let placement = Placement {
            x_pct: self.rng.range(10.0_f32, 90.0),
            y_pct: self.rng.range(10.0_f32, 90.0),
            rotation_deg: self.rng.range(-20.0_f32, 20.0),
        };
        let accent = self.rng.range(0, 2) == 1;
        let scale = self.rng.range(2.0_f32, 5.0);

        if kind.is_media() {
            let timeout = self.settings.worship_timeout_ms;
            let token = clock.schedule_once(Stage::Engagement, timeout, Task::ItemExpiry(id));
            self.timers
                .insert(id, ItemTimer::new(token, clock.now(), timeout));
        }
        if let Some(lifetime) = self.settings.item_lifetime_ms {
            let token = clock.schedule_once(Stage::Engagement, lifetime, Task::ItemRetire(id));
            self.retirements.insert(id, token);
        }

        debug!(item = id.0, kind = kind.as_str(), label = %label, "item_spawned");
        self.items.insert(
            id,
            SpawnedItem {
                id,
                kind,
                label,
                placement,
                created_at: clock.now(),
                outcome: Outcome::Pending,
                accent,
                scale,
            },
        );
        self.spawned += 1;
        id
    }

    /// User acted on `id`. Words carry no countdown and ignore the action.
    pub fn worship(&mut self, id: ItemId, clock: &mut SessionClock) -> Option<Outcome> {
        let outcome = self.timers.get_mut(&id)?.act(clock)?;
        self.resolve(id, outcome, None);
        Some(outcome)
    }

    /// Countdown for `id` ran out. Returns the failure when this call is the
    /// one that resolved the item.
    pub fn expire(&mut self, id: ItemId, resource: &mut ResourceModel) -> Option<Failure> {
        let outcome = self.timers.get_mut(&id)?.expire()?;
        self.resolve(id, outcome, Some(resource))
    }

    fn resolve(
        &mut self,
        id: ItemId,
        outcome: Outcome,
        resource: Option<&mut ResourceModel>,
    ) -> Option<Failure> {
        let item = self.items.get_mut(&id)?;
        item.outcome = outcome;
        match (outcome, resource) {
            (Outcome::Ignored, Some(resource)) => {
                resource.apply_penalty();
                self.failures += 1;
                info!(item = id.0, failures = self.failures, "item_ignored");
                Some(Failure {
                    item: id,
                    label: item.label.clone(),
                })
            }
            _ => {
                debug!(item = id.0, outcome = ?outcome, "item_resolved");
                None
            }
        }
    }

    /// Display lifetime ran out; the item leaves the arena with its timer.
    /// An item still counting down stays until its countdown resolves it.
    pub fn retire(&mut self, id: ItemId, clock: &mut SessionClock) -> bool {
        if let Some(timer) = self.timers.get(&id) {
            if !timer.outcome().is_resolved() {
                let wait = timer.deadline().saturating_sub(clock.now());
                let token = clock.schedule_once(Stage::Engagement, wait, Task::ItemRetire(id));
                self.retirements.insert(id, token);
                debug!(item = id.0, wait, "retirement_deferred");
                return false;
            }
        }
        self.retirements.remove(&id);
        if let Some(timer) = self.timers.remove(&id) {
            timer.disarm(clock);
        }
        self.items.remove(&id).is_some()
    }

    fn halt(&mut self, clock: &mut SessionClock) {
        if let Some(tick) = self.tick.take() {
            clock.cancel(tick);
        }
    }

    /// Stops the tick and destroys every item with its timers.
    pub fn shutdown(&mut self, clock: &mut SessionClock) -> usize {
        self.halt(clock);
        for timer in self.timers.values() {
            timer.disarm(clock);
        }
        for token in self.retirements.values() {
            clock.cancel(*token);
        }
        self.timers.clear();
        self.retirements.clear();
        let destroyed = self.items.len();
        self.items.clear();
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ResourceMode, SurvivalConfig},
        data::catalog::{DEFAULT_WORDS, MediaCatalog},
        session::resource::SpamCounter,
    };

    fn words() -> Vec<String> {
        DEFAULT_WORDS.iter().map(|w| w.to_string()).collect()
    }

    fn full_catalog() -> Catalog {
        Catalog::new(
            words(),
            MediaCatalog {
                images: vec!["img/1.jpg".into(), "img/2.jpg".into()],
                videos: vec!["vid/1.mp4".into()],
            },
        )
    }

    fn settings() -> SpawnSettings {
        SpawnSettings::from_config(&Config::default())
    }

    fn spam(ceiling: u32) -> ResourceModel {
        ResourceModel::SpamCount(SpamCounter::new(ceiling, 2))
    }

    fn spam_count(resource: &ResourceModel) -> u32 {
        match resource {
            ResourceModel::SpamCount(counter) => counter.count(),
            ResourceModel::Survival(_) => panic!("expected spam model"),
        }
    }

    #[test]
    fn weighted_choice_converges_to_configured_split() {
        let mut spawner = Spawner::new(settings(), full_catalog(), 7);
        let trials = 10_000;
        let mut counts = [0u32; 3];
        for _ in 0..trials {
            match spawner.choose_kind() {
                ItemKind::Word => counts[0] += 1,
                ItemKind::Image => counts[1] += 1,
                ItemKind::Video => counts[2] += 1,
            }
        }
        let share = |n: u32| n as f64 / trials as f64 * 100.0;
        assert!((share(counts[0]) - 40.0).abs() < 2.5, "word {counts:?}");
        assert!((share(counts[1]) - 45.0).abs() < 2.5, "image {counts:?}");
        assert!((share(counts[2]) - 15.0).abs() < 2.5, "video {counts:?}");
    }

    #[test]
    fn empty_media_catalog_degrades_to_words() {
        let mut spawner = Spawner::new(settings(), Catalog::words_only(words()), 3);
        for _ in 0..500 {
            assert_eq!(spawner.choose_kind(), ItemKind::Word);
        }
    }

    #[test]
    fn only_media_items_get_a_countdown() {
        let mut clock = SessionClock::new();
        let mut resource = spam(1000);
        let mut spawner = Spawner::new(settings(), full_catalog(), 11);
        spawner.begin(&mut clock, 2000);
        for _ in 0..200 {
            spawner.tick(&mut resource, &mut clock);
        }
        for item in spawner.items() {
            assert_eq!(item.kind.is_media(), spawner.timer(item.id).is_some());
            assert!((10.0..90.0).contains(&item.placement.x_pct));
            assert!((10.0..90.0).contains(&item.placement.y_pct));
            assert!((-20.0..20.0).contains(&item.placement.rotation_deg));
            assert!(!item.label.is_empty());
        }
    }

    #[test]
    fn ceiling_reached_on_exactly_the_ceiling_tick_without_failures() {
        let mut clock = SessionClock::new();
        let mut resource = spam(25);
        let mut spawner = Spawner::new(settings(), Catalog::words_only(words()), 5);
        spawner.begin(&mut clock, 2000);

        let mut ticks = 0;
        loop {
            ticks += 1;
            match spawner.tick(&mut resource, &mut clock) {
                TickResult::Spawned(_) => continue,
                TickResult::CeilingReached => break,
                TickResult::Stopped => panic!("stopped early"),
            }
        }
        assert_eq!(ticks, 25);
        assert_eq!(spawner.spawned(), 24);
        assert!(!spawner.is_running());
        assert_eq!(spawner.tick(&mut resource, &mut clock), TickResult::Stopped);
        assert_eq!(spam_count(&resource), 25);
    }

    #[test]
    fn ignored_item_costs_an_extra_two() {
        let mut clock = SessionClock::new();
        let mut resource = spam(25);
        let mut spawner = Spawner::new(settings(), full_catalog(), 9);
        spawner.begin(&mut clock, 2000);

        let media = loop {
            match spawner.tick(&mut resource, &mut clock) {
                TickResult::Spawned(id) if spawner.item(id).unwrap().kind.is_media() => break id,
                TickResult::Spawned(_) => continue,
                other => panic!("unexpected {other:?}"),
            }
        };
        let before = spam_count(&resource);
        let failure = spawner.expire(media, &mut resource).expect("first expiry fails");
        assert_eq!(failure.item, media);
        assert_eq!(spam_count(&resource), before + 2);
        assert_eq!(spawner.item(media).unwrap().outcome, Outcome::Ignored);

        assert!(spawner.expire(media, &mut resource).is_none());
        assert!(spawner.worship(media, &mut clock).is_none());
        assert_eq!(spam_count(&resource), before + 2);
        assert_eq!(spawner.failures(), 1);
    }

    #[test]
    fn worshipped_item_has_no_side_effects() {
        let mut clock = SessionClock::new();
        let mut resource = spam(1000);
        let mut spawner = Spawner::new(settings(), full_catalog(), 21);
        spawner.begin(&mut clock, 2000);
        let media = loop {
            if let TickResult::Spawned(id) = spawner.tick(&mut resource, &mut clock) {
                if spawner.item(id).unwrap().kind.is_media() {
                    break id;
                }
            }
        };
        let before = spam_count(&resource);
        assert_eq!(spawner.worship(media, &mut clock), Some(Outcome::Worshipped));
        assert!(spawner.expire(media, &mut resource).is_none());
        assert_eq!(spam_count(&resource), before);
        assert_eq!(spawner.failures(), 0);
    }

    #[test]
    fn survival_tick_retimes_the_recurring_spawn() {
        let mut clock = SessionClock::new();
        let survival = SurvivalConfig::default();
        let mut resource = ResourceModel::from_mode(&ResourceMode::Survival(survival.clone()));
        let mut spawner = Spawner::new(settings(), Catalog::words_only(words()), 2);
        spawner.begin(&mut clock, survival.slow_period_ms);

        let fired = clock.pop_due(0).expect("first tick is immediate");
        assert_eq!(fired.task, Task::SpawnTick);
        if let ResourceModel::Survival(meter) = &mut resource {
            for _ in 0..400 {
                meter.tick();
            }
        }
        let expected = match &resource {
            ResourceModel::Survival(meter) => meter.cadence_ms(),
            _ => unreachable!(),
        };
        assert!(expected < survival.slow_period_ms);
        spawner.tick(&mut resource, &mut clock);

        let next = clock.pop_due(u64::MAX).expect("rearmed");
        assert_eq!(next.task, Task::SpawnTick);
        assert_eq!(next.at, fired.at + expected);
        let after = clock.pop_due(u64::MAX).expect("rearmed again");
        assert_eq!(after.at - next.at, expected);
    }

    #[test]
    fn shutdown_destroys_items_and_their_timers() {
        let mut clock = SessionClock::new();
        let mut resource = spam(1000);
        let mut spawner = Spawner::new(settings(), full_catalog(), 13);
        spawner.begin(&mut clock, 2000);
        for _ in 0..10 {
            spawner.tick(&mut resource, &mut clock);
        }
        assert!(clock.pending() > 1);
        assert_eq!(spawner.shutdown(&mut clock), 10);
        assert_eq!(clock.pending(), 0);
        assert_eq!(spawner.items().count(), 0);
    }

    #[test]
    fn lifetime_retirement_removes_the_item() {
        let mut clock = SessionClock::new();
        let mut resource = spam(1000);
        let mut settings = settings();
        settings.item_lifetime_ms = Some(6000);
        let mut spawner = Spawner::new(settings, full_catalog(), 17);
        spawner.begin(&mut clock, 2000);
        let TickResult::Spawned(id) = spawner.tick(&mut resource, &mut clock) else {
            panic!("expected spawn");
        };
        assert!(spawner.retire(id, &mut clock));
        assert!(spawner.item(id).is_none());
        assert!(!spawner.retire(id, &mut clock));
    }

    #[test]
    fn retirement_waits_for_a_pending_countdown() {
        let mut clock = SessionClock::new();
        let mut resource = spam(1000);
        let mut settings = settings();
        settings.item_lifetime_ms = Some(1000);
        settings.weights = SpawnWeights {
            word: 0,
            image: 1,
            video: 0,
        };
        let mut spawner = Spawner::new(settings, full_catalog(), 19);
        spawner.begin(&mut clock, 2000);
        let TickResult::Spawned(id) = spawner.tick(&mut resource, &mut clock) else {
            panic!("expected spawn");
        };

        let mut penalties = 0;
        let mut retirements = Vec::new();
        while let Some(fired) = clock.pop_due(2500) {
            match fired.task {
                Task::ItemExpiry(item) => {
                    penalties += usize::from(spawner.expire(item, &mut resource).is_some());
                }
                Task::ItemRetire(item) => {
                    let outcome = spawner.item(item).map(|i| i.outcome);
                    retirements.push((fired.at, outcome, spawner.retire(item, &mut clock)));
                }
                _ => {}
            }
        }
        assert_eq!(
            retirements,
            vec![
                (1000, Some(Outcome::Pending), false),
                (2500, Some(Outcome::Ignored), true),
            ]
        );
        assert_eq!(penalties, 1);
        assert_eq!(spawner.failures(), 1);
        assert_eq!(spam_count(&resource), 1 + 2);
        assert!(spawner.item(id).is_none());
    }

    #[test]
    fn placement_maps_to_a_cell_inside_the_area() {
        let placement = Placement {
            x_pct: 90.0,
            y_pct: 10.0,
            rotation_deg: 0.0,
        };
        assert_eq!(placement.to_cell(80, 50), Point::new(72, 5));
        let edge = Placement {
            x_pct: 100.0,
            y_pct: 100.0,
            rotation_deg: 0.0,
        };
        assert_eq!(edge.to_cell(80, 50), Point::new(79, 49));
    }
}
