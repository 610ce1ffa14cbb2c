use bracket_noise::prelude::{FastNoise, NoiseType};
use bracket_terminal::prelude::*;

use crate::session::{
    Session,
    resource::{AlarmLevel, ResourceSnapshot},
    sequenced_log::LogLine,
    spawner::{ItemId, ItemKind, SpawnedItem},
    stage::Stage,
    timer::Outcome,
};

pub const HUD_ROWS: i32 = 3;
const RING_SPACING: f32 = 5.0;
const HOTKEYS: &str = "abcdefghijklmnopqrstuvwxyz";

/// Presentation-only state fed by session cues.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub flash_until: u64,
    pub displaced_until: u64,
    pub blind: bool,
    pub alarm: AlarmLevel,
    pub playback_rate: f32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            flash_until: 0,
            displaced_until: 0,
            blind: false,
            alarm: AlarmLevel::Calm,
            playback_rate: 1.0,
        }
    }
}

/// Background rings, always running. Phase speed is driven by the caller.
pub struct Hypno {
    noise: FastNoise,
    phase: f32,
}

impl Hypno {
    pub fn new(seed: u64) -> Self {
        let mut noise = FastNoise::seeded(seed);
        noise.set_noise_type(NoiseType::SimplexFractal);
        noise.set_frequency(0.08);
        Self { noise, phase: 0.0 }
    }

    pub fn step(&mut self, intensity: f32) {
        self.phase += 0.1 * (1.0 + intensity.clamp(0.0, 1.0) * 2.0);
    }

    pub fn draw(&self, ctx: &mut BTerm) {
        let (width, height) = ctx.get_char_size();
        let (width, height) = (width as i32, height as i32);
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let swell = self.phase.sin() * 3.0;
        for y in 0..height {
            for x in 0..width {
                // cells are roughly twice as tall as wide
                let dx = (x as f32 - center_x) / 2.0;
                let dy = y as f32 - center_y;
                let wobble = self.noise.get_noise(x as f32, y as f32 + self.phase * 4.0);
                let distance = (dx * dx + dy * dy).sqrt() + swell + wobble * 1.5;
                if distance.rem_euclid(RING_SPACING) < 0.6 {
                    ctx.set(
                        x,
                        y,
                        RGB::from_u8(90, 0, 90),
                        RGB::named(BLACK),
                        to_cp437('·'),
                    );
                }
            }
        }
    }
}

pub fn draw_hud(ctx: &mut BTerm, session: &Session, overlay: &Overlay) {
    let (width, _) = ctx.get_char_size();
    let border = if overlay.alarm == AlarmLevel::Sustained {
        RGB::named(RED)
    } else {
        RGB::named(DARK_GRAY)
    };
    ctx.draw_box(0, 0, width as i32 - 1, HUD_ROWS - 1, border, RGB::named(BLACK));
    let stage = session.stage().map_or("Idle", |stage| stage.as_str());
    ctx.print_color(
        2,
        1,
        RGB::named(MAGENTA),
        RGB::named(BLACK),
        format!("DAHLIA.OS · {stage}"),
    );
    let readout = resource_readout(&session.resource(), session.failures());
    ctx.print_color(24, 1, RGB::named(WHITE), RGB::named(BLACK), readout);

    let mut flags = Vec::new();
    if overlay.blind {
        flags.push("CAMERA BLIND".to_string());
    }
    if (overlay.playback_rate - 1.0).abs() > f32::EPSILON {
        flags.push(format!("AUDIO x{:.1}", overlay.playback_rate));
    }
    if !flags.is_empty() {
        let text = flags.join(" · ");
        let x = (width as i32 - text.len() as i32 - 2).max(0);
        ctx.print_color(x, 1, RGB::named(ORANGE), RGB::named(BLACK), text);
    }
}

pub fn resource_readout(snapshot: &ResourceSnapshot, failures: u32) -> String {
    match (snapshot.count, snapshot.level) {
        (Some((count, ceiling)), _) => format!("SPAM {count}/{ceiling} · MISSED {failures}"),
        (None, Some(level)) => format!(
            "LEVEL {:>3.0} · WALLET {:.2} · MISSED {failures}",
            level,
            snapshot.wallet.unwrap_or_default()
        ),
        (None, None) => String::new(),
    }
}

pub fn draw_boot(ctx: &mut BTerm, session: &Session) {
    ctx.print_color_centered(20, RGB::named(MAGENTA), RGB::named(BLACK), "D A H L I A");
    ctx.print_color_centered(22, RGB::named(GRAY), RGB::named(BLACK), "establishing link...");
    for (row, status) in session.status().iter().take(4).enumerate() {
        ctx.print_color_centered(
            25 + row as i32,
            RGB::named(DARK_GRAY),
            RGB::named(BLACK),
            format!("{}: {}", status.signal, status.message),
        );
    }
}

pub fn draw_terminal(ctx: &mut BTerm, lines: &[LogLine], start_y: i32, frame: u64) {
    for (row, line) in lines.iter().enumerate() {
        let y = start_y + row as i32;
        ctx.print_color(2, y, RGB::named(GREEN), RGB::named(BLACK), &line.text);
        if line.typing && frame / 15 % 2 == 0 {
            ctx.set(
                3 + line.text.len() as i32,
                y,
                RGB::named(GREEN),
                RGB::named(BLACK),
                to_cp437('█'),
            );
        }
    }
}

pub fn draw_prompt(ctx: &mut BTerm, y: i32, label: &str, input: &str, error: Option<&str>) {
    ctx.print_color(2, y, RGB::named(WHITE), RGB::named(BLACK), label);
    let field = format!("[{input:_<12}]");
    ctx.print_color(3 + label.len() as i32, y, RGB::named(YELLOW), RGB::named(BLACK), field);
    if let Some(error) = error {
        ctx.print_color(2, y + 1, RGB::named(RED), RGB::named(BLACK), error);
    }
}

/// Pending media items in arena order, each with its selection key.
pub fn hotkeys<'a>(items: impl Iterator<Item = &'a SpawnedItem>) -> Vec<(char, ItemId)> {
    HOTKEYS
        .chars()
        .zip(
            items
                .filter(|item| item.kind.is_media() && item.outcome == Outcome::Pending)
                .map(|item| item.id),
        )
        .collect()
}

pub fn draw_items(ctx: &mut BTerm, session: &Session) {
    let (width, height) = ctx.get_char_size();
    let area_h = height as i32 - HUD_ROWS;
    let keys = hotkeys(session.items());
    for item in session.items() {
        let cell = item.placement.to_cell(width as i32, area_h);
        let y = cell.y + HUD_ROWS;
        let key = keys
            .iter()
            .find(|(_, id)| *id == item.id)
            .map(|(key, _)| *key);
        let text = item_text(item, key);
        let x = (cell.x - text.len() as i32 / 2).max(0);
        ctx.print_color(x, y, item_color(item), RGB::named(BLACK), text);
    }
}

fn item_text(item: &SpawnedItem, key: Option<char>) -> String {
    let tilt = if item.placement.rotation_deg < -7.0 {
        '\\'
    } else if item.placement.rotation_deg > 7.0 {
        '/'
    } else {
        '|'
    };
    match (item.kind, key) {
        (ItemKind::Word, _) if item.scale >= 3.5 => format!("{tilt}{}{tilt}", item.label),
        (ItemKind::Word, _) => item.label.to_lowercase(),
        (kind, Some(key)) => format!("{tilt}[{key}] {} {}{tilt}", kind.as_str(), item.label),
        (kind, None) => format!("{tilt}{} {}{tilt}", kind.as_str(), item.label),
    }
}

fn item_color(item: &SpawnedItem) -> RGB {
    match (item.kind, item.outcome) {
        (_, Outcome::Worshipped) => RGB::named(LIGHT_GREEN),
        (_, Outcome::Ignored) => RGB::named(RED),
        (ItemKind::Word, _) if item.accent => RGB::named(MAGENTA),
        (ItemKind::Word, _) => RGB::named(WHITE),
        (ItemKind::Image, _) => RGB::named(YELLOW),
        (ItemKind::Video, _) => RGB::named(CYAN),
    }
}

pub fn draw_lockout(ctx: &mut BTerm, session: &Session) {
    let (width, height) = ctx.get_char_size();
    let (width, height) = (width as i32, height as i32);
    let (box_w, box_h) = (44, 11);
    let left = (width - box_w) / 2;
    let top = (height - box_h) / 2;
    ctx.draw_box(left, top, box_w, box_h, RGB::named(RED), RGB::named(BLACK));
    ctx.print_color_centered(top + 2, RGB::named(RED), RGB::named(BLACK), "DEVICE LOCKED");
    ctx.print_color_centered(
        top + 4,
        RGB::named(WHITE),
        RGB::named(BLACK),
        "YOUR DATA IS HELD. TRIBUTE REQUIRED.",
    );
    ctx.print_color_centered(
        top + 5,
        RGB::named(GRAY),
        RGB::named(BLACK),
        resource_readout(&session.resource(), session.failures()),
    );
    let error = session.lockout_error().then_some("WRONG CODE. PAY FIRST.");
    draw_prompt(ctx, top + 7, "RELEASE CODE:", session.input(), error);
    if session.resets() > 0 {
        ctx.print_color_centered(
            top + 10,
            RGB::named(DARK_GRAY),
            RGB::named(BLACK),
            format!("RELAPSES: {}", session.resets()),
        );
    }
}

pub fn draw_flash(ctx: &mut BTerm) {
    let (width, height) = ctx.get_char_size();
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            ctx.set_bg(x, y, RGB::from_u8(128, 0, 0));
        }
    }
}

pub fn draw_displaced(ctx: &mut BTerm) {
    let (_, height) = ctx.get_char_size();
    ctx.print_color_centered(
        height as i32 - 2,
        RGB::named(YELLOW),
        RGB::named(RED),
        "!! MOVEMENT DETECTED. STAY WHERE YOU ARE !!",
    );
}

pub fn draw_stage(ctx: &mut BTerm, session: &Session, frame: u64) {
    match session.stage() {
        None | Some(Stage::Boot) => draw_boot(ctx, session),
        Some(Stage::Terminal) => draw_terminal(ctx, session.lines(), HUD_ROWS + 1, frame),
        Some(Stage::Gate) => {
            draw_terminal(ctx, session.lines(), HUD_ROWS + 1, frame);
            let y = HUD_ROWS + 2 + session.lines().len() as i32;
            let error = session.gate_error().then_some("ACCESS DENIED.");
            draw_prompt(ctx, y, "PASSCODE:", session.input(), error);
        }
        Some(Stage::Engagement) => draw_items(ctx, session),
        Some(Stage::Lockout) => draw_lockout(ctx, session),
    }
}
