mod clock;
mod config;
mod data;
mod render;
mod scripted_input;
mod session;
mod signals;

use bracket_geometry::prelude::{DistanceAlg, Point};
use bracket_terminal::prelude::*;
use config::Config;
use data::catalog::{Catalog, MediaCatalog};
use render::{HUD_ROWS, Hypno, Overlay, hotkeys};
use scripted_input::{SCRIPT_ENV_VAR, ScriptedInput};
use session::{Cue, Session, spawner::ItemId, stage::Stage};
use signals::HostSignals;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PRESENCE_GRACE_MS: u64 = 250;
const DISPLACED_NOTICE_MS: u64 = 3000;
const CLICK_RADIUS: f32 = 4.0;

struct DahliaState {
    session: Session,
    script: Option<ScriptedInput>,
    hypno: Hypno,
    overlay: Overlay,
    frame: u64,
    carry_ms: f32,
    presence_until: u64,
}

impl GameState for DahliaState {
    fn tick(&mut self, ctx: &mut BTerm) {
        self.frame = self.frame.wrapping_add(1);
        self.advance_clock(ctx.frame_time_ms);
        if let Some(script) = self.script.as_mut() {
            script.poll(&mut self.session);
            if script.is_finished() {
                info!("script_finished");
                self.script = None;
            }
        }
        self.handle_input(ctx);
        self.apply_cues();
        self.hypno.step(self.session.resource().intensity);

        ctx.cls();
        self.draw_scene(ctx);
    }
}

impl DahliaState {
    fn new(session: Session, script: Option<ScriptedInput>, noise_seed: u64) -> Self {
        Self {
            session,
            script,
            hypno: Hypno::new(noise_seed),
            overlay: Overlay::default(),
            frame: 0,
            carry_ms: 0.0,
            presence_until: 0,
        }
    }

    fn advance_clock(&mut self, frame_time_ms: f32) {
        let elapsed = self.carry_ms + frame_time_ms.max(0.0);
        let whole = elapsed.floor();
        self.carry_ms = elapsed - whole;
        self.session.advance_by(whole as u64);
        let held = self.session.now() < self.presence_until;
        self.session.set_presence(held);
    }

    fn handle_input(&mut self, ctx: &mut BTerm) {
        if ctx.left_click {
            let (x, y) = ctx.mouse_pos();
            self.click(ctx, Point::new(x, y));
        }
        let Some(key) = ctx.key else {
            return;
        };
        match key {
            VirtualKeyCode::Escape => ctx.quit(),
            VirtualKeyCode::Return | VirtualKeyCode::NumpadEnter => self.session.submit(),
            VirtualKeyCode::Back => self.session.backspace(),
            VirtualKeyCode::Space => {
                self.presence_until = self.session.now() + PRESENCE_GRACE_MS;
                self.session.set_presence(true);
            }
            other => {
                let Some(letter) = letter(other) else {
                    return;
                };
                match self.session.stage() {
                    Some(Stage::Engagement) => self.worship_key(letter),
                    _ if ctx.shift => self.session.input_char(letter.to_ascii_uppercase()),
                    _ => self.session.input_char(letter),
                }
            }
        }
    }

    fn worship_key(&mut self, key: char) {
        let target = hotkeys(self.session.items())
            .into_iter()
            .find(|(hotkey, _)| *hotkey == key)
            .map(|(_, id)| id);
        if let Some(id) = target {
            self.worship(id);
        }
    }

    fn click(&mut self, ctx: &BTerm, at: Point) {
        let (width, height) = ctx.get_char_size();
        let area_h = height as i32 - HUD_ROWS;
        let target = self
            .session
            .pending_items()
            .filter(|item| item.kind.is_media())
            .map(|item| {
                let mut cell = item.placement.to_cell(width as i32, area_h);
                cell.y += HUD_ROWS;
                (item.id, DistanceAlg::Pythagoras.distance2d(cell, at))
            })
            .filter(|(_, distance)| *distance <= CLICK_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);
        if let Some(id) = target {
            self.worship(id);
        }
    }

    fn worship(&mut self, id: ItemId) {
        if let Some(outcome) = self.session.worship(id) {
            info!(item = id.0, ?outcome, "worshipped");
        }
    }

    fn apply_cues(&mut self) {
        let now = self.session.now();
        for cue in self.session.drain_cues() {
            match cue {
                Cue::Flash { duration_ms } => self.overlay.flash_until = now + duration_ms,
                Cue::PlaybackRate(rate) => {
                    info!(rate, "playback_rate");
                    self.overlay.playback_rate = rate;
                }
                Cue::Alarm(level) => self.overlay.alarm = level,
                Cue::Blind => self.overlay.blind = true,
                Cue::Displaced => self.overlay.displaced_until = now + DISPLACED_NOTICE_MS,
            }
        }
    }

    fn draw_scene(&mut self, ctx: &mut BTerm) {
        let now = self.session.now();
        self.hypno.draw(ctx);
        render::draw_hud(ctx, &self.session, &self.overlay);
        render::draw_stage(ctx, &self.session, self.frame);
        if now < self.overlay.displaced_until {
            render::draw_displaced(ctx);
        }
        if now < self.overlay.flash_until {
            render::draw_flash(ctx);
        }
    }
}

fn letter(key: VirtualKeyCode) -> Option<char> {
    use VirtualKeyCode::*;
    let letter = match key {
        A => 'a',
        B => 'b',
        C => 'c',
        D => 'd',
        E => 'e',
        F => 'f',
        G => 'g',
        H => 'h',
        I => 'i',
        J => 'j',
        K => 'k',
        L => 'l',
        M => 'm',
        N => 'n',
        O => 'o',
        P => 'p',
        Q => 'q',
        R => 'r',
        S => 's',
        T => 't',
        U => 'u',
        V => 'v',
        W => 'w',
        X => 'x',
        Y => 'y',
        Z => 'z',
        _ => return None,
    };
    Some(letter)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_script() -> Option<ScriptedInput> {
    let path = std::env::var(SCRIPT_ENV_VAR).ok()?;
    match ScriptedInput::from_file(&path) {
        Ok(script) => {
            info!(path = %path, actions = script.len(), "script_loaded");
            Some(script)
        }
        Err(err) => {
            warn!(%err, "script_ignored");
            None
        }
    }
}

fn main() -> BError {
    init_tracing();
    let config = Config::from_env()?;
    let media = MediaCatalog::scan(&config.media_root);
    let catalog = Catalog::new(config.words.clone(), media);
    let noise_seed = config.seed.unwrap_or(0x0da4_11a5);
    let mut session = Session::new(config, catalog, Box::new(HostSignals::new()));
    session.start()?;

    let context = BTermBuilder::simple80x50()
        .with_title("DAHLIA")
        .build()?;
    let state = DahliaState::new(session, load_script(), noise_seed);
    main_loop(context, state)
}
