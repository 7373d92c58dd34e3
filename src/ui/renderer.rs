/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// One tile is two terminal columns. Entities are drawn on the tile that
/// contains their position; cosmetic effects (catch sparkles, fly-away
/// fragments, impact shake) are fed in from the step's `GameEvent`s.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::coords::TileCoord;
use crate::domain::entity::{BreakableFamily, BreakableState, EntityKind, FlyAway, Sweet};
use crate::domain::tile::{Ground, TileKind};
use crate::sim::event::GameEvent;
use crate::sim::grid::Slot;
use crate::sim::session::{Outcome, SessionState};
use crate::sim::world::{Camera, World};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool, // true = this char occupies 2 terminal columns
    cont: bool, // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 4],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, bg: Color) -> Self {
        let mut cell = Self::from_char(c, Color::Reset, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    /// Full-width bar with `s` left-aligned.
    fn put_bar(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', fg, bg));
        }
        self.put_str(0, y, s, fg, bg);
    }
}

// ── Layout ──

/// Terminal columns per tile.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap above the map, message + gap + help below it.
const RESERVED_ROWS: usize = MAP_ROW + 4;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const WARN_BG: Color = Color::Rgb { r: 150, g: 30, b: 30 };
const PINK_BG: Color = Color::Rgb { r: 110, g: 60, b: 85 };
const GREEN_BG: Color = Color::Rgb { r: 45, g: 90, b: 45 };
const WATER_BG: Color = Color::Rgb { r: 20, g: 55, b: 125 };

/// Seconds an impact shakes the map.
const SHAKE_SECS: f32 = 0.12;
const MESSAGE_SECS: f32 = 2.0;

/// Viewport cell → tile, for a terminal position. `None` outside the map area.
pub fn screen_to_tile(camera: &Camera, column: u16, row: u16) -> Option<TileCoord> {
    let vy = (row as usize).checked_sub(MAP_ROW)?;
    let vx = column as usize / CELL_W;
    if vx >= camera.view_w || vy >= camera.view_h {
        return None;
    }
    Some(camera.view_to_tile(vx, vy))
}

pub fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::NotStarted => "TOUCH TO START",
        SessionState::Active => "",
        SessionState::Ended(Outcome::Won) => "CLEAR!",
        SessionState::Ended(Outcome::Lost) => "TIME UP",
    }
}

pub fn hud_text(world: &World, level: usize) -> String {
    let mut hud = format!(
        " Dog Dash  L{:<2}  Dogs:{:<3}  Time:{:>5.1}",
        level + 1,
        world.dogs_remaining(),
        world.remaining(),
    );
    let tier = world.session.combo.tier();
    if tier > 0 {
        hud.push_str(&format!("  Combo:x{}", tier + 1));
    }
    let label = state_label(world.state());
    if !label.is_empty() {
        hud.push_str("  ");
        hud.push_str(label);
    }
    hud
}

/// Glyphs and colors for a background tile: (left, right, fg, bg).
fn tile_glyphs(kind: TileKind) -> (char, char, Color, Color) {
    match kind {
        TileKind::Background(Ground::Pink) => (' ', ' ', Color::Reset, PINK_BG),
        TileKind::Background(Ground::Green) => (' ', ' ', Color::Reset, GREEN_BG),
        TileKind::Water { ripple: false } => ('≈', '≈', Color::Rgb { r: 120, g: 180, b: 255 }, WATER_BG),
        TileKind::Water { ripple: true } => ('~', '≈', Color::Rgb { r: 160, g: 210, b: 255 }, WATER_BG),
        TileKind::Wall(_) => ('█', '█', Color::Rgb { r: 130, g: 130, b: 130 }, Color::Rgb { r: 70, g: 70, b: 70 }),
    }
}

fn ground_bg(family: BreakableFamily) -> Color {
    match family {
        BreakableFamily::Cake => GREEN_BG,
        BreakableFamily::Pie => PINK_BG,
    }
}

fn sweet_glyph(sweet: Sweet) -> char {
    match sweet {
        Sweet::Shortcake => '🍰',
        Sweet::Choco => '🍫',
        Sweet::House => '🏠',
        Sweet::ApplePie => '🥧',
        Sweet::MontBlanc => '🌰',
    }
}

// ── Effects ──

#[derive(Clone, Copy, Debug)]
enum EffectKind {
    Catch { tier: u32 },
    Fragment(FlyAway),
}

#[derive(Clone, Copy, Debug)]
struct Effect {
    kind: EffectKind,
    position: glam::Vec2,
    age: f32,
    lifetime: f32,
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_state: Option<SessionState>,
    effects: Vec<Effect>,
    message: String,
    message_timer: f32,
    warning: bool,
    /// Remaining shake time and direction in columns.
    shake: (f32, i32),
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_state: None,
            effects: Vec::new(),
            message: String::new(),
            message_timer: 0.0,
            warning: false,
            shake: (0.0, 0),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame
        self.back.cells.fill(Cell::INVALID);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Drop effects and messages from the previous level.
    pub fn reset(&mut self) {
        self.effects.clear();
        self.message.clear();
        self.message_timer = 0.0;
        self.warning = false;
        self.shake = (0.0, 0);
    }

    fn say(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.message_timer = MESSAGE_SECS;
    }

    /// Turn step events into effects and messages.
    pub fn absorb(&mut self, events: &[GameEvent]) {
        for event in events {
            match event {
                GameEvent::SessionStarted => self.message.clear(),
                GameEvent::DogCaught { position, tier, .. } => {
                    self.effects.push(Effect {
                        kind: EffectKind::Catch { tier: *tier },
                        position: *position,
                        age: 0.0,
                        lifetime: GameEvent::CATCH_EFFECT_SECS,
                    });
                    if *tier > 0 {
                        self.say(format!("Combo x{}!", tier + 1));
                    }
                }
                GameEvent::Smashed { fragment, .. } => self.effects.push(Effect {
                    kind: EffectKind::Fragment(*fragment),
                    position: fragment.origin,
                    age: 0.0,
                    lifetime: FlyAway::LIFETIME_SECS,
                }),
                GameEvent::RedDogKicked { .. } => self.say("Kick!"),
                GameEvent::DogSinking { .. } => self.say("Splash!"),
                GameEvent::Impact(impact) => {
                    let dir = if impact.shake.x > 0.0 { 1 } else if impact.shake.x < 0.0 { -1 } else { 0 };
                    self.shake = (SHAKE_SECS, dir);
                }
                GameEvent::TimeRunningOut => {
                    self.warning = true;
                    self.say("Time running out!");
                }
                GameEvent::LevelEnded(Outcome::Won) => {
                    self.say("All dogs caught!  N: next level  R: replay");
                    self.message_timer = f32::INFINITY;
                }
                GameEvent::LevelEnded(Outcome::Lost) => {
                    self.say("Time up!  R: retry");
                    self.message_timer = f32::INFINITY;
                }
                GameEvent::PlayerMoved { .. } | GameEvent::FacingChanged { .. } | GameEvent::DogDrowned { .. } => {}
            }
        }
    }

    pub fn render(&mut self, world: &mut World, level: usize, dt: f32) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Viewport from terminal size, capped to the grid
        let geometry = world.geometry();
        world.camera.view_w = (self.term_w / CELL_W).min(geometry.columns).max(1);
        world.camera.view_h = self.term_h.saturating_sub(RESERVED_ROWS).min(geometry.rows).max(1);

        let state = world.state();
        if self.last_state != Some(state) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_state = Some(state);
        }

        if let Some(player) = world.player() {
            let tile = world.world_to_tile(player.body.position);
            if state == SessionState::NotStarted {
                world.camera.center_on(tile, geometry.columns, geometry.rows);
            } else {
                world.camera.follow(tile, geometry.columns, geometry.rows);
            }
        }

        self.tick_effects(dt);
        self.front.clear();
        self.compose_game(world, level);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn tick_effects(&mut self, dt: f32) {
        for effect in &mut self.effects {
            effect.age += dt;
        }
        self.effects.retain(|e| e.age < e.lifetime);
        if self.message_timer.is_finite() {
            self.message_timer -= dt;
            if self.message_timer <= 0.0 {
                self.message.clear();
            }
        }
        self.shake.0 = (self.shake.0 - dt).max(0.0);
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(Cell::BASE_BG))?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &World, level: usize) {
        let hud_bg = if self.warning && w.state() == SessionState::Active { WARN_BG } else { HUD_BG };
        self.front.put_bar(HUD_ROW, &hud_text(w, level), Color::White, hud_bg);

        let cam = w.camera.clone();
        let shift = if self.shake.0 > 0.0 { self.shake.1 } else { 0 };
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..cam.view_w {
                let col = vx as i32 * CELL_W as i32 + shift;
                if col < 0 || col as usize + 1 >= self.front.width { continue; }
                self.compose_tile(w, cam.view_to_tile(vx, vy), col as usize, row);
            }
        }

        self.compose_entities(w, &cam, shift);
        self.compose_effects(w, &cam, shift);

        let msg_row = MAP_ROW + cam.view_h + 1;
        if msg_row < self.front.height && !self.message.is_empty() {
            let msg = format!(" {} ", self.message);
            self.front.put_bar(msg_row, &msg, Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " Click/Arrows:run  R:restart  N/P:level  Q:quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn put_pair(&mut self, col: usize, row: usize, (c0, c1, fg, bg): (char, char, Color, Color)) {
        self.front.set(col, row, Cell::from_char(c0, fg, bg));
        self.front.set(col + 1, row, Cell::from_char(c1, fg, bg));
    }

    fn put_wide(&mut self, col: usize, row: usize, ch: char, bg: Color) {
        self.front.set(col, row, Cell::from_char_wide(ch, bg));
        self.front.set(col + 1, row, Cell::WIDE_CONT);
    }

    /// Background, then the breakable overlay.
    fn compose_tile(&mut self, w: &World, coord: TileCoord, col: usize, row: usize) {
        let mut bg = Cell::BASE_BG;
        match w.tiles.background.tile_at(coord) {
            Some(Slot::Tile(kind)) => {
                let glyphs = tile_glyphs(*kind);
                bg = glyphs.3;
                self.put_pair(col, row, glyphs);
            }
            _ => self.put_pair(col, row, (' ', ' ', Color::Reset, Cell::BASE_BG)),
        }

        let Some(Slot::Entity { id, .. }) = w.tiles.overlay.tile_at(coord) else { return };
        let Some(EntityKind::Breakable(b)) = w.entity(*id).map(|e| &e.kind) else { return };
        match b.state {
            BreakableState::Whole => self.put_wide(col, row, sweet_glyph(b.sweet), bg),
            BreakableState::Broken => {
                self.put_pair(col, row, (' ', ' ', Color::Reset, ground_bg(b.sweet.family())))
            }
        }
    }

    /// Dogs first, the player on top.
    fn compose_entities(&mut self, w: &World, cam: &Camera, shift: i32) {
        let mut player = None;
        for entity in w.entities() {
            let glyph = match &entity.kind {
                EntityKind::Player(_) => {
                    player = Some(entity);
                    continue;
                }
                EntityKind::Dog(_) => '🐕',
                EntityKind::RedDog(wanderer) if wanderer.is_sinking() => '💦',
                EntityKind::RedDog(_) => '🐺',
                EntityKind::Breakable(_) => continue,
            };
            self.put_on_map(w, cam, shift, entity.body.position, glyph);
        }
        if let Some(p) = player {
            let glyph = if matches!(w.state(), SessionState::Ended(Outcome::Won)) { '🙌' } else { '🏃' };
            self.put_on_map(w, cam, shift, p.body.position, glyph);
        }
    }

    fn compose_effects(&mut self, w: &World, cam: &Camera, shift: i32) {
        let effects = self.effects.clone();
        for effect in effects {
            match effect.kind {
                EffectKind::Catch { tier } => {
                    let glyph = if tier >= 3 { '🌟' } else { '✨' };
                    self.put_on_map(w, cam, shift, effect.position, glyph);
                }
                EffectKind::Fragment(fragment) => {
                    if fragment.alpha_at(effect.age) <= 0.0 { continue; }
                    let at = fragment.origin + fragment.offset_at(effect.age);
                    self.put_on_map(w, cam, shift, at, '✦');
                }
            }
        }
    }

    fn put_on_map(&mut self, w: &World, cam: &Camera, shift: i32, position: glam::Vec2, glyph: char) {
        let Some((vx, vy)) = cam.tile_to_view(w.world_to_tile(position)) else { return };
        let col = vx as i32 * CELL_W as i32 + shift;
        let row = MAP_ROW + vy;
        if col < 0 || col as usize + 1 >= self.front.width || row >= self.front.height { return; }
        let bg = self.front.get(col as usize, row).bg;
        self.put_wide(col as usize, row, glyph, bg);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::level::embedded_levels;

    #[test]
    fn screen_cells_map_through_the_camera() {
        let cam = Camera { x: 3, y: -1, view_w: 10, view_h: 5 };
        assert_eq!(screen_to_tile(&cam, 0, 1), None);
        assert_eq!(screen_to_tile(&cam, 0, MAP_ROW as u16), Some(TileCoord::new(3, -1)));
        assert_eq!(screen_to_tile(&cam, 5, MAP_ROW as u16 + 2), Some(TileCoord::new(5, 1)));
        assert_eq!(screen_to_tile(&cam, 20, MAP_ROW as u16), None);
        assert_eq!(screen_to_tile(&cam, 0, MAP_ROW as u16 + 5), None);
    }

    #[test]
    fn hud_shows_roster_and_state() {
        let levels = embedded_levels();
        let world = World::from_level(&levels[0], &GameConfig::default(), 1).expect("builds");
        let hud = hud_text(&world, 0);
        assert!(hud.contains("L1"));
        assert!(hud.contains(&format!("Dogs:{}", world.dogs_remaining())));
        assert!(hud.contains("TOUCH TO START"));
        assert!(!hud.contains("Combo"));
    }

    #[test]
    fn hud_shows_a_running_combo() {
        let levels = embedded_levels();
        let mut world = World::from_level(&levels[0], &GameConfig::default(), 1).expect("builds");
        world.session.combo.register(1.0);
        world.session.combo.register(1.2);
        world.session.combo.register(1.4);
        assert!(hud_text(&world, 0).contains("Combo:x3"));
    }

    #[test]
    fn cells_keep_their_glyph() {
        let cell = Cell::from_char('≈', Color::Blue, Color::Reset);
        assert_eq!(cell.as_str(), "≈");
        assert_eq!(cell.bg, Cell::BASE_BG);
        assert!(Cell::from_char_wide('🐕', PINK_BG).wide);
    }

    #[test]
    fn ripple_water_differs() {
        assert_ne!(tile_glyphs(TileKind::Water { ripple: true }).0, tile_glyphs(TileKind::Water { ripple: false }).0);
    }
}
