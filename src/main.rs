/// Entry point and game loop.

use std::time::{Duration, Instant};

use glam::Vec2;

use dogdash::config::GameConfig;
use dogdash::sim::level::{clamp_index, embedded_levels, load_levels, LevelDef, LevelError};
use dogdash::sim::event::GameEvent;
use dogdash::sim::physics::ArcadePhysics;
use dogdash::sim::session::Outcome;
use dogdash::sim::step::{self, FrameInput};
use dogdash::sim::world::World;
use dogdash::ui::input::{Command, InputState};
use dogdash::ui::renderer::{self, Renderer};

/// Longest frame the simulation will integrate in one go.
const MAX_DT: f32 = 0.1;

fn main() {
    env_logger::init();
    let config = GameConfig::load();
    let levels = load_levels(&config.levels_dir);
    log::info!("{} levels available", levels.len());

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&levels, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    match result {
        Ok(summary) => {
            println!();
            println!("Thanks for playing Dog Dash!");
            println!("{summary}");
        }
        Err(e) => eprintln!("Game error: {e}"),
    }
}

// ── Level loading ──

/// Build the world for `index` (clamped). A broken level falls back to the
/// first built-in one.
fn load_world(levels: &[LevelDef], index: usize, config: &GameConfig) -> Result<(usize, World), LevelError> {
    let index = clamp_index(index, levels.len());
    let seed = World::seed_for(config);
    log::info!("loading level {} (seed {seed})", index + 1);

    let built = match levels.get(index) {
        Some(def) => World::from_level(def, config, seed),
        None => Err(LevelError::EmptyManifest(config.levels_dir.clone())),
    };
    match built {
        Ok(world) => Ok((index, world)),
        Err(e) => {
            log::warn!("level {} unusable: {e}; falling back to built-in level 1", index + 1);
            let fallback = embedded_levels();
            let def = fallback.first().ok_or(e)?;
            Ok((0, World::from_level(def, config, seed)?))
        }
    }
}

// ── Touch mapping ──

/// World-space point for a touch command.
fn touch_point(world: &World, command: Command) -> Option<Vec2> {
    match command {
        Command::TouchScreen { column, row } => {
            renderer::screen_to_tile(&world.camera, column, row).map(|tile| world.tile_to_world(tile))
        }
        Command::Nudge { dc, dr } => {
            let player = world.player()?;
            let tile = world.world_to_tile(player.body.position).offset(dc, dr);
            Some(world.tile_to_world(tile))
        }
        _ => None,
    }
}

// ── Main loop ──

fn game_loop(levels: &[LevelDef], renderer: &mut Renderer, config: &GameConfig) -> Result<String, Box<dyn std::error::Error>> {
    let mut input = InputState::new();
    let mut physics = ArcadePhysics::new();
    let (mut index, mut world) = load_world(levels, 0, config)?;
    let mut cleared = 0usize;

    let frame = Duration::from_millis(config.speed.frame_ms.max(1));
    let mut last = Instant::now();

    loop {
        input.drain_events();
        if input.quit_requested() {
            break;
        }

        let target = if input.was_issued(Command::NextLevel) {
            Some(index + 1)
        } else if input.was_issued(Command::PrevLevel) {
            Some(index.checked_sub(1).unwrap_or(levels.len().saturating_sub(1)))
        } else if input.was_issued(Command::Restart) {
            Some(index)
        } else {
            None
        };
        if let Some(target) = target {
            (index, world) = load_world(levels, target, config)?;
            physics.reset();
            renderer.reset();
            last = Instant::now();
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32().min(MAX_DT);
        last = now;

        let touch = input.last_touch().and_then(|c| touch_point(&world, c));
        let contacts = physics.step(&mut world, dt);
        let events = step::step(&mut world, dt, &FrameInput { touch }, &contacts);
        if events.contains(&GameEvent::LevelEnded(Outcome::Won)) {
            cleared += 1;
        }
        renderer.absorb(&events);
        renderer.render(&mut world, index, dt)?;

        std::thread::sleep(frame.saturating_sub(now.elapsed()));
    }

    Ok(format!("Levels cleared: {cleared}"))
}
