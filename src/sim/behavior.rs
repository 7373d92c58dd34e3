/// Per-kind entity behavior, dispatched by the step.
///
/// Each kind's state machine implements `Behavior`. The step splits an
/// `Entity` into its `Body` and its kind state and hands both over together
/// with a `BehaviorCtx` borrowing the rest of the world.
///
/// Dog cycle:
///   start → walk ─┬─ target ok ─→ Walking (tween) ─→ Walk task ─→ walk
///                 └─ blocked ───→ Waiting ─────────→ Walk task ─→ walk
///
/// Red dog kick:
///   kick → Kicked ─→ ResumeAfterKick ─┬─ water ─→ Sinking ─→ FinishSink → despawn
///                                     └─ land ──→ walk

use std::f32::consts::PI;

use glam::Vec2;
use rand_pcg::Pcg32;

use crate::config::SpeedConfig;
use crate::domain::ai::{self, WanderStep};
use crate::domain::category::SINKS_RED_DOG;
use crate::domain::coords::GridGeometry;
use crate::domain::entity::{Body, Breakable, DogState, EntityId, EntityKind, Player, Tween, Wanderer};
use super::event::GameEvent;
use super::grid::TileMap;
use super::schedule::{Scheduler, TaskAction};

/// Everything a behavior may touch besides its own entity.
pub struct BehaviorCtx<'a> {
    pub now: f64,
    pub tiles: &'a TileMap,
    /// Geometry the entity moves in.
    pub geometry: GridGeometry,
    pub speed: &'a SpeedConfig,
    pub scheduler: &'a mut Scheduler,
    pub rng: &'a mut Pcg32,
    pub events: &'a mut Vec<GameEvent>,
    /// Entities to remove once the current pass is over.
    pub despawn: &'a mut Vec<EntityId>,
}

impl BehaviorCtx<'_> {
    fn after(&self, secs: f32) -> f64 {
        self.now + secs as f64
    }
}

pub trait Behavior {
    /// Session started.
    fn start(&mut self, _id: EntityId, _body: &mut Body, _ctx: &mut BehaviorCtx<'_>) {}

    /// A scheduled task for this entity came due.
    fn on_task(&mut self, _id: EntityId, _task: TaskAction, _body: &mut Body, _ctx: &mut BehaviorCtx<'_>) {}

    /// Per-frame continuous update (tweens, animations).
    fn advance(&mut self, _id: EntityId, _body: &mut Body, _dt: f32) {}
}

/// Player motion comes from input and physics only.
impl Behavior for Player {}

/// Breakables only react to contacts.
impl Behavior for Breakable {}

impl Behavior for Wanderer {
    fn start(&mut self, id: EntityId, body: &mut Body, ctx: &mut BehaviorCtx<'_>) {
        self.walk(id, body, ctx);
    }

    fn on_task(&mut self, id: EntityId, task: TaskAction, body: &mut Body, ctx: &mut BehaviorCtx<'_>) {
        match task {
            TaskAction::Walk => {
                if let DogState::Walking(tween) = self.state {
                    body.position = tween.to;
                }
                self.walk(id, body, ctx);
            }
            TaskAction::ResumeAfterKick => self.resume_after_kick(id, body, ctx),
            TaskAction::FinishSink => {
                ctx.despawn.push(id);
                ctx.events.push(GameEvent::DogDrowned { entity: id });
            }
        }
    }

    fn advance(&mut self, _id: EntityId, body: &mut Body, dt: f32) {
        match &mut self.state {
            DogState::Walking(tween) => body.position = tween.advance(dt),
            DogState::Sinking { elapsed, duration } => {
                *elapsed = (*elapsed + dt).min(*duration);
                let t = if *duration > 0.0 { *elapsed / *duration } else { 1.0 };
                body.rotation = SINK_SPIN * t;
                body.scale = 1.0 - t;
            }
            _ => {}
        }
    }
}

/// Total rotation of a drowning red dog: two full turns.
const SINK_SPIN: f32 = 4.0 * PI;

impl Wanderer {
    /// One wander cycle: pick a neighbour and walk there, or wait and retry.
    pub fn walk(&mut self, id: EntityId, body: &mut Body, ctx: &mut BehaviorCtx<'_>) {
        let from = ctx.geometry.world_to_tile(body.position);
        let step = ai::plan_step(
            ctx.tiles,
            from,
            ctx.rng,
            ctx.speed.retry_delay_secs,
            ctx.speed.retry_jitter_secs,
        );
        match step {
            WanderStep::MoveTo { target, offset: (dc, dr) } => {
                let to = ctx.geometry.tile_to_world(target);
                self.state = DogState::Walking(Tween::new(body.position, to, ctx.speed.dog_step_secs));
                ctx.scheduler.schedule(id, ctx.after(ctx.speed.dog_step_secs), TaskAction::Walk);

                let pose = ai::pose_for_offset(dc, dr);
                body.rotation = pose.rotation;
                if let Some(facing) = pose.facing {
                    let visual = body.set_facing(Wanderer::PREFIX, facing);
                    ctx.events.push(GameEvent::FacingChanged { entity: id, visual, rotation: pose.rotation });
                }
            }
            WanderStep::Retry { delay } => {
                log::debug!("{id} blocked at ({}, {}), retry in {delay:.2}s", from.col, from.row);
                self.state = DogState::Waiting;
                ctx.scheduler.schedule(id, ctx.after(delay), TaskAction::Walk);
            }
        }
    }

    /// Red dog hit by the player: drop everything and stay stunned.
    /// Kicking again restarts the pause. Sinking dogs ignore kicks.
    pub fn kick(&mut self, id: EntityId, ctx: &mut BehaviorCtx<'_>) -> bool {
        if self.is_sinking() {
            return false;
        }
        ctx.scheduler.cancel(id);
        self.state = DogState::Kicked;
        ctx.scheduler.schedule(id, ctx.after(ctx.speed.kick_pause_secs), TaskAction::ResumeAfterKick);
        true
    }

    fn resume_after_kick(&mut self, id: EntityId, body: &mut Body, ctx: &mut BehaviorCtx<'_>) {
        body.velocity = Vec2::ZERO;
        let tile = ctx.geometry.world_to_tile(body.position);
        if ctx.tiles.has_any_property(tile, SINKS_RED_DOG) {
            log::debug!("{id} sinking at ({}, {})", tile.col, tile.row);
            self.state = DogState::Sinking { elapsed: 0.0, duration: ctx.speed.sink_secs };
            body.category = None;
            ctx.scheduler.schedule(id, ctx.after(ctx.speed.sink_secs), TaskAction::FinishSink);
            ctx.events.push(GameEvent::DogSinking { entity: id });
        } else {
            self.walk(id, body, ctx);
        }
    }
}

/// Split an entity's kind into its behavior.
pub fn behavior_of(kind: &mut EntityKind) -> &mut dyn Behavior {
    match kind {
        EntityKind::Player(p) => p,
        EntityKind::Dog(w) | EntityKind::RedDog(w) => w,
        EntityKind::Breakable(b) => b,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::config::GameConfig;
    use crate::domain::category::{Category, WANDER_BLOCKERS};
    use crate::domain::coords::TileCoord;
    use crate::domain::tile::{Ground, TileKind};
    use crate::sim::grid::{Slot, TileLayer};

    const DOG: EntityId = EntityId(1);

    /// '#' wall, '~' water, anything else ground.
    fn tiles(rows: &[&str]) -> TileMap {
        let geometry = GridGeometry::new(Vec2::new(32.0, 32.0), rows[0].len(), rows.len());
        let mut layer = TileLayer::new("background", geometry);
        for (r, row) in rows.iter().enumerate() {
            for (c, ch) in row.chars().enumerate() {
                let kind = match ch {
                    '#' => TileKind::Wall('1'),
                    '~' => TileKind::Water { ripple: false },
                    _ => TileKind::Background(Ground::Pink),
                };
                layer.set(TileCoord::new(c as i32, r as i32), Slot::Tile(kind));
            }
        }
        TileMap::new(layer, None)
    }

    struct Rig {
        tiles: TileMap,
        /// Entity-layer geometry; the background's unless a test overrides it.
        geometry: GridGeometry,
        speed: SpeedConfig,
        scheduler: Scheduler,
        rng: Pcg32,
        events: Vec<GameEvent>,
        despawn: Vec<EntityId>,
    }

    impl Rig {
        fn new(rows: &[&str]) -> Self {
            let tiles = tiles(rows);
            Rig {
                geometry: tiles.geometry(),
                tiles,
                speed: GameConfig::default().speed,
                scheduler: Scheduler::new(),
                rng: Pcg32::seed_from_u64(3),
                events: Vec::new(),
                despawn: Vec::new(),
            }
        }

        fn ctx(&mut self, now: f64) -> BehaviorCtx<'_> {
            BehaviorCtx {
                now,
                tiles: &self.tiles,
                geometry: self.geometry,
                speed: &self.speed,
                scheduler: &mut self.scheduler,
                rng: &mut self.rng,
                events: &mut self.events,
                despawn: &mut self.despawn,
            }
        }

        fn body_at(&self, col: i32, row: i32) -> Body {
            let at = self.geometry.tile_to_world(TileCoord::new(col, row));
            Body::new(Category::RedDog, at, Wanderer::PREFIX)
        }
    }

    #[test]
    fn walk_only_targets_open_ground() {
        let mut rig = Rig::new(&["#~#", "#..", "###"]);
        let mut dog = Wanderer::new();
        for _ in 0..100 {
            let mut body = rig.body_at(1, 1);
            rig.scheduler.cancel(DOG);
            dog.walk(DOG, &mut body, &mut rig.ctx(0.0));
            match dog.state {
                DogState::Walking(tween) => {
                    let target = rig.tiles.geometry().world_to_tile(tween.to);
                    assert!(!rig.tiles.has_any_property(target, WANDER_BLOCKERS), "{target:?}");
                    assert!(target == TileCoord::new(1, 1) || target == TileCoord::new(2, 1));
                }
                DogState::Waiting => {}
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(rig.scheduler.pending_for(DOG), 1);
        }
    }

    #[test]
    fn walk_task_snaps_to_the_tween_target() {
        let mut rig = Rig::new(&["...", "...", "..."]);
        let mut dog = Wanderer::new();
        let mut body = rig.body_at(1, 1);
        let target = Vec2::new(80.0, 48.0);
        dog.state = DogState::Walking(Tween::new(body.position, target, 1.0));
        dog.on_task(DOG, TaskAction::Walk, &mut body, &mut rig.ctx(1.0));
        if let DogState::Walking(tween) = dog.state {
            assert_eq!(tween.from, target);
        }
        assert_eq!(body.position, target);
    }

    #[test]
    fn kick_replaces_pending_walk() {
        let mut rig = Rig::new(&["...", "...", "..."]);
        let mut dog = Wanderer::new();
        let mut body = rig.body_at(1, 1);
        dog.start(DOG, &mut body, &mut rig.ctx(0.0));
        assert!(dog.kick(DOG, &mut rig.ctx(0.2)));
        assert_eq!(dog.state, DogState::Kicked);
        assert!(rig.scheduler.take_due(1.0).is_empty());
        assert_eq!(rig.scheduler.take_due(1.25), vec![(DOG, TaskAction::ResumeAfterKick)]);
    }

    #[test]
    fn resume_on_water_sinks_and_finishes() {
        let mut rig = Rig::new(&["~~~", "~~~", "~~~"]);
        let mut dog = Wanderer::new();
        let mut body = rig.body_at(1, 1);
        dog.kick(DOG, &mut rig.ctx(0.0));
        assert_eq!(rig.scheduler.take_due(1.0), vec![(DOG, TaskAction::ResumeAfterKick)]);
        dog.on_task(DOG, TaskAction::ResumeAfterKick, &mut body, &mut rig.ctx(1.0));

        assert!(dog.is_sinking());
        assert_eq!(body.category, None);
        assert_eq!(rig.events, vec![GameEvent::DogSinking { entity: DOG }]);
        assert!(!dog.kick(DOG, &mut rig.ctx(1.1)));

        dog.advance(DOG, &mut body, 0.5);
        assert!((body.scale - 0.5).abs() < 1e-5);
        assert!((body.rotation - 2.0 * PI).abs() < 1e-4);
        dog.advance(DOG, &mut body, 5.0);
        assert_eq!(body.scale, 0.0);
        assert!((body.rotation - SINK_SPIN).abs() < 1e-4);

        assert_eq!(rig.scheduler.take_due(2.0), vec![(DOG, TaskAction::FinishSink)]);
        dog.on_task(DOG, TaskAction::FinishSink, &mut body, &mut rig.ctx(2.0));
        assert_eq!(rig.despawn, vec![DOG]);
    }

    #[test]
    fn resume_on_land_walks_again() {
        let mut rig = Rig::new(&["...", "...", "..."]);
        let mut dog = Wanderer::new();
        let mut body = rig.body_at(1, 1);
        body.velocity = Vec2::new(40.0, 0.0);
        dog.kick(DOG, &mut rig.ctx(0.0));
        dog.on_task(DOG, TaskAction::ResumeAfterKick, &mut body, &mut rig.ctx(1.0));
        assert_eq!(body.velocity, Vec2::ZERO);
        assert!(matches!(dog.state, DogState::Walking(_) | DogState::Waiting));
        assert_eq!(body.category, Some(Category::RedDog));
    }

    #[test]
    fn sink_check_uses_the_entity_layer_geometry() {
        // background tile (0, 2) is water; with 16px entity tiles the dog at
        // entity tile (1, 1) sits over it in world space but not in tile space
        let mut rig = Rig::new(&["...", "...", "~.."]);
        rig.geometry = GridGeometry::new(Vec2::new(16.0, 16.0), 3, 3);
        let mut dog = Wanderer::new();
        let mut body = rig.body_at(1, 1);
        assert_eq!(rig.tiles.geometry().world_to_tile(body.position), TileCoord::new(0, 2));

        dog.kick(DOG, &mut rig.ctx(0.0));
        dog.on_task(DOG, TaskAction::ResumeAfterKick, &mut body, &mut rig.ctx(1.0));
        assert!(!dog.is_sinking());
        assert!(matches!(dog.state, DogState::Walking(_) | DogState::Waiting));
    }
}
