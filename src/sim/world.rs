/// World: the complete state of one running level.
///
/// ## Layers
///
///   - `tiles`        : background + breakable overlay (`TileMap`), the only
///                      layers terrain queries look at.
///   - `entity_layer` : spawn slots for player, dogs and red dogs.
///
/// Entities live in `entities`, keyed by `EntityId` (BTreeMap, so iteration
/// order is spawn order). Layers hold ids, never entities. Removing an
/// entity goes through `despawn()`, which clears its layer slots and its
/// pending scheduler tasks in one place.
///
/// ## Camera / Viewport
///
/// Tile coordinates and screen cells are separate:
///   - `camera` : viewport into the grid (top-left tile + size in tiles)
///   - Camera follows the player's tile with a dead-zone approach
///   - Maps smaller than the viewport are centered

use std::collections::BTreeMap;

use glam::Vec2;
use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::GameConfig;
use crate::domain::category::CategoryMask;
use crate::domain::coords::{GridGeometry, TileCoord};
use crate::domain::entity::{
    Breakable, BreakableFamily, Entity, EntityId, EntityKind, Player, Sweet, Wanderer,
};
use crate::domain::tile::{parse_code, CellCode, SpawnKind, TileKind};
use super::contact::{ContactResolver, RemovalQueue};
use super::grid::{Slot, TileLayer, TileMap};
use super::level::{LayerDef, LevelDef, LevelError};
use super::schedule::Scheduler;
use super::session::{Combo, LevelSession, SessionState};

/// Chance that a water tile uses the ripple texture.
const WATER_RIPPLE_CHANCE: f64 = 0.1;

/// Camera: a viewport into the tile grid.
///
/// `(x, y)` is the tile coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many tiles fit in the viewport; set by the
/// renderer from the terminal size.
#[derive(Clone, Debug, Default)]
pub struct Camera {
    /// Column of the top-left visible tile (negative when centering)
    pub x: i32,
    /// Row of the top-left visible tile
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera::default()
    }

    /// Follow `target` within a `cols × rows` grid. The target moves freely
    /// inside the inner 60% of the viewport; outside it the view scrolls.
    pub fn follow(&mut self, target: TileCoord, cols: usize, rows: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, target.col, self.view_w, cols);
        self.y = follow_axis(self.y, target.row, self.view_h, rows);
    }

    /// Snap to center on `target` (no dead zone). Used on level load.
    pub fn center_on(&mut self, target: TileCoord, cols: usize, rows: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = center_axis(target.col, self.view_w, cols);
        self.y = center_axis(target.row, self.view_h, rows);
    }

    /// Tile → viewport cell. `None` if outside the visible area.
    pub fn tile_to_view(&self, coord: TileCoord) -> Option<(usize, usize)> {
        let vx = coord.col - self.x;
        let vy = coord.row - self.y;
        if vx >= 0 && vx < self.view_w as i32 && vy >= 0 && vy < self.view_h as i32 {
            Some((vx as usize, vy as usize))
        } else {
            None
        }
    }

    /// Viewport cell → tile (may be outside the grid).
    pub fn view_to_tile(&self, vx: usize, vy: usize) -> TileCoord {
        TileCoord::new(self.x + vx as i32, self.y + vy as i32)
    }
}

fn follow_axis(pos: i32, target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    let margin = view as i32 / 5;
    let low = pos + margin;
    let high = pos + view as i32 - margin - 1;
    let pos = if target < low {
        target - margin
    } else if target > high {
        target - view as i32 + margin + 1
    } else {
        pos
    };
    pos.clamp(0, (world as i32 - view as i32).max(0))
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    (target - view as i32 / 2).clamp(0, (world as i32 - view as i32).max(0))
}

pub struct World {
    // ── Layers ──
    pub tiles: TileMap,
    pub entity_layer: TileLayer,

    // ── Entities ──
    pub entities: BTreeMap<EntityId, Entity>,
    pub player: EntityId,

    // ── Session ──
    pub session: LevelSession,
    pub removals: RemovalQueue,
    pub resolver: ContactResolver,
    pub scheduler: Scheduler,

    // ── Clock / randomness ──
    /// Level clock in seconds. Frozen until the session starts.
    pub now: f64,
    pub rng: Pcg32,

    pub config: GameConfig,
    pub camera: Camera,
}

// ── Construction ──

impl World {
    /// Build a fresh world (and session) for `def`.
    pub fn from_level(def: &LevelDef, config: &GameConfig, seed: u64) -> Result<World, LevelError> {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut entities = BTreeMap::new();
        let mut next_id = 0u32;

        let background = build_layer(&def.background, &mut rng, &mut entities, &mut next_id);
        let overlay = def
            .breakables
            .as_ref()
            .map(|layer| build_layer(layer, &mut rng, &mut entities, &mut next_id));
        let mut entity_layer = build_layer(&def.dogs, &mut rng, &mut entities, &mut next_id);

        let mut players = entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Player(_)))
            .map(|e| e.id);
        let player = players
            .next()
            .ok_or_else(|| LevelError::MissingPlayer(def.dogs.name.clone()))?;
        let extra: Vec<EntityId> = players.collect();
        for id in extra {
            log::warn!("{}: extra player spawn {id} ignored", def.dogs.name);
            entities.remove(&id);
            entity_layer.forget_entity(id);
        }
        // the player moves freely; it never occupies a spawn slot
        entity_layer.forget_entity(player);

        let tiles = TileMap::new(background, overlay);
        let resolver = ContactResolver::new(tiles.geometry().layer_size(), config.impact.boundary_margin);
        let session = LevelSession::new(
            def.time_limit,
            Combo::new(config.combo.window_secs, config.combo.max_tier),
        );

        let world = World {
            tiles,
            entity_layer,
            entities,
            player,
            session,
            removals: RemovalQueue::default(),
            resolver,
            scheduler: Scheduler::new(),
            now: 0.0,
            rng,
            config: config.clone(),
            camera: Camera::new(),
        };
        log::info!(
            "level built: {}x{} tiles, {} dogs, {}s limit",
            world.geometry().columns,
            world.geometry().rows,
            world.dogs_remaining(),
            def.time_limit,
        );
        Ok(world)
    }

    /// Seed from config, or a fresh random one.
    pub fn seed_for(config: &GameConfig) -> u64 {
        config.seed.unwrap_or_else(rand::random)
    }
}

/// Turn one layer definition into slots, spawning entities as needed.
fn build_layer(
    def: &LayerDef,
    rng: &mut Pcg32,
    entities: &mut BTreeMap<EntityId, Entity>,
    next_id: &mut u32,
) -> TileLayer {
    let geometry = GridGeometry::new(def.tile_size, def.columns(), def.row_count());
    let mut layer = TileLayer::new(def.atlas.clone(), geometry);

    for (col, row, ch) in def.cells() {
        let coord = TileCoord::new(col as i32, row as i32);
        let slot = match parse_code(ch) {
            None => {
                log::warn!("{}: unknown tile code {ch:?} at ({col}, {row})", def.name);
                continue;
            }
            Some(CellCode::Empty) => continue,
            Some(CellCode::Tile(TileKind::Water { .. })) => {
                Slot::Tile(TileKind::Water { ripple: rng.random_bool(WATER_RIPPLE_CHANCE) })
            }
            Some(CellCode::Tile(kind)) => Slot::Tile(kind),
            Some(CellCode::Spawn(spawn)) => {
                let kind = match spawn {
                    SpawnKind::Player => EntityKind::Player(Player::new()),
                    SpawnKind::Dog => EntityKind::Dog(Wanderer::new()),
                    SpawnKind::RedDog => EntityKind::RedDog(Wanderer::new()),
                    SpawnKind::Breakable(family) => EntityKind::Breakable(Breakable::new(pick_sweet(family, rng))),
                };
                let id = EntityId(*next_id);
                *next_id += 1;
                let category = Some(kind.category());
                entities.insert(id, Entity::new(id, kind, geometry.tile_to_world(coord)));
                Slot::Entity { id, category }
            }
        };
        layer.set(coord, slot);
    }
    layer
}

fn pick_sweet(family: BreakableFamily, rng: &mut Pcg32) -> Sweet {
    let variants = family.variants();
    match WeightedIndex::new(variants.iter().map(|(_, w)| *w)) {
        Ok(dist) => variants[dist.sample(rng)].0,
        Err(_) => variants[0].0,
    }
}

// ── Queries (collaborator interface) ──

impl World {
    /// Entity-layer geometry; the one dogs and the player move in.
    pub fn geometry(&self) -> GridGeometry {
        self.entity_layer.geometry
    }

    pub fn world_to_tile(&self, point: Vec2) -> TileCoord {
        self.geometry().world_to_tile(point)
    }

    pub fn tile_to_world(&self, coord: TileCoord) -> Vec2 {
        self.geometry().tile_to_world(coord)
    }

    pub fn is_valid_tile(&self, coord: TileCoord) -> bool {
        self.geometry().is_valid_tile(coord)
    }

    /// Overlay first, then background.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&Slot> {
        self.tiles.tile_at(coord)
    }

    pub fn tile_at_point(&self, point: Vec2) -> Option<&Slot> {
        self.tiles.tile_at_point(point)
    }

    pub fn has_any_property(&self, coord: TileCoord, mask: CategoryMask) -> bool {
        self.tiles.has_any_property(coord, mask)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn player(&self) -> Option<&Entity> {
        self.entities.get(&self.player)
    }

    /// Dogs and red dogs still to catch. Sinking red dogs no longer count.
    pub fn dogs_remaining(&self) -> usize {
        self.entities
            .values()
            .filter(|e| match &e.kind {
                EntityKind::Dog(w) | EntityKind::RedDog(w) => !w.is_sinking(),
                _ => false,
            })
            .count()
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn elapsed(&self) -> f64 {
        self.session.elapsed
    }

    pub fn remaining(&self) -> f64 {
        self.session.remaining()
    }

    /// Remove an entity from the roster, its layers and the scheduler.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.scheduler.forget(id);
        self.entity_layer.forget_entity(id);
        self.tiles.overlay.forget_entity(id);
        let mut entity = self.entities.remove(&id)?;
        entity.body.alive = false;
        log::debug!("despawned {id}");
        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::Category;

    fn level(bg: &[&str], dogs: &[&str], sweets: Option<&[&str]>) -> LevelDef {
        let tile = Vec2::new(32.0, 32.0);
        LevelDef {
            time_limit: 30.0,
            background: LayerDef::from_rows("bg", "background", tile, bg),
            dogs: LayerDef::from_rows("dogs", "characters", tile, dogs),
            breakables: sweets.map(|rows| LayerDef::from_rows("sweets", "background", tile, rows)),
        }
    }

    #[test]
    fn builds_roster_and_layers() {
        let def = level(
            &["===", "=w=", "=1="],
            &["b..", ".p.", "..f"],
            Some(&["t..", "...", "..."]),
        );
        let w = World::from_level(&def, &GameConfig::default(), 1).expect("builds");
        assert_eq!(w.dogs_remaining(), 2);
        assert_eq!(w.entities().filter(|e| matches!(e.kind, EntityKind::Breakable(_))).count(), 1);
        let player = w.player().expect("player");
        assert_eq!(w.world_to_tile(player.body.position), TileCoord::new(1, 1));
        assert!(w.has_any_property(TileCoord::new(1, 2), Category::Wall.into()));
        assert!(w.has_any_property(TileCoord::new(0, 0), Category::Breakable.into()));
        assert_eq!(w.state(), SessionState::NotStarted);
    }

    #[test]
    fn missing_player_is_an_error() {
        let def = level(&["=="], &["b."], None);
        assert!(matches!(
            World::from_level(&def, &GameConfig::default(), 1),
            Err(LevelError::MissingPlayer(_))
        ));
    }

    #[test]
    fn unknown_codes_are_skipped() {
        let def = level(&["=?="], &["p.b"], None);
        let w = World::from_level(&def, &GameConfig::default(), 1).expect("builds");
        assert!(w.tile_at(TileCoord::new(1, 0)).is_none());
        assert!(w.tile_at(TileCoord::new(0, 0)).is_some());
    }

    #[test]
    fn despawn_clears_everything() {
        let def = level(&["==="], &["pb."], None);
        let mut w = World::from_level(&def, &GameConfig::default(), 1).expect("builds");
        let dog = w.entities().find(|e| e.kind.is_dog()).map(|e| e.id).expect("dog");
        assert!(w.entity_layer.tile_at(TileCoord::new(1, 0)).is_some());
        w.scheduler.schedule(dog, 1.0, crate::sim::schedule::TaskAction::Walk);
        assert!(w.despawn(dog).is_some());
        assert_eq!(w.dogs_remaining(), 0);
        assert!(w.entity_layer.tile_at(TileCoord::new(1, 0)).is_none());
        assert!(w.scheduler.is_empty());
        assert!(w.despawn(dog).is_none());
    }

    #[test]
    fn same_seed_same_level() {
        let def = level(&["wwwwwwww", "wwwwwwww"], &["p.......", "........"], Some(&["tttttttt", "uuuuuuuu"]));
        let a = World::from_level(&def, &GameConfig::default(), 99).expect("builds");
        let b = World::from_level(&def, &GameConfig::default(), 99).expect("builds");
        let sweets = |w: &World| -> Vec<Sweet> {
            w.entities()
                .filter_map(|e| match &e.kind {
                    EntityKind::Breakable(b) => Some(b.sweet),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(sweets(&a), sweets(&b));
        for s in sweets(&a) {
            assert!(matches!(s, Sweet::Shortcake | Sweet::Choco | Sweet::House | Sweet::ApplePie | Sweet::MontBlanc));
        }
    }

    #[test]
    fn camera_centers_small_maps_and_follows_large_ones() {
        let mut cam = Camera { x: 0, y: 0, view_w: 10, view_h: 10 };
        cam.center_on(TileCoord::new(2, 2), 4, 4);
        assert_eq!((cam.x, cam.y), (-3, -3));

        cam.center_on(TileCoord::new(0, 0), 40, 40);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.follow(TileCoord::new(9, 0), 40, 40);
        assert_eq!(cam.x, 9 - 10 + 2 + 1);
        assert_eq!(cam.tile_to_view(TileCoord::new(9, 0)), Some((7, 0)));
        assert_eq!(cam.view_to_tile(7, 0), TileCoord::new(9, 0));
    }
}
