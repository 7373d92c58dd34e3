/// Arcade physics: the stand-in engine behind the terminal front end.
///
/// Kinematic only. Dynamic bodies (player, red dogs) are circles; tiles and
/// breakables are axis-aligned boxes one tile wide. Every rule comes from the
/// category table:
///   - a dynamic body is pushed out of anything its profile is blocked by and
///     its velocity reflected (restitution 1 for the player, 0 otherwise)
///   - a pair raises begin/end contacts when either profile reports the other
///   - the player shoves red dogs it runs into (knock-back)
///
/// Contacts are diffed against the previous frame, so each touch yields one
/// Begin and, once the bodies part, one End.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::domain::category::{BodyProfile, Category};
use crate::domain::coords::TileCoord;
use crate::domain::entity::{Body, Entity, EntityId, EntityKind, Player};
use super::contact::{BodyRef, ContactBody, ContactEvent};
use super::grid::{Slot, TileMap};
use super::session::SessionState;
use super::world::World;

/// Gap under which two resting bodies still count as touching.
const CONTACT_SLOP: f32 = 1.0;
/// Dog and red dog radius as a fraction of the smaller tile side.
const DOG_RADIUS_FACTOR: f32 = 0.4;
const MAX_SUBSTEPS: f32 = 16.0;
/// Minimum speed a red dog is shoved away with.
const KNOCKBACK_MIN: f32 = 120.0;

type PairKey = (BodyRef, BodyRef);

/// Order-independent key for a pair of bodies.
fn pair_key(a: &ContactBody, b: &ContactBody) -> PairKey {
    if a.handle <= b.handle { (a.handle, b.handle) } else { (b.handle, a.handle) }
}

// ══════════════════════════════════════════════════════════════
// Shapes
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Debug)]
enum Shape {
    Circle(f32),
    /// Half extents.
    Box(Vec2),
}

impl Shape {
    fn of(kind: &EntityKind, tile: Vec2) -> Shape {
        match kind {
            EntityKind::Player(_) => Shape::Circle(Player::body_radius(tile)),
            EntityKind::Dog(_) | EntityKind::RedDog(_) => Shape::Circle(tile.x.min(tile.y) * DOG_RADIUS_FACTOR),
            EntityKind::Breakable(_) => Shape::Box(tile / 2.0),
        }
    }
}

/// Distance between two surfaces along `normal` (pointing from the other
/// body toward the circle). Negative `gap` means overlap.
#[derive(Clone, Copy, Debug)]
struct Separation {
    normal: Vec2,
    gap: f32,
}

fn circle_circle(pa: Vec2, ra: f32, pb: Vec2, rb: f32) -> Separation {
    let diff = pa - pb;
    let dist = diff.length();
    let normal = if dist > f32::EPSILON { diff / dist } else { Vec2::X };
    Separation { normal, gap: dist - ra - rb }
}

fn circle_box(center: Vec2, radius: f32, box_center: Vec2, half: Vec2) -> Separation {
    let closest = center.clamp(box_center - half, box_center + half);
    let diff = center - closest;
    let dist = diff.length();
    if dist > f32::EPSILON {
        return Separation { normal: diff / dist, gap: dist - radius };
    }
    // center inside the box: leave through the nearest face
    let local = center - box_center;
    let depth = half - local.abs();
    if depth.x < depth.y {
        Separation { normal: Vec2::new(local.x.signum(), 0.0), gap: -(depth.x + radius) }
    } else {
        Separation { normal: Vec2::new(0.0, local.y.signum()), gap: -(depth.y + radius) }
    }
}

/// Reflect the part of `velocity` heading into the surface.
fn bounce(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let into = velocity.dot(normal);
    if into >= 0.0 {
        return velocity;
    }
    velocity - (1.0 + restitution) * into * normal
}

fn restitution_of(category: Category) -> f32 {
    match category {
        Category::Player => 1.0,
        _ => 0.0,
    }
}

// ══════════════════════════════════════════════════════════════
// Static bodies
// ══════════════════════════════════════════════════════════════

/// A tile-sized body from the background or overlay layer.
#[derive(Clone, Copy, Debug)]
struct StaticBody {
    category: Category,
    handle: BodyRef,
    center: Vec2,
}

/// Static bodies whose tiles overlap the square of half-size `reach`
/// around `point`.
fn statics_near(tiles: &TileMap, point: Vec2, reach: f32) -> Vec<StaticBody> {
    let geometry = tiles.geometry();
    let a = geometry.world_to_tile(point - Vec2::splat(reach));
    let b = geometry.world_to_tile(point + Vec2::splat(reach));
    let mut found = Vec::new();
    for row in a.row.min(b.row)..=a.row.max(b.row) {
        for col in a.col.min(b.col)..=a.col.max(b.col) {
            let coord = TileCoord::new(col, row);
            for layer in [&tiles.background, &tiles.overlay] {
                let Some(slot) = layer.tile_at(coord) else { continue };
                let Some(category) = slot.category() else { continue };
                let handle = match *slot {
                    Slot::Entity { id, .. } => BodyRef::Entity(id),
                    _ => BodyRef::Tile(coord),
                };
                found.push(StaticBody { category, handle, center: geometry.tile_to_world(coord) });
            }
        }
    }
    found
}

fn near_boundary(position: Vec2, radius: f32, size: Vec2) -> bool {
    position.x - radius <= CONTACT_SLOP
        || position.y - radius <= CONTACT_SLOP
        || size.x - position.x - radius <= CONTACT_SLOP
        || size.y - position.y - radius <= CONTACT_SLOP
}

fn contact_body(entity: &Entity, category: Category) -> ContactBody {
    ContactBody { category, handle: BodyRef::Entity(entity.id), position: entity.body.position }
}

// ══════════════════════════════════════════════════════════════
// Engine
// ══════════════════════════════════════════════════════════════

#[derive(Default, Debug)]
pub struct ArcadePhysics {
    touching: BTreeMap<PairKey, ContactEvent>,
}

impl ArcadePhysics {
    pub fn new() -> Self {
        ArcadePhysics::default()
    }

    /// Forget every open contact (level reload).
    pub fn reset(&mut self) {
        self.touching.clear();
    }

    /// Integrate one frame and return the contact changes it produced.
    /// Nothing moves before the session starts.
    pub fn step(&mut self, world: &mut World, dt: f32) -> Vec<ContactEvent> {
        if world.state() == SessionState::NotStarted {
            return Vec::new();
        }
        let mut touching = BTreeMap::new();
        let ids: Vec<EntityId> = world.entities.keys().copied().collect();
        for &id in &ids {
            integrate(world, id, dt, &mut touching);
        }
        knock_back(world, &ids, &mut touching);
        collect_overlaps(world, &mut touching);
        self.diff(touching)
    }

    fn diff(&mut self, touching: BTreeMap<PairKey, ContactEvent>) -> Vec<ContactEvent> {
        let mut events = Vec::new();
        for (key, event) in &self.touching {
            if !touching.contains_key(key) {
                events.push(ContactEvent::end(event.a, event.b));
            }
        }
        for (key, event) in &touching {
            if !self.touching.contains_key(key) {
                events.push(*event);
            }
        }
        self.touching = touching;
        events
    }
}

fn integrate(world: &mut World, id: EntityId, dt: f32, touching: &mut BTreeMap<PairKey, ContactEvent>) {
    let World { tiles, entities, .. } = world;
    let Some(entity) = entities.get_mut(&id) else { return };
    let Some(profile) = entity.body.profile() else { return };
    if !profile.dynamic { return; }
    let Shape::Circle(radius) = Shape::of(&entity.kind, tiles.geometry().tile_size) else { return };

    let body = &mut entity.body;
    body.velocity *= (1.0 - body.linear_damping * dt).max(0.0);
    if body.velocity == Vec2::ZERO { return; }

    let travel = body.velocity.length() * dt;
    let substeps = (travel / (radius * 0.5)).ceil().clamp(1.0, MAX_SUBSTEPS);
    let h = dt / substeps;
    for _ in 0..substeps as u32 {
        body.position += body.velocity * h;
        for hit in block_against_tiles(tiles, body, radius, profile) {
            let other = ContactBody { category: hit.category, handle: hit.handle, position: hit.center };
            if profile.reports_contact_with(hit.category.profile()) {
                let me = ContactBody { category: profile.category, handle: BodyRef::Entity(id), position: body.position };
                touching.insert(pair_key(&me, &other), ContactEvent::begin(me, other));
            }
        }
        if block_against_boundary(tiles.geometry().layer_size(), body, radius, profile)
            && profile.reports_contact_with(Category::Boundary.profile())
        {
            let me = ContactBody { category: profile.category, handle: BodyRef::Entity(id), position: body.position };
            let edge = ContactBody { category: Category::Boundary, handle: BodyRef::Boundary, position: body.position };
            touching.insert(pair_key(&me, &edge), ContactEvent::begin(me, edge));
        }
    }
}

/// Push `body` out of every blocking tile it overlaps. Returns the tiles hit.
fn block_against_tiles(tiles: &TileMap, body: &mut Body, radius: f32, profile: &BodyProfile) -> Vec<StaticBody> {
    let half = tiles.geometry().tile_size / 2.0;
    let restitution = restitution_of(profile.category);
    let mut hits = Vec::new();
    for other in statics_near(tiles, body.position, radius) {
        if !profile.blocked_by(other.category) { continue; }
        let sep = circle_box(body.position, radius, other.center, half);
        if sep.gap < 0.0 {
            body.position -= sep.normal * sep.gap;
            body.velocity = bounce(body.velocity, sep.normal, restitution);
            hits.push(other);
        }
    }
    hits
}

/// Keep `body` inside the layer. Returns whether an edge was hit.
fn block_against_boundary(size: Vec2, body: &mut Body, radius: f32, profile: &BodyProfile) -> bool {
    if !profile.blocked_by(Category::Boundary) { return false; }
    let restitution = restitution_of(profile.category);
    let mut hit = false;
    for (normal, gap) in [
        (Vec2::X, body.position.x - radius),
        (Vec2::Y, body.position.y - radius),
        (Vec2::NEG_X, size.x - body.position.x - radius),
        (Vec2::NEG_Y, size.y - body.position.y - radius),
    ] {
        if gap < 0.0 {
            body.position -= normal * gap;
            body.velocity = bounce(body.velocity, normal, restitution);
            hit = true;
        }
    }
    hit
}

/// The player shoves overlapping red dogs away and bounces off them.
fn knock_back(world: &mut World, ids: &[EntityId], touching: &mut BTreeMap<PairKey, ContactEvent>) {
    let tile = world.tiles.geometry().tile_size;
    let Some(player) = world.player() else { return };
    let Some(player_profile) = player.body.profile() else { return };
    let Shape::Circle(player_radius) = Shape::of(&player.kind, tile) else { return };
    let (player_id, mut position, mut velocity) = (player.id, player.body.position, player.body.velocity);

    for &id in ids {
        let Some(dog) = world.entities.get_mut(&id) else { continue };
        let Some(profile) = dog.body.profile() else { continue };
        if !(player_profile.blocked_by(profile.category) && profile.blocked_by(Category::Player)) { continue; }
        let Shape::Circle(radius) = Shape::of(&dog.kind, tile) else { continue };

        let sep = circle_circle(dog.body.position, radius, position, player_radius);
        if sep.gap >= 0.0 { continue; }
        dog.body.position -= sep.normal * sep.gap;
        let push = velocity.dot(sep.normal).max(KNOCKBACK_MIN);
        dog.body.velocity = sep.normal * push;
        velocity = bounce(velocity, -sep.normal, restitution_of(Category::Player));
        log::debug!("{id} knocked back at {push:.0}");

        if player_profile.reports_contact_with(profile) {
            let me = ContactBody { category: Category::Player, handle: BodyRef::Entity(player_id), position };
            let other = contact_body(dog, profile.category);
            touching.insert(pair_key(&me, &other), ContactEvent::begin(me, other));
        }
    }

    if let Some(player) = world.entities.get_mut(&player_id) {
        player.body.position = position;
        player.body.velocity = velocity;
    }
}

/// Resting contacts: bodies within `CONTACT_SLOP` of each other.
fn collect_overlaps(world: &World, touching: &mut BTreeMap<PairKey, ContactEvent>) {
    let tile = world.tiles.geometry().tile_size;
    let size = world.tiles.geometry().layer_size();
    let movers: Vec<(&Entity, &BodyProfile, f32)> = world
        .entities()
        .filter_map(|e| {
            let profile = e.body.profile()?;
            match Shape::of(&e.kind, tile) {
                Shape::Circle(radius) => Some((e, profile, radius)),
                Shape::Box(_) => None,
            }
        })
        .collect();

    for (i, &(a, pa, ra)) in movers.iter().enumerate() {
        let me = contact_body(a, pa.category);

        for other in statics_near(&world.tiles, a.body.position, ra + CONTACT_SLOP) {
            if !pa.reports_contact_with(other.category.profile()) { continue; }
            if circle_box(a.body.position, ra, other.center, tile / 2.0).gap > CONTACT_SLOP { continue; }
            let body = ContactBody { category: other.category, handle: other.handle, position: other.center };
            touching.entry(pair_key(&me, &body)).or_insert(ContactEvent::begin(me, body));
        }

        if pa.reports_contact_with(Category::Boundary.profile()) && near_boundary(a.body.position, ra, size) {
            let edge = ContactBody { category: Category::Boundary, handle: BodyRef::Boundary, position: a.body.position };
            touching.entry(pair_key(&me, &edge)).or_insert(ContactEvent::begin(me, edge));
        }

        for &(b, pb, rb) in &movers[i + 1..] {
            if !pa.reports_contact_with(pb) { continue; }
            if circle_circle(a.body.position, ra, b.body.position, rb).gap > CONTACT_SLOP { continue; }
            let them = contact_body(b, pb.category);
            touching.entry(pair_key(&me, &them)).or_insert(ContactEvent::begin(me, them));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::contact::ContactPhase;
    use crate::sim::level::{LayerDef, LevelDef};

    fn world(bg: &[&str], dogs: &[&str], sweets: Option<&[&str]>) -> World {
        let tile = Vec2::new(32.0, 32.0);
        let def = LevelDef {
            time_limit: 30.0,
            background: LayerDef::from_rows("bg", "background", tile, bg),
            dogs: LayerDef::from_rows("dogs", "characters", tile, dogs),
            breakables: sweets.map(|rows| LayerDef::from_rows("sweets", "background", tile, rows)),
        };
        let mut w = World::from_level(&def, &GameConfig::default(), 5).expect("builds");
        w.session.start(0.0);
        w
    }

    fn push_player(w: &mut World, velocity: Vec2) {
        let id = w.player;
        if let Some(p) = w.entities.get_mut(&id) {
            p.body.velocity = velocity;
        }
    }

    fn run(physics: &mut ArcadePhysics, w: &mut World, frames: usize) -> Vec<ContactEvent> {
        (0..frames).flat_map(|_| physics.step(w, 0.016)).collect()
    }

    fn begins_with(events: &[ContactEvent], category: Category) -> usize {
        events
            .iter()
            .filter(|e| e.phase == ContactPhase::Begin && e.b.category == category)
            .count()
    }

    #[test]
    fn circle_box_separation() {
        let half = Vec2::splat(16.0);
        let sep = circle_box(Vec2::new(-10.0, 0.0), 8.0, Vec2::new(16.0, 0.0), half);
        assert_eq!(sep.normal, Vec2::NEG_X);
        assert!((sep.gap - 2.0).abs() < 1e-5);

        let inside = circle_box(Vec2::new(14.0, 1.0), 8.0, Vec2::ZERO, half);
        assert_eq!(inside.normal, Vec2::X);
        assert!((inside.gap + 10.0).abs() < 1e-5);
    }

    #[test]
    fn bounce_keeps_speed_with_full_restitution() {
        assert_eq!(bounce(Vec2::new(350.0, 0.0), Vec2::NEG_X, 1.0), Vec2::new(-350.0, 0.0));
        assert_eq!(bounce(Vec2::new(350.0, 0.0), Vec2::NEG_X, 0.0), Vec2::ZERO);
        // moving away already
        assert_eq!(bounce(Vec2::new(-5.0, 0.0), Vec2::NEG_X, 1.0), Vec2::new(-5.0, 0.0));
    }

    #[test]
    fn paused_before_the_session_starts() {
        let tile = Vec2::new(32.0, 32.0);
        let def = LevelDef {
            time_limit: 30.0,
            background: LayerDef::from_rows("bg", "background", tile, &["=1"]),
            dogs: LayerDef::from_rows("dogs", "characters", tile, &["p."]),
            breakables: None,
        };
        let mut w = World::from_level(&def, &GameConfig::default(), 5).expect("builds");
        push_player(&mut w, Vec2::new(350.0, 0.0));
        let before = w.player().map(|p| p.body.position);
        assert!(ArcadePhysics::new().step(&mut w, 0.016).is_empty());
        assert_eq!(w.player().map(|p| p.body.position), before);
    }

    #[test]
    fn player_bounces_off_a_wall() {
        let mut w = world(&["=1"], &["p."], None);
        push_player(&mut w, Vec2::new(350.0, 0.0));
        let mut physics = ArcadePhysics::new();
        let events = run(&mut physics, &mut w, 3);

        let player = w.player().expect("player");
        assert!((player.body.velocity.x + 350.0).abs() < 1e-3);
        assert_eq!(player.body.velocity.y, 0.0);
        assert!(player.body.position.x + 8.0 <= 32.0);
        assert_eq!(begins_with(&events, Category::Wall), 1);
        let wall = events.iter().find(|e| e.b.category == Category::Wall).expect("wall contact");
        assert_eq!(wall.b.handle, BodyRef::Tile(TileCoord::new(1, 0)));
        assert!(events.iter().any(|e| e.phase == ContactPhase::End && e.b.category == Category::Wall));
    }

    #[test]
    fn boundary_blocks_and_reports() {
        let mut w = world(&["=="], &["p."], None);
        push_player(&mut w, Vec2::new(-350.0, 0.0));
        let mut physics = ArcadePhysics::new();
        let events = run(&mut physics, &mut w, 3);
        let player = w.player().expect("player");
        assert!(player.body.position.x >= 8.0);
        assert!(player.body.velocity.x > 0.0);
        assert!(begins_with(&events, Category::Boundary) >= 1);
    }

    #[test]
    fn player_passes_through_breakables_with_a_contact() {
        let mut w = world(&["===="], &["p..."], Some(&[".t.."]));
        push_player(&mut w, Vec2::new(350.0, 0.0));
        let mut physics = ArcadePhysics::new();
        let events = run(&mut physics, &mut w, 3);

        assert_eq!(begins_with(&events, Category::Breakable), 1);
        let sweet = w.entities().find(|e| matches!(e.kind, EntityKind::Breakable(_))).map(|e| e.id);
        let contact = events.iter().find(|e| e.b.category == Category::Breakable).expect("contact");
        assert_eq!(Some(contact.b.handle), sweet.map(BodyRef::Entity));
        assert_eq!(w.player().map(|p| p.body.velocity), Some(Vec2::new(350.0, 0.0)));
    }

    #[test]
    fn red_dog_is_knocked_back_and_slows_down() {
        let mut w = world(&["======"], &["pf...."], None);
        push_player(&mut w, Vec2::new(350.0, 0.0));
        let mut physics = ArcadePhysics::new();
        let events = run(&mut physics, &mut w, 4);
        assert_eq!(begins_with(&events, Category::RedDog), 1);

        let red = w.entities().find(|e| matches!(e.kind, EntityKind::RedDog(_))).expect("red dog");
        let kicked = red.body.velocity.x;
        assert!(kicked > 0.0);
        assert!(w.player().is_some_and(|p| p.body.velocity.x < 0.0));

        let red_id = red.id;
        physics.step(&mut w, 0.1);
        let slowed = w.entity(red_id).map(|e| e.body.velocity.x).unwrap_or_default();
        assert!(slowed < kicked && slowed >= 0.0);
    }

    #[test]
    fn plain_dogs_only_report_contacts() {
        let mut w = world(&["===="], &["pb.."], None);
        push_player(&mut w, Vec2::new(350.0, 0.0));
        let mut physics = ArcadePhysics::new();
        let events = run(&mut physics, &mut w, 3);
        assert_eq!(begins_with(&events, Category::Dog), 1);
        assert_eq!(w.player().map(|p| p.body.velocity), Some(Vec2::new(350.0, 0.0)));
    }
}
