/// The step function: advances the world by one frame.
///
/// Processing order:
///   1. Clock (only while the session is active)
///   2. Session tick: timeout, then empty roster
///   3. Low-time warning
///   4. Touch (the first one starts the session, then moves the player)
///   5. Contact dispatch (catches are only queued here)
///   6. Scheduled AI continuations
///   7. Continuous behavior updates (tweens, sinking)
///   8. Despawns requested by behaviors
///   9. Removal queue drain + combo
///
/// Contacts come from the physics collaborator for the frame that just ran.
/// A win is therefore detected on the tick after the last dog is drained,
/// and a timeout on that tick beats any contact still in flight.

use glam::Vec2;

use crate::domain::entity::{Body, EntityId, EntityKind};
use super::behavior::{behavior_of, BehaviorCtx};
use super::contact::{ContactEvent, DomainAction};
use super::event::GameEvent;
use super::session::{Combo, Outcome};
use super::world::World;

/// Player input for one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    /// Touch point in world space.
    pub touch: Option<Vec2>,
}

/// Linear damping applied to the player once the level is over.
const END_OF_LEVEL_DAMPING: f32 = 1.0;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut World, dt: f32, input: &FrameInput, contacts: &[ContactEvent]) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    if world.session.is_ended() { return events; }

    if world.session.is_active() {
        world.now += dt as f64;
    }
    if let Some(outcome) = world.session.tick(world.now, world.dogs_remaining()) {
        end_level(world, outcome, &mut events);
        return events;
    }
    if world.session.take_low_time_warning(world.config.warning_secs) {
        log::info!("{:.1}s left", world.remaining());
        events.push(GameEvent::TimeRunningOut);
    }

    if let Some(target) = input.touch {
        resolve_touch(world, target, &mut events);
    }
    if !world.session.is_active() { return events; }

    resolve_contacts(world, contacts, &mut events);
    let mut despawn = Vec::new();
    run_due_tasks(world, &mut events, &mut despawn);
    advance_behaviors(world, dt);
    for id in despawn {
        world.despawn(id);
    }
    drain_removals(world, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// Helpers: behavior context
// ══════════════════════════════════════════════════════════════

/// Run `f` on one entity's kind and body with a context borrowing the rest
/// of the world. Returns `None` if the entity is gone.
fn with_entity<T>(
    world: &mut World,
    id: EntityId,
    events: &mut Vec<GameEvent>,
    despawn: &mut Vec<EntityId>,
    f: impl FnOnce(&mut EntityKind, &mut Body, &mut BehaviorCtx<'_>) -> T,
) -> Option<T> {
    let World { tiles, entity_layer, entities, scheduler, rng, config, now, .. } = world;
    let entity = entities.get_mut(&id)?;
    let mut ctx = BehaviorCtx {
        now: *now,
        tiles,
        geometry: entity_layer.geometry,
        speed: &config.speed,
        scheduler,
        rng,
        events,
        despawn,
    };
    Some(f(&mut entity.kind, &mut entity.body, &mut ctx))
}

// ══════════════════════════════════════════════════════════════
// Session
// ══════════════════════════════════════════════════════════════

fn end_level(world: &mut World, outcome: Outcome, events: &mut Vec<GameEvent>) {
    if let Some(player) = world.entities.get_mut(&world.player) {
        player.body.linear_damping = END_OF_LEVEL_DAMPING;
    }
    world.removals.drain();
    events.push(GameEvent::LevelEnded(outcome));
}

/// Start every entity's behavior. Runs once, on the first touch.
fn start_session(world: &mut World, events: &mut Vec<GameEvent>) {
    if !world.session.start(world.now) { return; }
    events.push(GameEvent::SessionStarted);

    let ids: Vec<EntityId> = world.entities.keys().copied().collect();
    let mut despawn = Vec::new();
    for id in ids {
        with_entity(world, id, events, &mut despawn, |kind, body, ctx| {
            behavior_of(kind).start(id, body, ctx);
        });
    }
}

// ══════════════════════════════════════════════════════════════
// Touch
// ══════════════════════════════════════════════════════════════

fn resolve_touch(world: &mut World, target: Vec2, events: &mut Vec<GameEvent>) {
    start_session(world, events);
    if !world.session.is_active() { return; }

    let speed = world.config.speed.player_speed;
    let Some(entity) = world.entities.get_mut(&world.player) else { return };
    let EntityKind::Player(player) = &mut entity.kind else { return };
    let before = entity.body.visual.clone();
    let visual = player.move_toward(&mut entity.body, target, speed);
    events.push(GameEvent::PlayerMoved { target });
    if visual != before {
        events.push(GameEvent::FacingChanged { entity: entity.id, visual, rotation: entity.body.rotation });
    }
}

// ══════════════════════════════════════════════════════════════
// Contacts
// ══════════════════════════════════════════════════════════════

fn resolve_contacts(world: &mut World, contacts: &[ContactEvent], events: &mut Vec<GameEvent>) {
    let player_collides = world
        .player()
        .map(|p| p.body.collision_mask())
        .unwrap_or_default();

    for event in contacts {
        let Some(action) = world.resolver.interpret(event, player_collides) else { continue };
        log::debug!("contact {:?} × {:?} → {action:?}", event.a.category, event.b.category);
        match action {
            DomainAction::QueueRemoval(id) => {
                world.removals.push(id);
            }
            DomainAction::Smash(id) => smash(world, id, events),
            DomainAction::Kick(id) => kick(world, id, events),
            DomainAction::Impact(impact) => events.push(GameEvent::Impact(impact)),
            DomainAction::Reface => reface_player(world, events),
        }
    }
}

fn smash(world: &mut World, id: EntityId, events: &mut Vec<GameEvent>) {
    let World { entities, tiles, rng, .. } = world;
    let Some(entity) = entities.get_mut(&id) else { return };
    let EntityKind::Breakable(breakable) = &mut entity.kind else { return };
    if let Some(fragment) = breakable.smash(&mut entity.body, rng) {
        tiles.overlay.set_entity_category(id, None);
        events.push(GameEvent::Smashed { entity: id, fragment });
    }
}

fn kick(world: &mut World, id: EntityId, events: &mut Vec<GameEvent>) {
    let mut despawn = Vec::new();
    let kicked = with_entity(world, id, events, &mut despawn, |kind, _body, ctx| match kind {
        EntityKind::RedDog(wanderer) => wanderer.kick(id, ctx),
        _ => false,
    });
    if kicked == Some(true) {
        events.push(GameEvent::RedDogKicked { entity: id });
    }
}

fn reface_player(world: &mut World, events: &mut Vec<GameEvent>) {
    let Some(entity) = world.entities.get_mut(&world.player) else { return };
    let EntityKind::Player(player) = &entity.kind else { return };
    let before = entity.body.visual.clone();
    let visual = player.face_current_direction(&mut entity.body);
    if visual != before {
        events.push(GameEvent::FacingChanged { entity: entity.id, visual, rotation: entity.body.rotation });
    }
}

// ══════════════════════════════════════════════════════════════
// Behaviors
// ══════════════════════════════════════════════════════════════

fn run_due_tasks(world: &mut World, events: &mut Vec<GameEvent>, despawn: &mut Vec<EntityId>) {
    for (id, task) in world.scheduler.take_due(world.now) {
        with_entity(world, id, events, despawn, |kind, body, ctx| {
            behavior_of(kind).on_task(id, task, body, ctx);
        });
    }
}

fn advance_behaviors(world: &mut World, dt: f32) {
    for entity in world.entities.values_mut() {
        behavior_of(&mut entity.kind).advance(entity.id, &mut entity.body, dt);
    }
}

// ══════════════════════════════════════════════════════════════
// Removal queue
// ══════════════════════════════════════════════════════════════

fn drain_removals(world: &mut World, events: &mut Vec<GameEvent>) {
    for id in world.removals.drain() {
        let Some(entity) = world.despawn(id) else { continue };
        let tier = world.session.combo.register(world.now);
        log::debug!("caught {id}, combo tier {tier}");
        events.push(GameEvent::DogCaught {
            entity: id,
            position: entity.body.position,
            tier,
            scale: Combo::catch_scale(tier),
        });
    }
}
