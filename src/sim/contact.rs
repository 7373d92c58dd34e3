/// Contact resolver: turns contact-begin/end events from the physics engine
/// into domain actions.
///
/// Dispatch is driven by `category::contact_response`, keyed on the body that
/// is not the player. Events without a player body are ignored, and each
/// event yields at most one action. Dog catches are not applied here; they
/// go through `RemovalQueue`, which the step drains after all contacts.

use std::f32::consts::{FRAC_PI_4, PI};

use glam::Vec2;

use crate::domain::category::{contact_response, uses_edge_proximity, Category, CategoryMask, ContactResponse, SPLASHES};
use crate::domain::coords::TileCoord;
use crate::domain::entity::EntityId;

/// What a contact body refers to in the world.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BodyRef {
    Boundary,
    Tile(TileCoord),
    Entity(EntityId),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ContactBody {
    pub category: Category,
    pub handle: BodyRef,
    pub position: Vec2,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContactPhase {
    Begin,
    End,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    pub a: ContactBody,
    pub b: ContactBody,
}

impl ContactEvent {
    pub fn begin(a: ContactBody, b: ContactBody) -> Self {
        ContactEvent { phase: ContactPhase::Begin, a, b }
    }

    pub fn end(a: ContactBody, b: ContactBody) -> Self {
        ContactEvent { phase: ContactPhase::End, a, b }
    }

    /// `(player, other)`, or `None` when neither body is the player.
    pub fn split_player(&self) -> Option<(&ContactBody, &ContactBody)> {
        if self.a.category == Category::Player {
            Some((&self.a, &self.b))
        } else if self.b.category == Category::Player {
            Some((&self.b, &self.a))
        } else {
            None
        }
    }
}

/// Side of the player that hit an obstacle. Discriminants index the
/// per-side offset tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Right = 0,
    Top = 1,
    Left = 2,
    Bottom = 3,
}

impl Side {
    /// Unit offset toward this side (y up).
    pub fn unit(self) -> Vec2 {
        const OFFSETS: [Vec2; 4] = [
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, -1.0),
        ];
        OFFSETS[self as usize]
    }

    /// Player scale at the start of a squash. Top/Bottom widen, Left/Right
    /// stretch tall.
    pub fn squash_scale(self, factor: f32) -> Vec2 {
        match self {
            Side::Top | Side::Bottom => Vec2::new(factor, 1.0 / factor),
            Side::Left | Side::Right => Vec2::new(1.0 / factor, factor),
        }
    }
}

/// Side from the direction player → obstacle.
pub fn side_from_angle(diff: Vec2) -> Side {
    let angle = diff.y.atan2(diff.x);
    if angle > -FRAC_PI_4 && angle <= FRAC_PI_4 {
        Side::Right
    } else if angle > FRAC_PI_4 && angle <= 3.0 * PI / 4.0 {
        Side::Top
    } else if angle <= -FRAC_PI_4 && angle > -3.0 * PI / 4.0 {
        Side::Bottom
    } else {
        Side::Left
    }
}

/// Side for a boundary hit, from the player's distance to the layer edges.
pub fn side_from_edges(player: Vec2, layer_size: Vec2, margin: f32) -> Side {
    if player.x < margin {
        Side::Left
    } else if player.y < margin {
        Side::Bottom
    } else if player.x > layer_size.x - margin {
        Side::Right
    } else {
        Side::Top
    }
}

/// Cosmetic response to the player hitting a static obstacle.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Impact {
    pub side: Side,
    pub obstacle: BodyRef,
    pub squash: Vec2,
    /// Screen shake amplitude and direction.
    pub shake: Vec2,
    /// Temporary displacement of the struck tile; `None` for the boundary.
    pub nudge: Option<Vec2>,
    pub water: bool,
}

impl Impact {
    pub const SQUASH_FACTOR: f32 = 1.6;
    pub const BOUNDARY_SHAKE: f32 = 20.0;
    pub const TILE_SHAKE: f32 = 8.0;
    pub const NUDGE: f32 = 4.0;
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum DomainAction {
    QueueRemoval(EntityId),
    Smash(EntityId),
    Kick(EntityId),
    Impact(Impact),
    /// Re-derive the player's facing from its velocity.
    Reface,
}

#[derive(Clone, Copy, Debug)]
pub struct ContactResolver {
    pub layer_size: Vec2,
    pub boundary_margin: f32,
}

impl ContactResolver {
    pub fn new(layer_size: Vec2, boundary_margin: f32) -> Self {
        ContactResolver { layer_size, boundary_margin }
    }

    /// `player_collides` is the player's collision mask; an ending contact
    /// with one of those categories means the player bounced.
    pub fn interpret(&self, event: &ContactEvent, player_collides: CategoryMask) -> Option<DomainAction> {
        let (player, other) = event.split_player()?;
        match event.phase {
            ContactPhase::End => player_collides.contains(other.category).then_some(DomainAction::Reface),
            ContactPhase::Begin => match (contact_response(other.category), other.handle) {
                (ContactResponse::CatchDog, BodyRef::Entity(id)) => Some(DomainAction::QueueRemoval(id)),
                (ContactResponse::Smash, BodyRef::Entity(id)) => Some(DomainAction::Smash(id)),
                (ContactResponse::Kick, BodyRef::Entity(id)) => Some(DomainAction::Kick(id)),
                (ContactResponse::Impact, handle) => Some(DomainAction::Impact(self.impact(player, other, handle))),
                _ => None,
            },
        }
    }

    fn impact(&self, player: &ContactBody, other: &ContactBody, handle: BodyRef) -> Impact {
        let boundary = uses_edge_proximity(other.category);
        let side = if boundary {
            side_from_edges(player.position, self.layer_size, self.boundary_margin)
        } else {
            side_from_angle(other.position - player.position)
        };
        let power = if boundary { Impact::BOUNDARY_SHAKE } else { Impact::TILE_SHAKE };
        Impact {
            side,
            obstacle: handle,
            squash: side.squash_scale(Impact::SQUASH_FACTOR),
            shake: side.unit() * power,
            nudge: (!boundary).then(|| side.unit() * Impact::NUDGE),
            water: SPLASHES.contains(other.category),
        }
    }
}

/// Dogs caught this step, removed only after contact dispatch finishes.
#[derive(Default, Debug)]
pub struct RemovalQueue {
    pending: Vec<EntityId>,
}

impl RemovalQueue {
    /// Returns false if `id` was already queued.
    pub fn push(&mut self, id: EntityId) -> bool {
        if self.pending.contains(&id) {
            return false;
        }
        self.pending.push(id);
        true
    }

    pub fn drain(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.pending)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
