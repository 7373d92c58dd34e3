/// Events emitted during a simulation step.
/// The presentation layer consumes these for animation/sound.

use glam::Vec2;

use crate::domain::entity::{EntityId, FacingVisual, FlyAway};
use super::contact::Impact;
use super::session::Outcome;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    SessionStarted,
    /// Player accepted a touch and is heading for `target`.
    PlayerMoved { target: Vec2 },
    FacingChanged { entity: EntityId, visual: FacingVisual, rotation: f32 },
    /// Dog drained from the removal queue. `scale` grows with the tier.
    DogCaught { entity: EntityId, position: Vec2, tier: u32, scale: f32 },
    Smashed { entity: EntityId, fragment: FlyAway },
    RedDogKicked { entity: EntityId },
    Impact(Impact),
    /// Red dog left the roster and started its drowning animation.
    DogSinking { entity: EntityId },
    /// Sinking finished; entity despawned.
    DogDrowned { entity: EntityId },
    TimeRunningOut,
    LevelEnded(Outcome),
}

impl GameEvent {
    /// Seconds a caught dog stays on screen while its catch effect plays.
    pub const CATCH_EFFECT_SECS: f32 = 1.3;
}
