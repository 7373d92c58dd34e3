/// Dog wander AI: one random step per cycle, retried after a jittered pause
/// when the chosen tile is out of bounds or blocked.
///
/// Terrain = what the tile IS (wall, water), queried through `Terrain` so the
/// AI never touches layers directly.

use std::f32::consts::FRAC_PI_4;

use rand::Rng;

use super::category::{CategoryMask, WANDER_BLOCKERS};
use super::coords::TileCoord;
use super::entity::Facing;

/// Read-only tile queries the AI needs.
pub trait Terrain {
    fn is_valid_tile(&self, coord: TileCoord) -> bool;
    fn has_any_property(&self, coord: TileCoord, mask: CategoryMask) -> bool;
}

/// Outcome of one wander cycle.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum WanderStep {
    /// Walk to `target`; `offset` is the `(dc, dr)` that was rolled.
    MoveTo { target: TileCoord, offset: (i32, i32) },
    /// Blocked: wait this many seconds and roll again.
    Retry { delay: f32 },
}

/// Independent roll of -1, 0 or 1 on each axis.
pub fn pick_offset<R: Rng>(rng: &mut R) -> (i32, i32) {
    (rng.random_range(-1..=1), rng.random_range(-1..=1))
}

/// A dog may step onto in-bounds tiles that are neither wall nor water.
pub fn can_enter<T: Terrain + ?Sized>(terrain: &T, coord: TileCoord) -> bool {
    terrain.is_valid_tile(coord) && !terrain.has_any_property(coord, WANDER_BLOCKERS)
}

/// Pause before a retry: uniform in `[base - jitter, base + jitter]`, never negative.
/// A zero or non-finite jitter gives exactly `base`.
pub fn retry_delay<R: Rng>(rng: &mut R, base: f32, jitter: f32) -> f32 {
    let j = jitter.abs();
    if j == 0.0 || !j.is_finite() {
        return base.max(0.0);
    }
    (base + rng.random_range(-j..=j)).max(0.0)
}

pub fn plan_step<T: Terrain + ?Sized, R: Rng>(
    terrain: &T,
    from: TileCoord,
    rng: &mut R,
    retry_base: f32,
    retry_jitter: f32,
) -> WanderStep {
    let (dc, dr) = pick_offset(rng);
    let target = from.offset(dc, dr);
    if can_enter(terrain, target) {
        WanderStep::MoveTo { target, offset: (dc, dr) }
    } else {
        WanderStep::Retry { delay: retry_delay(rng, retry_base, retry_jitter) }
    }
}

/// Dog pose for a step offset in grid terms (`dr` < 0 is up the screen).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct StepPose {
    /// `None` keeps the current facing.
    pub facing: Option<Facing>,
    pub rotation: f32,
}

pub fn pose_for_offset(dc: i32, dr: i32) -> StepPose {
    if dc != 0 && dr != 0 {
        let facing = if dr < 0 { Facing::Back } else { Facing::Forward };
        let mut rotation = if dr < 0 { FRAC_PI_4 } else { -FRAC_PI_4 };
        if dc > 0 {
            rotation = -rotation;
        }
        return StepPose { facing: Some(facing), rotation };
    }
    let facing = if dc > 0 {
        Some(Facing::Right)
    } else if dc < 0 {
        Some(Facing::Left)
    } else if dr < 0 {
        Some(Facing::Back)
    } else if dr > 0 {
        Some(Facing::Forward)
    } else {
        None
    };
    StepPose { facing, rotation: 0.0 }
}
