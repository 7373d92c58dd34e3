/// Entities: Player, Dog, RedDog, Breakable.
///
/// An `Entity` is a `Body` (continuous kinematic state shared by every kind)
/// plus an `EntityKind` holding the kind-specific state machine. The world
/// keeps entities in a roster keyed by `EntityId`; layers only hold ids.

use std::f32::consts::PI;

use glam::Vec2;
use rand::Rng;

use super::category::{BodyProfile, Category, CategoryMask};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ══════════════════════════════════════════════════════════════
// Facing
// ══════════════════════════════════════════════════════════════

/// Sprite facing. Forward faces the camera (moving down the screen).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Forward,
    Back,
    Left,
    Right,
}

impl Facing {
    /// Facing for a world-space velocity (y up).
    /// Vertical wins only when strictly dominant; ties go horizontal, so the
    /// zero vector faces Left.
    pub fn from_velocity(v: Vec2) -> Facing {
        if v.y.abs() > v.x.abs() {
            if v.y < 0.0 { Facing::Forward } else { Facing::Back }
        } else if v.x > 0.0 {
            Facing::Right
        } else {
            Facing::Left
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Facing::Forward => "ft",
            Facing::Back => "bk",
            Facing::Left | Facing::Right => "lt",
        }
    }
}

/// What a renderer needs to show a facing: the looping animation and whether
/// the side sprite is mirrored.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FacingVisual {
    pub facing: Facing,
    pub flip_x: bool,
    pub animation: String,
}

impl FacingVisual {
    /// `prefix` is the atlas prefix ("player", "dog"). Dogs only ship a
    /// front-facing animation.
    pub fn new(prefix: &str, facing: Facing) -> Self {
        let suffix = if prefix == "dog" { "ft" } else { facing.suffix() };
        FacingVisual {
            facing,
            flip_x: facing == Facing::Right,
            animation: format!("{prefix}_{suffix}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Body
// ══════════════════════════════════════════════════════════════

/// Kinematic state of any entity.
#[derive(Clone, Debug)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub scale: f32,
    /// `None` once the body has been removed from collision (smashed).
    pub category: Option<Category>,
    pub linear_damping: f32,
    pub visual: FacingVisual,
    pub alive: bool,
}

impl Body {
    pub fn new(category: Category, position: Vec2, prefix: &str) -> Self {
        Body {
            position,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
            category: Some(category),
            linear_damping: category.profile().linear_damping,
            visual: FacingVisual::new(prefix, Facing::Forward),
            alive: true,
        }
    }

    pub fn profile(&self) -> Option<&'static BodyProfile> {
        self.category.map(Category::profile)
    }

    pub fn collision_mask(&self) -> CategoryMask {
        self.profile().map_or(CategoryMask::NONE, |p| p.collides_with)
    }

    pub fn contact_mask(&self) -> CategoryMask {
        self.profile().map_or(CategoryMask::NONE, |p| p.contacts_with)
    }

    /// Explicit facing change. Returns the new visual for the renderer.
    pub fn set_facing(&mut self, prefix: &str, facing: Facing) -> FacingVisual {
        self.visual = FacingVisual::new(prefix, facing);
        self.visual.clone()
    }
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlayerState {
    Idle,
    Moving,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub state: PlayerState,
}

impl Player {
    pub const PREFIX: &'static str = "player";

    pub fn new() -> Self {
        Player { state: PlayerState::Idle }
    }

    /// Circle radius for a sprite of `tile` size: `max(min(w,h) - 16, 4) / 2`.
    pub fn body_radius(tile: Vec2) -> f32 {
        (tile.x.min(tile.y) - 16.0).max(4.0) / 2.0
    }

    /// Head for `target` at `speed`. A target on top of the player leaves the
    /// velocity at zero.
    pub fn move_toward(&mut self, body: &mut Body, target: Vec2, speed: f32) -> FacingVisual {
        body.velocity = (target - body.position).normalize_or_zero() * speed;
        self.state = if body.velocity == Vec2::ZERO { PlayerState::Idle } else { PlayerState::Moving };
        self.face_current_direction(body)
    }

    pub fn face_current_direction(&self, body: &mut Body) -> FacingVisual {
        body.set_facing(Self::PREFIX, Facing::from_velocity(body.velocity))
    }
}

impl Default for Player {
    fn default() -> Self {
        Player::new()
    }
}

// ══════════════════════════════════════════════════════════════
// Dogs
// ══════════════════════════════════════════════════════════════

/// Linear move between two points over a fixed duration.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Tween {
    pub from: Vec2,
    pub to: Vec2,
    pub elapsed: f32,
    pub duration: f32,
}

impl Tween {
    pub fn new(from: Vec2, to: Vec2, duration: f32) -> Self {
        Tween { from, to, elapsed: 0.0, duration }
    }

    /// Advance by `dt`, returning the interpolated position.
    pub fn advance(&mut self, dt: f32) -> Vec2 {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.from.lerp(self.to, self.progress())
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 { 1.0 } else { self.elapsed / self.duration }
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum DogState {
    /// Spawned, cycle not started yet.
    Idle,
    Walking(Tween),
    /// Waiting before retrying the walk.
    Waiting,
    /// Red dog only: stunned after a kick.
    Kicked,
    /// Red dog only: terminal drowning animation.
    Sinking { elapsed: f32, duration: f32 },
}

/// Wandering dog state. Shared by plain and red dogs.
#[derive(Clone, Debug)]
pub struct Wanderer {
    pub state: DogState,
}

impl Wanderer {
    pub const PREFIX: &'static str = "dog";

    pub fn new() -> Self {
        Wanderer { state: DogState::Idle }
    }

    pub fn is_sinking(&self) -> bool {
        matches!(self.state, DogState::Sinking { .. })
    }
}

impl Default for Wanderer {
    fn default() -> Self {
        Wanderer::new()
    }
}

// ══════════════════════════════════════════════════════════════
// Breakables
// ══════════════════════════════════════════════════════════════

/// Layer code family: 't' sits on green ground, 'u' on pink.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BreakableFamily {
    Cake,
    Pie,
}

impl BreakableFamily {
    /// Variants with their selection weights.
    pub fn variants(self) -> &'static [(Sweet, f32)] {
        match self {
            BreakableFamily::Cake => &[(Sweet::Shortcake, 0.33), (Sweet::Choco, 0.33), (Sweet::House, 0.34)],
            BreakableFamily::Pie => &[(Sweet::ApplePie, 0.5), (Sweet::MontBlanc, 0.5)],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sweet {
    Shortcake,
    Choco,
    House,
    ApplePie,
    MontBlanc,
}

impl Sweet {
    pub fn family(self) -> BreakableFamily {
        match self {
            Sweet::Shortcake | Sweet::Choco | Sweet::House => BreakableFamily::Cake,
            Sweet::ApplePie | Sweet::MontBlanc => BreakableFamily::Pie,
        }
    }

    pub fn whole_texture(self) -> &'static str {
        match self {
            Sweet::Shortcake => "shortcake",
            Sweet::Choco => "choco",
            Sweet::House => "house",
            Sweet::ApplePie => "applepie",
            Sweet::MontBlanc => "montblanc",
        }
    }

    /// Ground texture left behind once smashed.
    pub fn broken_texture(self) -> &'static str {
        match self.family() {
            BreakableFamily::Cake => "green",
            BreakableFamily::Pie => "pink",
        }
    }

    pub fn fly_away_texture(self) -> &'static str {
        match self {
            Sweet::Shortcake => "shortcake-flyaway",
            Sweet::Choco => "choco-flyaway",
            Sweet::House => "house-flyaway",
            Sweet::ApplePie => "applepie-flyaway",
            Sweet::MontBlanc => "montblanc-flyaway",
        }
    }
}

/// Cosmetic fragment thrown off a smashed breakable.
/// Only drift sign and spin are random; the rest of the motion is fixed.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FlyAway {
    pub texture: &'static str,
    pub origin: Vec2,
    /// Horizontal travel over the whole flight: ±100.
    pub drift: f32,
    /// Total rotation, in [-π, π).
    pub spin: f32,
}

impl FlyAway {
    pub const RISE: f32 = 30.0;
    pub const RISE_SECS: f32 = 0.2;
    pub const FALL: f32 = 300.0;
    pub const FALL_SECS: f32 = 0.8;
    pub const FADE_DELAY_SECS: f32 = 0.6;
    pub const FADE_SECS: f32 = 0.4;
    pub const SCALE_FROM: f32 = 1.5;
    pub const SCALE_TO: f32 = 0.4;
    pub const LIFETIME_SECS: f32 = 1.0;

    /// Offset from the origin `t` seconds into the flight.
    pub fn offset_at(&self, t: f32) -> Vec2 {
        let t = t.clamp(0.0, Self::LIFETIME_SECS);
        let x = self.drift * t / Self::LIFETIME_SECS;
        let y = if t <= Self::RISE_SECS {
            Self::RISE * (t / Self::RISE_SECS)
        } else {
            Self::RISE - Self::FALL * ((t - Self::RISE_SECS) / Self::FALL_SECS)
        };
        Vec2::new(x, y)
    }

    /// Opacity `t` seconds into the flight.
    pub fn alpha_at(&self, t: f32) -> f32 {
        if t <= Self::FADE_DELAY_SECS {
            1.0
        } else {
            (1.0 - (t - Self::FADE_DELAY_SECS) / Self::FADE_SECS).max(0.0)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BreakableState {
    Whole,
    Broken,
}

#[derive(Clone, Debug)]
pub struct Breakable {
    pub sweet: Sweet,
    pub state: BreakableState,
}

impl Breakable {
    pub fn new(sweet: Sweet) -> Self {
        Breakable { sweet, state: BreakableState::Whole }
    }

    pub fn texture(&self) -> &'static str {
        match self.state {
            BreakableState::Whole => self.sweet.whole_texture(),
            BreakableState::Broken => self.sweet.broken_texture(),
        }
    }

    /// Whole → Broken. Clears the collision body and returns the fragment.
    /// A second call is a no-op.
    pub fn smash<R: Rng>(&mut self, body: &mut Body, rng: &mut R) -> Option<FlyAway> {
        if self.state == BreakableState::Broken {
            return None;
        }
        self.state = BreakableState::Broken;
        body.category = None;
        let drift = if rng.random::<bool>() { 100.0 } else { -100.0 };
        let spin = -PI + rng.random::<f32>() * 2.0 * PI;
        Some(FlyAway {
            texture: self.sweet.fly_away_texture(),
            origin: body.position,
            drift,
            spin,
        })
    }
}

// ══════════════════════════════════════════════════════════════
// Entity
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub enum EntityKind {
    Player(Player),
    Dog(Wanderer),
    RedDog(Wanderer),
    Breakable(Breakable),
}

impl EntityKind {
    pub fn category(&self) -> Category {
        match self {
            EntityKind::Player(_) => Category::Player,
            EntityKind::Dog(_) => Category::Dog,
            EntityKind::RedDog(_) => Category::RedDog,
            EntityKind::Breakable(_) => Category::Breakable,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Player(_) => Player::PREFIX,
            EntityKind::Dog(_) | EntityKind::RedDog(_) => Wanderer::PREFIX,
            EntityKind::Breakable(b) => b.sweet.whole_texture(),
        }
    }

    /// Counts toward the level's catch roster.
    pub fn is_dog(&self) -> bool {
        matches!(self, EntityKind::Dog(_) | EntityKind::RedDog(_))
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub body: Body,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, position: Vec2) -> Self {
        let body = Body::new(kind.category(), position, kind.prefix());
        Entity { id, body, kind }
    }

    pub fn set_facing(&mut self, facing: Facing) -> FacingVisual {
        let prefix = self.kind.prefix();
        self.body.set_facing(prefix, facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn facing_from_velocity() {
        assert_eq!(Facing::from_velocity(Vec2::new(10.0, 0.0)), Facing::Right);
        assert_eq!(Facing::from_velocity(Vec2::new(-10.0, 0.0)), Facing::Left);
        assert_eq!(Facing::from_velocity(Vec2::new(1.0, -5.0)), Facing::Forward);
        assert_eq!(Facing::from_velocity(Vec2::new(1.0, 5.0)), Facing::Back);
        // ties go horizontal
        assert_eq!(Facing::from_velocity(Vec2::new(3.0, 3.0)), Facing::Right);
        assert_eq!(Facing::from_velocity(Vec2::ZERO), Facing::Left);
    }

    #[test]
    fn flip_only_when_facing_right() {
        assert!(FacingVisual::new("player", Facing::Right).flip_x);
        assert!(!FacingVisual::new("player", Facing::Left).flip_x);
        assert_eq!(FacingVisual::new("player", Facing::Right).animation, "player_lt");
        assert_eq!(FacingVisual::new("player", Facing::Back).animation, "player_bk");
        assert_eq!(FacingVisual::new("dog", Facing::Back).animation, "dog_ft");
    }

    #[test]
    fn move_toward_sets_speed_and_facing() {
        let mut player = Player::new();
        let mut body = Body::new(Category::Player, Vec2::new(48.0, 48.0), "player");
        let visual = player.move_toward(&mut body, Vec2::new(80.0, 48.0), 350.0);
        assert_eq!(visual.facing, Facing::Right);
        assert!((body.velocity.x - 350.0).abs() < 1e-3);
        assert_eq!(body.velocity.y, 0.0);
        assert_eq!(player.state, PlayerState::Moving);

        let here = body.position;
        let visual = player.move_toward(&mut body, here, 350.0);
        assert_eq!(body.velocity, Vec2::ZERO);
        assert_eq!(visual.facing, Facing::Left);
        assert_eq!(player.state, PlayerState::Idle);
    }

    #[test]
    fn player_radius() {
        assert_eq!(Player::body_radius(Vec2::new(32.0, 32.0)), 8.0);
        assert_eq!(Player::body_radius(Vec2::new(16.0, 40.0)), 2.0);
    }

    #[test]
    fn tween_clamps_at_end() {
        let mut t = Tween::new(Vec2::ZERO, Vec2::new(32.0, 0.0), 1.0);
        assert_eq!(t.advance(0.5), Vec2::new(16.0, 0.0));
        assert!(!t.is_done());
        assert_eq!(t.advance(0.75), Vec2::new(32.0, 0.0));
        assert!(t.is_done());
    }

    #[test]
    fn smash_only_once() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut b = Breakable::new(Sweet::Choco);
        let mut body = Body::new(Category::Breakable, Vec2::new(16.0, 16.0), "choco");
        let frag = b.smash(&mut body, &mut rng).expect("first smash yields a fragment");
        assert_eq!(frag.texture, "choco-flyaway");
        assert_eq!(frag.drift.abs(), 100.0);
        assert!(frag.spin >= -PI && frag.spin < PI);
        assert_eq!(body.category, None);
        assert_eq!(b.texture(), "green");
        assert!(b.smash(&mut body, &mut rng).is_none());
        assert_eq!(b.state, BreakableState::Broken);
    }

    #[test]
    fn fly_away_path() {
        let f = FlyAway { texture: "x", origin: Vec2::ZERO, drift: -100.0, spin: 0.0 };
        assert_eq!(f.offset_at(0.2), Vec2::new(-20.0, 30.0));
        assert!((f.offset_at(1.0).y - (30.0 - 300.0)).abs() < 1e-3);
        assert_eq!(f.alpha_at(0.5), 1.0);
        assert!((f.alpha_at(0.8) - 0.5).abs() < 1e-5);
        assert_eq!(f.alpha_at(2.0), 0.0);
    }

    #[test]
    fn pie_breaks_to_pink() {
        assert_eq!(Sweet::MontBlanc.broken_texture(), "pink");
        assert_eq!(Sweet::House.family(), BreakableFamily::Cake);
        let total: f32 = BreakableFamily::Cake.variants().iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn red_dog_body_is_damped() {
        let e = Entity::new(EntityId(3), EntityKind::RedDog(Wanderer::new()), Vec2::ZERO);
        assert_eq!(e.body.linear_damping, 1.0);
        assert!(e.kind.is_dog());
        assert!(e.body.collision_mask().contains(Category::Player));
    }
}
