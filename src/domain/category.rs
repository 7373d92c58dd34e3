/// Collision categories and the body policy table.
///
/// Every body carries exactly one category bit. Masks combine bits:
///   - `collides_with` : categories that physically block the body
///   - `contacts_with` : categories that raise contact events
///
/// `PROFILES` is the single source of truth for these relationships.
/// `contact_response` maps the other side of a player contact to what the
/// game does about it, so the contact resolver never compares categories
/// itself.

use std::ops::{BitAnd, BitOr};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct CategoryMask(pub u32);

impl CategoryMask {
    pub const NONE: CategoryMask = CategoryMask(0);
    pub const ALL: CategoryMask = CategoryMask(u32::MAX);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn union(self, other: CategoryMask) -> CategoryMask {
        CategoryMask(self.0 | other.0)
    }

    #[inline]
    pub const fn intersects(self, other: CategoryMask) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn contains(self, category: Category) -> bool {
        self.0 & category.bit().0 != 0
    }
}

impl BitOr for CategoryMask {
    type Output = CategoryMask;
    fn bitor(self, rhs: CategoryMask) -> CategoryMask {
        self.union(rhs)
    }
}

impl BitAnd for CategoryMask {
    type Output = CategoryMask;
    fn bitand(self, rhs: CategoryMask) -> CategoryMask {
        CategoryMask(self.0 & rhs.0)
    }
}

impl From<Category> for CategoryMask {
    fn from(c: Category) -> Self {
        c.bit()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Category {
    Boundary,
    Player,
    Dog,
    Wall,
    Water,
    Breakable,
    RedDog,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Boundary,
        Category::Player,
        Category::Dog,
        Category::Wall,
        Category::Water,
        Category::Breakable,
        Category::RedDog,
    ];

    pub const fn bit(self) -> CategoryMask {
        CategoryMask(1 << self as u32)
    }

    pub fn profile(self) -> &'static BodyProfile {
        &PROFILES[self as usize]
    }
}

/// Build a mask from a list of categories (const-friendly).
pub const fn mask_of(categories: &[Category]) -> CategoryMask {
    let mut bits = 0u32;
    let mut i = 0;
    while i < categories.len() {
        bits |= categories[i].bit().0;
        i += 1;
    }
    CategoryMask(bits)
}

/// One row of the policy table.
#[derive(Clone, Copy, Debug)]
pub struct BodyProfile {
    pub category: Category,
    pub collides_with: CategoryMask,
    pub contacts_with: CategoryMask,
    /// Static bodies never move.
    pub dynamic: bool,
    /// Velocity loss per second (0 = none).
    pub linear_damping: f32,
}

impl BodyProfile {
    /// Would `self` be physically blocked by a body of `other`?
    #[inline]
    pub fn blocked_by(&self, other: Category) -> bool {
        self.dynamic && self.collides_with.contains(other)
    }

    /// Do bodies of these two profiles raise contact events when they touch?
    #[inline]
    pub fn reports_contact_with(&self, other: &BodyProfile) -> bool {
        self.contacts_with.contains(other.category) || other.contacts_with.contains(self.category)
    }
}

/// Indexed by `Category as usize`.
pub static PROFILES: [BodyProfile; 7] = [
    BodyProfile {
        category: Category::Boundary,
        collides_with: CategoryMask::ALL,
        contacts_with: CategoryMask::NONE,
        dynamic: false,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::Player,
        collides_with: mask_of(&[Category::Boundary, Category::Wall, Category::Water, Category::RedDog]),
        contacts_with: mask_of(&[
            Category::Dog,
            Category::Breakable,
            Category::RedDog,
            Category::Boundary,
            Category::Wall,
            Category::Water,
        ]),
        dynamic: true,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::Dog,
        collides_with: CategoryMask::NONE,
        contacts_with: CategoryMask::NONE,
        dynamic: true,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::Wall,
        collides_with: CategoryMask::ALL,
        contacts_with: CategoryMask::NONE,
        dynamic: false,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::Water,
        collides_with: CategoryMask::ALL,
        contacts_with: CategoryMask::NONE,
        dynamic: false,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::Breakable,
        collides_with: CategoryMask::NONE,
        contacts_with: mask_of(&[Category::Player]),
        dynamic: false,
        linear_damping: 0.0,
    },
    BodyProfile {
        category: Category::RedDog,
        collides_with: mask_of(&[Category::Player, Category::Wall, Category::Breakable, Category::Boundary]),
        contacts_with: CategoryMask::NONE,
        dynamic: true,
        linear_damping: 1.0,
    },
];

/// Tiles a wandering dog refuses to step onto.
pub const WANDER_BLOCKERS: CategoryMask = mask_of(&[Category::Wall, Category::Water]);

/// Tiles a kicked red dog sinks in.
pub const SINKS_RED_DOG: CategoryMask = mask_of(&[Category::Water]);

/// Obstacles whose impact splashes.
pub const SPLASHES: CategoryMask = mask_of(&[Category::Water]);

/// What a contact between the player and a body of some category means.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContactResponse {
    /// Queue the dog for removal at the end of the step.
    CatchDog,
    /// Smash the breakable.
    Smash,
    /// Kick the red dog.
    Kick,
    /// Squash the player against a static obstacle.
    Impact,
    Ignore,
}

/// Indexed by `Category as usize`: response when the player touches it.
static PLAYER_RESPONSES: [ContactResponse; 7] = [
    ContactResponse::Impact,    // Boundary
    ContactResponse::Ignore,    // Player
    ContactResponse::CatchDog,  // Dog
    ContactResponse::Impact,    // Wall
    ContactResponse::Impact,    // Water
    ContactResponse::Smash,     // Breakable
    ContactResponse::Kick,      // RedDog
];

pub fn contact_response(other: Category) -> ContactResponse {
    PLAYER_RESPONSES[other as usize]
}

/// Boundary bodies have no tile or entity; impact sides use edge proximity.
pub fn uses_edge_proximity(category: Category) -> bool {
    category == Category::Boundary
}
