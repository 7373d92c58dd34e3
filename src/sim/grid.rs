/// Tile layers and the composed terrain view.
///
/// ## Layers
///
///   - `background` : ground, water and walls. Never mutated after load.
///   - `overlay`    : optional breakable layer, queried before the background.
///   - entity layer : spawn slots referencing roster ids (owned by `World`).
///
/// A slot holds either a static tile or a non-owning `EntityId`. Entity
/// slots cache the entity's current collision category so terrain queries
/// never reach into the roster; the cache changes only through
/// `set_entity_category` (breakable smashed) or `forget_entity`.

use glam::Vec2;

use crate::domain::ai::Terrain;
use crate::domain::category::{Category, CategoryMask};
use crate::domain::coords::{GridGeometry, TileCoord};
use crate::domain::entity::EntityId;
use crate::domain::tile::TileKind;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Slot {
    #[default]
    Empty,
    Tile(TileKind),
    Entity { id: EntityId, category: Option<Category> },
}

impl Slot {
    pub fn category(&self) -> Option<Category> {
        match self {
            Slot::Empty => None,
            Slot::Tile(kind) => kind.category(),
            Slot::Entity { category, .. } => *category,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Clone, Debug)]
pub struct TileLayer {
    pub atlas: String,
    pub geometry: GridGeometry,
    slots: Vec<Slot>,
}

impl TileLayer {
    pub fn new(atlas: impl Into<String>, geometry: GridGeometry) -> Self {
        TileLayer {
            atlas: atlas.into(),
            geometry,
            slots: vec![Slot::Empty; geometry.columns * geometry.rows],
        }
    }

    /// Same geometry, nothing in it. Stands in for an absent overlay.
    pub fn empty_like(other: &TileLayer) -> Self {
        TileLayer::new(other.atlas.clone(), other.geometry)
    }

    /// Non-empty slot at `coord`. Out-of-bounds coordinates are `None`.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&Slot> {
        self.geometry
            .index(coord)
            .map(|i| &self.slots[i])
            .filter(|s| !s.is_empty())
    }

    pub fn tile_at_point(&self, point: Vec2) -> Option<&Slot> {
        self.tile_at(self.geometry.world_to_tile(point))
    }

    /// Returns false for out-of-bounds coordinates.
    pub fn set(&mut self, coord: TileCoord, slot: Slot) -> bool {
        match self.geometry.index(coord) {
            Some(i) => {
                self.slots[i] = slot;
                true
            }
            None => false,
        }
    }

    /// Clear every slot referencing `id`. Returns whether one was found.
    pub fn forget_entity(&mut self, id: EntityId) -> bool {
        let mut found = false;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Slot::Entity { id: e, .. } if *e == id) {
                *slot = Slot::Empty;
                found = true;
            }
        }
        found
    }

    pub fn set_entity_category(&mut self, id: EntityId, category: Option<Category>) {
        for slot in self.slots.iter_mut() {
            if let Slot::Entity { id: e, category: c } = slot {
                if *e == id {
                    *c = category;
                }
            }
        }
    }
}

/// Background plus overlay, composed at query time.
#[derive(Clone, Debug)]
pub struct TileMap {
    pub background: TileLayer,
    pub overlay: TileLayer,
}

impl TileMap {
    pub fn new(background: TileLayer, overlay: Option<TileLayer>) -> Self {
        let overlay = overlay.unwrap_or_else(|| TileLayer::empty_like(&background));
        TileMap { background, overlay }
    }

    pub fn geometry(&self) -> GridGeometry {
        self.background.geometry
    }

    /// First non-empty slot: overlay, then background.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&Slot> {
        self.overlay.tile_at(coord).or_else(|| self.background.tile_at(coord))
    }

    /// Point is converted through the background geometry.
    pub fn tile_at_point(&self, point: Vec2) -> Option<&Slot> {
        self.tile_at(self.background.geometry.world_to_tile(point))
    }

    pub fn has_any_property(&self, coord: TileCoord, mask: CategoryMask) -> bool {
        self.tile_at(coord)
            .and_then(Slot::category)
            .is_some_and(|c| mask.contains(c))
    }
}

impl Terrain for TileMap {
    fn is_valid_tile(&self, coord: TileCoord) -> bool {
        self.background.geometry.is_valid_tile(coord)
    }

    fn has_any_property(&self, coord: TileCoord, mask: CategoryMask) -> bool {
        TileMap::has_any_property(self, coord, mask)
    }
}
