/// Coordinate transform between continuous world space and the tile grid.
///
/// World space has its origin at the bottom-left corner of a layer with y
/// pointing up. The grid is addressed `(col, row)` with row 0 at the TOP,
/// so the y-axis is inverted relative to the row index:
///
///   world.x = col * tile_w + tile_w / 2
///   world.y = layer_h - (row * tile_h + tile_h / 2)
///
/// The inverse floors in both axes, so a point exactly on a tile edge belongs
/// to the lower/left tile. Both directions agree at tile centers.

use glam::Vec2;

/// A tile address. Signed so that neighbour offsets (-1) stay representable;
/// validity is checked separately against the grid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

impl TileCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        TileCoord { col, row }
    }

    /// Neighbour at `(dc, dr)`. Row offsets follow grid orientation (+1 = down).
    pub const fn offset(self, dc: i32, dr: i32) -> Self {
        TileCoord { col: self.col + dc, row: self.row + dr }
    }
}

/// Size of one layer: tile dimensions plus grid dimensions.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct GridGeometry {
    pub tile_size: Vec2,
    pub columns: usize,
    pub rows: usize,
}

impl GridGeometry {
    pub fn new(tile_size: Vec2, columns: usize, rows: usize) -> Self {
        GridGeometry { tile_size, columns, rows }
    }

    /// `layer_size = grid_size * tile_size`.
    pub fn layer_size(&self) -> Vec2 {
        Vec2::new(
            self.columns as f32 * self.tile_size.x,
            self.rows as f32 * self.tile_size.y,
        )
    }

    /// Center of the tile at `coord`, in world space.
    /// Defined for every coordinate, including out-of-grid ones.
    pub fn tile_to_world(&self, coord: TileCoord) -> Vec2 {
        let x = coord.col as f32 * self.tile_size.x + self.tile_size.x / 2.0;
        let y = coord.row as f32 * self.tile_size.y + self.tile_size.y / 2.0;
        Vec2::new(x, self.layer_size().y - y)
    }

    /// Tile containing `point`. Edges floor toward the lower/left tile.
    pub fn world_to_tile(&self, point: Vec2) -> TileCoord {
        let col = (point.x / self.tile_size.x).floor();
        let row = ((self.layer_size().y - point.y) / self.tile_size.y).floor();
        TileCoord { col: col as i32, row: row as i32 }
    }

    #[inline]
    pub fn is_valid_tile(&self, coord: TileCoord) -> bool {
        coord.col >= 0
            && coord.row >= 0
            && (coord.col as usize) < self.columns
            && (coord.row as usize) < self.rows
    }

    /// Row-major slot index for a valid coordinate.
    #[inline]
    pub fn index(&self, coord: TileCoord) -> Option<usize> {
        if self.is_valid_tile(coord) {
            Some(coord.row as usize * self.columns + coord.col as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cols: usize, rows: usize) -> GridGeometry {
        GridGeometry::new(Vec2::new(32.0, 32.0), cols, rows)
    }

    #[test]
    fn layer_size_is_grid_times_tile() {
        let g = GridGeometry::new(Vec2::new(32.0, 16.0), 5, 3);
        assert_eq!(g.layer_size(), Vec2::new(160.0, 48.0));
    }

    #[test]
    fn row_zero_is_top_of_layer() {
        let g = grid(3, 3);
        assert_eq!(g.tile_to_world(TileCoord::new(0, 0)), Vec2::new(16.0, 80.0));
        assert_eq!(g.tile_to_world(TileCoord::new(2, 2)), Vec2::new(80.0, 16.0));
    }

    #[test]
    fn round_trip_every_tile() {
        let g = GridGeometry::new(Vec2::new(24.0, 40.0), 7, 5);
        for row in 0..5 {
            for col in 0..7 {
                let c = TileCoord::new(col, row);
                assert_eq!(g.world_to_tile(g.tile_to_world(c)), c);
            }
        }
    }

    #[test]
    fn edges_floor_to_lower_left() {
        let g = grid(3, 3);
        // x = 32 is the left edge of column 1
        assert_eq!(g.world_to_tile(Vec2::new(32.0, 80.0)).col, 1);
        assert_eq!(g.world_to_tile(Vec2::new(31.999, 80.0)).col, 0);
        // y = 64 sits between row 0 (above) and row 1 (below): (96-64)/32 = 1
        assert_eq!(g.world_to_tile(Vec2::new(16.0, 64.0)).row, 1);
    }

    #[test]
    fn negative_points_map_to_negative_tiles() {
        let g = grid(3, 3);
        let c = g.world_to_tile(Vec2::new(-1.0, 97.0));
        assert_eq!(c, TileCoord::new(-1, -1));
        assert!(!g.is_valid_tile(c));
    }

    #[test]
    fn validity_bounds() {
        let g = grid(3, 2);
        assert!(g.is_valid_tile(TileCoord::new(0, 0)));
        assert!(g.is_valid_tile(TileCoord::new(2, 1)));
        assert!(!g.is_valid_tile(TileCoord::new(3, 0)));
        assert!(!g.is_valid_tile(TileCoord::new(0, 2)));
        assert!(!g.is_valid_tile(TileCoord::new(-1, 0)));
        assert_eq!(g.index(TileCoord::new(2, 1)), Some(5));
        assert_eq!(g.index(TileCoord::new(3, 1)), None);
    }
}
