/// Static tile descriptors and the layer text codes that produce them.
/// Surface properties are queried through `category()`, so tile semantics
/// stay centralized here.

use super::category::Category;
use super::entity::BreakableFamily;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ground {
    Pink,  // '='
    Green, // 'o'
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TileKind {
    Background(Ground),
    /// `ripple` selects the alternate water texture.
    Water { ripple: bool },
    /// Wall variant code: '1'..='9' or 'i'..='n'.
    Wall(char),
}

impl TileKind {
    /// Collision category of the static body this tile carries, if any.
    pub fn category(self) -> Option<Category> {
        match self {
            TileKind::Background(_) => None,
            TileKind::Water { .. } => Some(Category::Water),
            TileKind::Wall(_) => Some(Category::Wall),
        }
    }
}

/// What a spawn code places on the entity or overlay layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpawnKind {
    Player,
    Dog,
    RedDog,
    Breakable(BreakableFamily),
}

/// One character of a layer file, classified.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellCode {
    Empty,
    Tile(TileKind),
    Spawn(SpawnKind),
}

/// Classify a layer character. `None` for unknown codes.
/// Water is returned without ripple; the loader rolls that.
pub fn parse_code(ch: char) -> Option<CellCode> {
    let cell = match ch {
        '.' => CellCode::Empty,
        '=' => CellCode::Tile(TileKind::Background(Ground::Pink)),
        'o' => CellCode::Tile(TileKind::Background(Ground::Green)),
        'w' => CellCode::Tile(TileKind::Water { ripple: false }),
        '1'..='9' | 'i'..='n' => CellCode::Tile(TileKind::Wall(ch)),
        'b' => CellCode::Spawn(SpawnKind::Dog),
        'f' => CellCode::Spawn(SpawnKind::RedDog),
        'p' => CellCode::Spawn(SpawnKind::Player),
        't' => CellCode::Spawn(SpawnKind::Breakable(BreakableFamily::Cake)),
        'u' => CellCode::Spawn(SpawnKind::Breakable(BreakableFamily::Pie)),
        _ => return None,
    };
    Some(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_codes_cover_digits_and_i_to_n() {
        for ch in "123456789ijklmn".chars() {
            assert_eq!(parse_code(ch), Some(CellCode::Tile(TileKind::Wall(ch))));
        }
        assert_eq!(parse_code('0'), None);
        assert_eq!(parse_code('h'), None);
        assert_eq!(parse_code('o'), Some(CellCode::Tile(TileKind::Background(Ground::Green))));
    }

    #[test]
    fn categories() {
        assert_eq!(TileKind::Wall('3').category(), Some(Category::Wall));
        assert_eq!(TileKind::Water { ripple: true }.category(), Some(Category::Water));
        assert_eq!(TileKind::Background(Ground::Pink).category(), None);
        assert_eq!(TileKind::Background(Ground::Green).category(), None);
    }

    #[test]
    fn spawn_codes() {
        assert_eq!(parse_code('p'), Some(CellCode::Spawn(SpawnKind::Player)));
        assert_eq!(parse_code('f'), Some(CellCode::Spawn(SpawnKind::RedDog)));
        assert_eq!(
            parse_code('u'),
            Some(CellCode::Spawn(SpawnKind::Breakable(BreakableFamily::Pie)))
        );
        assert_eq!(parse_code('.'), Some(CellCode::Empty));
        assert_eq!(parse_code('?'), None);
    }
}
