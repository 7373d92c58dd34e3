/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels.toml` manifest in the configured levels directory
///   2. Built-in embedded levels
///
/// ## Manifest format (`levels.toml`):
///   ```toml
///   [[level]]
///   time_limit = 30.0
///   background = "level1_bg.txt"
///   dogs = "level1_dogs.txt"
///   breakables = "level1_sweets.txt"   # optional
///   ```
///
/// Layer file names are relative to the manifest.
///
/// ## Layer format:
///   Line 1: atlas name
///   Line 2: tile size as `<w>x<h>`
///   Lines:  grid rows, row 0 at the top of the layer
///
/// ## Tile legend:
///   '.' = Empty            '=' / 'o' = Pink / green ground
///   'w' = Water            '1'-'9', 'i'-'n' = Wall variants
///   'p' = Player spawn     'b' = Dog         'f' = Red dog
///   't' = Cake breakable   'u' = Pie breakable

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("{0}: layer file has no tile size header")]
    MissingHeader(String),
    #[error("{name}: bad tile size header {line:?} (expected <w>x<h>)")]
    BadHeader { name: String, line: String },
    #[error("{0}: no player spawn")]
    MissingPlayer(String),
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{}: no [[level]] entries", .0.display())]
    EmptyManifest(PathBuf),
}

/// One parsed layer file. Rows are padded to a common width.
#[derive(Clone, Debug)]
pub struct LayerDef {
    pub name: String,
    pub atlas: String,
    pub tile_size: Vec2,
    pub rows: Vec<Vec<char>>,
}

impl LayerDef {
    /// Build from raw rows, padding short ones with empty cells.
    pub fn from_rows(name: &str, atlas: &str, tile_size: Vec2, rows: &[&str]) -> Self {
        let mut rows: Vec<Vec<char>> = rows.iter().map(|r| r.chars().collect()).collect();
        while rows.last().is_some_and(|r| r.iter().all(|c| c.is_whitespace())) {
            rows.pop();
        }

        let max_width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for (i, row) in rows.iter_mut().enumerate() {
            if row.len() < max_width {
                log::warn!("{name}: row {i} is {} wide, padding to {max_width}", row.len());
                row.resize(max_width, '.');
            }
        }

        LayerDef {
            name: name.to_string(),
            atlas: atlas.to_string(),
            tile_size,
            rows,
        }
    }

    pub fn columns(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row-major `(col, row, code)` for every cell.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().map(move |(c, &ch)| (c, r, ch))
        })
    }
}

/// Everything needed to build one level.
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub time_limit: f64,
    pub background: LayerDef,
    pub dogs: LayerDef,
    pub breakables: Option<LayerDef>,
}

// ══════════════════════════════════════════════════════════════
// Layer parsing
// ══════════════════════════════════════════════════════════════

/// Parse one layer file. `name` is used in messages only.
pub fn parse_layer(name: &str, content: &str) -> Result<LayerDef, LevelError> {
    let mut lines = content.lines().map(|l| l.trim_end_matches('\r'));
    let atlas = lines.next().unwrap_or_default().trim();
    let header = lines
        .next()
        .ok_or_else(|| LevelError::MissingHeader(name.to_string()))?;
    let tile_size = parse_tile_size(header).ok_or_else(|| LevelError::BadHeader {
        name: name.to_string(),
        line: header.to_string(),
    })?;
    let rows: Vec<&str> = lines.collect();
    Ok(LayerDef::from_rows(name, atlas, tile_size, &rows))
}

/// `"32x32"` → `(32, 32)`. Uses the first and last `x`-separated parts.
fn parse_tile_size(line: &str) -> Option<Vec2> {
    let parts: Vec<&str> = line.trim().split('x').collect();
    if parts.len() < 2 {
        return None;
    }
    let w = parts.first()?.trim().parse::<u32>().ok()?;
    let h = parts.last()?.trim().parse::<u32>().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some(Vec2::new(w as f32, h as f32))
}

// ══════════════════════════════════════════════════════════════
// Manifest
// ══════════════════════════════════════════════════════════════

#[derive(Deserialize, Debug)]
struct Manifest {
    #[serde(default)]
    level: Vec<ManifestEntry>,
}

#[derive(Deserialize, Debug)]
struct ManifestEntry {
    time_limit: f64,
    background: String,
    dogs: String,
    #[serde(default)]
    breakables: Option<String>,
}

/// Load every level listed in `<dir>/levels.toml`.
pub fn load_manifest(dir: &Path) -> Result<Vec<LevelDef>, LevelError> {
    let path = dir.join("levels.toml");
    let text = read(&path)?;
    let manifest: Manifest = toml::from_str(&text).map_err(|source| LevelError::Manifest {
        path: path.clone(),
        source,
    })?;
    if manifest.level.is_empty() {
        return Err(LevelError::EmptyManifest(path));
    }

    let mut levels = Vec::with_capacity(manifest.level.len());
    for entry in &manifest.level {
        let background = load_layer(&dir.join(&entry.background))?;
        let dogs = load_layer(&dir.join(&entry.dogs))?;
        let breakables = match &entry.breakables {
            Some(file) => Some(load_layer(&dir.join(file))?),
            None => None,
        };
        levels.push(LevelDef { time_limit: entry.time_limit, background, dogs, breakables });
    }
    log::info!("loaded {} levels from {}", levels.len(), path.display());
    Ok(levels)
}

fn load_layer(path: &Path) -> Result<LayerDef, LevelError> {
    let text = read(path)?;
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    parse_layer(&name, &text)
}

fn read(path: &Path) -> Result<String, LevelError> {
    std::fs::read_to_string(path).map_err(|source| LevelError::Io { path: path.to_path_buf(), source })
}

/// Manifest levels if `dir` has a usable one, otherwise the embedded set.
pub fn load_levels(dir: &Path) -> Vec<LevelDef> {
    if !dir.join("levels.toml").exists() {
        log::info!("no levels.toml in {}, using built-in levels", dir.display());
        return embedded_levels();
    }
    match load_manifest(dir) {
        Ok(levels) => levels,
        Err(e) => {
            log::warn!("{e}; using built-in levels");
            embedded_levels()
        }
    }
}

/// Out-of-range indices fall back to the first level.
pub fn clamp_index(index: usize, count: usize) -> usize {
    if index < count { index } else { 0 }
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

pub fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded(30.0, &[
            "1222222222222223",
            "4==============5",
            "4==oooooooo====5",
            "4==o======o====5",
            "4==o==ww==o====5",
            "4==o==ww==o====5",
            "4==oooooooo====5",
            "4==============5",
            "4==============5",
            "6777777777777778",
        ], &[
            "................",
            "................",
            "....b...........",
            "..........b.....",
            "................",
            "............p...",
            "................",
            "...b.......f....",
            "................",
            "................",
        ], Some(&[
            "................",
            "................",
            "................",
            ".............t..",
            "................",
            "................",
            "................",
            "................",
            ".....u..........",
            "................",
        ])),
        make_embedded(40.0, &[
            "ijjjjjjjjjjjjjjjjjjk",
            "l==================m",
            "l==wwww=====oooooo=m",
            "l==wwww=====o====o=m",
            "l===========o=11=o=m",
            "l===========o====o=m",
            "l=ooooo=====oooooo=m",
            "l=o===o============m",
            "l=o===o====wwwwww==m",
            "l=ooooo====wwwwww==m",
            "l==================m",
            "nnnnnnnnnnnnnnnnnnnn",
        ], &[
            "....................",
            "..b.............b...",
            "....................",
            "........f...........",
            "....................",
            ".........p..........",
            "....................",
            "....b...........f...",
            "....................",
            "....................",
            "..........b.........",
            "....................",
        ], Some(&[
            "....................",
            "....................",
            "........t...........",
            "....................",
            "....................",
            "...............u....",
            "....................",
            "........t...........",
            "....................",
            "....................",
            "....................",
            "....................",
        ])),
        make_embedded(25.0, &[
            "12222223",
            "4======5",
            "4=oooo=5",
            "4=o==o=5",
            "4=oooo=5",
            "4======5",
            "67777778",
        ], &[
            "........",
            ".b....b.",
            "........",
            "...p....",
            "........",
            ".b....b.",
            "........",
        ], None),
    ]
}

fn make_embedded(time_limit: f64, background: &[&str], dogs: &[&str], breakables: Option<&[&str]>) -> LevelDef {
    let tile = Vec2::new(32.0, 32.0);
    LevelDef {
        time_limit,
        background: LayerDef::from_rows("embedded background", "background", tile, background),
        dogs: LayerDef::from_rows("embedded dogs", "characters", tile, dogs),
        breakables: breakables.map(|rows| LayerDef::from_rows("embedded breakables", "background", tile, rows)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let layer = parse_layer("t", "background\n32x24\n=o\nw1\n").expect("parses");
        assert_eq!(layer.atlas, "background");
        assert_eq!(layer.tile_size, Vec2::new(32.0, 24.0));
        assert_eq!(layer.columns(), 2);
        assert_eq!(layer.row_count(), 2);
        assert_eq!(layer.rows[1], vec!['w', '1']);
    }

    #[test]
    fn crlf_and_trailing_blank_lines_ignored() {
        let layer = parse_layer("t", "bg\r\n32x32\r\n==\r\n==\r\n\r\n\n").expect("parses");
        assert_eq!(layer.row_count(), 2);
        assert_eq!(layer.rows[0], vec!['=', '=']);
    }

    #[test]
    fn short_rows_are_padded() {
        let layer = parse_layer("t", "bg\n32x32\n====\n==\n").expect("parses");
        assert_eq!(layer.rows[1], vec!['=', '=', '.', '.']);
    }

    #[test]
    fn malformed_headers() {
        assert!(matches!(parse_layer("t", "bg"), Err(LevelError::MissingHeader(_))));
        assert!(matches!(parse_layer("t", "bg\nthirtytwo\n=="), Err(LevelError::BadHeader { .. })));
        assert!(matches!(parse_layer("t", "bg\n0x32\n=="), Err(LevelError::BadHeader { .. })));
        // first and last components only
        let layer = parse_layer("t", "bg\n16x99x24\n=").expect("parses");
        assert_eq!(layer.tile_size, Vec2::new(16.0, 24.0));
    }

    #[test]
    fn index_clamps_to_first_level() {
        assert_eq!(clamp_index(2, 3), 2);
        assert_eq!(clamp_index(3, 3), 0);
        assert_eq!(clamp_index(99, 1), 0);
    }

    #[test]
    fn embedded_layers_line_up() {
        for def in embedded_levels() {
            assert_eq!(def.background.columns(), def.dogs.columns());
            assert_eq!(def.background.row_count(), def.dogs.row_count());
            assert_eq!(def.dogs.cells().filter(|&(_, _, c)| c == 'p').count(), 1);
            if let Some(b) = &def.breakables {
                assert_eq!(b.columns(), def.background.columns());
            }
        }
    }

    #[test]
    fn missing_manifest_uses_embedded() {
        let dir = std::env::temp_dir().join("dogdash-no-such-levels-dir");
        assert_eq!(load_levels(&dir).len(), embedded_levels().len());
    }

    #[test]
    fn manifest_round_trip_from_disk() {
        let dir = std::env::temp_dir().join(format!("dogdash-manifest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(dir.join("bg.txt"), "background\n32x32\n===\n=w=\n===\n").expect("write");
        std::fs::write(dir.join("dogs.txt"), "characters\n32x32\n...\np.b\n...\n").expect("write");
        std::fs::write(
            dir.join("levels.toml"),
            "[[level]]\ntime_limit = 12.5\nbackground = \"bg.txt\"\ndogs = \"dogs.txt\"\n",
        )
        .expect("write");

        let levels = load_manifest(&dir).expect("manifest loads");
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].time_limit, 12.5);
        assert!(levels[0].breakables.is_none());
        assert_eq!(levels[0].background.rows[1], vec!['=', 'w', '=']);

        std::fs::write(dir.join("levels.toml"), "[[level]]\ntime_limit = 1.0\nbackground = \"gone.txt\"\ndogs = \"dogs.txt\"\n")
            .expect("write");
        assert!(matches!(load_manifest(&dir), Err(LevelError::Io { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
