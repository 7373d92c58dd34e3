/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub combo: ComboConfig,
    pub impact: ImpactConfig,
    pub levels_dir: PathBuf,
    /// RNG seed; `None` draws a fresh one per level.
    pub seed: Option<u64>,
    /// Remaining seconds below which the "time running out" event fires.
    pub warning_secs: f64,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub player_speed: f32,
    pub dog_step_secs: f32,
    pub retry_delay_secs: f32,
    pub retry_jitter_secs: f32,
    pub kick_pause_secs: f32,
    pub sink_secs: f32,
    pub frame_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ComboConfig {
    pub window_secs: f64,
    pub max_tier: u32,
}

#[derive(Clone, Debug)]
pub struct ImpactConfig {
    /// Distance from a layer edge that counts as hitting that edge.
    pub boundary_margin: f32,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    combo: TomlCombo,
    #[serde(default)]
    impact: TomlImpact,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_player_speed")]
    player_speed: f32,
    #[serde(default = "default_dog_step")]
    dog_step_secs: f32,
    #[serde(default = "default_retry_delay")]
    retry_delay_secs: f32,
    #[serde(default = "default_retry_jitter")]
    retry_jitter_secs: f32,
    #[serde(default = "default_kick_pause")]
    kick_pause_secs: f32,
    #[serde(default = "default_sink")]
    sink_secs: f32,
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlCombo {
    #[serde(default = "default_combo_window")]
    window_secs: f64,
    #[serde(default = "default_max_tier")]
    max_tier: u32,
}

#[derive(Deserialize, Debug)]
struct TomlImpact {
    #[serde(default = "default_boundary_margin")]
    boundary_margin: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default = "default_warning")]
    warning_secs: f64,
}

// ── Defaults ──

fn default_player_speed() -> f32 { 350.0 }
fn default_dog_step() -> f32 { 1.0 }
fn default_retry_delay() -> f32 { 0.25 }
fn default_retry_jitter() -> f32 { 0.15 }
fn default_kick_pause() -> f32 { 1.0 }
fn default_sink() -> f32 { 1.0 }
fn default_frame_ms() -> u64 { 16 }
fn default_combo_window() -> f64 { 0.5 }
fn default_max_tier() -> u32 { 11 }   // highest catch sound index
fn default_boundary_margin() -> f32 { 20.0 }
fn default_levels_dir() -> String { "levels".into() }
fn default_warning() -> f64 { 10.0 }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            player_speed: default_player_speed(),
            dog_step_secs: default_dog_step(),
            retry_delay_secs: default_retry_delay(),
            retry_jitter_secs: default_retry_jitter(),
            kick_pause_secs: default_kick_pause(),
            sink_secs: default_sink(),
            frame_ms: default_frame_ms(),
        }
    }
}

impl Default for TomlCombo {
    fn default() -> Self {
        TomlCombo { window_secs: default_combo_window(), max_tier: default_max_tier() }
    }
}

impl Default for TomlImpact {
    fn default() -> Self {
        TomlImpact { boundary_margin: default_boundary_margin() }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            seed: None,
            warning_secs: default_warning(),
        }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document. Parse errors fall back to defaults.
    pub fn parse(text: &str) -> Self {
        GameConfig::from_toml(parse_toml(text, Path::new("config.toml")), &[])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            speed: SpeedConfig {
                player_speed: toml_cfg.speed.player_speed,
                dog_step_secs: seconds("dog_step_secs", toml_cfg.speed.dog_step_secs, default_dog_step()),
                retry_delay_secs: seconds("retry_delay_secs", toml_cfg.speed.retry_delay_secs, default_retry_delay()),
                retry_jitter_secs: seconds("retry_jitter_secs", toml_cfg.speed.retry_jitter_secs, default_retry_jitter()),
                kick_pause_secs: seconds("kick_pause_secs", toml_cfg.speed.kick_pause_secs, default_kick_pause()),
                sink_secs: seconds("sink_secs", toml_cfg.speed.sink_secs, default_sink()),
                frame_ms: toml_cfg.speed.frame_ms.max(1),
            },
            combo: ComboConfig {
                window_secs: toml_cfg.combo.window_secs,
                max_tier: toml_cfg.combo.max_tier,
            },
            impact: ImpactConfig {
                boundary_margin: toml_cfg.impact.boundary_margin,
            },
            levels_dir,
            seed: toml_cfg.general.seed,
            warning_secs: toml_cfg.general.warning_secs,
        }
    }
}

/// Durations must be finite and non-negative; anything else is replaced by
/// the default.
fn seconds(key: &str, value: f32, default: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        log::warn!("[speed] {key} = {value} is not a valid duration; using {default}");
        default
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn parse_toml(text: &str, path: &Path) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("{} parse error: {e}; using default settings", path.display());
            TomlConfig::default()
        }
    }
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    log::info!("config: {}", path.display());
                    return parse_toml(&text, &path);
                }
                Err(e) => log::warn!("could not read {}: {e}", path.display()),
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = GameConfig::parse("");
        assert_eq!(cfg.speed.player_speed, 350.0);
        assert_eq!(cfg.speed.retry_jitter_secs, 0.15);
        assert_eq!(cfg.combo.max_tier, 11);
        assert_eq!(cfg.impact.boundary_margin, 20.0);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::parse(
            "[speed]\nplayer_speed = 200.0\n\n[general]\nseed = 42\n",
        );
        assert_eq!(cfg.speed.player_speed, 200.0);
        assert_eq!(cfg.speed.dog_step_secs, 1.0);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.warning_secs, 10.0);
    }

    #[test]
    fn invalid_durations_use_defaults() {
        let cfg = GameConfig::parse(
            "[speed]\nretry_jitter_secs = nan\nsink_secs = -1.0\nkick_pause_secs = inf\ndog_step_secs = 0.5\n",
        );
        assert_eq!(cfg.speed.retry_jitter_secs, 0.15);
        assert_eq!(cfg.speed.sink_secs, 1.0);
        assert_eq!(cfg.speed.kick_pause_secs, 1.0);
        assert_eq!(cfg.speed.dog_step_secs, 0.5);
    }

    #[test]
    fn broken_document_falls_back() {
        let cfg = GameConfig::parse("[speed\nplayer_speed = ");
        assert_eq!(cfg.speed.player_speed, 350.0);
    }
}
