//! Dog Dash: simulation core of a top-down tile arcade game.
//!
//! Core modules:
//! - `domain`: pure rules (coordinates, categories, tiles, entities, wandering AI)
//! - `sim`: the running world (tile grid, roster, scheduler, contacts, session, step)
//! - `config`: `config.toml` loading with defaults
//! - `ui`: terminal front end used by the `dogdash` binary

pub mod config;
pub mod domain;
pub mod sim;
pub mod ui;

pub use config::GameConfig;
pub use domain::coords::{GridGeometry, TileCoord};
pub use sim::session::{Outcome, SessionState};
pub use sim::world::World;
