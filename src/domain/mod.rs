pub mod ai;
pub mod category;
pub mod coords;
pub mod entity;
pub mod tile;
