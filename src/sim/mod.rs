pub mod behavior;
pub mod contact;
pub mod event;
pub mod grid;
pub mod level;
pub mod physics;
pub mod schedule;
pub mod session;
pub mod step;
pub mod world;
