pub mod animal;
pub mod movement;
pub mod observe;
pub mod simulation;
pub mod vegetation;
pub mod world;

pub use animal::Animal;
pub use simulation::{DayListener, Simulation};
pub use world::{Element, WorldMap};
