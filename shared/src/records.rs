use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{Coord, Direction};

/// Immutable per-animal view embedded in frames and trackers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalView {
    pub id: u64,
    pub pos: Coord,
    pub dir: Direction,
    pub energy: i32,
    pub age: u32,
    pub birth_day: u32,
    pub death_day: Option<u32>,
    pub children: u32,
    pub plants_eaten: u32,
    pub descendants: u32,
    pub genotype: String,
    pub active_gene: usize,
}

/// An immutable deep copy of world state taken at one instant, safe to hand
/// to a renderer on any thread. Purely an in-memory handoff; it has no
/// lifecycle beyond being read once.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub run_id: Uuid,
    pub day: u32,
    pub animals: HashMap<Coord, Vec<AnimalView>>,
    pub plants: Vec<Coord>,
    pub water: Vec<Coord>,
    pub top_genotypes: Vec<String>,
    pub selected: Option<AnimalView>,
}

/// Per-day statistics record, a pure function of the state at computation
/// time. Serialized as-is by persistence collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub run_id: Uuid,
    pub run_name: String,
    pub day: u32,
    pub live_animals: usize,
    pub dead_animals: usize,
    pub plants: usize,
    pub empty_cells: usize,
    pub avg_energy: f64,
    pub avg_lifespan: f64,
    pub avg_children: f64,
    pub genotype_counts: HashMap<String, u32>,
    pub top_genotypes: Vec<(String, u32)>,
}
