use std::cmp::Reverse;
use std::collections::HashMap;

use shared::{AnimalView, Coord, DayStats, RenderFrame};

use crate::simulation::Simulation;

/// Genotype frequencies among the living, most common first. Equal counts
/// fall back to lexical order of the formatted genotype so the ranking is
/// deterministic.
pub fn top_genotypes(sim: &Simulation, k: usize) -> Vec<(String, u32)> {
    rank(genotype_counts(sim), k)
}

fn genotype_counts(sim: &Simulation) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for animal in sim.world().animals() {
        *counts.entry(animal.genotype.to_string()).or_insert(0) += 1;
    }
    counts
}

fn rank(counts: HashMap<String, u32>, k: usize) -> Vec<(String, u32)> {
    let mut entries: Vec<(String, u32)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(k);
    entries
}

/// Per-day statistics as a pure function of the current state. Callers on
/// other threads must hold the simulation lock for the whole call.
pub fn day_stats(sim: &Simulation) -> DayStats {
    let world = sim.world();
    let live = world.live_count();

    let mut energy_total: i64 = 0;
    let mut children_total: u64 = 0;
    for animal in world.animals() {
        energy_total += i64::from(animal.energy);
        children_total += u64::from(animal.children);
    }

    let lifespans: Vec<u32> = sim.dead().filter_map(|animal| animal.lifespan()).collect();
    let avg_lifespan = if lifespans.is_empty() {
        0.0
    } else {
        lifespans.iter().map(|&d| f64::from(d)).sum::<f64>() / lifespans.len() as f64
    };

    let counts = genotype_counts(sim);
    let total_cells = world.width() as usize * world.height() as usize;

    DayStats {
        run_id: sim.run_id(),
        run_name: sim.props().run_name.clone(),
        day: sim.day(),
        live_animals: live,
        dead_animals: sim.dead_count(),
        plants: world.plants().len(),
        empty_cells: total_cells - world.occupied_cells(),
        avg_energy: if live > 0 {
            energy_total as f64 / live as f64
        } else {
            0.0
        },
        avg_lifespan,
        avg_children: if live > 0 {
            children_total as f64 / live as f64
        } else {
            0.0
        },
        top_genotypes: rank(counts.clone(), sim.props().top_k),
        genotype_counts: counts,
    }
}

/// Deep-copy the world into an immutable frame a renderer can keep without
/// holding any lock. The selected animal is resolved against the live arena
/// first, then the dead collection so trackers outlive their subject.
pub fn capture_frame(sim: &Simulation, selected: Option<u64>) -> RenderFrame {
    let world = sim.world();

    let mut animals: HashMap<Coord, Vec<AnimalView>> = HashMap::new();
    for animal in world.animals() {
        animals.entry(animal.pos).or_default().push(animal.view());
    }
    for views in animals.values_mut() {
        views.sort_by_key(|view| (Reverse(view.energy), Reverse(view.age), view.id));
    }

    let selected = selected.and_then(|id| {
        world
            .animal(id)
            .map(|animal| animal.view())
            .or_else(|| sim.dead_animal(id).map(|animal| animal.view()))
    });

    RenderFrame {
        run_id: sim.run_id(),
        day: sim.day(),
        animals,
        plants: world.plants().iter().copied().collect(),
        water: world.water().iter().copied().collect(),
        top_genotypes: top_genotypes(sim, sim.props().top_k)
            .into_iter()
            .map(|(genotype, _)| genotype)
            .collect(),
        selected,
    }
}
