use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use shared::{ConfigError, Coord, Crossover, Direction, Genotype, SimProperties};

use crate::animal::Animal;
use crate::world::WorldMap;

/// Callback invoked once per completed day, on the thread driving the
/// simulation. Listeners must not block.
pub type DayListener = Box<dyn Fn(&Simulation) + Send>;

/// One simulation run: the world map, the dead collection and the day
/// counter, orchestrated a day at a time.
pub struct Simulation {
    props: Arc<SimProperties>,
    run_id: Uuid,
    world: WorldMap,
    dead: HashMap<u64, Animal>,
    day: u32,
    next_id: u64,
    crossover: Crossover,
    rng: StdRng,
    listeners: Vec<DayListener>,
}

impl Simulation {
    /// Validate the configuration, build the world and place the starting
    /// population.
    pub fn new(props: SimProperties) -> Result<Self, ConfigError> {
        props.validate()?;
        let mut rng = match props.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let world = WorldMap::new(&props, &mut rng);
        let crossover = Crossover::new(props.min_mutations, props.max_mutations);
        let mut sim = Self {
            props: Arc::new(props),
            run_id: Uuid::new_v4(),
            world,
            dead: HashMap::new(),
            day: 0,
            next_id: 0,
            crossover,
            rng,
            listeners: Vec::new(),
        };
        sim.populate();
        Ok(sim)
    }

    pub fn props(&self) -> &Arc<SimProperties> {
        &self.props
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn world(&self) -> &WorldMap {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldMap {
        &mut self.world
    }

    pub fn live_count(&self) -> usize {
        self.world.live_count()
    }

    pub fn is_extinct(&self) -> bool {
        self.world.live_count() == 0
    }

    pub fn dead(&self) -> impl Iterator<Item = &Animal> {
        self.dead.values()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    pub fn dead_animal(&self, id: u64) -> Option<&Animal> {
        self.dead.get(&id)
    }

    pub fn add_day_listener(&mut self, listener: DayListener) {
        self.listeners.push(listener);
    }

    /// Place a new animal with a fresh id. Used for the starting population
    /// and for scripted scenarios.
    pub fn seed_animal(&mut self, pos: Coord, energy: i32, genotype: Genotype) -> u64 {
        let id = self.alloc_id();
        let dir = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
        self.world
            .place_animal(Animal::founder(id, pos, dir, energy, genotype));
        id
    }

    /// Run one full simulation day, in this fixed order:
    /// 1. sweep the dead, 2. update world elements (tide + plant growth),
    /// 3. move animals, 4. eat, 5. reproduce, 6. bump the day counter and
    /// notify listeners. Eating depends on post-move positions and breeding
    /// on post-eating energy, so the order is part of the contract.
    pub fn advance_day(&mut self) {
        self.sweep_dead();
        self.world.update_world_elements(self.day, &mut self.rng);
        self.move_animals();
        self.feed();
        self.breed();
        self.day += 1;
        self.notify_day_end();
    }

    fn populate(&mut self) {
        for _ in 0..self.props.start_animals {
            let pos = self.random_land_cell();
            let genotype = Genotype::random(self.props.genome_length, &mut self.rng);
            let energy = self.props.start_energy;
            self.seed_animal(pos, energy, genotype);
        }
        for _ in 0..self.props.start_plants {
            self.world.spawn_plant(&mut self.rng);
        }
    }

    fn random_land_cell(&mut self) -> Coord {
        for _ in 0..100 {
            let pos = Coord::new(
                self.rng.gen_range(0..self.world.width()),
                self.rng.gen_range(0..self.world.height()),
            );
            if !self.world.water().contains(&pos) {
                return pos;
            }
        }
        Coord::new(0, 0)
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Animals whose energy ran out get their death day stamped and migrate
    /// from the live arena to the dead collection.
    fn sweep_dead(&mut self) {
        for id in self.world.live_ids() {
            let dead = matches!(self.world.animal(id), Some(animal) if animal.is_dead());
            if dead {
                if let Some(mut animal) = self.world.remove_animal(id) {
                    animal.death_day = Some(self.day);
                    self.dead.insert(id, animal);
                }
            }
        }
    }

    fn move_animals(&mut self) {
        for id in self.world.live_ids() {
            self.world.move_animal(id);
        }
    }

    /// On every cell where a plant and animals coincide, the strongest
    /// animal eats; the plant is gone afterwards.
    fn feed(&mut self) {
        let gain = self.props.plant_energy;
        for pos in self.world.grazed_cells() {
            let eater = match self.world.ranked_animals_at(pos).first() {
                Some(&id) => id,
                None => continue,
            };
            if let Some(animal) = self.world.animal_mut(eater) {
                animal.eat_plant(gain);
            }
            self.world.remove_plant(pos);
        }
    }

    /// On every cell with at least two animals, the top two try to breed.
    /// Falling short of the energy threshold is a silent no-op.
    fn breed(&mut self) {
        let threshold = self.props.reproduction_threshold;
        let cost = self.props.reproduction_cost;
        for pos in self.world.crowded_cells() {
            let ranked = self.world.ranked_animals_at(pos);
            let (first, second) = match (ranked.first(), ranked.get(1)) {
                (Some(&a), Some(&b)) => (a, b),
                _ => continue,
            };
            let fit = |id: u64| {
                self.world
                    .animal(id)
                    .map(|a| a.energy >= threshold)
                    .unwrap_or(false)
            };
            if !fit(first) || !fit(second) {
                continue;
            }

            // Both parents pay up front; the child starts with the sum and a
            // genotype weighted by what the parents have left.
            let (genes_a, energy_a) = match self.world.animal_mut(first) {
                Some(parent) => {
                    parent.energy -= cost;
                    parent.children += 1;
                    (parent.genotype.genes().to_vec(), parent.energy)
                }
                None => continue,
            };
            let (genes_b, energy_b) = match self.world.animal_mut(second) {
                Some(parent) => {
                    parent.energy -= cost;
                    parent.children += 1;
                    (parent.genotype.genes().to_vec(), parent.energy)
                }
                None => continue,
            };

            let genes =
                self.crossover
                    .child_genes(&genes_a, &genes_b, energy_a, energy_b, &mut self.rng);
            let dir = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
            let id = self.alloc_id();
            let child = Animal::offspring(
                id,
                pos,
                dir,
                cost * 2,
                self.day,
                [first, second],
                Genotype::from_genes(genes),
            );
            self.world.place_animal(child);
            self.bump_descendants([first, second]);
        }
    }

    /// Every distinct ancestor of a newborn gains one descendant; diamond
    /// lineages are counted once per birth.
    fn bump_descendants(&mut self, parents: [u64; 2]) {
        let mut seen: HashSet<u64> = HashSet::new();
        let mut queue: Vec<u64> = parents.to_vec();
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            let grandparents = if let Some(animal) = self.world.animal_mut(id) {
                animal.descendants += 1;
                animal.parents
            } else if let Some(animal) = self.dead.get_mut(&id) {
                animal.descendants += 1;
                animal.parents
            } else {
                continue;
            };
            queue.extend(grandparents.into_iter().flatten());
        }
    }

    fn notify_day_end(&mut self) {
        let listeners = std::mem::take(&mut self.listeners);
        for listener in &listeners {
            listener(self);
        }
        let mut listeners = listeners;
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MovementVariant, VegetationVariant};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scenario_props() -> SimProperties {
        SimProperties {
            width: 5,
            height: 5,
            start_animals: 0,
            start_plants: 0,
            plants_per_day: 0,
            start_energy: 50,
            plant_energy: 10,
            move_cost: 1,
            reproduction_threshold: 30,
            reproduction_cost: 12,
            genome_length: 8,
            min_mutations: 0,
            max_mutations: 0,
            movement: MovementVariant::Predestined,
            vegetation: VegetationVariant::Anywhere,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn sim() -> Simulation {
        Simulation::new(scenario_props()).unwrap()
    }

    fn genotype() -> Genotype {
        Genotype::from_genes(vec![0; 8])
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let props = SimProperties {
            width: -1,
            ..Default::default()
        };
        assert!(Simulation::new(props).is_err());
    }

    #[test]
    fn test_new_places_starting_population() {
        let props = SimProperties {
            start_animals: 10,
            start_plants: 15,
            vegetation: VegetationVariant::Anywhere,
            seed: Some(1),
            ..Default::default()
        };
        let sim = Simulation::new(props).unwrap();
        assert_eq!(sim.live_count(), 10);
        assert_eq!(sim.world().plants().len(), 15);
        assert!(sim.world().animals().all(|a| a.birth_day == 0));
    }

    #[test]
    fn test_reproduction_conserves_energy() {
        let mut sim = sim();
        let cell = Coord::new(2, 2);
        let a = sim.seed_animal(cell, 50, genotype());
        let b = sim.seed_animal(cell, 40, genotype());

        sim.breed();

        assert_eq!(sim.live_count(), 3);
        let parent_a = sim.world().animal(a).unwrap();
        let parent_b = sim.world().animal(b).unwrap();
        let child = sim
            .world()
            .animals()
            .find(|an| an.id != a && an.id != b)
            .unwrap();
        assert_eq!(parent_a.energy, 38);
        assert_eq!(parent_b.energy, 28);
        assert_eq!(child.energy, 24);
        assert_eq!(
            parent_a.energy + parent_b.energy + child.energy,
            50 + 40,
            "energy is transferred, not created"
        );
        assert_eq!(child.birth_day, 0);
        assert_eq!(child.parents, [Some(a), Some(b)]);
        assert_eq!(parent_a.children, 1);
        assert_eq!(parent_b.children, 1);
        assert_eq!(child.genotype.len(), 8);
    }

    #[test]
    fn test_reproduction_rejected_below_threshold() {
        let mut sim = sim();
        let cell = Coord::new(1, 1);
        let a = sim.seed_animal(cell, 5, genotype());
        let b = sim.seed_animal(cell, 5, genotype());

        sim.breed();

        assert_eq!(sim.live_count(), 2);
        assert_eq!(sim.world().animal(a).unwrap().energy, 5);
        assert_eq!(sim.world().animal(b).unwrap().children, 0);
    }

    #[test]
    fn test_eating_tie_break_prefers_age() {
        let mut sim = sim();
        let cell = Coord::new(3, 3);
        let young = sim.seed_animal(cell, 10, genotype());
        let old = sim.seed_animal(cell, 10, genotype());
        sim.world_mut().animal_mut(young).unwrap().age = 3;
        sim.world_mut().animal_mut(old).unwrap().age = 7;
        sim.world_mut().place_plant(cell);

        sim.feed();

        assert_eq!(sim.world().animal(old).unwrap().energy, 20);
        assert_eq!(sim.world().animal(old).unwrap().plants_eaten, 1);
        assert_eq!(sim.world().animal(young).unwrap().energy, 10);
        assert!(!sim.world().plants().contains(&cell));
    }

    #[test]
    fn test_dead_sweep_stamps_death_day() {
        let mut sim = sim();
        let doomed = sim.seed_animal(Coord::new(0, 0), 1, genotype());

        // Day 0 drains the last energy point; the day-1 sweep collects it.
        sim.advance_day();
        assert_eq!(sim.live_count(), 1);
        sim.advance_day();

        assert_eq!(sim.live_count(), 0);
        assert_eq!(sim.dead_count(), 1);
        let dead = sim.dead_animal(doomed).unwrap();
        assert_eq!(dead.death_day, Some(1));
        assert!(dead.death_day.unwrap() >= dead.birth_day);
        assert!(sim.world().animal(doomed).is_none());
    }

    #[test]
    fn test_full_day_cycle_moves_and_ages() {
        let mut sim = sim();
        let start = Coord::new(2, 2);
        let id = sim.seed_animal(start, 10, genotype());
        sim.world_mut().place_plant(start);

        sim.advance_day();

        let animal = sim.world().animal(id).unwrap();
        assert_eq!(animal.age, 1);
        assert_ne!(animal.pos, start);
        // It left the plant cell before the eat phase, so the plant stays.
        assert_eq!(animal.energy, 9);
        assert!(sim.world().plants().contains(&start));
        assert_eq!(sim.day(), 1);
    }

    #[test]
    fn test_descendants_count_whole_lineage_once() {
        let mut sim = sim();
        let cell = Coord::new(2, 2);
        let a = sim.seed_animal(cell, 100, genotype());
        let b = sim.seed_animal(cell, 90, genotype());

        sim.breed();
        let c = sim
            .world()
            .animals()
            .find(|an| an.id != a && an.id != b)
            .unwrap()
            .id;
        assert_eq!(sim.world().animal(a).unwrap().descendants, 1);
        assert_eq!(sim.world().animal(b).unwrap().descendants, 1);

        // Make the child and parent A the top pair, then breed again. A sits
        // on both sides of the lineage and must be counted once.
        sim.world_mut().animal_mut(c).unwrap().energy = 200;
        sim.world_mut().animal_mut(b).unwrap().energy = 1;
        sim.breed();

        assert_eq!(sim.world().animal(c).unwrap().descendants, 1);
        assert_eq!(sim.world().animal(a).unwrap().descendants, 2);
        assert_eq!(sim.world().animal(b).unwrap().descendants, 2);
    }

    #[test]
    fn test_day_listeners_run_each_day() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        let mut sim = sim();
        sim.add_day_listener(Box::new(|s| {
            CALLS.store(s.day(), Ordering::SeqCst);
        }));

        sim.advance_day();
        sim.advance_day();
        sim.advance_day();

        // Listeners observe the already-incremented day counter.
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }
}
