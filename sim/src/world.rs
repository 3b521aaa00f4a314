use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use shared::{Coord, Direction, MapVariant, MovementVariant, SimProperties};

use crate::animal::Animal;
use crate::movement;
use crate::vegetation::Vegetation;

/// Length of one full tide cycle in days; the first half is high tide.
const TIDE_CYCLE_DAYS: u32 = 10;
const HIGH_TIDE_DAYS: u32 = 5;

/// How many random free cells a plant spawn samples before giving up on a
/// saturated or infertile map.
const SPAWN_ATTEMPTS: usize = 16;

/// What probing a single cell reports; the strongest animal shadows plants,
/// plants shadow water.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Animal(u64),
    Plant,
    Water,
}

/// The canonical spatial store: the animal arena plus its position index,
/// plant and water cells, and the set of currently free cells.
///
/// Invariants: a cell is free iff it holds no animal, no plant and no water;
/// position entries with no animals are pruned; entities never cache stale
/// positions, the map is the single source of truth.
#[derive(Debug)]
pub struct WorldMap {
    width: i32,
    height: i32,
    variant: MapVariant,
    movement: MovementVariant,
    vegetation: Vegetation,
    move_cost: i32,
    plants_per_day: u32,

    animals: HashMap<u64, Animal>,
    by_pos: HashMap<Coord, Vec<u64>>,
    plants: BTreeSet<Coord>,
    water: BTreeSet<Coord>,
    free: BTreeSet<Coord>,
}

impl WorldMap {
    pub fn new<R: Rng>(props: &SimProperties, rng: &mut R) -> Self {
        let mut map = Self {
            width: props.width,
            height: props.height,
            variant: props.map,
            movement: props.movement,
            vegetation: Vegetation::new(props.vegetation, props.height),
            move_cost: props.move_cost,
            plants_per_day: props.plants_per_day,
            animals: HashMap::new(),
            by_pos: HashMap::new(),
            plants: BTreeSet::new(),
            water: BTreeSet::new(),
            free: BTreeSet::new(),
        };
        for y in 0..map.height {
            for x in 0..map.width {
                map.free.insert(Coord::new(x, y));
            }
        }
        if let MapVariant::Tidal { initial_water, .. } = props.map {
            let mut cells: Vec<Coord> = map.free.iter().copied().collect();
            cells.shuffle(rng);
            for cell in cells.into_iter().take(initial_water as usize) {
                map.flood(cell);
            }
        }
        map
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Coord) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    // ---- animals ------------------------------------------------------

    pub fn place_animal(&mut self, animal: Animal) {
        debug_assert!(self.in_bounds(animal.pos));
        let id = animal.id;
        let pos = animal.pos;
        self.animals.insert(id, animal);
        self.attach(id, pos);
    }

    pub fn remove_animal(&mut self, id: u64) -> Option<Animal> {
        let animal = self.animals.remove(&id)?;
        self.detach(id, animal.pos);
        Some(animal)
    }

    pub fn animal(&self, id: u64) -> Option<&Animal> {
        self.animals.get(&id)
    }

    pub fn animal_mut(&mut self, id: u64) -> Option<&mut Animal> {
        self.animals.get_mut(&id)
    }

    pub fn animals(&self) -> impl Iterator<Item = &Animal> {
        self.animals.values()
    }

    pub fn live_count(&self) -> usize {
        self.animals.len()
    }

    /// Stable id snapshot for iteration while the arena is being mutated.
    pub fn live_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.animals.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Advance one animal a single step: consult its movement policy, rotate
    /// by the active gene, step one cell and apply boundary correction, then
    /// charge the move cost and age it by one.
    pub fn move_animal(&mut self, id: u64) {
        let (old_pos, active, new_pos, new_dir) = match self.animals.get(&id) {
            Some(animal) => {
                let active =
                    movement::next_active_index(self.movement, &animal.genotype, animal.age);
                let dir = animal.dir.rotated(animal.genotype.gene_at(active));
                let (pos, dir) = self.correct_position(animal.pos, animal.pos.stepped(dir), dir);
                (animal.pos, active, pos, dir)
            }
            None => return,
        };
        self.detach(id, old_pos);
        if let Some(animal) = self.animals.get_mut(&id) {
            animal.genotype.set_active(active);
            animal.pos = new_pos;
            animal.dir = new_dir;
            animal.energy -= self.move_cost;
            animal.age += 1;
        }
        self.attach(id, new_pos);
    }

    /// Animal ids on a cell, strongest first: energy desc, then age desc,
    /// then id asc so the ranking is total.
    pub fn ranked_animals_at(&self, pos: Coord) -> Vec<u64> {
        let mut ids = self.by_pos.get(&pos).cloned().unwrap_or_default();
        ids.sort_by_key(|id| {
            let animal = &self.animals[id];
            (Reverse(animal.energy), Reverse(animal.age), *id)
        });
        ids
    }

    /// Cells holding two or more animals, in row-major order.
    pub fn crowded_cells(&self) -> Vec<Coord> {
        let mut cells: Vec<Coord> = self
            .by_pos
            .iter()
            .filter(|(_, ids)| ids.len() >= 2)
            .map(|(&pos, _)| pos)
            .collect();
        cells.sort_unstable();
        cells
    }

    /// Cells where a plant and at least one animal coincide.
    pub fn grazed_cells(&self) -> Vec<Coord> {
        self.plants
            .iter()
            .copied()
            .filter(|pos| self.by_pos.contains_key(pos))
            .collect()
    }

    // ---- plants & water ----------------------------------------------

    pub fn place_plant(&mut self, pos: Coord) -> bool {
        if !self.in_bounds(pos) || self.plants.contains(&pos) || self.water.contains(&pos) {
            return false;
        }
        self.plants.insert(pos);
        self.free.remove(&pos);
        true
    }

    pub fn remove_plant(&mut self, pos: Coord) -> bool {
        if self.plants.remove(&pos) {
            self.refresh_free(pos);
            true
        } else {
            false
        }
    }

    /// Grow one plant on a random free cell the vegetation policy accepts.
    /// A saturated or infertile map makes this a no-op, not an error.
    pub fn spawn_plant<R: Rng>(&mut self, rng: &mut R) -> bool {
        for _ in 0..SPAWN_ATTEMPTS {
            if self.free.is_empty() {
                return false;
            }
            let pick = rng.gen_range(0..self.free.len());
            let cell = match self.free.iter().nth(pick) {
                Some(&cell) => cell,
                None => return false,
            };
            if self.vegetation.allows(cell) {
                self.plants.insert(cell);
                self.free.remove(&cell);
                return true;
            }
        }
        false
    }

    pub fn plants(&self) -> &BTreeSet<Coord> {
        &self.plants
    }

    pub fn water(&self) -> &BTreeSet<Coord> {
        &self.water
    }

    pub fn free_cells(&self) -> &BTreeSet<Coord> {
        &self.free
    }

    /// Distinct cells occupied by any animal, plant or water.
    pub fn occupied_cells(&self) -> usize {
        let mut occupied: HashSet<Coord> = self.by_pos.keys().copied().collect();
        occupied.extend(self.plants.iter().copied());
        occupied.extend(self.water.iter().copied());
        occupied.len()
    }

    pub fn element_at(&self, pos: Coord) -> Option<Element> {
        if let Some(&id) = self.ranked_animals_at(pos).first() {
            return Some(Element::Animal(id));
        }
        if self.plants.contains(&pos) {
            return Some(Element::Plant);
        }
        if self.water.contains(&pos) {
            return Some(Element::Water);
        }
        None
    }

    // ---- topology -----------------------------------------------------

    /// Boundary correction. The x axis wraps; the y axis clamps at the pole
    /// rows and reflects the heading. On the tidal variant a corrected cell
    /// that is water rejects the whole move: the animal keeps its old cell
    /// and turns around.
    pub fn correct_position(&self, old: Coord, new: Coord, dir: Direction) -> (Coord, Direction) {
        let x = new.x.rem_euclid(self.width);
        let (y, dir) = if new.y < 0 {
            (0, dir.reflected_vertical())
        } else if new.y >= self.height {
            (self.height - 1, dir.reflected_vertical())
        } else {
            (new.y, dir)
        };
        let corrected = Coord::new(x, y);
        if matches!(self.variant, MapVariant::Tidal { .. }) && self.water.contains(&corrected) {
            return (old, dir.opposite());
        }
        (corrected, dir)
    }

    /// Topology-specific daily environment update, run before movement:
    /// tide flow on the tidal variant, then the day's plant growth.
    pub fn update_world_elements<R: Rng>(&mut self, day: u32, rng: &mut R) {
        if let MapVariant::Tidal { violence_pct, .. } = self.variant {
            self.tide_flow(day, violence_pct, rng);
        }
        for _ in 0..self.plants_per_day {
            self.spawn_plant(rng);
        }
    }

    fn tide_flow<R: Rng>(&mut self, day: u32, violence_pct: u32, rng: &mut R) {
        if self.water.is_empty() {
            return;
        }
        let high_tide = day % TIDE_CYCLE_DAYS < HIGH_TIDE_DAYS;

        // Only shoreline water takes part in the flow.
        let mut boundary: Vec<Coord> = self
            .water
            .iter()
            .copied()
            .filter(|&cell| self.has_land_neighbor(cell))
            .collect();
        boundary.shuffle(rng);

        let advance = (self.water.len() / 5).max(1);
        if high_tide {
            let mut flooded = 0;
            for cell in boundary {
                if flooded >= advance {
                    break;
                }
                let mut dir = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                for _ in 0..Direction::ALL.len() {
                    if let Some(target) = self.neighbor(cell, dir) {
                        if !self.water.contains(&target) {
                            self.flood(target);
                            flooded += 1;
                            break;
                        }
                    }
                    dir = dir.rotated(1);
                }
            }
            // Anyone standing in water drowns by the next dead sweep.
            let drowned: Vec<u64> = self
                .by_pos
                .iter()
                .filter(|(pos, _)| self.water.contains(pos))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect();
            for id in drowned {
                if let Some(animal) = self.animals.get_mut(&id) {
                    animal.energy = 0;
                }
            }
        } else {
            // Higher violence makes the tide keep more of its gains.
            let retreat = ((advance * (100 - violence_pct) as usize) / 100).max(1);
            for cell in boundary.into_iter().take(retreat) {
                self.water.remove(&cell);
                self.refresh_free(cell);
            }
        }
    }

    /// Turn a cell into water, displacing any plant there.
    fn flood(&mut self, pos: Coord) {
        self.water.insert(pos);
        self.plants.remove(&pos);
        self.free.remove(&pos);
    }

    fn has_land_neighbor(&self, cell: Coord) -> bool {
        Direction::ALL
            .iter()
            .filter_map(|&dir| self.neighbor(cell, dir))
            .any(|n| !self.water.contains(&n))
    }

    /// The adjacent cell in a direction, wrapping x and dropping anything
    /// past the pole rows.
    fn neighbor(&self, pos: Coord, dir: Direction) -> Option<Coord> {
        let stepped = pos.stepped(dir);
        if stepped.y < 0 || stepped.y >= self.height {
            return None;
        }
        Some(Coord::new(stepped.x.rem_euclid(self.width), stepped.y))
    }

    // ---- bookkeeping --------------------------------------------------

    fn attach(&mut self, id: u64, pos: Coord) {
        self.by_pos.entry(pos).or_default().push(id);
        self.free.remove(&pos);
    }

    fn detach(&mut self, id: u64, pos: Coord) {
        if let Some(ids) = self.by_pos.get_mut(&pos) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_pos.remove(&pos);
            }
        }
        self.refresh_free(pos);
    }

    /// Re-derive free-set membership for one cell from the occupancy maps.
    fn refresh_free(&mut self, pos: Coord) {
        if self.in_bounds(pos)
            && !self.by_pos.contains_key(&pos)
            && !self.plants.contains(&pos)
            && !self.water.contains(&pos)
        {
            self.free.insert(pos);
        } else {
            self.free.remove(&pos);
        }
    }
}
