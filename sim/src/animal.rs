use shared::{AnimalView, Coord, Direction, Genotype};

/// The mutable agent: position, energy, age, genotype and lineage counters.
///
/// An animal is created either at world initialization (birth day 0) or by
/// reproduction. It is never dropped before teardown; once its energy falls
/// to zero or below, the daily sweep stamps `death_day` and moves it to the
/// dead collection, where it keeps feeding lifespan statistics.
#[derive(Debug, Clone)]
pub struct Animal {
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
    pub parents: [Option<u64>; 2],
    pub genotype: Genotype,
}

impl Animal {
    /// A founder animal with no lineage.
    pub fn founder(id: u64, pos: Coord, dir: Direction, energy: i32, genotype: Genotype) -> Self {
        Self {
            id,
            pos,
            dir,
            energy,
            age: 0,
            birth_day: 0,
            death_day: None,
            children: 0,
            plants_eaten: 0,
            descendants: 0,
            parents: [None, None],
            genotype,
        }
    }

    /// A newborn placed on its parents' cell.
    #[allow(clippy::too_many_arguments)]
    pub fn offspring(
        id: u64,
        pos: Coord,
        dir: Direction,
        energy: i32,
        birth_day: u32,
        parents: [u64; 2],
        genotype: Genotype,
    ) -> Self {
        Self {
            id,
            pos,
            dir,
            energy,
            age: 0,
            birth_day,
            death_day: None,
            children: 0,
            plants_eaten: 0,
            descendants: 0,
            parents: [Some(parents[0]), Some(parents[1])],
            genotype,
        }
    }

    /// Gain energy from a plant. Eligibility (who eats on a crowded cell) is
    /// decided by the daily orchestration, not here.
    pub fn eat_plant(&mut self, gain: i32) {
        self.energy += gain;
        self.plants_eaten += 1;
    }

    pub fn is_dead(&self) -> bool {
        self.energy <= 0
    }

    /// Days lived, available once the death day is stamped. Guarded against
    /// inconsistent records.
    pub fn lifespan(&self) -> Option<u32> {
        self.death_day
            .filter(|&death| death >= self.birth_day)
            .map(|death| death - self.birth_day)
    }

    pub fn view(&self) -> AnimalView {
        AnimalView {
            id: self.id,
            pos: self.pos,
            dir: self.dir,
            energy: self.energy,
            age: self.age,
            birth_day: self.birth_day,
            death_day: self.death_day,
            children: self.children,
            plants_eaten: self.plants_eaten,
            descendants: self.descendants,
            genotype: self.genotype.to_string(),
            active_gene: self.genotype.active_index(),
        }
    }
}
