use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest legal gene value; genes are direction rotations in eighths of a
/// full turn.
pub const GENE_MAX: u8 = 7;

/// The ordered gene sequence steering one animal. The active index is the
/// cursor consulted by movement policies; what advances it depends on the
/// policy, so the genotype only stores it.
///
/// A genotype belongs to exactly one animal. Children always receive a
/// freshly built sequence, never a shared one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genotype {
    genes: Vec<u8>,
    active: usize,
}

impl Genotype {
    /// Build a uniformly random genotype of the given length.
    pub fn random<R: Rng>(len: usize, rng: &mut R) -> Self {
        let genes = (0..len).map(|_| rng.gen_range(0..=GENE_MAX)).collect();
        Self { genes, active: 0 }
    }

    /// Wrap an existing gene sequence. Callers guarantee every value is in
    /// `0..=GENE_MAX`.
    pub fn from_genes(genes: Vec<u8>) -> Self {
        debug_assert!(genes.iter().all(|&g| g <= GENE_MAX));
        Self { genes, active: 0 }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn genes(&self) -> &[u8] {
        &self.genes
    }

    pub fn gene_at(&self, index: usize) -> u8 {
        self.genes[index % self.genes.len()]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Move the cursor, wrapping at the genotype length.
    pub fn set_active(&mut self, index: usize) {
        self.active = index % self.genes.len();
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for gene in &self.genes {
            write!(f, "{gene}")?;
        }
        Ok(())
    }
}

/// Energy-weighted crossover with a bounded number of point mutations.
///
/// The split point is proportional to each parent's share of the combined
/// energy, so the better-fed parent contributes the larger contiguous
/// segment. Which parent supplies the left side is a coin flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    pub min_mutations: u32,
    pub max_mutations: u32,
}

impl Crossover {
    pub fn new(min_mutations: u32, max_mutations: u32) -> Self {
        Self {
            min_mutations,
            max_mutations,
        }
    }

    /// Produce a child gene sequence from two parents weighted by energy.
    /// Both parents must have sequences of equal length.
    pub fn child_genes<R: Rng>(
        &self,
        genes_a: &[u8],
        genes_b: &[u8],
        energy_a: i32,
        energy_b: i32,
        rng: &mut R,
    ) -> Vec<u8> {
        debug_assert_eq!(genes_a.len(), genes_b.len());
        let len = genes_a.len();

        let weight_a = energy_a.max(0) as f64;
        let weight_b = energy_b.max(0) as f64;
        let total = weight_a + weight_b;
        let share_a = if total > 0.0 { weight_a / total } else { 0.5 };

        let mut child = if rng.gen::<bool>() {
            let split = (len as f64 * share_a).round() as usize;
            let mut genes = genes_a[..split].to_vec();
            genes.extend_from_slice(&genes_b[split..]);
            genes
        } else {
            let split = (len as f64 * (1.0 - share_a)).round() as usize;
            let mut genes = genes_b[..split].to_vec();
            genes.extend_from_slice(&genes_a[split..]);
            genes
        };

        let mutations =
            (rng.gen_range(self.min_mutations..=self.max_mutations) as usize).min(len);
        for slot in index::sample(rng, len, mutations) {
            child[slot] = rng.gen_range(0..=GENE_MAX);
        }

        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_genotype_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let genotype = Genotype::random(32, &mut rng);
        assert_eq!(genotype.len(), 32);
        assert!(genotype.genes().iter().all(|&g| g <= GENE_MAX));
        assert_eq!(genotype.active_index(), 0);
    }

    #[test]
    fn test_active_index_wraps() {
        let mut genotype = Genotype::from_genes(vec![0, 1, 2, 3]);
        genotype.set_active(6);
        assert_eq!(genotype.active_index(), 2);
        assert_eq!(genotype.gene_at(5), 1);
    }

    #[test]
    fn test_display_concatenates_genes() {
        let genotype = Genotype::from_genes(vec![0, 7, 3, 3]);
        assert_eq!(genotype.to_string(), "0733");
    }

    #[test]
    fn test_crossover_without_mutation_splits_by_energy() {
        let mut rng = StdRng::seed_from_u64(42);
        let crossover = Crossover::new(0, 0);
        let a = vec![1u8; 10];
        let b = vec![2u8; 10];

        // All the energy on one side: the child is a pure copy of that side
        // regardless of which parent won the coin flip.
        let child = crossover.child_genes(&a, &b, 50, 0, &mut rng);
        assert_eq!(child, a);
        let child = crossover.child_genes(&a, &b, 0, 50, &mut rng);
        assert_eq!(child, b);

        // Equal energy: one contiguous half from each parent.
        let child = crossover.child_genes(&a, &b, 30, 30, &mut rng);
        assert_eq!(child.iter().filter(|&&g| g == 1).count(), 5);
        assert_eq!(child.iter().filter(|&&g| g == 2).count(), 5);
    }

    proptest! {
        #[test]
        fn prop_child_genes_stay_valid(
            seed in any::<u64>(),
            len in 1usize..64,
            energy_a in 0i32..500,
            energy_b in 0i32..500,
            min in 0u32..8,
            extra in 0u32..8,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let a = Genotype::random(len, &mut rng);
            let b = Genotype::random(len, &mut rng);
            let crossover = Crossover::new(min, min + extra);

            let child = crossover.child_genes(a.genes(), b.genes(), energy_a, energy_b, &mut rng);

            prop_assert_eq!(child.len(), len);
            prop_assert!(child.iter().all(|&g| g <= GENE_MAX));
        }
    }
}
