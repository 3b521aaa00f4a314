use shared::{Genotype, MovementVariant};

/// Select the gene index consulted for the next step.
///
/// `Predestined` replays the genotype cyclically. `AgeDriven` derives the
/// index from the animal's age instead, monotonic before the wrap, so the
/// realized pattern skips ahead and drifts as the animal grows old.
pub fn next_active_index(variant: MovementVariant, genotype: &Genotype, age: u32) -> usize {
    let len = genotype.len();
    match variant {
        MovementVariant::Predestined => (genotype.active_index() + 1) % len,
        MovementVariant::AgeDriven => {
            let age = age as usize;
            (age + age / len) % len
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predestined_cycles_through_genotype() {
        let mut genotype = Genotype::from_genes(vec![0, 1, 2]);
        let mut seen = Vec::new();
        for _ in 0..6 {
            let idx = next_active_index(MovementVariant::Predestined, &genotype, 0);
            genotype.set_active(idx);
            seen.push(idx);
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_age_driven_index_is_monotonic_with_wrap() {
        let genotype = Genotype::from_genes(vec![0; 8]);
        let len = genotype.len();
        let mut previous_unwrapped = 0;
        for age in 0..100u32 {
            let age_usize = age as usize;
            let unwrapped = age_usize + age_usize / len;
            assert!(unwrapped >= previous_unwrapped);
            previous_unwrapped = unwrapped;

            let idx = next_active_index(MovementVariant::AgeDriven, &genotype, age);
            assert_eq!(idx, unwrapped % len);
            assert!(idx < len);
        }
    }

    #[test]
    fn test_age_driven_drifts_from_predestined() {
        // After one full genotype length of aging, the age-driven index has
        // skipped ahead of the plain cyclic position.
        let genotype = Genotype::from_genes(vec![0; 4]);
        assert_eq!(next_active_index(MovementVariant::AgeDriven, &genotype, 2), 2);
        assert_eq!(next_active_index(MovementVariant::AgeDriven, &genotype, 4), 1);
        assert_eq!(next_active_index(MovementVariant::AgeDriven, &genotype, 9), 3);
    }
}
