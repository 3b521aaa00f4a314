use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DEFAULT_TOP_K;

/// Engine step delays are clamped into this window rather than rejected;
/// speed is a live tunable, not a validated constant.
pub const MIN_STEP_DELAY_MS: u64 = 10;
pub const MAX_STEP_DELAY_MS: u64 = 5000;

pub fn clamp_step_delay(ms: u64) -> u64 {
    ms.clamp(MIN_STEP_DELAY_MS, MAX_STEP_DELAY_MS)
}

/// Grid topology selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapVariant {
    /// Toroidal wrap on the x axis, reflecting pole rows on the y axis.
    Globe,
    /// Globe rules plus dynamic water on a 10-day tide cycle. Higher
    /// `violence_pct` makes the tide retreat less relative to its advance.
    Tidal {
        initial_water: u32,
        violence_pct: u32,
    },
}

/// How an animal's next active gene index is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementVariant {
    /// Circular replay of the genotype.
    Predestined,
    /// Index derived from the animal's age; the replay drifts as it ages.
    AgeDriven,
}

/// Where new plants are allowed to sprout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationVariant {
    /// Any free cell.
    Anywhere,
    /// Only a fertile band of rows around the equator.
    FertileBand,
}

/// Immutable configuration for one simulation run. Validated eagerly by
/// `validate()`; shared by reference afterwards and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProperties {
    pub width: i32,
    pub height: i32,

    pub start_animals: u32,
    pub start_plants: u32,
    pub plants_per_day: u32,

    pub start_energy: i32,
    pub plant_energy: i32,
    pub move_cost: i32,
    pub reproduction_threshold: i32,
    pub reproduction_cost: i32,

    pub genome_length: usize,
    pub min_mutations: u32,
    pub max_mutations: u32,

    pub map: MapVariant,
    pub movement: MovementVariant,
    pub vegetation: VegetationVariant,

    /// Suggested inter-step delay; the engine clamps it into bounds.
    pub step_delay_ms: u64,
    /// Wall-clock cadence of the snapshot producer.
    pub snapshot_interval_ms: u64,
    /// How many genotypes the per-day ranking reports.
    pub top_k: usize,

    pub run_name: String,
    pub save_statistics: bool,
    /// Deterministic seed; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for SimProperties {
    fn default() -> Self {
        Self {
            width: 30,
            height: 30,
            start_animals: 20,
            start_plants: 40,
            plants_per_day: 6,
            start_energy: 50,
            plant_energy: 10,
            move_cost: 1,
            reproduction_threshold: 30,
            reproduction_cost: 12,
            genome_length: 32,
            min_mutations: 0,
            max_mutations: 3,
            map: MapVariant::Globe,
            movement: MovementVariant::Predestined,
            vegetation: VegetationVariant::FertileBand,
            step_delay_ms: 300,
            snapshot_interval_ms: 100,
            top_k: DEFAULT_TOP_K,
            run_name: "meadow".to_string(),
            save_statistics: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("map dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("starting energy must be positive, got {0}")]
    InvalidStartEnergy(i32),
    #[error("plant energy must be positive, got {0}")]
    InvalidPlantEnergy(i32),
    #[error("move cost must not be negative, got {0}")]
    InvalidMoveCost(i32),
    #[error("genome length must be positive")]
    EmptyGenome,
    #[error("mutation bounds {min}..={max} must be ordered and fit genome length {len}")]
    InvalidMutationBounds { min: u32, max: u32, len: usize },
    #[error("reproduction threshold must be positive, got {0}")]
    InvalidReproductionThreshold(i32),
    #[error("reproduction cost {cost} must be positive and not exceed the threshold {threshold}")]
    InvalidReproductionCost { cost: i32, threshold: i32 },
    #[error("reproduction cost {cost} must not exceed starting energy {start}")]
    ReproductionCostAboveStartEnergy { cost: i32, start: i32 },
    #[error("{plants} starting plants cannot fit a {cells}-cell grid")]
    TooManyStartPlants { plants: u32, cells: u64 },
    #[error("tide violence must be a percentage, got {0}")]
    InvalidViolence(u32),
    #[error("{water} water cells cannot fit a {cells}-cell grid with room to spare")]
    TooMuchWater { water: u32, cells: u64 },
    #[error("top-k must be positive")]
    InvalidTopK,
    #[error("run name must not be empty")]
    EmptyRunName,
}

impl SimProperties {
    /// Fail-fast validation. Invalid values are reported, never silently
    /// corrected; the step delay is the single documented exception and is
    /// clamped by the engine instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_grid()?;
        self.validate_energy()?;
        self.validate_genome()?;
        self.validate_map()?;
        self.validate_reporting()?;
        Ok(())
    }

    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn validate_grid(&self) -> Result<(), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if u64::from(self.start_plants) > self.cell_count() {
            return Err(ConfigError::TooManyStartPlants {
                plants: self.start_plants,
                cells: self.cell_count(),
            });
        }
        Ok(())
    }

    fn validate_energy(&self) -> Result<(), ConfigError> {
        if self.start_energy <= 0 {
            return Err(ConfigError::InvalidStartEnergy(self.start_energy));
        }
        if self.plant_energy <= 0 {
            return Err(ConfigError::InvalidPlantEnergy(self.plant_energy));
        }
        if self.move_cost < 0 {
            return Err(ConfigError::InvalidMoveCost(self.move_cost));
        }
        if self.reproduction_threshold <= 0 {
            return Err(ConfigError::InvalidReproductionThreshold(
                self.reproduction_threshold,
            ));
        }
        if self.reproduction_cost <= 0 || self.reproduction_cost > self.reproduction_threshold {
            return Err(ConfigError::InvalidReproductionCost {
                cost: self.reproduction_cost,
                threshold: self.reproduction_threshold,
            });
        }
        if self.reproduction_cost > self.start_energy {
            return Err(ConfigError::ReproductionCostAboveStartEnergy {
                cost: self.reproduction_cost,
                start: self.start_energy,
            });
        }
        Ok(())
    }

    fn validate_genome(&self) -> Result<(), ConfigError> {
        if self.genome_length == 0 {
            return Err(ConfigError::EmptyGenome);
        }
        if self.min_mutations > self.max_mutations
            || self.max_mutations as usize > self.genome_length
        {
            return Err(ConfigError::InvalidMutationBounds {
                min: self.min_mutations,
                max: self.max_mutations,
                len: self.genome_length,
            });
        }
        Ok(())
    }

    fn validate_map(&self) -> Result<(), ConfigError> {
        if let MapVariant::Tidal {
            initial_water,
            violence_pct,
        } = self.map
        {
            if violence_pct > 100 {
                return Err(ConfigError::InvalidViolence(violence_pct));
            }
            // Water may grow at high tide; demand room for land to remain.
            if u64::from(initial_water) >= self.cell_count() {
                return Err(ConfigError::TooMuchWater {
                    water: initial_water,
                    cells: self.cell_count(),
                });
            }
        }
        Ok(())
    }

    fn validate_reporting(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.run_name.is_empty() {
            return Err(ConfigError::EmptyRunName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SimProperties::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let props = SimProperties {
            width: 0,
            ..Default::default()
        };
        assert_eq!(
            props.validate(),
            Err(ConfigError::InvalidDimensions {
                width: 0,
                height: 30
            })
        );
    }

    #[test]
    fn test_rejects_mutation_bounds_outside_genome() {
        let props = SimProperties {
            genome_length: 4,
            min_mutations: 2,
            max_mutations: 6,
            ..Default::default()
        };
        assert!(matches!(
            props.validate(),
            Err(ConfigError::InvalidMutationBounds { .. })
        ));

        let props = SimProperties {
            min_mutations: 3,
            max_mutations: 1,
            ..Default::default()
        };
        assert!(matches!(
            props.validate(),
            Err(ConfigError::InvalidMutationBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_reproduction_cost_above_threshold() {
        let props = SimProperties {
            reproduction_threshold: 10,
            reproduction_cost: 11,
            ..Default::default()
        };
        assert!(matches!(
            props.validate(),
            Err(ConfigError::InvalidReproductionCost { .. })
        ));
    }

    #[test]
    fn test_rejects_reproduction_cost_above_start_energy() {
        let props = SimProperties {
            start_energy: 10,
            reproduction_threshold: 40,
            reproduction_cost: 20,
            ..Default::default()
        };
        assert!(matches!(
            props.validate(),
            Err(ConfigError::ReproductionCostAboveStartEnergy { .. })
        ));
    }

    #[test]
    fn test_rejects_flooded_tidal_grid() {
        let props = SimProperties {
            width: 5,
            height: 5,
            start_plants: 0,
            map: MapVariant::Tidal {
                initial_water: 25,
                violence_pct: 20,
            },
            ..Default::default()
        };
        assert!(matches!(
            props.validate(),
            Err(ConfigError::TooMuchWater { .. })
        ));

        let props = SimProperties {
            map: MapVariant::Tidal {
                initial_water: 10,
                violence_pct: 120,
            },
            ..Default::default()
        };
        assert_eq!(props.validate(), Err(ConfigError::InvalidViolence(120)));
    }

    #[test]
    fn test_step_delay_is_clamped_not_rejected() {
        assert_eq!(clamp_step_delay(0), MIN_STEP_DELAY_MS);
        assert_eq!(clamp_step_delay(250), 250);
        assert_eq!(clamp_step_delay(1_000_000), MAX_STEP_DELAY_MS);
    }

    #[test]
    fn test_config_json_round_trip() {
        let props = SimProperties {
            map: MapVariant::Tidal {
                initial_water: 12,
                violence_pct: 40,
            },
            movement: MovementVariant::AgeDriven,
            seed: Some(99),
            ..Default::default()
        };
        let json = serde_json::to_string(&props).unwrap();
        let decoded: SimProperties = serde_json::from_str(&json).unwrap();
        assert_eq!(props, decoded);
    }
}
