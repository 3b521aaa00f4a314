use shared::{Coord, VegetationVariant};

/// Vegetation policy, resolved once at construction: decides which free
/// cells are eligible for new plant growth.
#[derive(Debug, Clone, Copy)]
pub struct Vegetation {
    variant: VegetationVariant,
    band_from: i32,
    band_to: i32,
}

impl Vegetation {
    /// The fertile band covers roughly a fifth of the rows, centered on the
    /// equator, and never fewer than one row.
    pub fn new(variant: VegetationVariant, height: i32) -> Self {
        let band_rows = (height / 5).max(1);
        let band_from = (height - band_rows) / 2;
        Self {
            variant,
            band_from,
            band_to: band_from + band_rows - 1,
        }
    }

    pub fn allows(&self, pos: Coord) -> bool {
        match self.variant {
            VegetationVariant::Anywhere => true,
            VegetationVariant::FertileBand => pos.y >= self.band_from && pos.y <= self.band_to,
        }
    }
}
