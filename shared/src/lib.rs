pub mod config;
pub mod genes;
pub mod grid;
pub mod records;

pub use config::*;
pub use genes::*;
pub use grid::*;
pub use records::*;

/// Default number of genotypes reported in the per-day ranking.
pub const DEFAULT_TOP_K: usize = 3;
