pub mod correlation;
pub mod decomposition;
pub mod eigen;
mod utils;

pub use correlation::{kendall_pearson, spearman_pearson, Kendall, PearsonConversion, Spearman};
pub use decomposition::{decompose, decompose_array, Decomposer, DecomposerBuilder, Decomposition};
pub use eigen::{EigenBasis, EigenSolver, NalgebraEigen};
pub use utils::default_tolerance;
