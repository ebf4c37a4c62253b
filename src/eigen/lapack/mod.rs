use anyhow::{anyhow, Context};

use super::{load_symmetric, EigenBasis, EigenSolver};

/// Eigensolver backed by LAPACK's `dsyev`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LapackEigen;

impl EigenSolver for LapackEigen {
    fn eigendecompose(
        &self,
        matrix: &[f64],
        m: usize,
        tolerance: f64,
    ) -> anyhow::Result<EigenBasis> {
        let symmetric = load_symmetric(matrix, m, tolerance)?;

        let eigen = nalgebra_lapack::SymmetricEigen::try_new(symmetric)
            .ok_or_else(|| anyhow!("LAPACK symmetric eigendecomposition failed"))?;

        EigenBasis::from_columns(&eigen.eigenvectors, &eigen.eigenvalues, tolerance)
            .context("Failed to order eigendecomposition")
    }
}
