//! # Symmetric Eigendecomposition
//!
//! The eigensolver is an injected collaborator: anything implementing
//! [`EigenSolver`] can back the covariance decomposition. Matrices cross this
//! boundary as row-major flattened `f64` buffers.

use anyhow::{anyhow, bail, Context};
use nalgebra::{DMatrix, DVector};

use crate::utils::check_square;

#[cfg(feature = "lapack")]
mod lapack;

#[cfg(feature = "lapack")]
pub use lapack::LapackEigen;

/// Eigenvectors and eigenvalues of a covariance matrix, sorted by descending
/// eigenvalue.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenBasis {
    /// Row-major `m`-by-`m` buffer, row `i` is the `i`-th eigenvector.
    pub eigenvectors: Vec<f64>,
    pub eigenvalues: Vec<f64>,
}

impl EigenBasis {
    pub fn dimension(&self) -> usize {
        self.eigenvalues.len()
    }

    /// The `i`-th eigenvector.
    pub fn eigenvector(&self, i: usize) -> &[f64] {
        let m = self.dimension();
        &self.eigenvectors[i * m..(i + 1) * m]
    }

    pub fn total_variance(&self) -> f64 {
        self.eigenvalues.iter().sum()
    }

    /// Builds a basis from the column-eigenvector output of a solver, sorting
    /// the pairs by descending eigenvalue and clamping round-off negatives.
    ///
    /// Eigenvalues below `-tolerance * max(|λ|)` mean the matrix is not
    /// positive semi-definite and are reported as an error.
    pub(crate) fn from_columns(
        eigenvectors: &DMatrix<f64>,
        eigenvalues: &DVector<f64>,
        tolerance: f64,
    ) -> anyhow::Result<Self> {
        let m = eigenvalues.len();
        if eigenvectors.nrows() != m || eigenvectors.ncols() != m {
            bail!(
                "Eigenvector matrix is {}x{}, expected {}x{}",
                eigenvectors.nrows(),
                eigenvectors.ncols(),
                m,
                m
            );
        }
        if eigenvalues.iter().any(|v| !v.is_finite()) {
            bail!("Eigensolver produced non-finite eigenvalues");
        }

        let scale = eigenvalues.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let floor = tolerance * scale;

        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let mut values = Vec::with_capacity(m);
        let mut vectors = Vec::with_capacity(m * m);
        for &k in &order {
            let mut value = eigenvalues[k];
            if value < 0.0 {
                if -value > floor {
                    bail!(
                        "Matrix is not positive semi-definite: eigenvalue {:e} is below tolerance {:e}",
                        value,
                        -floor
                    );
                }
                log::warn!("Clamping negative eigenvalue {:e} to zero", value);
                value = 0.0;
            }
            values.push(value);
            vectors.extend(eigenvectors.column(k).iter().copied());
        }

        Ok(EigenBasis {
            eigenvectors: vectors,
            eigenvalues: values,
        })
    }
}

/// Symmetric eigendecomposition of a covariance matrix.
pub trait EigenSolver {
    /// Decomposes the row-major `m`-by-`m` `matrix`.
    ///
    /// Implementations return the eigenpairs sorted by descending eigenvalue
    /// and fail if the matrix is malformed or the solver does not converge.
    fn eigendecompose(&self, matrix: &[f64], m: usize, tolerance: f64)
        -> anyhow::Result<EigenBasis>;
}

impl<S: EigenSolver + ?Sized> EigenSolver for &S {
    fn eigendecompose(
        &self,
        matrix: &[f64],
        m: usize,
        tolerance: f64,
    ) -> anyhow::Result<EigenBasis> {
        (**self).eigendecompose(matrix, m, tolerance)
    }
}

/// Checks shape, finiteness and symmetry of a covariance buffer and loads it
/// into a nalgebra matrix.
pub(crate) fn load_symmetric(
    matrix: &[f64],
    m: usize,
    symmetry_tolerance: f64,
) -> anyhow::Result<DMatrix<f64>> {
    check_square(matrix.len(), m)?;
    if let Some(pos) = matrix.iter().position(|v| !v.is_finite()) {
        bail!(
            "Matrix entry ({}, {}) is not finite: {}",
            pos / m,
            pos % m,
            matrix[pos]
        );
    }

    let scale = matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let limit = symmetry_tolerance * scale.max(1.0);
    for i in 0..m {
        for j in (i + 1)..m {
            let (a, b) = (matrix[i * m + j], matrix[j * m + i]);
            if (a - b).abs() > limit {
                bail!(
                    "Matrix is not symmetric: entry ({}, {}) = {} but ({}, {}) = {}",
                    i,
                    j,
                    a,
                    j,
                    i,
                    b
                );
            }
        }
    }

    Ok(DMatrix::from_row_slice(m, m, matrix))
}

/// Pure-Rust eigensolver backed by nalgebra's symmetric QR iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraEigen {
    max_iterations: usize,
    symmetry_tolerance: Option<f64>,
}

impl NalgebraEigen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of QR sweeps. `0` leaves the iteration unbounded.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Relative tolerance for the symmetry check. Defaults to the tolerance
    /// passed to [`EigenSolver::eigendecompose`].
    pub fn symmetry_tolerance(mut self, tolerance: f64) -> Self {
        self.symmetry_tolerance = Some(tolerance);
        self
    }
}

impl EigenSolver for NalgebraEigen {
    fn eigendecompose(
        &self,
        matrix: &[f64],
        m: usize,
        tolerance: f64,
    ) -> anyhow::Result<EigenBasis> {
        let symmetric = load_symmetric(
            matrix,
            m,
            self.symmetry_tolerance.unwrap_or(tolerance),
        )?;

        log::trace!(
            "Running symmetric eigendecomposition on {}x{} matrix (max_iterations = {})",
            m,
            m,
            self.max_iterations
        );

        // nalgebra's own convergence threshold is unrelated to the PSD tolerance.
        let eigen = nalgebra::SymmetricEigen::try_new(
            symmetric,
            f64::EPSILON,
            self.max_iterations,
        )
        .ok_or_else(|| anyhow!("Symmetric eigendecomposition did not converge"))?;

        EigenBasis::from_columns(&eigen.eigenvectors, &eigen.eigenvalues, tolerance)
            .context("Failed to order eigendecomposition")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_diagonal_matrix() {
        let basis = NalgebraEigen::new()
            .eigendecompose(&[1.0, 0.0, 0.0, 4.0], 2, 1e-8)
            .unwrap();

        assert_eq!(basis.dimension(), 2);
        assert_abs_diff_eq!(basis.eigenvalues[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(basis.eigenvalues[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(basis.eigenvector(0)[1].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(basis.eigenvector(1)[0].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(basis.total_variance(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sorted_and_orthonormal() {
        #[rustfmt::skip]
        let cov = [
            5.0, 2.0, 1.0,
            2.0, 3.0, 0.5,
            1.0, 0.5, 1.0,
        ];
        let basis = NalgebraEigen::new().eigendecompose(&cov, 3, 1e-8).unwrap();

        assert!(basis.eigenvalues.windows(2).all(|w| w[0] >= w[1]));
        assert_abs_diff_eq!(basis.total_variance(), 9.0, epsilon = 1e-10);

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(
                    dot(basis.eigenvector(i), basis.eigenvector(j)),
                    expected,
                    epsilon = 1e-10
                );
            }
        }

        // A v = λ v
        for i in 0..3 {
            let v = basis.eigenvector(i);
            for r in 0..3 {
                let av = dot(&cov[r * 3..(r + 1) * 3], v);
                assert_abs_diff_eq!(av, basis.eigenvalues[i] * v[r], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_rank_deficient_is_clamped() {
        // Rank one: [1, 1]^T [1, 1]
        let basis = NalgebraEigen::new()
            .eigendecompose(&[1.0, 1.0, 1.0, 1.0], 2, 1e-8)
            .unwrap();

        assert_abs_diff_eq!(basis.eigenvalues[0], 2.0, epsilon = 1e-12);
        assert!(basis.eigenvalues[1] >= 0.0);
        assert_abs_diff_eq!(basis.eigenvalues[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_not_symmetric() {
        let err = NalgebraEigen::new()
            .eigendecompose(&[1.0, 2.0, 0.0, 1.0], 2, 1e-8)
            .unwrap_err();
        assert!(err.to_string().contains("not symmetric"));
    }

    #[test]
    fn test_not_positive_semidefinite() {
        let err = NalgebraEigen::new()
            .eigendecompose(&[1.0, 2.0, 2.0, 1.0], 2, 1e-8)
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to order eigendecomposition");
        assert!(format!("{:#}", err).contains("not positive semi-definite"));
    }

    #[test]
    fn test_non_finite_and_shape() {
        let solver = NalgebraEigen::new();
        assert!(solver.eigendecompose(&[f64::NAN, 0.0, 0.0, 1.0], 2, 1e-8).is_err());
        assert!(solver.eigendecompose(&[1.0, 0.0, 0.0], 2, 1e-8).is_err());
        assert!(solver.eigendecompose(&[], 0, 1e-8).is_err());
    }

    #[test]
    fn test_symmetry_tolerance_override() {
        let cov = [2.0, 1.0, 1.0 + 1e-6, 2.0];
        assert!(NalgebraEigen::new().eigendecompose(&cov, 2, 1e-8).is_err());
        assert!(NalgebraEigen::new()
            .symmetry_tolerance(1e-4)
            .eigendecompose(&cov, 2, 1e-8)
            .is_ok());
    }
}
