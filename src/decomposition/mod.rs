//! # Covariance Decomposition
//!
//! Reduces an `m`-by-`m` covariance matrix Σ to `n ≤ m` principal directions
//! and builds a pair of linear maps between the correlated space and an
//! uncorrelated, unit-variance space:
//!
//! - the forward (coloring) map `C` is `m × n`: for `z` with uncorrelated
//!   unit-variance components, `C z` has covariance Σ restricted to the
//!   retained directions;
//! - the inverse (whitening) map `D` is `n × m`: for `x` distributed per Σ,
//!   `D x` has uncorrelated unit-variance components.
//!
//! `n` is the smallest number of leading eigenvalues whose cumulative sum
//! reaches the retention fraction λ ∈ (0, 1] of the total variance.
//!
//! The maps are held in row-major (standard) layout; [`Decomposition::into_parts`]
//! flattens them eigenvector-major.

use anyhow::bail;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::eigen::{EigenBasis, EigenSolver, NalgebraEigen};
use crate::utils::{check_square, default_tolerance};

/// Result of a covariance decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    forward: Array2<f64>,
    inverse: Array2<f64>,
    eigenvalues: Vec<f64>,
    total_variance: f64,
}

impl Decomposition {
    /// Forward map `C`, shape `m × n`.
    pub fn forward(&self) -> ArrayView2<'_, f64> {
        self.forward.view()
    }

    /// Inverse map `D`, shape `n × m`.
    pub fn inverse(&self) -> ArrayView2<'_, f64> {
        self.inverse.view()
    }

    /// Effective dimension `n`.
    pub fn dimension(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Original dimension `m`.
    pub fn original_dimension(&self) -> usize {
        self.forward.nrows()
    }

    /// Eigenvalues of the retained components, descending.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn total_variance(&self) -> f64 {
        self.total_variance
    }

    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        self.eigenvalues
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }

    /// Fraction of the total variance captured by the retained components.
    pub fn retained_variance(&self) -> f64 {
        self.eigenvalues.iter().sum::<f64>() / self.total_variance
    }

    /// Maps `n` uncorrelated components into the correlated space (`C z`).
    pub fn color(&self, z: ArrayView1<f64>) -> anyhow::Result<Array1<f64>> {
        if z.len() != self.dimension() {
            bail!(
                "Length of input ({}) does not match effective dimension ({})",
                z.len(),
                self.dimension()
            );
        }
        Ok(self.forward.dot(&z))
    }

    /// Maps an `m`-vector from the correlated space to `n` uncorrelated
    /// components (`D x`).
    pub fn whiten(&self, x: ArrayView1<f64>) -> anyhow::Result<Array1<f64>> {
        if x.len() != self.original_dimension() {
            bail!(
                "Length of input ({}) does not match original dimension ({})",
                x.len(),
                self.original_dimension()
            );
        }
        Ok(self.inverse.dot(&x))
    }

    /// Colors every row of a `samples × n` matrix.
    pub fn color_rows(&self, z: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        if z.ncols() != self.dimension() {
            bail!(
                "Number of columns ({}) does not match effective dimension ({})",
                z.ncols(),
                self.dimension()
            );
        }
        Ok(z.dot(&self.forward.t()))
    }

    /// Whitens every row of a `samples × m` matrix.
    pub fn whiten_rows(&self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        if x.ncols() != self.original_dimension() {
            bail!(
                "Number of columns ({}) does not match original dimension ({})",
                x.ncols(),
                self.original_dimension()
            );
        }
        Ok(x.dot(&self.inverse.t()))
    }

    /// Splits into the flattened forward map (`m·n`), the flattened inverse
    /// map (`n·m`) and the effective dimension.
    ///
    /// The flat buffers follow the eigenvector-major order: for reduced
    /// dimension `i` and original dimension `j`, the forward entry is at
    /// `i * m + j` and the inverse entry at `j * n + i`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>, usize) {
        let n = self.dimension();
        let forward = self.forward.t().iter().copied().collect();
        let inverse = self.inverse.t().iter().copied().collect();
        (forward, inverse, n)
    }
}

/// Number of leading eigenvalues needed to reach `retention` of their total.
///
/// Falls back to all of them if rounding keeps the cumulative ratio below the
/// threshold.
pub fn effective_dimension(eigenvalues: &[f64], retention: f64) -> usize {
    let total: f64 = eigenvalues.iter().sum();
    let mut cumulative = 0.0;
    for (i, value) in eigenvalues.iter().enumerate() {
        cumulative += value;
        if cumulative / total >= retention {
            return i + 1;
        }
    }
    eigenvalues.len()
}

pub struct DecomposerBuilder<S: EigenSolver> {
    solver: S,
    retention: f64,
    tolerance: Option<f64>,
}

impl<S: EigenSolver> DecomposerBuilder<S> {
    pub fn new(solver: S) -> Self {
        DecomposerBuilder {
            solver,
            retention: 1.0,
            tolerance: None,
        }
    }

    /// Fraction of the total variance to preserve, in `(0, 1]`.
    pub fn retention(mut self, retention: f64) -> Self {
        self.retention = retention;
        self
    }

    /// Tolerance passed to the eigensolver. Defaults to `sqrt(f64::EPSILON)`.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Decomposer<S> {
        Decomposer {
            solver: self.solver,
            retention: self.retention,
            tolerance: self.tolerance.unwrap_or_else(default_tolerance),
        }
    }
}

impl Default for DecomposerBuilder<NalgebraEigen> {
    fn default() -> Self {
        Self::new(NalgebraEigen::new())
    }
}

/// Variance-truncated covariance decomposition over an injected eigensolver.
pub struct Decomposer<S: EigenSolver> {
    solver: S,
    retention: f64,
    tolerance: f64,
}

impl<S: EigenSolver> Decomposer<S> {
    pub fn retention(&self) -> f64 {
        self.retention
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Decomposes a row-major `m`-by-`m` covariance matrix.
    ///
    /// Solver failures are returned unchanged.
    pub fn decompose(&self, covariance: &[f64], m: usize) -> anyhow::Result<Decomposition> {
        if !(self.retention > 0.0 && self.retention <= 1.0) {
            bail!("Retention must lie in (0, 1], got {}", self.retention);
        }
        check_square(covariance.len(), m)?;

        let basis = self.solver.eigendecompose(covariance, m, self.tolerance)?;
        self.reduce(&basis, m)
    }

    /// Decomposes a square covariance matrix given as an ndarray view.
    pub fn decompose_array(&self, covariance: ArrayView2<f64>) -> anyhow::Result<Decomposition> {
        let (rows, cols) = covariance.dim();
        if rows != cols {
            bail!("Covariance matrix must be square, got {}x{}", rows, cols);
        }
        let flat: Vec<f64> = covariance.iter().copied().collect();
        self.decompose(&flat, rows)
    }

    fn reduce(&self, basis: &EigenBasis, m: usize) -> anyhow::Result<Decomposition> {
        if basis.eigenvalues.len() != m || basis.eigenvectors.len() != m * m {
            bail!(
                "Eigensolver returned {} eigenvalues and {} eigenvector entries for dimension {}",
                basis.eigenvalues.len(),
                basis.eigenvectors.len(),
                m
            );
        }

        let total_variance = basis.total_variance();
        if !(total_variance > 0.0) {
            bail!("Covariance matrix has no positive variance (total {})", total_variance);
        }

        let n = effective_dimension(&basis.eigenvalues, self.retention);
        let eigenvalues = basis.eigenvalues[..n].to_vec();
        log::debug!(
            "Reduced covariance from {} to {} dimensions, retaining {:.6} of variance (target {})",
            m,
            n,
            eigenvalues.iter().sum::<f64>() / total_variance,
            self.retention
        );

        let mut forward = Array2::<f64>::zeros((m, n));
        let mut inverse = Array2::<f64>::zeros((n, m));
        for (i, &value) in eigenvalues.iter().enumerate() {
            if value <= 0.0 {
                log::warn!(
                    "Component {} has zero variance and cannot be whitened",
                    i
                );
            }
            let sigma = value.sqrt();
            for (j, &rho) in basis.eigenvector(i).iter().enumerate() {
                forward[[j, i]] = rho * sigma;
                inverse[[i, j]] = rho / sigma;
            }
        }

        Ok(Decomposition {
            forward,
            inverse,
            eigenvalues,
            total_variance,
        })
    }
}

/// Decomposes `covariance` with the default eigensolver, keeping the leading
/// components that explain at least `retention` of the variance.
pub fn decompose(covariance: &[f64], m: usize, retention: f64) -> anyhow::Result<Decomposition> {
    DecomposerBuilder::default()
        .retention(retention)
        .build()
        .decompose(covariance, m)
}

/// Same as [`decompose`] for an ndarray covariance matrix.
pub fn decompose_array(covariance: ArrayView2<f64>, retention: f64) -> anyhow::Result<Decomposition> {
    DecomposerBuilder::default()
        .retention(retention)
        .build()
        .decompose_array(covariance)
}
