//! # Rank Correlation Conversion
//!
//! Closed-form conversions from rank correlation coefficients to the Pearson
//! linear correlation coefficient, assuming the underlying variables are
//! jointly normal.
//!
//! - Spearman's ρ: `r = 2 sin(π ρ / 6)`
//! - Kendall's τ: `r = sin(π τ / 2)`
//!
//! Inputs outside `[-1, 1]` are not rejected; the formulas still evaluate but
//! the result is not a meaningful correlation.

use ndarray::{Array2, ArrayView2};
use num_traits::{Float, FloatConst};

use crate::utils::lit;

pub trait PearsonConversion {
    /// Converts a single coefficient.
    fn to_pearson<T>(&self, coefficient: T) -> T
    where
        T: Float + FloatConst;

    /// Converts every coefficient, preserving length and order.
    fn convert<T>(&self, coefficients: &[T]) -> Vec<T>
    where
        T: Float + FloatConst,
    {
        coefficients.iter().map(|&c| self.to_pearson(c)).collect()
    }

    /// Converts a whole coefficient matrix element-wise.
    fn convert_matrix<T>(&self, coefficients: ArrayView2<T>) -> Array2<T>
    where
        T: Float + FloatConst,
    {
        coefficients.mapv(|c| self.to_pearson(c))
    }
}

/// Spearman's rank correlation coefficient.
///
/// <https://en.wikipedia.org/wiki/Spearman%27s_rank_correlation_coefficient>
#[derive(Debug, Clone, Copy, Default)]
pub struct Spearman;

impl PearsonConversion for Spearman {
    fn to_pearson<T>(&self, coefficient: T) -> T
    where
        T: Float + FloatConst,
    {
        lit::<T>(2.0) * (T::PI() * coefficient / lit(6.0)).sin()
    }
}

/// Kendall's τ rank correlation coefficient.
///
/// <https://en.wikipedia.org/wiki/Kendall_rank_correlation_coefficient>
#[derive(Debug, Clone, Copy, Default)]
pub struct Kendall;

impl PearsonConversion for Kendall {
    fn to_pearson<T>(&self, coefficient: T) -> T
    where
        T: Float + FloatConst,
    {
        (T::FRAC_PI_2() * coefficient).sin()
    }
}

/// Converts Spearman's ρ coefficients into Pearson coefficients.
pub fn spearman_pearson<T>(rho: &[T]) -> Vec<T>
where
    T: Float + FloatConst,
{
    Spearman.convert(rho)
}

/// Converts Kendall's τ coefficients into Pearson coefficients.
pub fn kendall_pearson<T>(tau: &[T]) -> Vec<T>
where
    T: Float + FloatConst,
{
    Kendall.convert(tau)
}
