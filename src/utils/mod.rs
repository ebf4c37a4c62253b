use anyhow::bail;
use num_traits::Float;

/// Tolerance handed to the eigensolver when none is configured.
pub fn default_tolerance() -> f64 {
    f64::EPSILON.sqrt()
}

/// Converts an `f64` literal into `T`, falling back to NaN if `T` cannot hold it.
pub(crate) fn lit<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Checks that a flattened buffer holds an `m`-by-`m` matrix.
pub(crate) fn check_square(len: usize, m: usize) -> anyhow::Result<()> {
    if m == 0 {
        bail!("Matrix dimension must be positive");
    }
    match m.checked_mul(m) {
        Some(expected) if expected == len => Ok(()),
        _ => bail!(
            "Length of matrix ({}) does not match dimension {}x{}",
            len,
            m,
            m
        ),
    }
}
