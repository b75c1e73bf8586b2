//! Small numerical helpers shared by materials, kernels and the solver.
use crate::error::{HomogenizationError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

/// Tolerance used for symmetry and definiteness tests, and the lower bound of element densities.
pub const NUMERICAL_ZERO: f64 = 1e-9;

/// Returns `(A + A^T) / 2`.
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Fuzzy comparison `||a - b|| <= precision * min(||a||, ||b||)` in the Frobenius norm.
///
/// Note that, as a relative comparison, this can never succeed when one of the arguments is
/// exactly zero and the other is not.
pub fn is_approx(a: &DMatrix<f64>, b: &DMatrix<f64>, precision: f64) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    (a - b).norm() <= precision * a.norm().min(b.norm())
}

pub fn is_symmetric(matrix: &DMatrix<f64>) -> bool {
    matrix.is_square() && is_approx(matrix, &matrix.transpose(), NUMERICAL_ZERO)
}

/// Symmetric positive definite, as decided by a successful Cholesky factorization.
pub fn is_pd(matrix: &DMatrix<f64>) -> bool {
    is_symmetric(matrix) && matrix.clone().cholesky().is_some()
}

/// Symmetric positive semi-definite, with eigenvalues allowed to dip to `-NUMERICAL_ZERO`.
pub fn is_psd(matrix: &DMatrix<f64>) -> bool {
    if !is_symmetric(matrix) {
        return false;
    }
    let eigen = SymmetricEigen::new(symmetrize(matrix));
    eigen.eigenvalues.iter().all(|&lambda| lambda >= -NUMERICAL_ZERO)
}

pub fn arithmetic_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Harmonic mean `n / sum(1 / v_i)`.
///
/// Zero entries have no finite reciprocal and are rejected.
pub fn harmonic_mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Ok(0.0);
    }
    let mut reciprocal_sum = 0.0;
    for &v in values {
        if v == 0.0 {
            return Err(HomogenizationError::invalid_configuration(
                "Harmonic mean is undefined for values containing zero.",
            ));
        }
        reciprocal_sum += 1.0 / v;
    }
    Ok(values.len() as f64 / reciprocal_sum)
}

/// Assembles the 2x2 block matrix `[[a, b], [c, d]]`.
///
/// # Panics
///
/// Panics if the block dimensions are incompatible.
pub(crate) fn block_matrix(a: &DMatrix<f64>, b: &DMatrix<f64>, c: &DMatrix<f64>, d: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(a.nrows(), b.nrows());
    assert_eq!(c.nrows(), d.nrows());
    assert_eq!(a.ncols(), c.ncols());
    assert_eq!(b.ncols(), d.ncols());
    let (m, n) = a.shape();
    let mut result = DMatrix::zeros(m + c.nrows(), n + b.ncols());
    result.view_mut((0, 0), a.shape()).copy_from(a);
    result.view_mut((0, n), b.shape()).copy_from(b);
    result.view_mut((m, 0), c.shape()).copy_from(c);
    result.view_mut((m, n), d.shape()).copy_from(d);
    result
}
