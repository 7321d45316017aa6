//! Backend-dispatched linear algebra: products, covariance, eigenproblems,
//! inversion and the principal matrix square root.
//!
//! Shape and symmetry preconditions are checked here, before any backend is
//! called. Numerical failures are governed by [`NumericPolicy`].

use crate::backend;
use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;
use crate::traits::{EigenDecomposition, Transpose};
use serde::{Deserialize, Serialize};

/// What to do when an operation produces a numerically invalid result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumericPolicy {
    /// Report `FaceCoreError::NumericallyInvalid`.
    #[default]
    Strict,
    /// Let NaN values flow into the result, as the legacy library did.
    Propagate,
}

fn ensure_square(m: &Matrix) -> Result<()> {
    if !m.is_square() {
        return Err(FaceCoreError::NotSquare {
            rows: m.rows(),
            cols: m.cols(),
        });
    }
    Ok(())
}

fn ensure_symmetric(m: &Matrix) -> Result<()> {
    ensure_square(m)?;
    let n = m.rows();
    let scale = m.as_slice().iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = 1e-9 * scale;
    for j in 0..n {
        for i in (j + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > tolerance {
                return Err(FaceCoreError::NonSymmetricMatrix);
            }
        }
    }
    Ok(())
}

/// `A * B`.
pub fn product(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "Cannot multiply {}x{} by {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    backend::active().gemm(a, Transpose::No, b, Transpose::No)
}

/// `A^T * B` without materializing `A^T`.
pub fn product_transposed(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.rows() != b.rows() {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "Cannot multiply ({}x{})^T by {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    backend::active().gemm(a, Transpose::Yes, b, Transpose::No)
}

pub fn transpose(m: &Matrix) -> Matrix {
    let (rows, cols) = m.dims();
    let src = m.as_slice();
    let mut data = vec![0.0; rows * cols];
    for j in 0..cols {
        for i in 0..rows {
            // T(j, i) = M(i, j); T has `cols` rows
            data[j + i * cols] = src[i + j * rows];
        }
    }
    Matrix::from_parts(cols, rows, data)
}

/// Covariance of the columns of `m` taken as observations: `A * A^T / (n - 1)`
/// where `A` is `m` with its mean column removed. The divisor floors at 1.
pub fn covariance(m: &Matrix) -> Result<Matrix> {
    let mut a = m.copy();
    let mean = a.mean_column();
    a.subtract_columns(&mean)?;

    let mut c = backend::active().gemm(&a, Transpose::No, &a, Transpose::Yes)?;

    let divisor = if m.cols() > 1 { (m.cols() - 1) as f64 } else { 1.0 };
    c.elem_mult(1.0 / divisor);
    Ok(c)
}

/// Eigenvalues (ascending) and eigenvectors (as columns) of a symmetric matrix.
pub fn eigen(m: &Matrix) -> Result<EigenDecomposition> {
    ensure_symmetric(m)?;
    backend::active().symmetric_eigen(m)
}

/// Solves the generalized symmetric problem `A x = lambda B x`, ascending.
///
/// `B` must be positive definite; eigenvectors are normalized so that `x^T B x = 1`.
pub fn eigen2(a: &Matrix, b: &Matrix) -> Result<EigenDecomposition> {
    ensure_symmetric(a)?;
    ensure_symmetric(b)?;
    if a.rows() != b.rows() {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "eigen2 operands differ in size: {}x{} and {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    backend::active().generalized_eigen(a, b)
}

/// Inverse through LU factorization. Singular input is reported as an error.
pub fn inverse(m: &Matrix) -> Result<Matrix> {
    inverse_with(m, NumericPolicy::Strict)
}

/// Inverse through LU factorization. Under [`NumericPolicy::Propagate`] a
/// singular input yields a NaN-filled matrix instead of an error.
pub fn inverse_with(m: &Matrix, policy: NumericPolicy) -> Result<Matrix> {
    ensure_square(m)?;
    match backend::active().lu_inverse(m)? {
        Some(inv) => Ok(inv),
        None => match policy {
            NumericPolicy::Strict => Err(FaceCoreError::numeric(
                "inverse",
                format!("{}x{} matrix is singular", m.rows(), m.cols()),
            )),
            NumericPolicy::Propagate => {
                log::warn!("inverse of a singular {}x{} matrix", m.rows(), m.cols());
                Ok(Matrix::from_parts(
                    m.rows(),
                    m.cols(),
                    vec![f64::NAN; m.len()],
                ))
            }
        },
    }
}

/// Principal square root of a symmetric matrix, `V * diag(sqrt(lambda)) * V^T`.
pub fn sqrtm(m: &Matrix) -> Result<Matrix> {
    sqrtm_with(m, NumericPolicy::Strict)
}

/// Principal square root of a symmetric matrix.
///
/// Under [`NumericPolicy::Strict`], eigenvalues that are negative only by
/// rounding (within `n * eps * max|lambda|`) are clamped to zero and any other
/// negative eigenvalue is an error. Under [`NumericPolicy::Propagate`] negative
/// eigenvalues produce NaN entries.
pub fn sqrtm_with(m: &Matrix, policy: NumericPolicy) -> Result<Matrix> {
    let EigenDecomposition { values, vectors } = eigen(m)?;
    let n = m.rows();
    let largest = values.as_slice().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = n as f64 * f64::EPSILON * largest;

    let mut b = vectors.copy();
    for (j, &lambda) in values.as_slice().iter().enumerate() {
        let root = match policy {
            NumericPolicy::Propagate => lambda.sqrt(),
            NumericPolicy::Strict if lambda >= -tolerance => lambda.max(0.0).sqrt(),
            NumericPolicy::Strict => {
                return Err(FaceCoreError::numeric(
                    "sqrtm",
                    format!("negative eigenvalue {} has no real square root", lambda),
                ))
            }
        };
        b.column_mut(j).iter_mut().for_each(|v| *v *= root);
    }

    // X = B * V^T, V orthonormal
    backend::active().gemm(&b, Transpose::No, &vectors, Transpose::Yes)
}
