use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;
use crate::traits::{Backend, EigenDecomposition, Transpose};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Host execution through nalgebra's BLAS/LAPACK-style routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

fn to_dmatrix(m: &Matrix) -> DMatrix<f64> {
    // Both sides are column-major
    DMatrix::from_column_slice(m.rows(), m.cols(), m.as_slice())
}

fn from_dmatrix(m: &DMatrix<f64>) -> Matrix {
    Matrix::from_parts(m.nrows(), m.ncols(), m.as_slice().to_vec())
}

fn op(m: &Matrix, trans: Transpose) -> DMatrix<f64> {
    match trans {
        Transpose::No => to_dmatrix(m),
        Transpose::Yes => to_dmatrix(m).transpose(),
    }
}

/// Reorders eigenpairs so eigenvalues ascend, keeping each vector with its value.
fn sorted_ascending(values: &DVector<f64>, vectors: &DMatrix<f64>) -> EigenDecomposition {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut sorted_values = Vec::with_capacity(n);
    let mut sorted_vectors = Vec::with_capacity(n * vectors.nrows());
    for &k in &order {
        sorted_values.push(values[k]);
        sorted_vectors.extend(vectors.column(k).iter().copied());
    }
    EigenDecomposition {
        values: Matrix::from_parts(n, 1, sorted_values),
        vectors: Matrix::from_parts(vectors.nrows(), n, sorted_vectors),
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn gemm(&self, a: &Matrix, trans_a: Transpose, b: &Matrix, trans_b: Transpose) -> Result<Matrix> {
        let a = op(a, trans_a);
        let b = op(b, trans_b);
        if a.ncols() != b.nrows() {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "gemm inner dimensions mismatch: {}x{} * {}x{}",
                a.nrows(),
                a.ncols(),
                b.nrows(),
                b.ncols()
            )));
        }
        let mut c = DMatrix::<f64>::zeros(a.nrows(), b.ncols());
        // C := 1 * op(A) * op(B) + 0 * C
        c.gemm(1.0, &a, &b, 0.0);
        Ok(from_dmatrix(&c))
    }

    fn symmetric_eigen(&self, m: &Matrix) -> Result<EigenDecomposition> {
        let eig = SymmetricEigen::new(to_dmatrix(m));
        Ok(sorted_ascending(&eig.eigenvalues, &eig.eigenvectors))
    }

    fn generalized_eigen(&self, a: &Matrix, b: &Matrix) -> Result<EigenDecomposition> {
        // Reduce to a standard problem: B = L L^T, C = L^-1 A L^-T, x = L^-T y
        let chol = to_dmatrix(b).cholesky().ok_or_else(|| {
            FaceCoreError::numeric("eigen2", "right-hand matrix is not positive definite")
        })?;
        let l = chol.l();
        let not_invertible = || FaceCoreError::numeric("eigen2", "Cholesky factor is singular");

        let y = l
            .solve_lower_triangular(&to_dmatrix(a))
            .ok_or_else(not_invertible)?;
        let c = l
            .solve_lower_triangular(&y.transpose())
            .ok_or_else(not_invertible)?
            .transpose();
        let c = (&c + c.transpose()) * 0.5;

        let eig = SymmetricEigen::new(c);
        let x = l
            .transpose()
            .solve_upper_triangular(&eig.eigenvectors)
            .ok_or_else(not_invertible)?;
        Ok(sorted_ascending(&eig.eigenvalues, &x))
    }

    fn lu_inverse(&self, m: &Matrix) -> Result<Option<Matrix>> {
        let inv = to_dmatrix(m).lu().try_inverse();
        Ok(inv
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .map(|inv| from_dmatrix(&inv)))
    }
}
