use crate::error::Result;
use crate::matrix::Matrix;
use std::fmt::Debug;

/// Whether a gemm operand is used as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    No,
    Yes,
}

impl Transpose {
    /// Shape of `op(m)`.
    pub fn apply_dims(self, m: &Matrix) -> (usize, usize) {
        match self {
            Transpose::No => (m.rows(), m.cols()),
            Transpose::Yes => (m.cols(), m.rows()),
        }
    }
}

/// Output of a (generalized) symmetric eigendecomposition.
///
/// `values` is `n x 1` in ascending order; column `i` of `vectors` pairs with `values[i]`.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub values: Matrix,
    pub vectors: Matrix,
}

/// Numeric execution strategy (CPU or GPU), selected at build time.
///
/// Implementations may assume the kernel has already checked shapes and symmetry.
pub trait Backend: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// `C := op(A) * op(B)` with alpha = 1 and beta = 0, as a single fused call.
    fn gemm(&self, a: &Matrix, trans_a: Transpose, b: &Matrix, trans_b: Transpose) -> Result<Matrix>;

    /// Eigenpairs of a symmetric matrix, ascending.
    fn symmetric_eigen(&self, m: &Matrix) -> Result<EigenDecomposition>;

    /// Eigenpairs of `A x = lambda B x` with `A` symmetric and `B` symmetric positive definite.
    fn generalized_eigen(&self, a: &Matrix, b: &Matrix) -> Result<EigenDecomposition>;

    /// LU factorization followed by explicit inversion. `None` when a pivot vanishes.
    fn lu_inverse(&self, m: &Matrix) -> Result<Option<Matrix>>;
}
