use super::CpuBackend;
use crate::device::GpuDevice;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::traits::{Backend, EigenDecomposition, Transpose};

/// Products on the shared wgpu device; decompositions on the host.
///
/// Every call is synchronous: operands are pushed, the dispatch is awaited
/// and the result is pulled before returning, so callers always receive a
/// host-current matrix.
#[derive(Debug, Default)]
pub struct GpuBackend {
    host: CpuBackend,
}

impl GpuBackend {
    pub const fn new() -> Self {
        Self { host: CpuBackend }
    }
}

impl Backend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn gemm(&self, a: &Matrix, trans_a: Transpose, b: &Matrix, trans_b: Transpose) -> Result<Matrix> {
        let device = GpuDevice::shared()?;
        let mut c = device.gemm(a, trans_a, b, trans_b)?;
        c.pull()?;
        Ok(c)
    }

    fn symmetric_eigen(&self, m: &Matrix) -> Result<EigenDecomposition> {
        self.host.symmetric_eigen(m)
    }

    fn generalized_eigen(&self, a: &Matrix, b: &Matrix) -> Result<EigenDecomposition> {
        self.host.generalized_eigen(a, b)
    }

    fn lu_inverse(&self, m: &Matrix) -> Result<Option<Matrix>> {
        self.host.lu_inverse(m)
    }
}
