use crate::context::GpuContext;
use crate::error::{FaceCoreError, Result};
use crate::matrix::Matrix;
use crate::mirror::DeviceMirror;
use crate::ops::{self, GemmParams};
use crate::traits::Transpose;
use std::sync::{Arc, OnceLock};
use std::mem;

/// GPU execution device holding the WGPU context.
///
/// The async constructor is the primitive; [`GpuDevice::shared`] wraps it in
/// a process-wide instance that every GPU dispatch goes through.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    pub(crate) context: Arc<GpuContext>,
}

static SHARED: OnceLock<std::result::Result<GpuDevice, String>> = OnceLock::new();

impl GpuDevice {
    pub async fn new() -> Result<Self> {
        let context = GpuContext::new().await?;
        log::info!("GpuDevice created");
        Ok(Self {
            context: Arc::new(context),
        })
    }

    /// The process-wide device, created on first use.
    ///
    /// A failed initialization is remembered and reported again on every call.
    pub fn shared() -> Result<&'static GpuDevice> {
        SHARED
            .get_or_init(|| pollster::block_on(Self::new()).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| FaceCoreError::WgpuInitError(e.clone()))
    }

    /// Uploads `data` into a new storage buffer.
    pub(crate) fn upload(&self, label: &str, data: &[f64]) -> wgpu::Buffer {
        self.context.create_gpu_buffer_with_data(
            label,
            bytemuck::cast_slice(data),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )
    }

    pub(crate) fn empty(&self, label: &str, len: usize) -> wgpu::Buffer {
        self.context.create_empty_buffer(
            label,
            (len * mem::size_of::<f64>()) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )
    }

    /// `op(A) * op(B)` on the device.
    ///
    /// Both operands are pushed first. The returned matrix is device-ahead;
    /// call [`Matrix::pull`] before reading it on the host.
    pub fn gemm(&self, a: &Matrix, trans_a: Transpose, b: &Matrix, trans_b: Transpose) -> Result<Matrix> {
        let (m, k) = trans_a.apply_dims(a);
        let (kb, n) = trans_b.apply_dims(b);
        if k != kb {
            return Err(FaceCoreError::InvalidDimensions(format!(
                "gemm inner dimensions mismatch: {}x{} * {}x{}",
                m, k, kb, n
            )));
        }
        if [a.len(), b.len(), m * n].iter().any(|&len| len > u32::MAX as usize) {
            return Err(FaceCoreError::InvalidDimensions(
                "gemm operand too large for a 32-bit device index".to_string(),
            ));
        }

        a.push(self)?;
        b.push(self)?;

        let c_buffer = self.empty("GEMM Result Buffer", m * n);
        {
            let a_mirror = a.mirror.borrow();
            let b_mirror = b.mirror.borrow();
            let (Some(a_mirror), Some(b_mirror)) = (a_mirror.as_ref(), b_mirror.as_ref()) else {
                return Err(FaceCoreError::Internal("operand mirror missing after push".to_string()));
            };
            let params = GemmParams::new(
                (m, n, k),
                a.rows(),
                b.rows(),
                trans_a == Transpose::Yes,
                trans_b == Transpose::Yes,
            );
            ops::internal_gemm(&self.context, params, &a_mirror.buffer, &b_mirror.buffer, &c_buffer)?;
        }

        let c = Matrix::zeros(m, n)?;
        *c.mirror.borrow_mut() = Some(DeviceMirror::device_ahead(c_buffer, Arc::clone(&self.context)));
        Ok(c)
    }

    // --- Utility ---

    pub fn get_transfer_stats(&self) -> TransferStats {
        let (bytes_to_gpu, bytes_from_gpu) = self.context.get_transfer_stats();
        TransferStats {
            bytes_to_gpu,
            bytes_from_gpu,
        }
    }

    pub fn reset_transfer_stats(&self) {
        self.context.reset_transfer_stats();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes_to_gpu: u64,
    pub bytes_from_gpu: u64,
}
