use thiserror::Error;

pub type Result<T> = core::result::Result<T, FaceCoreError>;

#[derive(Error, Debug)]
pub enum FaceCoreError {
    #[error("WGPU initialization failed: {0}")]
    WgpuInitError(String),

    #[error("WGPU error: {0}")]
    WgpuError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid matrix dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    #[error("Matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix is not symmetric")]
    NonSymmetricMatrix,

    /// The operation completed but its result is not a valid number
    /// (singular inverse, negative eigenvalue under a square root, zero-norm cosine).
    #[error("Numerically invalid result in {operation}: {detail}")]
    NumericallyInvalid {
        operation: &'static str,
        detail: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaceCoreError {
    pub(crate) fn numeric(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::NumericallyInvalid {
            operation,
            detail: detail.into(),
        }
    }
}
