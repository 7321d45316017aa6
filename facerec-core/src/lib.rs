//! # Face Recognition Core
//!
//! Column-major `f64` matrices and the linear algebra the feature layers are
//! built on. Products and decompositions dispatch to a backend chosen at
//! build time: nalgebra on the host by default, a wgpu compute pipeline with
//! the `gpu` feature.

pub mod backend;
pub mod distance;
mod elementwise;
pub mod error;
pub mod image;
pub mod io;
pub mod linalg;
pub mod matrix;
pub mod traits;

#[cfg(feature = "gpu")]
mod context;
#[cfg(feature = "gpu")]
pub mod device;
#[cfg(feature = "gpu")]
pub mod mirror;
#[cfg(feature = "gpu")]
mod ops;

pub use distance::Metric;
pub use error::{FaceCoreError, Result};
pub use image::PixelBuffer;
pub use linalg::NumericPolicy;
pub use matrix::Matrix;
pub use traits::{Backend, EigenDecomposition, Transpose};

#[cfg(feature = "gpu")]
pub use device::{GpuDevice, TransferStats};
#[cfg(feature = "gpu")]
pub use mirror::SyncState;
