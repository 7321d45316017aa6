//! Build-time selection of the numeric strategy.
//!
//! Without the `gpu` feature every kernel call runs on [`CpuBackend`]. With it,
//! matrix products are dispatched to a wgpu compute pipeline through
//! [`GpuBackend`], which keeps host and device mirrors in sync at its own
//! boundary and delegates decompositions to the CPU strategy.

mod cpu;
#[cfg(feature = "gpu")]
mod gpu;

pub use cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;

use crate::traits::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "gpu")] {
        static ACTIVE: GpuBackend = GpuBackend::new();
    } else {
        static ACTIVE: CpuBackend = CpuBackend;
    }
}

/// The strategy every kernel operation dispatches to.
pub fn active() -> &'static dyn Backend {
    &ACTIVE
}
