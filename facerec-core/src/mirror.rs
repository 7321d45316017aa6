//! Device-side copy of a matrix and the explicit sync points between the two.
//!
//! A matrix starts host-only. [`Matrix::push`] creates or refreshes the
//! device buffer, [`Matrix::pull`] copies device results back. Host writes
//! through `&mut Matrix` mark the mirror stale; nothing is synchronized
//! implicitly.

use crate::context::GpuContext;
use crate::device::GpuDevice;
use crate::error::Result;
use crate::matrix::Matrix;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Host and device hold the same values.
    Synced,
    /// The host was written after the last push.
    HostAhead,
    /// A device computation wrote the buffer; the host copy is stale.
    DeviceAhead,
}

#[derive(Debug)]
pub(crate) struct DeviceMirror {
    pub(crate) buffer: wgpu::Buffer,
    context: Arc<GpuContext>,
    state: SyncState,
}

impl DeviceMirror {
    pub(crate) fn device_ahead(buffer: wgpu::Buffer, context: Arc<GpuContext>) -> Self {
        Self {
            buffer,
            context,
            state: SyncState::DeviceAhead,
        }
    }

    pub(crate) fn state(&self) -> SyncState {
        self.state
    }

    pub(crate) fn mark_host_ahead(&mut self) {
        debug_assert!(
            self.state != SyncState::DeviceAhead,
            "host write to a matrix with unpulled device results"
        );
        self.state = SyncState::HostAhead;
    }

    pub(crate) fn is_device_ahead(&self) -> bool {
        self.state == SyncState::DeviceAhead
    }
}

impl Matrix {
    /// Makes the device copy current, uploading only when needed.
    pub fn push(&self, device: &GpuDevice) -> Result<()> {
        let mut slot = self.mirror.borrow_mut();
        match slot.as_mut() {
            None => {
                log::trace!("push {}x{}: allocate and upload", self.rows(), self.cols());
                let buffer = device.upload("Matrix Mirror", self.host_data());
                *slot = Some(DeviceMirror {
                    buffer,
                    context: Arc::clone(&device.context),
                    state: SyncState::Synced,
                });
            }
            Some(mirror) if mirror.state == SyncState::HostAhead => {
                log::trace!("push {}x{}: refresh", self.rows(), self.cols());
                mirror.context.write_buffer(&mirror.buffer, self.host_data())?;
                mirror.state = SyncState::Synced;
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Makes the host copy current, downloading only when the device is ahead.
    pub fn pull(&mut self) -> Result<()> {
        let len = self.len();
        let data = {
            let slot = self.mirror.get_mut();
            match slot.as_mut() {
                Some(mirror) if mirror.is_device_ahead() => {
                    let data = pollster::block_on(
                        mirror.context.read_buffer_to_cpu::<f64>(&mirror.buffer, len),
                    )?;
                    mirror.state = SyncState::Synced;
                    data
                }
                _ => return Ok(()),
            }
        };
        log::trace!("pull {}x{}", self.rows(), self.cols());
        self.overwrite_host(data);
        Ok(())
    }

    /// Current sync state, `None` for host-only matrices.
    pub fn sync_state(&self) -> Option<SyncState> {
        self.mirror.borrow().as_ref().map(|m| m.state())
    }
}
