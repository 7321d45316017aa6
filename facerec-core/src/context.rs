use crate::error::{FaceCoreError, Result};
use bytemuck::Pod;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use wgpu::{util::DeviceExt, PollType};

/// WGPU device and queue plus host/device transfer counters.
#[derive(Debug, Clone)]
pub(crate) struct GpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) bytes_to_gpu: Arc<AtomicU64>,
    pub(crate) bytes_from_gpu: Arc<AtomicU64>,
}

impl GpuContext {
    pub(crate) async fn new() -> Result<Self> {
        log::info!("Initializing WGPU context");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| FaceCoreError::WgpuInitError("No suitable adapter found".to_string()))?;

        log::info!("Selected adapter: {:?}", adapter.get_info());

        // Results must match the host path, so f64 shaders are mandatory
        if !adapter.features().contains(wgpu::Features::SHADER_F64) {
            return Err(FaceCoreError::WgpuInitError(
                "Adapter does not support SHADER_F64".to_string(),
            ));
        }

        let mut limits = wgpu::Limits::default().using_resolution(adapter.limits());
        limits.max_storage_buffers_per_shader_stage =
            limits.max_storage_buffers_per_shader_stage.max(3);
        log::debug!("Requested limits: {:?}", limits);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("facerec_core device"),
                trace: wgpu::Trace::Off,
                memory_hints: wgpu::MemoryHints::Performance,
                required_features: wgpu::Features::SHADER_F64,
                required_limits: limits,
            })
            .await
            .map_err(|e| FaceCoreError::WgpuInitError(format!("Failed to request device: {}", e)))?;

        log::info!("Device and queue obtained");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            bytes_to_gpu: Arc::new(AtomicU64::new(0)),
            bytes_from_gpu: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Creates a buffer holding `contents` and counts the upload.
    pub(crate) fn create_gpu_buffer_with_data(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let byte_len = contents.len() as u64;
        log::debug!("Creating GPU buffer '{}' with {} bytes", label, byte_len);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        self.count_upload(byte_len);
        buffer
    }

    /// Overwrites the start of `buffer` with `data`.
    pub(crate) fn write_buffer<T: Pod>(&self, buffer: &wgpu::Buffer, data: &[T]) -> Result<()> {
        let byte_len = std::mem::size_of_val(data) as u64;
        if byte_len == 0 {
            return Ok(());
        }
        if buffer.size() < byte_len {
            return Err(FaceCoreError::Internal(format!(
                "Target buffer size ({}) is smaller than data size ({})",
                buffer.size(),
                byte_len
            )));
        }
        if !buffer.usage().contains(wgpu::BufferUsages::COPY_DST) {
            return Err(FaceCoreError::Internal(
                "Target buffer must have COPY_DST usage".to_string(),
            ));
        }
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
        self.count_upload(byte_len);
        Ok(())
    }

    /// Creates an uninitialized buffer. Nothing is transferred.
    pub(crate) fn create_empty_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        log::debug!("Creating empty GPU buffer '{}' of size {}", label, size);
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Copies `element_count` values of `buffer` back to the host.
    ///
    /// Blocks on `device.poll` until the staging copy is mapped.
    pub(crate) async fn read_buffer_to_cpu<T: Pod>(
        &self,
        buffer: &wgpu::Buffer,
        element_count: usize,
    ) -> Result<Vec<T>> {
        let size_bytes = (element_count * std::mem::size_of::<T>()) as u64;
        if size_bytes == 0 {
            return Ok(Vec::new());
        }
        if buffer.size() < size_bytes {
            return Err(FaceCoreError::Internal(format!(
                "GPU buffer size ({}) is smaller than requested readback ({})",
                buffer.size(),
                size_bytes
            )));
        }

        let staging = self.create_empty_buffer(
            "readback staging buffer",
            size_bytes,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if let Err(e) = sender.send(result) {
                log::error!("Failed to send map result back: {:?}", e);
            }
        });

        self.device
            .poll(PollType::Wait)
            .map_err(|e| FaceCoreError::WgpuError(format!("Device poll failed: {}", e)))?;

        match receiver.await {
            Ok(Ok(())) => {
                let result = {
                    let data = slice.get_mapped_range();
                    bytemuck::cast_slice::<u8, T>(&data).to_vec()
                };
                staging.unmap();
                self.bytes_from_gpu.fetch_add(size_bytes, Ordering::Relaxed);
                log::trace!(
                    "bytes_from_gpu += {}, now {}",
                    size_bytes,
                    self.bytes_from_gpu.load(Ordering::Relaxed)
                );
                Ok(result)
            }
            Ok(Err(e)) => Err(FaceCoreError::WgpuError(format!(
                "Buffer mapping failed: {}",
                e
            ))),
            Err(_) => Err(FaceCoreError::Internal(
                "Channel receive error during buffer mapping".to_string(),
            )),
        }
    }

    fn count_upload(&self, byte_len: u64) {
        self.bytes_to_gpu.fetch_add(byte_len, Ordering::Relaxed);
        log::trace!(
            "bytes_to_gpu += {}, now {}",
            byte_len,
            self.bytes_to_gpu.load(Ordering::Relaxed)
        );
    }

    pub(crate) fn get_transfer_stats(&self) -> (u64, u64) {
        (
            self.bytes_to_gpu.load(Ordering::Relaxed),
            self.bytes_from_gpu.load(Ordering::Relaxed),
        )
    }

    pub(crate) fn reset_transfer_stats(&self) {
        self.bytes_to_gpu.store(0, Ordering::Relaxed);
        self.bytes_from_gpu.store(0, Ordering::Relaxed);
        log::info!("GPU transfer counters reset");
    }
}
