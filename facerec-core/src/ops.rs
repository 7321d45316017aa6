// Compute dispatches behind GpuDevice. Callers validate shapes first.

use crate::context::GpuContext;
use crate::error::Result;
use bytemuck::{Pod, Zeroable};
use std::mem;

const GEMM_TILE: u32 = 16;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct GemmParams {
    pub(crate) m: u32,
    pub(crate) n: u32,
    pub(crate) k: u32,
    pub(crate) a_rows: u32,
    pub(crate) b_rows: u32,
    pub(crate) trans_a: u32,
    pub(crate) trans_b: u32,
    _padding: u32,
}

impl GemmParams {
    pub(crate) fn new(
        (m, n, k): (usize, usize, usize),
        a_rows: usize,
        b_rows: usize,
        trans_a: bool,
        trans_b: bool,
    ) -> Self {
        Self {
            m: m as u32,
            n: n as u32,
            k: k as u32,
            a_rows: a_rows as u32,
            b_rows: b_rows as u32,
            trans_a: trans_a as u32,
            trans_b: trans_b as u32,
            _padding: 0,
        }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Encodes and submits `c := op(a) * op(b)`. Does not wait for completion.
pub(crate) fn internal_gemm(
    context: &GpuContext,
    params: GemmParams,
    a: &wgpu::Buffer,
    b: &wgpu::Buffer,
    c: &wgpu::Buffer,
) -> Result<()> {
    let device = &context.device;

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("GEMM Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/gemm.wgsl").into()),
    });

    let params_buffer = context.create_gpu_buffer_with_data(
        "GEMM Params Buffer",
        bytemuck::bytes_of(&params),
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    );

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("GEMM Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(mem::size_of::<GemmParams>() as u64),
                },
                count: None,
            },
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("GEMM Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("GEMM Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader_module,
        entry_point: Some("main"),
        cache: None,
        compilation_options: Default::default(),
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("GEMM Bind Group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: a.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: b.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: c.as_entire_binding(),
            },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("GEMM Encoder"),
    });
    {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("GEMM Compute Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        // x covers rows of C, y covers columns
        compute_pass.dispatch_workgroups(
            params.m.div_ceil(GEMM_TILE),
            params.n.div_ceil(GEMM_TILE),
            1,
        );
    }
    context.queue.submit(std::iter::once(encoder.finish()));
    log::debug!(
        "Dispatched GEMM {}x{}x{} (trans_a={}, trans_b={})",
        params.m,
        params.n,
        params.k,
        params.trans_a,
        params.trans_b
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemm_params_layout() {
        // Must match the WGSL uniform: eight u32 fields
        assert_eq!(mem::size_of::<GemmParams>(), 32);
        let p = GemmParams::new((2, 3, 4), 4, 4, true, false);
        assert_eq!((p.m, p.n, p.k, p.trans_a, p.trans_b), (2, 3, 4, 1, 0));
    }
}
