// src/gpu_culling.rs
//! GPU execution of the culling kernel as a wgpu compute pass.
//!
//! Runs the same classify-then-compact kernel as [`crate::culling`], one
//! invocation per candidate in workgroups of 64, with the survivor counter
//! living in a 4-byte storage buffer. The host side here only uploads and
//! records; reading results back (or feeding the counter into an indirect
//! draw) belongs to the surrounding pipeline.

use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::camera::{CameraFrame, FrustumUniform};
use crate::error::{CullError, Result};
use crate::point::CandidatePoint;

/// Workgroup width of the compute kernel (matches `@workgroup_size` in
/// `CULL_WGSL`).
pub const WORKGROUP_SIZE: u32 = 64;

const POINT_STRIDE: u64 = std::mem::size_of::<CandidatePoint>() as u64;

/// Per-dispatch parameters (matches `Params` in `CULL_WGSL`).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CullParams {
    point_count: u32,
    _pad: [u32; 3],
}

/// GPU culling pass over a fixed-capacity point buffer.
///
/// Created once per maximum batch size; per frame, write the camera and the
/// candidate points, then [`encode`](Self::encode) the pass. After the
/// submitted work completes, the first `counter` entries of
/// [`compacted_buffer`](Self::compacted_buffer) are the survivors and
/// [`counter_buffer`](Self::counter_buffer) holds their count, ready to be
/// copied into the instance-count word of an indirect draw command.
pub struct GpuCuller {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    globals_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    source_buffer: wgpu::Buffer,
    compacted_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    capacity: usize,
    point_count: u32,
}

impl GpuCuller {
    /// Create the pipeline and buffers for batches of up to `capacity`
    /// points.
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pointcull_cs"),
            source: wgpu::ShaderSource::Wgsl(CULL_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pointcull_bgl"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pointcull_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("pointcull_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "cs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pointcull_globals"),
            size: std::mem::size_of::<FrustumUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pointcull_params"),
            size: std::mem::size_of::<CullParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let source_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pointcull_source"),
            size: capacity as u64 * POINT_STRIDE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Survivors are consumed downstream as per-instance vertex data.
        let compacted_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pointcull_compacted"),
            size: capacity as u64 * POINT_STRIDE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pointcull_counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pointcull_bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: source_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: compacted_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: counter_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            pipeline,
            bind_group,
            globals_buffer,
            params_buffer,
            source_buffer,
            compacted_buffer,
            counter_buffer,
            capacity,
            point_count: 0,
        }
    }

    /// Upload the per-frame camera state.
    pub fn write_camera(&self, queue: &wgpu::Queue, frame: &CameraFrame) {
        let uniform = FrustumUniform::from_frame(frame);
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Upload the candidate batch for the next pass.
    pub fn write_points(&mut self, queue: &wgpu::Queue, points: &[CandidatePoint]) -> Result<()> {
        if points.len() > self.capacity {
            return Err(CullError::CapacityExceeded {
                len: points.len(),
                capacity: self.capacity,
            });
        }
        if !points.is_empty() {
            queue.write_buffer(&self.source_buffer, 0, bytemuck::cast_slice(points));
        }
        let params = CullParams {
            point_count: points.len() as u32,
            _pad: [0; 3],
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        self.point_count = points.len() as u32;
        Ok(())
    }

    /// Record the pass: zero the survivor counter, then one dispatch covering
    /// every uploaded point.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.counter_buffer, 0, None);
        if self.point_count == 0 {
            return;
        }

        let workgroups = (self.point_count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        debug!(
            "encoding cull pass: {} points in {} workgroups",
            self.point_count, workgroups
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("pointcull_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }

    /// Dense survivor buffer; the first `counter` entries are valid after the
    /// pass completes.
    pub fn compacted_buffer(&self) -> &wgpu::Buffer {
        &self.compacted_buffer
    }

    /// Single `u32` survivor count.
    pub fn counter_buffer(&self) -> &wgpu::Buffer {
        &self.counter_buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
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

/// The culling kernel. One invocation per candidate: reject on the first
/// failing plane, otherwise claim a slot and write the point. The explicit
/// count guard covers the tail of the final workgroup, since dispatches
/// round up to whole workgroups.
const CULL_WGSL: &str = r#"
struct Globals {
    vp: mat4x4<f32>,
    view: mat4x4<f32>,
    view_nt: mat4x4<f32>,
    proj: mat4x4<f32>,
    inv_vp: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_view_nt: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    frustum: array<vec4<f32>, 6>,
}

struct Params {
    point_count: u32,
}

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var<uniform> params: Params;
@group(0) @binding(2) var<storage, read> source_points: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read_write> compacted_points: array<vec4<f32>>;
@group(0) @binding(4) var<storage, read_write> survivor_count: atomic<u32>;

@compute @workgroup_size(64)
fn cs_main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let index = gid.x;
    if (index >= params.point_count) {
        return;
    }

    let point = source_points[index];
    let pos = vec4<f32>(point.xyz, 1.0);
    for (var i = 0u; i < 6u; i = i + 1u) {
        if (dot(pos, globals.frustum[i]) < -point.w) {
            return;
        }
    }

    let slot = atomicAdd(&survivor_count, 1u);
    compacted_points[slot] = point;
}
"#;
