use anyhow::{Context, Result, ensure};
use glam::UVec3;
use log::{debug, warn};
use std::borrow::Cow;
use std::num::NonZeroU64;
use std::sync::mpsc;

use gpu::GpuContext;

use crate::camera::CameraUniform;
use crate::config::ClusterConfig;
use crate::error::CullError;
use crate::grid::{ClusterGrid, ClusterRecord};
use crate::light::LightBlock;

pub mod gpu;
pub mod shader;

const GRID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = 16;

/// Buffers the cull kernel writes, plus the staging copies they are read back
/// through.
pub struct CullOutputs {
    pub grid_tex: wgpu::Texture,
    pub grid_view: wgpu::TextureView,
    pub point_index: wgpu::Buffer,
    pub spot_index: wgpu::Buffer,
    pub cursor: wgpu::Buffer,

    pub grid_staging: wgpu::Buffer,
    pub point_staging: wgpu::Buffer,
    pub spot_staging: wgpu::Buffer,
    pub cursor_staging: wgpu::Buffer,
}

/// GPU rendition of the cull kernel.
pub struct ClusterCullPipeline {
    pub context: GpuContext,
    pub config: ClusterConfig,
    pub pipeline: wgpu::ComputePipeline,

    pub camera_buffer: wgpu::Buffer,
    pub point_block: wgpu::Buffer,
    pub spot_block: wgpu::Buffer,

    pub outputs: CullOutputs,

    pub cull_bgl: wgpu::BindGroupLayout,
    pub cull_bg: wgpu::BindGroup,
}

fn padded_row_bytes(width: u32) -> u32 {
    (width * TEXEL_BYTES).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

impl ClusterCullPipeline {
    pub fn new(context: GpuContext, config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        let limit = context.device.limits().max_compute_invocations_per_workgroup;
        if config.workgroup_invocations() > limit {
            return Err(CullError::WorkgroupTooLarge {
                invocations: config.workgroup_invocations(),
                limit,
            }
            .into());
        }

        let device = &context.device;

        let (camera_buffer, point_block, spot_block) = Self::create_inputs(device);
        let outputs = Self::create_outputs(device, &config);
        let cull_bgl = Self::create_layout(device);

        let cull_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cull BG"),
            layout: &cull_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: point_block.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: spot_block.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: outputs.point_index.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: outputs.spot_index.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: outputs.cursor.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&outputs.grid_view),
                },
            ],
        });

        let pipeline = {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Cull Lights Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader::cull_lights_source(
                    &config,
                ))),
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cull Pipeline Layout"),
                bind_group_layouts: &[&cull_bgl],
                push_constant_ranges: &[],
            });

            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Cull Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        Ok(Self {
            context,
            config,
            pipeline,
            camera_buffer,
            point_block,
            spot_block,
            outputs,
            cull_bgl,
            cull_bg,
        })
    }

    pub fn upload(&self, camera: &CameraUniform, point: &LightBlock, spot: &LightBlock) {
        let queue = &self.context.queue;
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
        queue.write_buffer(&self.point_block, 0, bytemuck::bytes_of(point));
        queue.write_buffer(&self.spot_block, 0, bytemuck::bytes_of(spot));
    }

    /// Zeroes the write cursor. Must happen before every dispatch.
    pub fn reset_cursor(&self) {
        self.context
            .queue
            .write_buffer(&self.outputs.cursor, 0, bytemuck::bytes_of(&[0u32; 2]));
    }

    /// Records one dispatch of `workgroups` groups.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, workgroups: UVec3) -> Result<()> {
        self.config.validate_dispatch(workgroups)?;

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Cull Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &self.cull_bg, &[]);
        cpass.dispatch_workgroups(workgroups.x, workgroups.y, workgroups.z);
        Ok(())
    }

    /// Upload, reset, dispatch over the whole grid and submit.
    pub fn cull(
        &self,
        camera: &CameraUniform,
        point: &LightBlock,
        spot: &LightBlock,
    ) -> Result<()> {
        self.upload(camera, point, spot);
        self.reset_cursor();

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Cull Encoder"),
                });
        self.encode(&mut encoder, self.config.workgroup_count())?;
        self.context.queue.submit(Some(encoder.finish()));
        debug!(
            "dispatched {} cull workgroups",
            self.config.workgroup_count()
        );
        Ok(())
    }

    /// Copies the grid, both index arrays and the cursor back to the host.
    /// Blocks until the GPU is done.
    pub fn read_back(&self) -> Result<ClusterGrid> {
        let device = &self.context.device;
        let out = &self.outputs;
        let grid = self.config.grid;
        let row_bytes = padded_row_bytes(grid.x);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Cull Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &out.grid_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &out.grid_staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row_bytes),
                    rows_per_image: Some(grid.y),
                },
            },
            wgpu::Extent3d {
                width: grid.x,
                height: grid.y,
                depth_or_array_layers: grid.z,
            },
        );
        for (src, dst) in [
            (&out.point_index, &out.point_staging),
            (&out.spot_index, &out.spot_staging),
            (&out.cursor, &out.cursor_staging),
        ] {
            encoder.copy_buffer_to_buffer(src, 0, dst, 0, src.size());
        }
        self.context.queue.submit(Some(encoder.finish()));

        let texels: Vec<f32> = self.map_read(&out.grid_staging)?;
        let point_indices: Vec<u32> = self.map_read(&out.point_staging)?;
        let spot_indices: Vec<u32> = self.map_read(&out.spot_staging)?;
        let cursor: Vec<u32> = self.map_read(&out.cursor_staging)?;
        ensure!(cursor.len() == 2, "cursor readback has {} words", cursor.len());

        let floats_per_row = (row_bytes / 4) as usize;
        let mut records = Vec::with_capacity(self.config.cluster_count());
        for z in 0..grid.z as usize {
            for y in 0..grid.y as usize {
                let row = (z * grid.y as usize + y) * floats_per_row;
                for x in 0..grid.x as usize {
                    let t = row + x * 4;
                    records.push(ClusterRecord::from_texel([
                        texels[t],
                        texels[t + 1],
                        texels[t + 2],
                        texels[t + 3],
                    ]));
                }
            }
        }

        let result = ClusterGrid {
            grid,
            records,
            point_indices,
            spot_indices,
            cursor: [cursor[0], cursor[1]],
        };
        if result.cursor[0] as usize > result.point_indices.len()
            || result.cursor[1] as usize > result.spot_indices.len()
        {
            warn!(
                "light index arrays full: cursor {:?}, capacity {}/{}",
                result.cursor,
                result.point_indices.len(),
                result.spot_indices.len()
            );
        }
        Ok(result)
    }

    fn map_read<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("Failed to wait for cull readback")?;
        rx.recv()
            .context("Readback callback dropped")?
            .context("Failed to map readback buffer")?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, T>(&view)
        };
        buffer.unmap();
        Ok(data)
    }

    pub fn create_inputs(device: &wgpu::Device) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Buffer) {
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera UBO"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let block_size = std::mem::size_of::<LightBlock>() as u64;
        let point_block = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Point Light UBO"),
            size: block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let spot_block = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Spot Light UBO"),
            size: block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        (camera_buffer, point_block, spot_block)
    }

    pub fn create_outputs(device: &wgpu::Device, config: &ClusterConfig) -> CullOutputs {
        let grid = config.grid;
        let grid_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Light Grid"),
            size: wgpu::Extent3d {
                width: grid.x,
                height: grid.y,
                depth_or_array_layers: grid.z,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: GRID_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let grid_view = grid_tex.create_view(&wgpu::TextureViewDescriptor::default());

        let index_buffer = |label: &str, capacity: u32| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: capacity as u64 * 4,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let staging = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let point_index = index_buffer("Point Index SSBO", config.point_index_capacity);
        let spot_index = index_buffer("Spot Index SSBO", config.spot_index_capacity);
        let cursor = index_buffer("Index Cursor SSBO", 2);

        let grid_bytes = padded_row_bytes(grid.x) as u64 * grid.y as u64 * grid.z as u64;

        CullOutputs {
            grid_staging: staging("Light Grid Staging", grid_bytes),
            point_staging: staging("Point Index Staging", point_index.size()),
            spot_staging: staging("Spot Index Staging", spot_index.size()),
            cursor_staging: staging("Index Cursor Staging", cursor.size()),
            grid_tex,
            grid_view,
            point_index,
            spot_index,
            cursor,
        }
    }

    pub fn create_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let uniform = |binding, size: usize| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(size as u64),
            },
            count: None,
        };
        let storage = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cull BGL"),
            entries: &[
                uniform(0, std::mem::size_of::<CameraUniform>()),
                uniform(1, std::mem::size_of::<LightBlock>()),
                uniform(2, std::mem::size_of::<LightBlock>()),
                storage(3),
                storage(4),
                storage(5),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: GRID_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_for_copies() {
        assert_eq!(padded_row_bytes(8), 256);
        assert_eq!(padded_row_bytes(16), 256);
        assert_eq!(padded_row_bytes(17), 512);
    }
}
