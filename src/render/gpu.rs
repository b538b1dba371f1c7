use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use log::info;

pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Device without a surface; the cull kernel only needs compute.
    ///
    /// Only Vulkan, Metal, DX12 and WebGPU adapters are accepted. GL drivers
    /// write 3D storage textures to layer 0 only, which loses every record
    /// past the first depth slice.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .context("No suitable GPU adapters found on the system")?;

        let adapter_info = adapter.get_info();
        ensure!(
            supports_layered_storage_writes(adapter_info.backend),
            "Adapter {} uses {:?}, which cannot write 3D storage textures",
            adapter_info.name,
            adapter_info.backend
        );

        let adapter_limits = adapter.limits();

        // the light blocks are 24 KiB uniforms, over the downlevel 16 KiB
        let limits = wgpu::Limits {
            max_uniform_buffer_binding_size: adapter_limits
                .max_uniform_buffer_binding_size
                .min(64 << 10),
            ..wgpu::Limits::default().using_resolution(adapter_limits)
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Cull Device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                ..Default::default()
            })
            .await
            .context("Failed to request device")?;

        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    pub fn headless_blocking() -> Result<Self> {
        pollster::block_on(Self::headless())
    }
}

fn supports_layered_storage_writes(backend: wgpu::Backend) -> bool {
    wgpu::Backends::PRIMARY.contains(backend.into())
}
