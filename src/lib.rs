//! Clustered light culling for a forward renderer.
//!
//! The view frustum is split into a grid of clusters and every point and spot
//! light is binned into the clusters its bounding sphere touches. Each cluster
//! gets a `(point_start, point_count, spot_start, spot_count)` record pointing
//! into two flat light-index arrays, which the shading pass walks instead of
//! the full light list.
//!
//! The kernel exists twice with the same semantics: a WGSL compute shader
//! driven by [`render::ClusterCullPipeline`], and a rayon-parallel CPU version in
//! [`culler::ClusterCuller`].

pub mod camera;
pub mod cluster;
pub mod config;
pub mod culler;
pub mod error;
pub mod grid;
pub mod light;
pub mod render;

pub use camera::{Camera, CameraInfo, CameraUniform};
pub use config::ClusterConfig;
pub use culler::{ClusterCuller, CullTargets, DispatchStats};
pub use error::{CullError, CullResult};
pub use grid::{ClusterGrid, ClusterRecord};
pub use light::manager::{LightId, LightManager};
pub use light::{GpuLight, Light, LightBlock, LightKind};
pub use render::ClusterCullPipeline;
pub use render::gpu::GpuContext;
