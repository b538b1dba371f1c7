use glam::UVec3;

use crate::error::{CullError, CullResult};
use crate::light::LightKind;

/// Lights per uniform block. Point and spot lights use one block each.
pub const LIGHT_BLOCK_CAPACITY: usize = 512;

pub const MAX_POINT_LIGHTS: usize = LIGHT_BLOCK_CAPACITY;
pub const MAX_SPOT_LIGHTS: usize = LIGHT_BLOCK_CAPACITY;
pub const MAX_DIRECTIONAL_LIGHTS: usize = 8;

/// Upper bound for the per-cluster scratch lists. The runtime
/// `local_capacity` may be lower but never higher.
pub const MAX_LIGHTS_PER_CLUSTER: usize = 64;

pub const DEFAULT_INDEX_CAPACITY: u32 = 65536;

/// Largest index capacity whose offsets are exact in an `f32` texel channel.
pub const MAX_INDEX_CAPACITY: u32 = 1 << 24;

/// Flattened index of `coord` in a grid of size `grid`, x fastest.
pub fn linear_index(grid: UVec3, coord: UVec3) -> usize {
    (coord.x + grid.x * (coord.y + grid.y * coord.z)) as usize
}

/// Layout of the cluster grid and the buffers the kernel writes into.
///
/// Both kernels read every constant from here, and the WGSL source is generated
/// from it, so the host and the shader always agree on the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterConfig {
    /// Clusters along x, y (screen tiles) and z (depth slices).
    pub grid: UVec3,
    pub workgroup_size: UVec3,
    /// Lights kept per cluster before truncation, per light kind.
    pub local_capacity: u32,
    pub point_index_capacity: u32,
    pub spot_index_capacity: u32,
    /// Clamp the spot radius discriminant to zero like the point formula does.
    /// When false a negative discriminant produces a NaN radius that never
    /// intersects anything.
    pub clamp_spot_discriminant: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            grid: UVec3::new(8, 8, 16),
            workgroup_size: UVec3::new(8, 8, 4),
            local_capacity: MAX_LIGHTS_PER_CLUSTER as u32,
            point_index_capacity: DEFAULT_INDEX_CAPACITY,
            spot_index_capacity: DEFAULT_INDEX_CAPACITY,
            clamp_spot_discriminant: true,
        }
    }
}

impl ClusterConfig {
    pub fn with_grid(mut self, grid: UVec3) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_workgroup_size(mut self, workgroup_size: UVec3) -> Self {
        self.workgroup_size = workgroup_size;
        self
    }

    pub fn with_local_capacity(mut self, local_capacity: u32) -> Self {
        self.local_capacity = local_capacity;
        self
    }

    pub fn with_index_capacity(mut self, point: u32, spot: u32) -> Self {
        self.point_index_capacity = point;
        self.spot_index_capacity = spot;
        self
    }

    pub fn cluster_count(&self) -> usize {
        (self.grid.x * self.grid.y * self.grid.z) as usize
    }

    pub fn workgroup_invocations(&self) -> u32 {
        self.workgroup_size.x * self.workgroup_size.y * self.workgroup_size.z
    }

    /// Workgroups needed to cover the grid exactly once.
    pub fn workgroup_count(&self) -> UVec3 {
        self.grid / self.workgroup_size
    }

    pub fn coord_of(&self, index: usize) -> UVec3 {
        let index = index as u32;
        let plane = self.grid.x * self.grid.y;
        UVec3::new(
            index % self.grid.x,
            (index % plane) / self.grid.x,
            index / plane,
        )
    }

    pub fn validate(&self) -> CullResult<()> {
        if self.grid.min_element() == 0 {
            return Err(CullError::EmptyGrid(self.grid));
        }
        if self.workgroup_size.min_element() == 0 {
            return Err(CullError::EmptyGrid(self.workgroup_size));
        }
        if self.local_capacity == 0 || self.local_capacity as usize > MAX_LIGHTS_PER_CLUSTER {
            return Err(CullError::LocalCapacity {
                requested: self.local_capacity,
                max: MAX_LIGHTS_PER_CLUSTER as u32,
            });
        }
        if self.grid % self.workgroup_size != UVec3::ZERO {
            return Err(CullError::WorkgroupMismatch {
                grid: self.grid,
                workgroup: self.workgroup_size,
            });
        }
        for (kind, capacity) in [
            (LightKind::Point, self.point_index_capacity),
            (LightKind::Spot, self.spot_index_capacity),
        ] {
            if capacity == 0 {
                return Err(CullError::ZeroIndexCapacity(kind));
            }
            if capacity > MAX_INDEX_CAPACITY {
                return Err(CullError::IndexCapacityTooLarge {
                    kind,
                    requested: capacity,
                    max: MAX_INDEX_CAPACITY,
                });
            }
        }
        Ok(())
    }

    /// Rejects a dispatch whose extent does not cover the grid exactly.
    pub fn validate_dispatch(&self, workgroups: UVec3) -> CullResult<()> {
        let covered = workgroups * self.workgroup_size;
        if covered != self.grid {
            return Err(CullError::DispatchMismatch {
                dispatched: workgroups,
                covered,
                grid: self.grid,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClusterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster_count(), 1024);
        assert_eq!(config.workgroup_count(), UVec3::new(1, 1, 4));
        assert_eq!(config.workgroup_invocations(), 256);
    }

    #[test]
    fn linear_index_round_trips_every_cluster() {
        let config = ClusterConfig::default().with_grid(UVec3::new(4, 3, 5));
        for i in 0..config.cluster_count() {
            assert_eq!(linear_index(config.grid, config.coord_of(i)), i);
        }
        assert_eq!(linear_index(config.grid, UVec3::new(1, 2, 3)), 1 + 4 * (2 + 3 * 3));
    }

    #[test]
    fn rejects_misaligned_workgroup() {
        let config = ClusterConfig::default()
            .with_grid(UVec3::new(6, 8, 16))
            .with_workgroup_size(UVec3::new(4, 4, 4));
        assert!(matches!(
            config.validate(),
            Err(CullError::WorkgroupMismatch { .. })
        ));
    }

    #[test]
    fn rejects_local_capacity_out_of_range() {
        let config = ClusterConfig::default().with_local_capacity(65);
        assert!(matches!(
            config.validate(),
            Err(CullError::LocalCapacity { requested: 65, .. })
        ));
        let config = ClusterConfig::default().with_local_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_grid_and_zero_capacity() {
        let config = ClusterConfig::default().with_grid(UVec3::new(8, 0, 16));
        assert_eq!(
            config.validate(),
            Err(CullError::EmptyGrid(UVec3::new(8, 0, 16)))
        );
        let config = ClusterConfig::default().with_index_capacity(16, 0);
        assert_eq!(
            config.validate(),
            Err(CullError::ZeroIndexCapacity(LightKind::Spot))
        );
    }

    #[test]
    fn rejects_index_capacity_past_exact_float_range() {
        let config = ClusterConfig::default().with_index_capacity(MAX_INDEX_CAPACITY, 16);
        assert!(config.validate().is_ok());
        let config = ClusterConfig::default().with_index_capacity(16, MAX_INDEX_CAPACITY + 1);
        assert_eq!(
            config.validate(),
            Err(CullError::IndexCapacityTooLarge {
                kind: LightKind::Spot,
                requested: MAX_INDEX_CAPACITY + 1,
                max: MAX_INDEX_CAPACITY,
            })
        );
    }

    #[test]
    fn dispatch_must_cover_grid() {
        let config = ClusterConfig::default();
        assert!(config.validate_dispatch(UVec3::new(1, 1, 4)).is_ok());
        // the reference setup dispatched a single group over a 16-deep grid
        assert!(matches!(
            config.validate_dispatch(UVec3::new(1, 1, 1)),
            Err(CullError::DispatchMismatch { .. })
        ));
    }
}
