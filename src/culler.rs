use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Mat4, UVec3};
use log::{debug, warn};
use rayon::prelude::*;

use crate::camera::{CameraInfo, CameraUniform};
use crate::cluster::{Aabb, cluster_bounds, light_overlaps_cluster};
use crate::config::{ClusterConfig, MAX_LIGHTS_PER_CLUSTER};
use crate::error::{CullError, CullResult};
use crate::grid::{ClusterGrid, ClusterRecord};
use crate::light::{GpuLight, LightBlock, point_light_radius, spot_light_radius};

/// Stack scratch list one invocation fills before publishing.
#[derive(Clone, Copy, Debug)]
pub struct LocalLightList {
    indices: [u32; MAX_LIGHTS_PER_CLUSTER],
    len: usize,
    capacity: usize,
}

impl LocalLightList {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: [0; MAX_LIGHTS_PER_CLUSTER],
            len: 0,
            capacity: capacity.min(MAX_LIGHTS_PER_CLUSTER),
        }
    }

    /// Appends `index`; returns false once the list is full.
    pub fn push(&mut self, index: u32) -> bool {
        if self.is_full() {
            return false;
        }
        self.indices[self.len] = index;
        self.len += 1;
        true
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices[..self.len]
    }
}

/// Shared write cursor, one component per index array.
///
/// Owned by the caller and reset by the caller before each dispatch; the
/// dispatch only ever adds to it.
#[derive(Debug, Default)]
pub struct IndexCursor {
    pub point: AtomicU32,
    pub spot: AtomicU32,
}

impl IndexCursor {
    pub fn reset(&self) {
        self.point.store(0, Ordering::Relaxed);
        self.spot.store(0, Ordering::Relaxed);
    }

    pub fn load(&self) -> [u32; 2] {
        [
            self.point.load(Ordering::Relaxed),
            self.spot.load(Ordering::Relaxed),
        ]
    }
}

/// Output buffers of the CPU kernel: the record grid, both index arrays and
/// the cursor.
#[derive(Debug)]
pub struct CullTargets {
    pub grid: UVec3,
    pub records: Vec<ClusterRecord>,
    pub point_indices: Vec<AtomicU32>,
    pub spot_indices: Vec<AtomicU32>,
    pub cursor: IndexCursor,
}

impl CullTargets {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            grid: config.grid,
            records: vec![ClusterRecord::default(); config.cluster_count()],
            point_indices: (0..config.point_index_capacity)
                .map(|_| AtomicU32::new(0))
                .collect(),
            spot_indices: (0..config.spot_index_capacity)
                .map(|_| AtomicU32::new(0))
                .collect(),
            cursor: IndexCursor::default(),
        }
    }

    pub fn snapshot(&self) -> ClusterGrid {
        let load = |v: &[AtomicU32]| v.iter().map(|a| a.load(Ordering::Relaxed)).collect();
        ClusterGrid {
            grid: self.grid,
            records: self.records.clone(),
            point_indices: load(&self.point_indices),
            spot_indices: load(&self.spot_indices),
            cursor: self.cursor.load(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub clusters: u32,
    pub point_refs: u64,
    pub spot_refs: u64,
    /// Clusters whose local list filled up; later lights were not considered.
    pub saturated_clusters: u32,
    /// References dropped because the global index array was full.
    pub point_overflow: u64,
    pub spot_overflow: u64,
}

impl DispatchStats {
    fn merge(self, other: Self) -> Self {
        Self {
            clusters: self.clusters + other.clusters,
            point_refs: self.point_refs + other.point_refs,
            spot_refs: self.spot_refs + other.spot_refs,
            saturated_clusters: self.saturated_clusters + other.saturated_clusters,
            point_overflow: self.point_overflow + other.point_overflow,
            spot_overflow: self.spot_overflow + other.spot_overflow,
        }
    }
}

struct Published {
    start: u32,
    count: u32,
    dropped: u32,
}

/// Reserves a slice of `indices` and copies `list` into it. References past
/// the end of the array are dropped.
fn publish(list: &LocalLightList, cursor: &AtomicU32, indices: &[AtomicU32]) -> Published {
    let requested = list.len() as u32;
    let start = cursor.fetch_add(requested, Ordering::Relaxed);
    let available = (indices.len() as u32).saturating_sub(start);
    let count = requested.min(available);
    for (slot, &index) in indices
        .iter()
        .skip(start as usize)
        .zip(&list.as_slice()[..count as usize])
    {
        slot.store(index, Ordering::Relaxed);
    }
    Published {
        start,
        count,
        dropped: requested - count,
    }
}

fn gather(
    lights: &[GpuLight],
    capacity: usize,
    aabb: &Aabb,
    view: &Mat4,
    radius: impl Fn(f32) -> f32,
) -> LocalLightList {
    let mut list = LocalLightList::new(capacity);
    for (i, light) in lights.iter().enumerate() {
        if light_overlaps_cluster(aabb, view, light.center(), radius(light.intensity())) {
            list.push(i as u32);
            if list.is_full() {
                break;
            }
        }
    }
    list
}

/// CPU rendition of the cull kernel. Every cluster is one rayon task; the
/// tasks only meet at the two cursor `fetch_add`s.
#[derive(Clone, Copy, Debug)]
pub struct ClusterCuller {
    pub config: ClusterConfig,
}

impl ClusterCuller {
    pub fn new(config: ClusterConfig) -> CullResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Local accumulation for one cluster: the lights of each kind that touch
    /// it, capped at the local capacity.
    pub fn cull_cluster(
        &self,
        coord: UVec3,
        camera: &CameraUniform,
        point: &LightBlock,
        spot: &LightBlock,
    ) -> (LocalLightList, LocalLightList) {
        let aabb = cluster_bounds(coord, &camera.info(), self.config.grid);
        let view = camera.view();
        let capacity = self.config.local_capacity as usize;
        let clamp = self.config.clamp_spot_discriminant;
        (
            gather(point.active(), capacity, &aabb, &view, point_light_radius),
            gather(spot.active(), capacity, &aabb, &view, |i| {
                spot_light_radius(i, clamp)
            }),
        )
    }

    /// Runs one dispatch of `workgroups` groups into `targets`.
    ///
    /// The cursor is not reset here. Callers reset it between dispatches
    /// (see [`ClusterCuller::cull`]).
    pub fn dispatch(
        &self,
        workgroups: UVec3,
        camera: &CameraUniform,
        point: &LightBlock,
        spot: &LightBlock,
        targets: &mut CullTargets,
    ) -> CullResult<DispatchStats> {
        self.config.validate_dispatch(workgroups)?;
        if targets.grid != self.config.grid || targets.records.len() != self.config.cluster_count()
        {
            return Err(CullError::TargetsMismatch {
                expected: self.config.grid,
                found_grid: targets.grid,
                found: targets.records.len(),
            });
        }

        let CullTargets {
            records,
            point_indices,
            spot_indices,
            cursor,
            ..
        } = targets;
        let (point_indices, spot_indices, cursor) = (&*point_indices, &*spot_indices, &*cursor);
        let capacity = self.config.local_capacity as usize;

        let stats = records
            .par_iter_mut()
            .enumerate()
            .map(|(i, record)| {
                let coord = self.config.coord_of(i);
                let (point_list, spot_list) = self.cull_cluster(coord, camera, point, spot);

                let p = publish(&point_list, &cursor.point, point_indices);
                let s = publish(&spot_list, &cursor.spot, spot_indices);

                *record = ClusterRecord {
                    point_start: p.start,
                    point_count: p.count,
                    spot_start: s.start,
                    spot_count: s.count,
                };

                DispatchStats {
                    clusters: 1,
                    point_refs: p.count as u64,
                    spot_refs: s.count as u64,
                    saturated_clusters: (point_list.len() == capacity
                        || spot_list.len() == capacity) as u32,
                    point_overflow: p.dropped as u64,
                    spot_overflow: s.dropped as u64,
                }
            })
            .reduce(DispatchStats::default, DispatchStats::merge);

        debug!(
            "culled {} clusters: {} point refs, {} spot refs",
            stats.clusters, stats.point_refs, stats.spot_refs
        );
        if stats.point_overflow + stats.spot_overflow > 0 {
            warn!(
                "light index arrays full: dropped {} point and {} spot references",
                stats.point_overflow, stats.spot_overflow
            );
        }
        Ok(stats)
    }

    /// Resets the cursor and dispatches over the whole grid.
    pub fn cull(
        &self,
        camera: &CameraUniform,
        point: &LightBlock,
        spot: &LightBlock,
        targets: &mut CullTargets,
    ) -> CullResult<DispatchStats> {
        targets.cursor.reset();
        self.dispatch(self.config.workgroup_count(), camera, point, spot, targets)
    }
}

/// Uncapped per-cluster overlap lists for one light kind, in record order.
/// Used to check the kernels against.
pub fn brute_force(
    config: &ClusterConfig,
    camera: &CameraUniform,
    lights: &[GpuLight],
    radius: impl Fn(f32) -> f32,
) -> Vec<Vec<u32>> {
    let info: CameraInfo = camera.info();
    let view = camera.view();
    (0..config.cluster_count())
        .map(|i| {
            let aabb = cluster_bounds(config.coord_of(i), &info, config.grid);
            lights
                .iter()
                .enumerate()
                .filter(|(_, l)| {
                    light_overlaps_cluster(&aabb, &view, l.center(), radius(l.intensity()))
                })
                .map(|(i, _)| i as u32)
                .collect()
        })
        .collect()
}
