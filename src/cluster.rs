use glam::{Mat4, UVec3, Vec3};

use crate::camera::CameraInfo;

/// View-space axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Squared distance from `point` to the nearest point of the box; zero
    /// inside.
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        let mut dist = 0.0;
        for i in 0..3 {
            let v = point[i];
            let below = self.min[i] - self.min[i].min(v);
            dist += below * below;
            let above = self.max[i].max(v) - self.max[i];
            dist += above * above;
        }
        dist
    }
}

/// The two tile lines of `tile` along one axis, for a slice whose near and far
/// half extents are `near_half` and `far_half`, folded into (min, max).
fn tile_span(tile: u32, tiles: u32, near_half: f32, far_half: f32) -> (f32, f32) {
    let line = |half: f32, i: u32| -half + i as f32 * (2.0 * half) / tiles as f32;
    let samples = [
        line(far_half, tile),
        line(near_half, tile),
        line(far_half, tile + 1),
        line(near_half, tile + 1),
    ];
    samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        })
}

/// View-space bounds of cluster `coord` in a `grid` laid over the frustum.
///
/// Depth is split linearly into `grid.z` slices between near and far. The
/// frustum-shaped cell is approximated by the box around its eight corners.
pub fn cluster_bounds(coord: UVec3, info: &CameraInfo, grid: UVec3) -> Aabb {
    let slice = (info.far - info.near) / grid.z as f32;
    let far_depth = info.near + slice * (coord.z + 1) as f32;
    let near_depth = far_depth - slice;

    let tan_half_fov = (info.fov_y / 2.0).tan();
    let far_h = far_depth * tan_half_fov;
    let near_h = near_depth * tan_half_fov;
    let far_w = far_h * info.aspect;
    let near_w = near_h * info.aspect;

    let (min_x, max_x) = tile_span(coord.x, grid.x, near_w, far_w);
    let (min_y, max_y) = tile_span(coord.y, grid.y, near_h, far_h);

    Aabb {
        min: Vec3::new(min_x, min_y, -far_depth),
        max: Vec3::new(max_x, max_y, -near_depth),
    }
}

/// Sphere vs box by nearest-point distance. A negative radius is treated as
/// zero, so it only hits boxes containing the center. A NaN radius hits
/// nothing.
pub fn sphere_intersects_aabb(aabb: &Aabb, center: Vec3, radius: f32) -> bool {
    if radius.is_nan() {
        return false;
    }
    let r = radius.max(0.0);
    aabb.distance_squared(center) <= r * r
}

/// Overlap test for a light given in world space.
pub fn light_overlaps_cluster(aabb: &Aabb, view: &Mat4, world_center: Vec3, radius: f32) -> bool {
    sphere_intersects_aabb(aabb, view.transform_point3(world_center), radius)
}
