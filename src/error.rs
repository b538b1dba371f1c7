use glam::UVec3;
use thiserror::Error;

use crate::light::LightKind;

pub type CullResult<T> = Result<T, CullError>;

/// Host-side configuration and capacity errors.
///
/// The kernel itself has no error channel; everything here is caught before a
/// dispatch is recorded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CullError {
    #[error("cluster grid has a zero dimension: {0}")]
    EmptyGrid(UVec3),

    #[error("local capacity {requested} outside 1..={max}")]
    LocalCapacity { requested: u32, max: u32 },

    #[error("grid {grid} is not a multiple of workgroup size {workgroup}")]
    WorkgroupMismatch { grid: UVec3, workgroup: UVec3 },

    #[error("dispatch of {dispatched} workgroups covers {covered} clusters, grid is {grid}")]
    DispatchMismatch {
        dispatched: UVec3,
        covered: UVec3,
        grid: UVec3,
    },

    #[error("{0:?} index capacity is zero")]
    ZeroIndexCapacity(LightKind),

    #[error("{kind:?} index capacity {requested} exceeds {max}")]
    IndexCapacityTooLarge {
        kind: LightKind,
        requested: u32,
        max: u32,
    },

    #[error("targets hold {found} clusters of grid {found_grid}, culler grid is {expected}")]
    TargetsMismatch {
        expected: UVec3,
        found_grid: UVec3,
        found: usize,
    },

    #[error("too many {kind:?} lights: capacity is {capacity}")]
    TooManyLights { kind: LightKind, capacity: usize },

    #[error("workgroup of {invocations} invocations exceeds device limit {limit}")]
    WorkgroupTooLarge { invocations: u32, limit: u32 },

    #[error("unknown light id")]
    UnknownLight,
}
