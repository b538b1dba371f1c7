use glam::Vec3;

use crate::config::{
    LIGHT_BLOCK_CAPACITY, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};
use crate::error::{CullError, CullResult};

pub mod manager;

/// Coefficients of the `1 / (1 + k_l d + k_q d^2)` attenuation model the
/// shading pass uses.
pub const ATTENUATION_LINEAR: f32 = 0.14;
pub const ATTENUATION_QUADRATIC: f32 = 0.07;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
}

impl LightKind {
    pub fn capacity(self) -> usize {
        match self {
            LightKind::Point => MAX_POINT_LIGHTS,
            LightKind::Directional => MAX_DIRECTIONAL_LIGHTS,
            LightKind::Spot => MAX_SPOT_LIGHTS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,

    pub position: Vec3,

    pub intensity: f32,

    pub direction: Vec3,

    pub color: Vec3,

    pub range: f32,

    /// Cone half-angle in radians, spot lights only.
    pub angle: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            position: Vec3::ZERO,
            intensity: 1.0,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            range: 10.0,
            angle: 0.5, // ~30 deg
        }
    }
}

impl Light {
    pub fn point(position: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            intensity,
            ..Default::default()
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, angle: f32, intensity: f32) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction,
            angle,
            intensity,
            ..Default::default()
        }
    }

    pub fn directional(direction: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction,
            intensity,
            ..Default::default()
        }
    }
}

/// One light as both kernels read it: three `vec4`s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4],  // w: intensity
    pub color: [f32; 4],     // w: range
    pub direction: [f32; 4], // w: spot angle
}

impl From<&Light> for GpuLight {
    fn from(l: &Light) -> Self {
        Self {
            position: l.position.extend(l.intensity).to_array(),
            color: l.color.extend(l.range).to_array(),
            direction: l.direction.extend(l.angle).to_array(),
        }
    }
}

impl GpuLight {
    pub fn center(&self) -> Vec3 {
        Vec3::from_slice(&self.position[..3])
    }

    pub fn intensity(&self) -> f32 {
        self.position[3]
    }
}

/// Fixed-capacity light array plus active count, laid out like the uniform
/// block the compute shader declares (count after the array, padded to 16).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightBlock {
    pub lights: [GpuLight; LIGHT_BLOCK_CAPACITY],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl LightBlock {
    pub fn empty() -> Box<Self> {
        bytemuck::zeroed_box()
    }

    /// Packs `lights` into a new block. Fails instead of truncating when the
    /// slice is larger than the capacity of `kind`.
    pub fn from_lights(kind: LightKind, lights: &[Light]) -> CullResult<Box<Self>> {
        let capacity = kind.capacity().min(LIGHT_BLOCK_CAPACITY);
        if lights.len() > capacity {
            return Err(CullError::TooManyLights { kind, capacity });
        }
        let mut block = Self::empty();
        for (slot, light) in block.lights.iter_mut().zip(lights) {
            *slot = light.into();
        }
        block.count = lights.len() as u32;
        Ok(block)
    }

    pub fn active(&self) -> &[GpuLight] {
        &self.lights[..(self.count as usize).min(LIGHT_BLOCK_CAPACITY)]
    }
}

fn radius_from_discriminant(discriminant: f32) -> f32 {
    -1.0 + discriminant.sqrt() / ATTENUATION_LINEAR
}

/// Cutoff radius of a point light.
///
/// Solves the attenuation quadratic for the distance where the contribution
/// falls below the shading threshold. The discriminant is clamped, so dim
/// lights bottom out at -1.
pub fn point_light_radius(intensity: f32) -> f32 {
    let c = 1.0 - 5.0 * intensity;
    let discriminant =
        ATTENUATION_LINEAR * ATTENUATION_LINEAR - 4.0 * ATTENUATION_QUADRATIC * c;
    radius_from_discriminant(discriminant.max(0.0))
}

/// Cutoff radius of a spot light. Note the sign of the `c` term differs from
/// [`point_light_radius`]; with `clamp` unset a negative discriminant yields NaN.
pub fn spot_light_radius(intensity: f32, clamp: bool) -> f32 {
    let c = 1.0 - 5.0 * intensity;
    let discriminant =
        ATTENUATION_LINEAR * ATTENUATION_LINEAR + 4.0 * ATTENUATION_QUADRATIC * c;
    if clamp {
        radius_from_discriminant(discriminant.max(0.0))
    } else {
        radius_from_discriminant(discriminant)
    }
}
