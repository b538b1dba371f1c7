use glam::{Mat4, Vec3, Vec4};

/// Camera block the cull shader reads.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],       // 64 bytes
    pub projection: [[f32; 4]; 4], // 64 bytes
    pub view_pos: [f32; 4],        // w unused
    pub cam_info: [f32; 4],        // fov_y, aspect, near, far
}

impl CameraUniform {
    pub fn view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }

    pub fn info(&self) -> CameraInfo {
        let [fov_y, aspect, near, far] = self.cam_info;
        CameraInfo {
            fov_y,
            aspect,
            near,
            far,
        }
    }
}

/// Projection parameters the cluster bounds are derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraInfo {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraInfo {
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.fov_y, self.aspect, self.near, self.far)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.z_near, self.z_far)
    }

    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            fov_y: self.fov_y_radians,
            aspect: self.aspect,
            near: self.z_near,
            far: self.z_far,
        }
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view: self.view().to_cols_array_2d(),
            projection: self.projection().to_cols_array_2d(),
            view_pos: self.eye.extend(1.0).to_array(),
            cam_info: self.info().to_vec4().to_array(),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60.0f32.to_radians(),
            z_near: 0.1,
            z_far: 100.0,
            aspect: 1.0,
        }
    }
}
