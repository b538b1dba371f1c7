use crate::config::{ClusterConfig, LIGHT_BLOCK_CAPACITY};

const CULL_LIGHTS_BODY: &str = include_str!("../../shaders/cull_lights.wgsl");

/// WGSL source of the cull kernel for `config`, with the module-scope
/// constants the shader body refers to prepended.
pub fn cull_lights_source(config: &ClusterConfig) -> String {
    let header = format!(
        "const GRID_X: u32 = {}u;\n\
         const GRID_Y: u32 = {}u;\n\
         const GRID_Z: u32 = {}u;\n\
         const WORKGROUP_X: u32 = {}u;\n\
         const WORKGROUP_Y: u32 = {}u;\n\
         const WORKGROUP_Z: u32 = {}u;\n\
         const LOCAL_CAPACITY: u32 = {}u;\n\
         const LIGHT_BLOCK_CAPACITY: u32 = {}u;\n\
         const CLAMP_SPOT_DISCRIMINANT: bool = {};\n\n",
        config.grid.x,
        config.grid.y,
        config.grid.z,
        config.workgroup_size.x,
        config.workgroup_size.y,
        config.workgroup_size.z,
        config.local_capacity,
        LIGHT_BLOCK_CAPACITY,
        config.clamp_spot_discriminant,
    );
    header + CULL_LIGHTS_BODY
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    #[test]
    fn header_reflects_config() {
        let config = ClusterConfig {
            clamp_spot_discriminant: false,
            ..ClusterConfig::default()
        }
        .with_grid(UVec3::new(16, 8, 24))
        .with_local_capacity(32);
        let src = cull_lights_source(&config);
        assert!(src.contains("const GRID_X: u32 = 16u;"));
        assert!(src.contains("const GRID_Z: u32 = 24u;"));
        assert!(src.contains("const WORKGROUP_Z: u32 = 4u;"));
        assert!(src.contains("const LOCAL_CAPACITY: u32 = 32u;"));
        assert!(src.contains("const LIGHT_BLOCK_CAPACITY: u32 = 512u;"));
        assert!(src.contains("const CLAMP_SPOT_DISCRIMINANT: bool = false;"));
        assert!(src.contains("fn main("));
    }
}
