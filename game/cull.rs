use anyhow::Result;
use glam::Vec3;
use log::{info, warn};

use cluster_cull::{
    Camera, ClusterConfig, ClusterCullPipeline, ClusterCuller, ClusterGrid, CullTargets,
    GpuContext, Light, LightManager,
};

fn summarize(label: &str, grid: &ClusterGrid) {
    let busiest = grid
        .coords()
        .max_by_key(|&c| grid.record(c).point_count + grid.record(c).spot_count);
    let lit = grid
        .records
        .iter()
        .filter(|r| r.point_count + r.spot_count > 0)
        .count();
    info!(
        "{label}: {lit}/{} clusters lit, {} point refs, {} spot refs, busiest {:?}",
        grid.cluster_count(),
        grid.total_point_refs(),
        grid.total_spot_refs(),
        busiest.map(|c| (c, grid.record(c))),
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let cam = Camera {
        eye: Vec3::new(0.0, 3.0, 12.0),
        target: Vec3::new(0.0, 0.0, -20.0),
        up: Vec3::Y,
        fov_y_radians: 60.0_f32.to_radians(),
        z_near: 0.1,
        z_far: 100.0,
        aspect: 16.0 / 9.0,
    };

    let mut lights = LightManager::new();
    for i in 0..200 {
        let t = i as f32 * 0.37;
        lights.insert(Light::point(
            Vec3::new(t.sin() * 15.0, (t * 0.5).cos() * 3.0, -t * 1.2),
            0.25 + (i % 7) as f32 * 0.2,
        ))?;
    }
    for i in 0..32 {
        let x = (i % 8) as f32 * 4.0 - 14.0;
        let z = -((i / 8) as f32) * 10.0;
        lights.insert(Light::spot(Vec3::new(x, 4.0, z), Vec3::NEG_Y, 0.5, 0.1))?;
    }
    lights.insert(Light::directional(Vec3::new(-0.3, -1.0, -0.2), 0.8))?;

    let config = ClusterConfig::default();
    let camera = cam.uniform();
    let point = lights.point_block();
    let spot = lights.spot_block();

    let culler = ClusterCuller::new(config)?;
    let mut targets = CullTargets::new(&config);
    let stats = culler.cull(&camera, &point, &spot, &mut targets)?;
    info!("cpu dispatch: {stats:?}");
    summarize("cpu", &targets.snapshot());

    match GpuContext::headless_blocking() {
        Ok(ctx) => {
            let pipeline = ClusterCullPipeline::new(ctx, config)?;
            pipeline.cull(&camera, &point, &spot)?;
            summarize("gpu", &pipeline.read_back()?);
        }
        Err(err) => warn!("no GPU available, skipping GPU dispatch: {err:#}"),
    }

    Ok(())
}
