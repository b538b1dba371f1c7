use cluster_cull::cluster::{Aabb, cluster_bounds, light_overlaps_cluster};
use cluster_cull::culler::brute_force;
use cluster_cull::light::{point_light_radius, spot_light_radius};
use cluster_cull::{
    Camera, ClusterConfig, ClusterCuller, CullTargets, Light, LightBlock, LightKind,
    LightManager,
};
use glam::{UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn small_grid() -> ClusterConfig {
    ClusterConfig::default()
        .with_grid(UVec3::new(4, 4, 16))
        .with_workgroup_size(UVec3::new(4, 4, 4))
}

/// Deterministic scatter of points in front of the default camera.
fn scatter(n: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-35.0..5.0),
            )
        })
        .collect()
}

#[test]
fn single_light_lands_in_exactly_the_overlapping_clusters() {
    let config = small_grid();
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();
    let point =
        LightBlock::from_lights(LightKind::Point, &[Light::point(Vec3::ZERO, 0.3)]).unwrap();
    let spot = LightBlock::empty();
    let mut targets = CullTargets::new(&config);

    culler.cull(&camera, &point, &spot, &mut targets).unwrap();
    let grid = targets.snapshot();

    let radius = point_light_radius(0.3);
    let view = camera.view();
    let mut hits = 0;
    for coord in grid.coords() {
        let aabb: Aabb = cluster_bounds(coord, &camera.info(), config.grid);
        let expected = light_overlaps_cluster(&aabb, &view, Vec3::ZERO, radius);
        if expected {
            hits += 1;
            assert_eq!(grid.point_lights(coord), &[0], "cluster {coord}");
        } else {
            assert_eq!(grid.record(coord).point_count, 0, "cluster {coord}");
        }
    }

    // origin sits 10 units ahead on the corner shared by the four central tiles
    for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
        assert_eq!(grid.point_lights(UVec3::new(x, y, 1)), &[0]);
    }
    assert_eq!(grid.total_point_refs(), hits);
    assert_eq!(grid.cursor, [hits as u32, 0]);
}

#[test]
fn no_lights_leaves_every_record_zero() {
    let config = ClusterConfig::default();
    let culler = ClusterCuller::new(config).unwrap();
    let empty = LightBlock::empty();
    let mut targets = CullTargets::new(&config);

    let stats = culler
        .cull(&Camera::default().uniform(), &empty, &empty, &mut targets)
        .unwrap();
    let grid = targets.snapshot();

    assert_eq!(stats.clusters, 1024);
    assert!(grid.records.iter().all(|r| *r == Default::default()));
    assert_eq!(grid.cursor, [0, 0]);
}

#[test]
fn local_capacity_saturates_without_overrun() {
    let config = small_grid();
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();
    let target = UVec3::new(2, 1, 4);
    let center = cluster_bounds(target, &camera.info(), config.grid).center();
    let world = camera.view().inverse().transform_point3(center);

    for n in [64, 100] {
        let lights = vec![Light::point(world, 0.0); n];
        let point = LightBlock::from_lights(LightKind::Point, &lights).unwrap();
        let mut targets = CullTargets::new(&config);
        let stats = culler
            .cull(&camera, &point, &LightBlock::empty(), &mut targets)
            .unwrap();
        let grid = targets.snapshot();

        let expected: Vec<u32> = (0..64).collect();
        assert_eq!(grid.point_lights(target), expected.as_slice());
        assert!(stats.saturated_clusters >= 1);
        assert!(grid.ranges_disjoint());
    }
}

#[test]
fn totals_match_brute_force() {
    let config = ClusterConfig::default();
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();

    let points: Vec<Light> = scatter(40, 7)
        .into_iter()
        .enumerate()
        .map(|(i, p)| Light::point(p, 0.2 + (i % 5) as f32 * 0.3))
        .collect();
    let spots: Vec<Light> = scatter(30, 99)
        .into_iter()
        .map(|p| Light::spot(p, Vec3::NEG_Y, 0.4, 0.1))
        .collect();
    let point = LightBlock::from_lights(LightKind::Point, &points).unwrap();
    let spot = LightBlock::from_lights(LightKind::Spot, &spots).unwrap();

    let mut targets = CullTargets::new(&config);
    let stats = culler.cull(&camera, &point, &spot, &mut targets).unwrap();
    let grid = targets.snapshot();

    let expected_point = brute_force(&config, &camera, point.active(), point_light_radius);
    let expected_spot = brute_force(&config, &camera, spot.active(), |i| {
        spot_light_radius(i, true)
    });

    let pairs: usize = expected_point.iter().map(Vec::len).sum();
    assert!(pairs > 0);
    assert_eq!(grid.total_point_refs(), pairs as u64);
    assert_eq!(stats.point_refs, pairs as u64);
    assert_eq!(
        grid.total_spot_refs(),
        expected_spot.iter().map(Vec::len).sum::<usize>() as u64
    );

    for (i, coord) in grid.coords().enumerate() {
        assert_eq!(grid.point_lights(coord), expected_point[i].as_slice());
        assert_eq!(grid.spot_lights(coord), expected_spot[i].as_slice());
    }
    assert!(grid.ranges_disjoint());
    assert_eq!(stats.point_overflow + stats.spot_overflow, 0);
}

#[test]
fn full_index_array_drops_instead_of_overrunning() {
    let config = small_grid().with_index_capacity(10, 10);
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();
    // bright enough to reach many clusters
    let lights: Vec<Light> = scatter(20, 3)
        .into_iter()
        .map(|p| Light::point(p, 3.0))
        .collect();
    let point = LightBlock::from_lights(LightKind::Point, &lights).unwrap();
    let mut targets = CullTargets::new(&config);

    let stats = culler
        .cull(&camera, &point, &LightBlock::empty(), &mut targets)
        .unwrap();
    let grid = targets.snapshot();

    assert_eq!(grid.total_point_refs(), 10);
    assert!(grid.cursor[0] > 10);
    assert_eq!(stats.point_overflow, grid.cursor[0] as u64 - 10);
    assert!(grid.ranges_disjoint());
    assert!(
        grid.records
            .iter()
            .filter(|r| r.point_count > 0)
            .all(|r| r.point_range().end <= 10)
    );
}

#[test]
fn cursor_is_left_to_the_caller() {
    let config = small_grid();
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();
    let point =
        LightBlock::from_lights(LightKind::Point, &[Light::point(Vec3::ZERO, 0.3)]).unwrap();
    let empty = LightBlock::empty();
    let mut targets = CullTargets::new(&config);

    culler.cull(&camera, &point, &empty, &mut targets).unwrap();
    let first = targets.cursor.load()[0];
    assert!(first > 0);

    culler
        .dispatch(config.workgroup_count(), &camera, &point, &empty, &mut targets)
        .unwrap();
    assert_eq!(targets.cursor.load()[0], first * 2);
    let min_start = targets
        .records
        .iter()
        .filter(|r| r.point_count > 0)
        .map(|r| r.point_start)
        .min();
    assert_eq!(min_start, Some(first));

    targets.cursor.reset();
    assert_eq!(targets.cursor.load(), [0, 0]);
}

#[test]
fn unclamped_spot_discriminant_skips_bright_spots() {
    let camera = Camera::default().uniform();
    let spot = LightBlock::from_lights(
        LightKind::Spot,
        &[Light::spot(Vec3::ZERO, Vec3::NEG_Z, 0.3, 0.5)],
    )
    .unwrap();
    let empty = LightBlock::empty();

    let clamped = small_grid();
    let mut targets = CullTargets::new(&clamped);
    ClusterCuller::new(clamped)
        .unwrap()
        .cull(&camera, &empty, &spot, &mut targets)
        .unwrap();
    // radius clamps to -1, treated as a point: only clusters containing it
    assert!(targets.snapshot().total_spot_refs() >= 1);

    let unclamped = ClusterConfig {
        clamp_spot_discriminant: false,
        ..small_grid()
    };
    let mut targets = CullTargets::new(&unclamped);
    ClusterCuller::new(unclamped)
        .unwrap()
        .cull(&camera, &empty, &spot, &mut targets)
        .unwrap();
    assert_eq!(targets.snapshot().total_spot_refs(), 0);
}

#[test]
fn managed_lights_report_their_packed_indices() {
    let config = small_grid();
    let culler = ClusterCuller::new(config).unwrap();
    let camera = Camera::default().uniform();

    let mut lights = LightManager::new();
    let far_away = lights
        .insert(Light::point(Vec3::new(0.0, 0.0, 500.0), 0.3))
        .unwrap();
    let visible = lights.insert(Light::point(Vec3::ZERO, 0.3)).unwrap();
    lights
        .insert(Light::directional(Vec3::NEG_Y, 1.0))
        .unwrap();

    let mut targets = CullTargets::new(&config);
    culler
        .cull(&camera, &lights.point_block(), &lights.spot_block(), &mut targets)
        .unwrap();
    assert_eq!(targets.snapshot().point_lights(UVec3::new(1, 1, 1)), &[1]);

    lights.remove(far_away);
    assert_eq!(lights.packed_index(visible), Some((LightKind::Point, 0)));
    culler
        .cull(&camera, &lights.point_block(), &lights.spot_block(), &mut targets)
        .unwrap();
    assert_eq!(targets.snapshot().point_lights(UVec3::new(1, 1, 1)), &[0]);
}
