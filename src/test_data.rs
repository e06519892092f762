//! # Test Data Generator
//!
//! Generates point clouds for benchmarking and validation.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pointcloud::PointCloud;

/// Two points at (0,0,0) and (1,1,1) with no radius layer
pub fn diagonal_pair() -> PointCloud {
    PointCloud::from_positions(vec![Vec3::ZERO, Vec3::ONE])
}

/// `n^3` points on the integer lattice `[0, n)^3`
pub fn grid_cloud(n: usize) -> PointCloud {
    let mut positions = Vec::with_capacity(n * n * n);
    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                positions.push(Vec3::new(x as f32, y as f32, z as f32));
            }
        }
    }
    PointCloud::from_positions(positions)
}

/// `count` points uniform in `[-extent, extent]^3` with per-point radii in
/// `[0, max_radius)`
pub fn random_cloud(count: usize, extent: f32, max_radius: f32, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let positions: Vec<Vec3> = (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
            )
        })
        .collect();
    let radii: Vec<f32> = (0..count).map(|_| rng.gen::<f32>() * max_radius).collect();

    let mut pointcloud = PointCloud::from_positions(positions);
    pointcloud.radius_for_write().copy_from_slice(&radii);
    pointcloud
}

/// Points on a flat square in the XY plane, all with `z = 0`
pub fn planar_cloud(side: usize, spacing: f32) -> PointCloud {
    let positions = (0..side * side)
        .map(|i| Vec3::new((i % side) as f32 * spacing, (i / side) as f32 * spacing, 0.0))
        .collect();
    PointCloud::from_positions(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_cloud() {
        let pointcloud = grid_cloud(3);
        assert_eq!(pointcloud.point_count(), 27);
        let bounds = pointcloud.bounds_min_max(false).unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::splat(2.0));
    }

    #[test]
    fn test_random_cloud_is_seeded() {
        let a = random_cloud(50, 2.0, 0.1, 7);
        let b = random_cloud(50, 2.0, 0.1, 7);
        assert_eq!(a.attribute_storage(), b.attribute_storage());
        assert!(a.radius().is_span());
    }

    #[test]
    fn test_planar_cloud_tree() {
        // Many coplanar points in one tree bucket
        let pointcloud = planar_cloud(40, 0.5);
        let tree = pointcloud.bvh().unwrap();
        assert_eq!(tree.len(), 1600);

        let (idx, dist) = tree.nearest(Vec3::new(1.1, 1.1, 0.0)).unwrap();
        assert_eq!(pointcloud.positions()[idx], Vec3::new(1.0, 1.0, 0.0));
        assert!(dist < 0.2);
    }
}
