//! PointCloud Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustcloud::{random_cloud, EvalMode, FnModifier, ModifierMode, Object, StageOutcome, Vec3};

fn bench_bounds(c: &mut Criterion) {
    let mut pointcloud = random_cloud(100_000, 10.0, 0.1, 1);

    c.bench_function("bounds_min_max_uncached", |b| {
        b.iter(|| {
            pointcloud.tag_positions_changed();
            black_box(pointcloud.bounds_min_max(false))
        })
    });

    c.bench_function("bounds_with_radius_uncached", |b| {
        b.iter(|| {
            pointcloud.tag_radii_changed();
            black_box(pointcloud.bounds_min_max(true))
        })
    });

    c.bench_function("bounds_min_max_cached", |b| {
        b.iter(|| black_box(pointcloud.bounds_min_max(false)))
    });
}

fn bench_radius_read(c: &mut Criterion) {
    let virtual_radius = rustcloud::grid_cloud(40);
    let real_radius = random_cloud(64_000, 1.0, 0.1, 2);

    c.bench_function("radius_sum_virtual", |b| {
        b.iter(|| virtual_radius.radius().iter().sum::<f32>())
    });

    c.bench_function("radius_sum_span", |b| {
        b.iter(|| real_radius.radius().iter().sum::<f32>())
    });
}

fn bench_bvh(c: &mut Criterion) {
    let pointcloud = random_cloud(50_000, 10.0, 0.1, 3);
    let tree = pointcloud.bvh().unwrap();

    c.bench_function("bvh_build_50k", |b| {
        b.iter(|| rustcloud::PointTree::build(black_box(pointcloud.positions())))
    });

    c.bench_function("bvh_nearest", |b| {
        b.iter(|| tree.nearest(black_box(Vec3::new(0.3, -1.2, 4.0))))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut object = Object::new("bench", random_cloud(10_000, 1.0, 0.1, 4));
    object.pipeline_mut().push(
        Box::new(FnModifier::new("offset", |_, geometry| {
            if let Some(pointcloud) = geometry.pointcloud_for_write() {
                for p in pointcloud.positions_for_write() {
                    *p += Vec3::X;
                }
            }
            Ok(StageOutcome::MutatedInPlace)
        })),
        ModifierMode::ALL,
    );

    c.bench_function("data_update_one_stage_10k", |b| {
        b.iter(|| object.data_update(EvalMode::Viewport))
    });
}

criterion_group!(benches, bench_bounds, bench_radius_read, bench_bvh, bench_evaluate);
criterion_main!(benches);
