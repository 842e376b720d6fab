use approx::assert_relative_eq;
use bsurf::prelude::*;
use nalgebra::{Point2, Point3, Point4, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn plane(size: f64) -> NurbsSurface<f64> {
    NurbsSurface::bilinear([
        Point3::new(0., 0., 0.),
        Point3::new(size, 0., 0.),
        Point3::new(0., size, 0.),
        Point3::new(size, size, 0.),
    ])
    .unwrap()
}

/// Flat surface with two spans in each direction
fn split_plane() -> NurbsSurface<f64> {
    let u = SurfaceDirection::clamped(2, 3).unwrap();
    let v = SurfaceDirection::clamped(2, 3).unwrap();
    let points = (0..3)
        .flat_map(|j| (0..3).map(move |i| Point3::new(i as f64, j as f64, 0.)))
        .collect();
    NurbsSurface::try_new(u, v, points, None).unwrap()
}

fn bernstein(n: usize, i: usize, t: f64) -> f64 {
    let binomial = (0..i).fold(1., |acc, k| acc * (n - k) as f64 / (k + 1) as f64);
    binomial * t.powi(i as i32) * (1. - t).powi((n - i) as i32)
}

#[test]
fn closest_point_above_the_center() {
    let surface = plane(2.);
    let closest = surface.find_closest_point(&Point3::new(1., 1., 0.75), &ClosestPointOptions::default());
    assert!(closest.valid);
    assert_relative_eq!(closest.distance, 0.75, epsilon = 1e-8);
    assert_relative_eq!(closest.uv, Point2::new(0.5, 0.5), epsilon = 1e-8);
    assert_relative_eq!(closest.point, Point3::new(1., 1., 0.), epsilon = 1e-8);
}

#[test]
fn closest_point_far_outside_is_clamped() {
    let surface = plane(2.);
    let closest = surface.find_closest_point(&Point3::new(10., -7., 1.), &ClosestPointOptions::default());
    assert!(closest.valid);
    assert!((0. ..=1.).contains(&closest.uv.x));
    assert!((0. ..=1.).contains(&closest.uv.y));
    assert_relative_eq!(closest.uv, Point2::new(1., 0.), epsilon = 1e-8);
}

#[test]
fn closest_point_on_random_heights() {
    let surface = split_plane();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..25 {
        let (x, y) = (rng.random_range(0.05..1.95), rng.random_range(0.05..1.95));
        let height = rng.random_range(0.01..2.0);
        let closest = surface.find_closest_point(&Point3::new(x, y, height), &ClosestPointOptions::default());
        assert!(closest.valid);
        assert_relative_eq!(closest.distance, height, epsilon = 1e-8);
        assert_relative_eq!(closest.uv, Point2::new(x / 2., y / 2.), epsilon = 1e-8);
    }
}

#[test]
fn ray_through_a_plane_hits_once() {
    let surface = split_plane();
    let ray = Ray::new(Point3::new(0.6, 1.6, 2.), Vector3::new(0.1, -0.2, -1.));
    let hits = surface.find_intersection(&ray, None);
    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert!(hit.curve_parameter() > 0.);
    assert_relative_eq!(hit.curve_parameter(), 2., epsilon = 1e-9);
    let (u, v) = hit.uv();
    assert!((0. ..=1.).contains(&u) && (0. ..=1.).contains(&v));
    assert_relative_eq!(*hit.surface_point(), Point3::new(0.8, 1.2, 0.), epsilon = 1e-9);
    assert_relative_eq!(u, 0.4, epsilon = 1e-9);
    assert_relative_eq!(v, 0.6, epsilon = 1e-9);
}

#[test]
fn ray_missing_the_patch_finds_nothing() {
    let surface = plane(1.);
    let ray = Ray::new(Point3::new(3., 3., 1.), Vector3::new(0., 0., -1.));
    assert!(surface.find_intersection(&ray, None).is_empty());
}

#[test]
fn null_and_weightless_patches_evaluate_safely() {
    let collapsed: BezierPatch<f64> = BezierPatch::from_points(1, 3, vec![Point3::new(1., 2., 3.); 3]);
    assert!(collapsed.is_null());
    let grid = evaluate_grid(&collapsed, (0., 1.), (0., 1.), 3, 3, false, true);
    assert!(grid.points().iter().all(|p| p.iter().all(|c| c.is_finite())));
    assert!(grid.normals().iter().all(|n| n.iter().all(|c| c.is_finite())));

    let weightless = BezierPatch::from_points(2, 2, vec![Point3::new(1., 1., 1.); 4])
        .with_control_points(vec![Point4::new(0., 0., 0., 0.); 4], true);
    let grid = evaluate_grid(&weightless, (0., 1.), (0., 1.), 4, 4, false, true);
    assert_eq!(grid.points().len(), 16);
    assert!(grid.points().iter().all(|p| *p == Point3::origin()));
    assert!(grid.valid().iter().all(|v| !v));
}

#[test]
fn non_rational_grid_matches_the_tensor_product() {
    let points: Vec<_> = (0..4)
        .flat_map(|j| {
            (0..4).map(move |i| {
                Point3::new(i as f64, j as f64, ((i * 3 + j * 5) % 7) as f64 * 0.25)
            })
        })
        .collect();
    let surface = NurbsSurface::try_new(
        SurfaceDirection::clamped(4, 4).unwrap(),
        SurfaceDirection::clamped(4, 4).unwrap(),
        points.clone(),
        None,
    )
    .unwrap();
    let patch = BezierPatch::extract(&surface, 0, 0);
    let grid = evaluate_grid(&patch, (0., 1.), (0., 1.), 5, 6, false, false);
    for (param, point) in grid.params().iter().zip(grid.points()) {
        let mut expected = Vector3::zeros();
        for j in 0..4 {
            for i in 0..4 {
                expected += points[j * 4 + i].coords * bernstein(3, i, param.x) * bernstein(3, j, param.y);
            }
        }
        assert_relative_eq!(point.coords, expected, epsilon = 1e-12);
    }
}
