use std::collections::{BTreeMap, HashSet};

use approx::assert_relative_eq;
use bsurf::prelude::*;
use geo::{Area, LineString, Polygon};
use nalgebra::{Point2, Point3};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Quadratic in U over two spans, quadratic in V over one, with a bump that makes the
/// two patches ask for different step counts
fn bumpy_surface() -> NurbsSurface<f64> {
    let u = SurfaceDirection::clamped(3, 4).unwrap();
    let v = SurfaceDirection::clamped(3, 3).unwrap();
    let points = (0..3)
        .flat_map(|j| {
            (0..4).map(move |i| {
                let z = if i == 3 && j == 1 { 1.5 } else { 0.1 * i as f64 };
                Point3::new(i as f64, j as f64, z)
            })
        })
        .collect();
    NurbsSurface::try_new(u, v, points, None).unwrap()
}

/// Quadratic over three spans in each direction, a wavy sheet of nine curved patches
fn wavy_surface() -> NurbsSurface<f64> {
    let u = SurfaceDirection::clamped(3, 5).unwrap();
    let v = SurfaceDirection::clamped(3, 5).unwrap();
    let points = (0..5)
        .flat_map(|j| {
            (0..5).map(move |i| {
                let z = 0.4 * (i as f64 * 1.3).sin() * (j as f64 * 0.9).cos();
                Point3::new(i as f64, j as f64, z)
            })
        })
        .collect();
    NurbsSurface::try_new(u, v, points, None).unwrap()
}

fn random_star(rng: &mut StdRng) -> Vec<Point2<f64>> {
    let n = rng.random_range(5..24);
    let phase: f64 = rng.random_range(0.0..1.0);
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64 + phase;
            let radius = rng.random_range(0.1..0.45);
            Point2::new(0.5 + radius * angle.cos(), 0.5 + radius * angle.sin())
        })
        .collect()
}

fn flat_surface() -> NurbsSurface<f64> {
    NurbsSurface::bilinear([
        Point3::new(0., 0., 0.),
        Point3::new(1., 0., 0.),
        Point3::new(0., 1., 0.),
        Point3::new(1., 1., 0.),
    ])
    .unwrap()
}

fn mesh_area(tess: &SurfaceTessellation<f64>) -> f64 {
    let (points, faces) = tess.to_mesh();
    faces
        .iter()
        .map(|[a, b, c]| (points[*b] - points[*a]).cross(&(points[*c] - points[*a])).z * 0.5)
        .sum()
}

fn polygon_area(points: &[Point2<f64>]) -> f64 {
    let ring: LineString<f64> = points.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(ring, vec![]).unsigned_area()
}

type EdgeKey = ((u64, u64), (u64, u64));

/// Parameter-space area of every facet together with the total length of the edges no
/// neighbouring facet walks back along
fn param_area_and_open_length(tess: &SurfaceTessellation<f64>) -> (f64, f64) {
    let key = |p: &Point2<f64>| (p.x.to_bits(), p.y.to_bits());
    let mut area = 0.;
    let mut edges: HashSet<EdgeKey> = HashSet::new();
    let mut segments = vec![];
    for event in tess.events() {
        let params = event.params().unwrap();
        for [a, b, c] in event.triangles() {
            let (a, b, c) = (params[a], params[b], params[c]);
            if key(&a) == key(&b) || key(&b) == key(&c) || key(&c) == key(&a) {
                continue;
            }
            area += ((b - a).perp(&(c - a))) * 0.5;
            for (p, q) in [(a, b), (b, c), (c, a)] {
                edges.insert((key(&p), key(&q)));
                segments.push((p, q));
            }
        }
    }
    let open = segments
        .iter()
        .filter(|(p, q)| !edges.contains(&(key(q), key(p))))
        .map(|(p, q)| (q - p).norm())
        .sum();
    (area, open)
}

fn perimeter(points: &[Point2<f64>]) -> f64 {
    (0..points.len())
        .map(|i| (points[(i + 1) % points.len()] - points[i]).norm())
        .sum()
}

fn circle(center: Point2<f64>, radius: f64, n: usize) -> Vec<Point2<f64>> {
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            center + nalgebra::Vector2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

#[test]
fn shared_patch_edge_is_watertight() {
    let surface = bumpy_surface();
    let options = TessellationOptions::default()
        .with_chord_tolerance(0.005)
        .with_params_required(true);
    let tess = surface.tessellate(Some(options)).unwrap();
    assert!(tess.summary().is_complete());
    assert_eq!(tess.summary().regions, 2);

    // points on the knot line, keyed by V, from each side
    let mut left: BTreeMap<u64, Point3<f64>> = BTreeMap::new();
    let mut right: BTreeMap<u64, Point3<f64>> = BTreeMap::new();
    for event in tess.events() {
        let params = event.params().unwrap();
        let on_left = params.iter().all(|p| p.x <= 0.5);
        for (p, point) in params.iter().zip(event.points()) {
            if p.x == 0.5 {
                let side = if on_left { &mut left } else { &mut right };
                side.insert(p.y.to_bits(), *point);
            }
        }
    }
    assert!(left.len() >= 2);
    assert_eq!(
        left.keys().collect::<Vec<_>>(),
        right.keys().collect::<Vec<_>>()
    );
    for (v, p) in left.iter() {
        assert_relative_eq!(*p, right[v], epsilon = 1e-9);
    }
}

#[test]
fn finer_tolerance_never_lowers_step_counts() {
    let patches = BezierPatch::extract_all(&bumpy_surface());
    for patch in patches.iter() {
        let mut previous: Option<GridCounts<f64>> = None;
        for tolerance in [0.5, 0.1, 0.05, 0.01, 0.001] {
            let counts = compute_step_counts(patch, &ToleranceOptions::default().with_chord_tolerance(tolerance));
            if let Some(prev) = previous.as_ref() {
                for (a, b) in [(&prev.u, &counts.u), (&prev.v, &counts.v)] {
                    assert!(b.interior >= a.interior);
                    assert!(b.low >= a.low);
                    assert!(b.high >= a.high);
                }
            }
            previous = Some(counts);
        }
    }
}

#[test]
fn trimmed_disc_area_is_preserved() {
    let disc = circle(Point2::new(0.5, 0.5), 0.35, 48);
    let expected = polygon_area(&disc);
    let surface = flat_surface().with_trim_loops(vec![PolygonBoundary::new(disc)]);
    for strategy in [TessellationStrategy::PatchMonotone, TessellationStrategy::SurfaceGraph] {
        let options = TessellationOptions::default()
            .with_min_per_bezier(6)
            .with_strategy(strategy);
        let tess = surface.tessellate(Some(options)).unwrap();
        let summary = tess.summary();
        assert!(summary.is_complete(), "{:?}: {:?}", strategy, summary);
        assert!(summary.regions > 0);
        assert!(summary.tri_strips > 0);
        assert_relative_eq!(mesh_area(&tess), expected, epsilon = 1e-9);
    }
}

#[test]
fn random_stars_on_a_curved_surface_are_closed_meshes() {
    let surface = wavy_surface();
    let mut rng = StdRng::seed_from_u64(29);
    for _ in 0..40 {
        let star = random_star(&mut rng);
        let (area, length) = (polygon_area(&star), perimeter(&star));
        let trimmed = surface.clone().with_trim_loops(vec![PolygonBoundary::new(star)]);
        for strategy in [TessellationStrategy::PatchMonotone, TessellationStrategy::SurfaceGraph] {
            let options = TessellationOptions::default()
                .with_params_required(true)
                .with_strategy(strategy);
            let tess = trimmed.tessellate(Some(options)).unwrap();
            assert!(tess.summary().is_complete(), "{:?}: {:?}", strategy, tess.summary());
            let (mesh_area, open_length) = param_area_and_open_length(&tess);
            assert_relative_eq!(mesh_area, area, epsilon = 1e-9);
            // only the trim itself is left without a facet on its other side
            assert_relative_eq!(open_length, length, epsilon = 1e-9);
        }
    }
}

#[test]
fn hole_origin_cuts_the_loop_out() {
    let disc = circle(Point2::new(0.5, 0.5), 0.25, 32);
    let hole = polygon_area(&disc);
    let surface = flat_surface()
        .with_trim_loops(vec![PolygonBoundary::new(disc)])
        .with_hole_origin(true);
    let tess = surface.tessellate(None).unwrap();
    assert!(tess.summary().is_complete());
    assert_relative_eq!(mesh_area(&tess), 1. - hole, epsilon = 1e-9);
}

#[test]
fn monotone_regions_cover_random_stars() {
    let surface = bumpy_surface();
    let layout = PatchLayout::new(&surface);
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..20 {
        let star = random_star(&mut rng);
        let decomposition = decompose(&[star.clone()], &layout, 1e-10);
        assert_eq!(decomposition.failed_bands, 0);
        let total: f64 = decomposition.regions.iter().map(|r| polygon_area(&r.polygon())).sum();
        assert_relative_eq!(total, polygon_area(&star), epsilon = 1e-9);
        for region in decomposition.regions.iter() {
            assert!(is_v_monotone(&region.polygon()));
        }
    }
}

#[test]
fn events_stream_through_the_sink() {
    let surface = bumpy_surface();
    let mut points = 0;
    let summary = surface
        .tessellate_with(&TessellationOptions::default(), |event| {
            assert!(event.points().len() >= 3);
            points += event.points().len();
        })
        .unwrap();
    assert!(points > 0);
    assert_eq!(summary.failed_regions, 0);
}
