use argmin::core::{ArgminFloat, Executor, State};
use nalgebra::{Point2, Point3, Vector2};

use crate::{
    misc::FloatingPoint,
    patch::{evaluate_grid_into, BezierPatch, Grid},
    surface::NurbsSurface,
    tolerance::diagonal_error,
};

use super::{
    project_to_triangle, ClosestPointOptions, PatchClosestParameterNewton, PatchClosestParameterProblem,
    TriangleProjection,
};

/// Result of a closest point query.
/// `uv` is the parameter fraction on the surface, `valid` is false when no patch could be sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceClosestPoint<T: FloatingPoint> {
    pub uv: Point2<T>,
    pub point: Point3<T>,
    pub distance: T,
    pub valid: bool,
}

impl<T: FloatingPoint> SurfaceClosestPoint<T> {
    pub fn invalid() -> Self {
        Self {
            uv: Point2::origin(),
            point: Point3::origin(),
            distance: T::zero(),
            valid: false,
        }
    }
}

/// Best coarse hit of the triangle search
struct Candidate<'a, T: FloatingPoint> {
    patch: &'a BezierPatch<T>,
    projection: TriangleProjection<T>,
    /// local patch parameter interpolated from the triangle corners
    local: Point2<T>,
    distance: T,
}

impl<T: FloatingPoint + ArgminFloat> NurbsSurface<T> {
    /// Find the closest point on the surface to a given point.
    /// Every patch is searched on a coarse triangulated grid, then the best hit is refined by Newton iteration.
    ///
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let plane: NurbsSurface<f64> = NurbsSurface::bilinear([
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(2., 0., 0.),
    ///     Point3::new(0., 2., 0.),
    ///     Point3::new(2., 2., 0.),
    /// ]).unwrap();
    /// let closest = plane.find_closest_point(&Point3::new(1., 1., 3.), &ClosestPointOptions::default());
    /// assert!(closest.valid);
    /// assert!((closest.distance - 3.).abs() < 1e-8);
    /// assert!((closest.uv.x - 0.5).abs() < 1e-8);
    /// ```
    pub fn find_closest_point(&self, point: &Point3<T>, options: &ClosestPointOptions<T>) -> SurfaceClosestPoint<T> {
        let patches = BezierPatch::extract_all(self);
        find_closest_point_on_patches(self, &patches, point, options)
    }
}

/// Closest point search over already extracted patches of `surface`
pub fn find_closest_point_on_patches<T: FloatingPoint + ArgminFloat>(
    surface: &NurbsSurface<T>,
    patches: &[BezierPatch<T>],
    point: &Point3<T>,
    options: &ClosestPointOptions<T>,
) -> SurfaceClosestPoint<T> {
    let mut grid = Grid::default();
    let mut best: Option<Candidate<'_, T>> = None;

    for patch in patches.iter() {
        if patch.is_null() {
            log::trace!("skip null patch {:?}", patch.indices());
            continue;
        }
        let deviation = diagonal_error(
            &patch.euclidean_control_points(),
            patch.u_order(),
            patch.v_order(),
        )
        .relative;
        let nu = options.density(patch.u_order(), deviation);
        let nv = options.density(patch.v_order(), deviation);
        let range = (T::zero(), T::one());
        evaluate_grid_into(&mut grid, patch, range, range, nu, nv, false, false);

        let local = |i: usize, j: usize| {
            Point2::new(
                nalgebra::convert::<f64, T>(i as f64) / nalgebra::convert((nu - 1) as f64),
                nalgebra::convert::<f64, T>(j as f64) / nalgebra::convert((nv - 1) as f64),
            )
        };

        for j in 0..nv - 1 {
            for i in 0..nu - 1 {
                let cell = [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)];
                if cell.iter().any(|(ci, cj)| !grid.is_valid(*ci, *cj)) {
                    continue;
                }
                for triangle in [[cell[0], cell[1], cell[2]], [cell[0], cell[2], cell[3]]] {
                    let [a, b, c] = triangle;
                    let projection = project_to_triangle(
                        point,
                        grid.point(a.0, a.1),
                        grid.point(b.0, b.1),
                        grid.point(c.0, c.1),
                    );
                    let distance = (projection.point - point).norm();
                    if best.as_ref().is_some_and(|b| b.distance <= distance) {
                        continue;
                    }
                    let w = &projection.barycentric;
                    let local = Point2::from(
                        local(a.0, a.1).coords * w.x + local(b.0, b.1).coords * w.y + local(c.0, c.1).coords * w.z,
                    );
                    best = Some(Candidate {
                        patch,
                        projection,
                        local,
                        distance,
                    });
                }
            }
        }
    }

    match best {
        Some(candidate) => refine(surface, point, candidate, options),
        None => SurfaceClosestPoint::invalid(),
    }
}

fn refine<T: FloatingPoint + ArgminFloat>(
    surface: &NurbsSurface<T>,
    point: &Point3<T>,
    candidate: Candidate<'_, T>,
    options: &ClosestPointOptions<T>,
) -> SurfaceClosestPoint<T> {
    let patch = candidate.patch;
    let (u, v) = patch.local_to_fraction(candidate.local.x, candidate.local.y);
    let coarse = at_fraction(surface, point, Point2::new(u, v));

    let window = options.acceptance_window;
    if candidate.projection.min_unclamped() < -window {
        return coarse;
    }

    let solver = PatchClosestParameterNewton::new((-window, T::one() + window));
    let problem = PatchClosestParameterProblem::new(point, patch);
    let res = Executor::new(problem, solver)
        .configure(|state| {
            state
                .param(Vector2::new(candidate.local.x, candidate.local.y))
                .max_iters(options.max_iters)
        })
        .run();
    let local = match res.ok().and_then(|r| r.state().get_best_param().cloned()) {
        Some(local) => local,
        None => {
            log::debug!("closest point refinement failed, keeping the grid candidate");
            return coarse;
        }
    };

    let (u, v) = patch.local_to_fraction(local.x, local.y);
    let (zero, one) = (T::zero(), T::one());
    let inside = zero <= u && u <= one && zero <= v && v <= one;
    let uv = Point2::new(nalgebra::clamp(u, zero, one), nalgebra::clamp(v, zero, one));
    let refined = at_fraction(surface, point, uv);

    let accept = if inside {
        refined.distance <= coarse.distance * (one + options.relative_slack) + T::default_epsilon()
    } else {
        refined.distance < coarse.distance
    };
    if accept {
        refined
    } else {
        coarse
    }
}

fn at_fraction<T: FloatingPoint>(surface: &NurbsSurface<T>, point: &Point3<T>, uv: Point2<T>) -> SurfaceClosestPoint<T> {
    let p = surface.point_at_fraction(&uv);
    SurfaceClosestPoint {
        uv,
        point: p,
        distance: (p - point).norm(),
        valid: true,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::surface::SurfaceDirection;

    fn dome() -> NurbsSurface<f64> {
        let points = (0..3)
            .flat_map(|j| {
                (0..3).map(move |i| Point3::new(i as f64, j as f64, if i == 1 && j == 1 { 2. } else { 0. }))
            })
            .collect();
        NurbsSurface::try_new(
            SurfaceDirection::clamped(3, 3).unwrap(),
            SurfaceDirection::clamped(3, 3).unwrap(),
            points,
            None,
        )
        .unwrap()
    }

    #[test]
    fn refined_point_is_orthogonal() {
        let surface = dome();
        let query = Point3::new(0.7, 1.2, 2.);
        let closest = surface.find_closest_point(&query, &ClosestPointOptions::default());
        assert!(closest.valid);
        let knot = surface.fraction_to_knot(&closest.uv);
        let d = surface.rational_derivatives(knot.x, knot.y, 1);
        let r = closest.point - query;
        assert_relative_eq!(r.dot(&d[1][0]), 0., epsilon = 1e-5);
        assert_relative_eq!(r.dot(&d[0][1]), 0., epsilon = 1e-5);
    }

    #[test]
    fn refinement_is_never_worse_than_sampling() {
        let surface = dome();
        let query = Point3::new(1.3, 0.4, -1.);
        let coarse = surface.find_closest_point(&query, &ClosestPointOptions::default().with_max_iters(0));
        let fine = surface.find_closest_point(&query, &ClosestPointOptions::default());
        assert!(fine.distance <= coarse.distance + 1e-9);
    }

    #[test]
    fn point_on_surface() {
        let surface = dome();
        let on = surface.point_at_fraction(&Point2::new(0.3, 0.6));
        let closest = surface.find_closest_point(&on, &ClosestPointOptions::default());
        assert_relative_eq!(closest.distance, 0., epsilon = 1e-8);
        assert_relative_eq!(closest.uv, Point2::new(0.3, 0.6), epsilon = 1e-6);
    }
}
