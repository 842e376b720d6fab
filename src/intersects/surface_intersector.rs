use std::cmp::Ordering;

use argmin::core::{ArgminFloat, Executor, State};
use itertools::Itertools;
use nalgebra::{Point3, Vector3};

use crate::{
    bounding_box::BoundingBox,
    curve::{NurbsCurve, ParametricCurve},
    misc::{scalar, FloatingPoint, Ray},
    patch::{evaluate, evaluate_grid, BezierPatch, Grid},
    surface::NurbsSurface,
};

use super::{
    BilinearHit, BilinearQuad, HasIntersection, IntersectionOptions, Intersects, SurfaceCurveIntersection,
    SurfaceCurveIntersectionProblem, SurfaceCurveNewton,
};

/// How far past a coarse cell a pierce point may land and still seed a refinement
const CELL_MARGIN: f64 = 0.1;

/// Coarse sampling of one patch, kept for repeated queries
#[derive(Clone, Debug)]
struct PatchRange<T: FloatingPoint> {
    patch: BezierPatch<T>,
    bounds: BoundingBox<T>,
    grid: Grid<T>,
}

impl<T: FloatingPoint> PatchRange<T> {
    fn cell_count(&self) -> (usize, usize) {
        (self.grid.num_u() - 1, self.grid.num_v() - 1)
    }

    fn cell(&self, i: usize, j: usize) -> Option<BilinearQuad<T>> {
        let g = &self.grid;
        let corners = [(i, j), (i + 1, j), (i, j + 1), (i + 1, j + 1)];
        if corners.iter().any(|(ci, cj)| !g.is_valid(*ci, *cj)) {
            return None;
        }
        Some(BilinearQuad::new(
            g.point(i, j),
            g.point(i + 1, j),
            g.point(i, j + 1),
            g.point(i + 1, j + 1),
        ))
    }

    fn cell_bounds(&self, i: usize, j: usize) -> BoundingBox<T> {
        let g = &self.grid;
        BoundingBox::new_with_points([
            *g.point(i, j),
            *g.point(i + 1, j),
            *g.point(i, j + 1),
            *g.point(i + 1, j + 1),
        ])
    }

    /// Map a hit inside cell `(i, j)` to local patch parameters
    fn local(&self, i: usize, j: usize, hit: &BilinearHit<T>) -> (T, T) {
        let (cu, cv) = self.cell_count();
        let du = T::one() / scalar(cu as f64);
        let dv = T::one() / scalar(cv as f64);
        (
            (scalar::<T>(i as f64) + hit.s) * du,
            (scalar::<T>(j as f64) + hit.t) * dv,
        )
    }

    /// Absolute residual tolerance for hits on this patch
    fn residual_tolerance(&self, relative: T) -> T {
        let magnitude = self
            .bounds
            .min()
            .iter()
            .chain(self.bounds.max().iter())
            .fold(T::zero(), |m, c| m.max(c.abs()));
        relative * (T::one() + magnitude)
    }
}

/// Ray and curve intersector over the patches of one surface.
/// Patch extraction, bounding ranges and coarse grids are built once and reused by every query.
#[derive(Clone, Debug)]
pub struct SurfaceIntersector<'a, T: FloatingPoint> {
    surface: &'a NurbsSurface<T>,
    ranges: Vec<PatchRange<T>>,
    options: IntersectionOptions<T>,
}

impl<'a, T: FloatingPoint> SurfaceIntersector<'a, T> {
    pub fn new(surface: &'a NurbsSurface<T>, options: IntersectionOptions<T>) -> Self {
        let ranges = BezierPatch::extract_all(surface)
            .into_iter()
            .filter(|patch| !patch.is_null())
            .map(|patch| {
                let bounds = BoundingBox::new_with_points(patch.euclidean_control_points());
                let nu = options.grid_size(patch.u_order());
                let nv = options.grid_size(patch.v_order());
                let range = (T::zero(), T::one());
                let grid = evaluate_grid(&patch, range, range, nu, nv, false, false);
                PatchRange { patch, bounds, grid }
            })
            .collect();
        Self {
            surface,
            ranges,
            options,
        }
    }

    pub fn surface(&self) -> &NurbsSurface<T> {
        self.surface
    }

    pub fn options(&self) -> &IntersectionOptions<T> {
        &self.options
    }

    /// Coarse seeds `(patch index, [line parameter, u, v])` where the line pierces a grid cell.
    /// `segment` limits the line parameter to a chord when set.
    fn pierce(&self, ray: &Ray<T>, segment: Option<(T, T)>) -> Vec<(usize, Vector3<T>)> {
        let mut seeds = vec![];
        let cell_margin = scalar::<T>(CELL_MARGIN);
        for (index, range) in self.ranges.iter().enumerate() {
            let margin = range.bounds.diagonal_length() * scalar(1e-6) + T::default_epsilon();
            let Some((t0, t1)) = range
                .bounds
                .line_interval(ray.origin(), ray.direction(), margin)
            else {
                continue;
            };
            if let Some((lo, hi)) = segment {
                if t1 < lo || t0 > hi {
                    continue;
                }
            }

            let (cu, cv) = range.cell_count();
            for j in 0..cv {
                for i in 0..cu {
                    let Some(quad) = range.cell(i, j) else {
                        continue;
                    };
                    let cell_box = range.cell_bounds(i, j).expanded(margin);
                    if cell_box
                        .line_interval(ray.origin(), ray.direction(), margin)
                        .is_none()
                    {
                        continue;
                    }
                    for hit in quad.line_intersections(ray, cell_margin) {
                        if let Some((lo, hi)) = segment {
                            if hit.line_parameter < lo || hit.line_parameter > hi {
                                continue;
                            }
                        }
                        let (u, v) = range.local(i, j, &hit);
                        seeds.push((index, Vector3::new(hit.line_parameter, u, v)));
                    }
                }
            }
        }
        seeds
    }

    /// Build a hit from a converged local solution, `None` when it left the patch or the curve domain
    fn accept<C: ParametricCurve<T>>(
        &self,
        range: &PatchRange<T>,
        curve: &C,
        param: &Vector3<T>,
    ) -> Option<SurfaceCurveIntersection<Point3<T>, T>> {
        let margin = self.options.parameter_margin;
        let (lo, hi) = (-margin, T::one() + margin);
        if param.y < lo || param.y > hi || param.z < lo || param.z > hi {
            return None;
        }
        let (d0, d1) = curve.domain();
        let slack = (d1 - d0).abs().min(T::one()) * margin;
        if param.x < d0 - slack || param.x > d1 + slack {
            return None;
        }
        let s = param.y.clamp(T::zero(), T::one());
        let t = param.z.clamp(T::zero(), T::one());
        let sample = evaluate(&range.patch, s, t, false);
        if !sample.valid {
            return None;
        }
        let (u, v) = range.patch.local_to_fraction(s, t);
        let c = param.x.clamp(d0, d1);
        Some(SurfaceCurveIntersection::new(
            (sample.point, (u, v)),
            (curve.point_at(c), c),
        ))
    }

    /// Sort hits along the curve and merge the ones found from neighboring cells or patches
    fn merge(&self, hits: Vec<SurfaceCurveIntersection<Point3<T>, T>>, parameter_tolerance: T) -> Vec<SurfaceCurveIntersection<Point3<T>, T>> {
        let tolerance = self.options.merge_tolerance;
        hits.into_iter()
            .sorted_by(|x, y| {
                x.curve_parameter()
                    .partial_cmp(&y.curve_parameter())
                    .unwrap_or(Ordering::Equal)
            })
            .coalesce(|x, y| {
                let close = (x.a().0 - y.a().0).norm() <= tolerance
                    && (x.curve_parameter() - y.curve_parameter()).abs() <= parameter_tolerance;
                if close {
                    // keep the hit whose curve and surface points agree best
                    let dx = (x.a().0 - x.b().0).norm();
                    let dy = (y.a().0 - y.b().0).norm();
                    Ok(if dy < dx { y } else { x })
                } else {
                    Err((x, y))
                }
            })
            .collect()
    }
}

impl<T: FloatingPoint + ArgminFloat> SurfaceIntersector<'_, T> {
    /// Intersections of the full line through `ray`; hits behind the origin have negative parameters.
    pub fn intersect_ray(&self, ray: &Ray<T>) -> Vec<SurfaceCurveIntersection<Point3<T>, T>> {
        let hits = self
            .pierce(ray, None)
            .into_iter()
            .filter_map(|(index, seed)| self.refine(&self.ranges[index], ray, seed))
            .collect();
        let length = ray.direction().norm();
        let parameter_tolerance = if length > T::default_epsilon() {
            self.options.merge_tolerance / length
        } else {
            self.options.merge_tolerance
        };
        self.merge(hits, parameter_tolerance)
    }

    /// Intersections with a bounded curve.
    /// The curve is stroked into chords and every chord pierces the coarse grids before refinement.
    pub fn intersect_curve<C: ParametricCurve<T>>(&self, curve: &C) -> Vec<SurfaceCurveIntersection<Point3<T>, T>> {
        let params = curve.stroke_parameters();
        let mut hits = vec![];
        for (t0, t1) in params.iter().tuple_windows() {
            let (p0, p1) = (curve.point_at(*t0), curve.point_at(*t1));
            let chord = Ray::new(p0, p1 - p0);
            // let the chord run a little past its ends to catch hits on the curve's bulge
            let reach: T = nalgebra::convert(CELL_MARGIN);
            let seeds = self.pierce(&chord, Some((-reach, T::one() + reach)));
            for (index, seed) in seeds {
                let t = *t0 + (*t1 - *t0) * seed.x;
                let seed = Vector3::new(t, seed.y, seed.z);
                if let Some(hit) = self.refine(&self.ranges[index], curve, seed) {
                    hits.push(hit);
                }
            }
        }
        let (d0, d1) = curve.domain();
        let parameter_tolerance = self.options.merge_tolerance * (T::one() + d1 - d0);
        self.merge(hits, parameter_tolerance)
    }

    /// Newton refinement of one seed, `None` when it fails to converge or leaves the patch
    fn refine<C: ParametricCurve<T>>(
        &self,
        range: &PatchRange<T>,
        curve: &C,
        seed: Vector3<T>,
    ) -> Option<SurfaceCurveIntersection<Point3<T>, T>> {
        let problem = SurfaceCurveIntersectionProblem::new(&range.patch, curve);
        let solver = SurfaceCurveNewton::new(
            range.residual_tolerance(self.options.tolerance),
            self.options.required_converged,
        );
        let res = Executor::new(problem, solver)
            .configure(|state| state.param(seed).max_iters(self.options.max_iters))
            .run();
        match res {
            Ok(r) if r.solver.is_converged() => {
                let param = r.state().get_param().cloned()?;
                self.accept(range, curve, &param)
            }
            Ok(_) => {
                log::trace!("surface curve newton did not converge from {:?}", seed);
                None
            }
            Err(e) => {
                log::trace!("surface curve newton aborted: {}", e);
                None
            }
        }
    }
}

impl<'a, T: FloatingPoint + ArgminFloat> Intersects<'a, &'a Ray<T>> for NurbsSurface<T> {
    type Output = Vec<SurfaceCurveIntersection<Point3<T>, T>>;
    type Option = Option<IntersectionOptions<T>>;

    /// Find the intersections between the surface and the line of a ray
    ///
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let plane: NurbsSurface<f64> = NurbsSurface::bilinear([
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(1., 0., 0.),
    ///     Point3::new(0., 1., 0.),
    ///     Point3::new(1., 1., 0.),
    /// ]).unwrap();
    /// let ray = Ray::new(Point3::new(0.25, 0.5, 1.), Vector3::new(0., 0., -1.));
    /// let hits = plane.find_intersection(&ray, None);
    /// assert_eq!(hits.len(), 1);
    /// assert!((hits[0].curve_parameter() - 1.).abs() < 1e-9);
    /// ```
    fn find_intersection(&'a self, ray: &'a Ray<T>, option: Self::Option) -> Self::Output {
        SurfaceIntersector::new(self, option.unwrap_or_default()).intersect_ray(ray)
    }
}

impl<'a, T: FloatingPoint + ArgminFloat> Intersects<'a, &'a NurbsCurve<T>> for NurbsSurface<T> {
    type Output = Vec<SurfaceCurveIntersection<Point3<T>, T>>;
    type Option = Option<IntersectionOptions<T>>;

    fn find_intersection(&'a self, curve: &'a NurbsCurve<T>, option: Self::Option) -> Self::Output {
        SurfaceIntersector::new(self, option.unwrap_or_default()).intersect_curve(curve)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        intersects::HasIntersectionParameter,
        misc::EllipseArc,
        surface::SurfaceDirection,
    };

    fn wave() -> NurbsSurface<f64> {
        // 4x3 net over [0, 3] x [0, 2] with a bump in the middle
        let points = (0..3)
            .flat_map(|j| {
                (0..4).map(move |i| {
                    let z = if (i == 1 || i == 2) && j == 1 { 1. } else { 0. };
                    Point3::new(i as f64, j as f64, z)
                })
            })
            .collect();
        NurbsSurface::try_new(
            SurfaceDirection::clamped(3, 4).unwrap(),
            SurfaceDirection::clamped(3, 3).unwrap(),
            points,
            None,
        )
        .unwrap()
    }

    #[test]
    fn vertical_ray_hits_once() {
        let surface = wave();
        let intersector = SurfaceIntersector::new(&surface, IntersectionOptions::default());
        let ray = Ray::new(Point3::new(1.3, 0.8, 5.), Vector3::new(0., 0., -1.));
        let hits = intersector.intersect_ray(&ray);
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_relative_eq!(*hit.surface_point(), *hit.curve_point(), epsilon = 1e-8);
        assert_relative_eq!(hit.surface_point().x, 1.3, epsilon = 1e-8);
        assert_relative_eq!(hit.surface_point().y, 0.8, epsilon = 1e-8);
        let (u, v) = hit.a_parameter();
        let on = surface.point_at_fraction(&nalgebra::Point2::new(u, v));
        assert_relative_eq!(on, *hit.surface_point(), epsilon = 1e-8);
    }

    #[test]
    fn line_behind_origin_is_reported() {
        let surface = wave();
        let ray = Ray::new(Point3::new(1.5, 1., -3.), Vector3::new(0., 0., -1.));
        let hits = surface.find_intersection(&ray, None);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].curve_parameter() < 0.);
    }

    #[test]
    fn ray_missing_the_bounds() {
        let surface = wave();
        let ray = Ray::new(Point3::new(10., 10., 5.), Vector3::new(0., 0., -1.));
        assert!(surface.find_intersection(&ray, None).is_empty());
    }

    #[test]
    fn arc_crosses_twice() {
        let surface = wave();
        // vertical circle around the bump crossing the surface on both sides
        let arc = EllipseArc::circle(
            Point3::new(1.5, 1., 0.2),
            Vector3::x(),
            Vector3::z(),
            1.,
        );
        let intersector = SurfaceIntersector::new(&surface, IntersectionOptions::default());
        let hits = intersector.intersect_curve(&arc);
        assert!(hits.len() >= 2);
        for hit in hits.iter() {
            assert_relative_eq!(*hit.surface_point(), *hit.curve_point(), epsilon = 1e-7);
        }
    }
}
